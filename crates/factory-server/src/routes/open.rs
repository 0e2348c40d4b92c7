use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use axum::extract::State;
use axum::Json;
use factory_core::FactoryError;
use serde::Deserialize;
use tracing::info;

use crate::error::AppError;
use crate::state::AppState;

const EDITORS: &[&str] = &["code", "cursor"];

#[derive(Deserialize)]
pub struct OpenFolderBody {
    #[serde(default)]
    path: String,
}

fn resolve(app: &AppState, raw: &str) -> Result<PathBuf, AppError> {
    app.layout
        .resolve_project_path(raw.trim())
        .ok_or_else(|| AppError::not_found(raw.trim()))
}

fn launch_editor(path: &Path) -> factory_core::Result<()> {
    let editor = EDITORS
        .iter()
        .find_map(|e| which::which(e).ok())
        .ok_or_else(|| FactoryError::MissingExecutable(EDITORS.join(" or ")))?;
    Command::new(&editor)
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;
    info!(editor = %editor.display(), path = %path.display(), "opened folder in editor");
    Ok(())
}

/// POST /api/open-folder: open a project in the code editor.
pub async fn open_folder(
    State(app): State<AppState>,
    Json(body): Json<OpenFolderBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let path = resolve(&app, &body.path)?;
    let result = tokio::task::spawn_blocking(move || {
        launch_editor(&path)?;
        Ok::<_, FactoryError>(serde_json::json!({
            "success": true,
            "path": path.to_string_lossy(),
        }))
    })
    .await
    .map_err(AppError::join)??;

    Ok(Json(result))
}

/// POST /api/open-folder-explorer: open a project in the OS file manager.
pub async fn open_folder_explorer(
    State(app): State<AppState>,
    Json(body): Json<OpenFolderBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let path = resolve(&app, &body.path)?;
    let result = tokio::task::spawn_blocking(move || {
        open::that(&path)?;
        Ok::<_, FactoryError>(serde_json::json!({
            "success": true,
            "path": path.to_string_lossy(),
        }))
    })
    .await
    .map_err(AppError::join)??;

    Ok(Json(result))
}
