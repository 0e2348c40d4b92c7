use axum::extract::State;
use axum::Json;
use factory_core::push::{push_repository, VersionMode};
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct PushBody {
    #[serde(default)]
    path: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    version_mode: String,
}

/// POST /api/push: commit everything with a version-line message and push.
///
/// `message` is only a fallback for `generate_version` when nothing could be
/// generated; `use_existing` always takes the last line of `VERSION.md`.
pub async fn push(
    State(app): State<AppState>,
    Json(body): Json<PushBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let raw = body.path.trim().to_string();
    let path = app
        .layout
        .resolve_project_path(&raw)
        .ok_or_else(|| AppError::not_found(&raw))?;
    let mode: VersionMode = body.version_mode.parse()?;

    let result = tokio::task::spawn_blocking(move || {
        let fallback = match body.message.trim() {
            "" => app.settings.ui.default_push_message.clone(),
            m => m.to_string(),
        };
        // A failed push may still have committed, so invalidate either way.
        let outcome = push_repository(&path, mode, &fallback, app.settings.timeouts.git_push());
        app.cache.invalidate();
        let outcome = outcome?;

        let mut json = serde_json::to_value(&outcome)?;
        json["success"] = serde_json::Value::Bool(true);
        Ok::<_, factory_core::FactoryError>(json)
    })
    .await
    .map_err(AppError::join)??;

    Ok(Json(result))
}
