use axum::extract::State;
use axum::Json;
use factory_core::folders::{self, Visibility};
use factory_core::io::count_folders;
use serde::Deserialize;
use tracing::warn;

use crate::error::AppError;
use crate::routes::repos::sync_catalog;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateProjectBody {
    #[serde(default)]
    name: Option<String>,
}

/// POST /api/create-project: scaffold a folder under `NEW_PROJECTS`.
pub async fn create_project(
    State(app): State<AppState>,
    Json(body): Json<CreateProjectBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let result = tokio::task::spawn_blocking(move || {
        let folder = folders::create_project(&app.layout, body.name.as_deref())?;
        app.cache.invalidate();
        Ok::<_, factory_core::FactoryError>(serde_json::json!({
            "success": true,
            "message": format!("Project \"{folder}\" created"),
            "folder_name": folder,
        }))
    })
    .await
    .map_err(AppError::join)??;

    Ok(Json(result))
}

#[derive(Deserialize)]
pub struct AddToGithubBody {
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    visibility: String,
}

/// POST /api/add-to-github: publish a local project as a new GitHub
/// repository, then refresh the catalog.
pub async fn add_to_github(
    State(app): State<AppState>,
    Json(body): Json<AddToGithubBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let visibility: Visibility = body.visibility.parse()?;
    let result = tokio::task::spawn_blocking(move || {
        let published = folders::publish_to_github(
            &app.layout,
            &app.identity.username,
            body.name.trim(),
            &body.description,
            visibility,
            app.settings.timeouts.create_project(),
        )?;
        // The repository exists now; a failed listing only leaves the catalog stale.
        if let Err(e) = sync_catalog(&app) {
            warn!(error = %e, "catalog refresh after publish failed");
        }
        app.cache.invalidate();

        let mut json = serde_json::to_value(&published)?;
        json["success"] = serde_json::Value::Bool(true);
        Ok::<_, factory_core::FactoryError>(json)
    })
    .await
    .map_err(AppError::join)??;

    Ok(Json(result))
}

#[derive(Deserialize)]
pub struct ReposBody {
    #[serde(default)]
    repos: Vec<String>,
}

/// POST /api/install: clone the selected repository URLs into `MY_REPOS`.
pub async fn install(
    State(app): State<AppState>,
    Json(body): Json<ReposBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let result = tokio::task::spawn_blocking(move || {
        let results = folders::install_repos(
            &app.layout,
            &body.repos,
            app.settings.timeouts.install_per_repo(),
        )?;
        app.cache.invalidate();
        Ok::<_, factory_core::FactoryError>(serde_json::json!({
            "success": true,
            "results": results,
            "installed_count": count_folders(&app.layout.installed),
        }))
    })
    .await
    .map_err(AppError::join)??;

    Ok(Json(result))
}

/// POST /api/delete: remove the named local folders.
pub async fn delete(
    State(app): State<AppState>,
    Json(body): Json<ReposBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let result = tokio::task::spawn_blocking(move || {
        let results = folders::delete_folders(&app.layout, &body.repos)?;
        app.cache.invalidate();
        Ok::<_, factory_core::FactoryError>(serde_json::json!({
            "success": true,
            "results": results,
            "installed_count": count_folders(&app.layout.installed),
            "new_projects_count": count_folders(&app.layout.new_projects),
        }))
    })
    .await
    .map_err(AppError::join)??;

    Ok(Json(result))
}

#[derive(Deserialize)]
pub struct RenameBody {
    #[serde(default)]
    pub(crate) old_name: String,
    #[serde(default)]
    pub(crate) new_name: String,
}

/// POST /api/rename: rename a local-only project.
pub async fn rename(
    State(app): State<AppState>,
    Json(body): Json<RenameBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let old = body.old_name.trim().to_string();
    let new = body.new_name.trim().to_string();
    let result = tokio::task::spawn_blocking(move || {
        folders::rename_local_project(&app.layout, &old, &new)?;
        app.cache.invalidate();
        Ok::<_, factory_core::FactoryError>(serde_json::json!({
            "success": true,
            "old_name": old,
            "new_name": new,
        }))
    })
    .await
    .map_err(AppError::join)??;

    Ok(Json(result))
}
