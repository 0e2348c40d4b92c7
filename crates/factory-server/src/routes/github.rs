use axum::extract::State;
use axum::Json;
use factory_core::catalog::update_catalog;
use factory_core::folders;
use factory_core::paths::validate_folder_name;
use serde::Deserialize;

use crate::error::AppError;
use crate::routes::folders::RenameBody;
use crate::state::AppState;

/// POST /api/rename-github: rename the repository on GitHub, then the catalog
/// entry, then the local clone if there is one.
pub async fn rename_github(
    State(app): State<AppState>,
    Json(body): Json<RenameBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let old = body.old_name.trim().to_string();
    let new = body.new_name.trim().to_string();
    let result = tokio::task::spawn_blocking(move || {
        validate_folder_name(&old)?;
        validate_folder_name(&new)?;

        let url = app.github()?.rename_repo(&old, &new)?;
        update_catalog(&app.layout.catalog_path(), |f| f.rename(&old, &new))?;
        let local = folders::rename_installed_after_github(
            &app.layout,
            &app.identity.username,
            &old,
            &new,
            app.settings.timeouts.rename(),
        )?;
        app.cache.invalidate();

        Ok::<_, factory_core::FactoryError>(serde_json::json!({
            "success": true,
            "old_name": old,
            "new_name": new,
            "url": url,
            "local_path": local.map(|p| p.to_string_lossy().into_owned()),
        }))
    })
    .await
    .map_err(AppError::join)??;

    Ok(Json(result))
}

#[derive(Deserialize)]
pub struct DeleteGithubBody {
    #[serde(default)]
    name: String,
}

/// POST /api/delete-github: delete the repository on GitHub and drop it from
/// the catalog. Local clones are left alone.
pub async fn delete_github(
    State(app): State<AppState>,
    Json(body): Json<DeleteGithubBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let name = body.name.trim().to_string();
    validate_folder_name(&name)?;
    let result = tokio::task::spawn_blocking(move || {
        app.github()?.delete_repo(&name)?;
        update_catalog(&app.layout.catalog_path(), |f| f.remove(&name))?;
        app.cache.invalidate();
        Ok::<_, factory_core::FactoryError>(serde_json::json!({ "success": true, "name": name }))
    })
    .await
    .map_err(AppError::join)??;

    Ok(Json(result))
}

#[derive(Deserialize)]
pub struct UpdateDescriptionBody {
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
}

/// POST /api/update-description
pub async fn update_description(
    State(app): State<AppState>,
    Json(body): Json<UpdateDescriptionBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let name = body.name.trim().to_string();
    let description = body.description.trim().to_string();
    validate_folder_name(&name)?;
    let result = tokio::task::spawn_blocking(move || {
        app.github()?.update_description(&name, &description)?;
        update_catalog(&app.layout.catalog_path(), |f| {
            f.set_description(&name, &description)
        })?;
        app.cache.invalidate();
        Ok::<_, factory_core::FactoryError>(serde_json::json!({
            "success": true,
            "name": name,
            "description": description,
        }))
    })
    .await
    .map_err(AppError::join)??;

    Ok(Json(result))
}
