use axum::extract::State;
use axum::Json;
use factory_core::catalog::ProjectCatalog;

use crate::error::AppError;
use crate::state::AppState;

/// GET /api/repos: merged catalog with push eligibility from cached states.
pub async fn list_repos(State(app): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let result = tokio::task::spawn_blocking(move || {
        let snapshot = app.cache.get_states(false);
        let view = ProjectCatalog::new(&app.layout, &app.identity.username).load(&snapshot);
        let json = serde_json::to_value(&view)?;
        Ok::<_, factory_core::FactoryError>(json)
    })
    .await
    .map_err(AppError::join)??;

    Ok(Json(result))
}

/// GET /api/push-states: force a rescan, then report `can_push` per row.
pub async fn push_states(State(app): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let result = tokio::task::spawn_blocking(move || {
        let snapshot = app.cache.get_states(true);
        let items = ProjectCatalog::new(&app.layout, &app.identity.username).push_states(&snapshot);
        Ok::<_, factory_core::FactoryError>(serde_json::json!({ "items": items }))
    })
    .await
    .map_err(AppError::join)??;

    Ok(Json(result))
}

/// POST /api/refresh: replace the catalog file with the account's current
/// GitHub repositories.
pub async fn refresh_catalog(
    State(app): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let result = tokio::task::spawn_blocking(move || {
        let count = sync_catalog(&app)?;
        app.cache.invalidate();
        Ok::<_, factory_core::FactoryError>(serde_json::json!({
            "success": true,
            "message": format!("Fetched {count} repositories"),
            "count": count,
        }))
    })
    .await
    .map_err(AppError::join)??;

    Ok(Json(result))
}

/// Rewrite `repositories.yaml` from the GitHub API. Blocking.
pub(crate) fn sync_catalog(app: &AppState) -> factory_core::Result<usize> {
    let client = app.github()?.with_timeout(app.settings.timeouts.refresh());
    ProjectCatalog::new(&app.layout, &app.identity.username).refresh(&client)
}
