use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use factory_core::screenshots;
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ScreenshotQuery {
    #[serde(default)]
    path: String,
    #[serde(default)]
    name: String,
}

/// GET /api/project-screenshots?path=: image list for one project. An
/// unknown project is an empty list.
pub async fn list_project_screenshots(
    State(app): State<AppState>,
    Query(query): Query<ScreenshotQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let result = tokio::task::spawn_blocking(move || {
        let items = app
            .layout
            .resolve_project_path(query.path.trim())
            .map(|project| screenshots::list_screenshots(&project))
            .unwrap_or_default();
        serde_json::json!({ "items": items })
    })
    .await
    .map_err(AppError::join)?;

    Ok(Json(result))
}

/// GET /api/project-screenshot-file?path=&name=: raw image bytes.
pub async fn get_screenshot_file(
    State(app): State<AppState>,
    Query(query): Query<ScreenshotQuery>,
) -> Result<Response, AppError> {
    let raw = query.path.trim().to_string();
    let project = app
        .layout
        .resolve_project_path(&raw)
        .ok_or_else(|| AppError::not_found(&raw))?;

    let (bytes, mime) = tokio::task::spawn_blocking(move || {
        let (file, mime) = screenshots::screenshot_file(&project, &query.name)?;
        let bytes = std::fs::read(file)?;
        Ok::<_, factory_core::FactoryError>((bytes, mime))
    })
    .await
    .map_err(AppError::join)??;

    Ok((
        [
            (header::CONTENT_TYPE, mime),
            (header::CACHE_CONTROL, "no-store".to_string()),
        ],
        bytes,
    )
        .into_response())
}
