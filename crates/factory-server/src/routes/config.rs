use axum::extract::State;
use axum::Json;

use crate::error::AppError;
use crate::state::AppState;

/// GET /api/config: account identity and install summary for the header bar.
///
/// `installed_urls` lists the origin of every clone under `MY_REPOS`, taken
/// from the cached State Cache snapshot. The avatar lookup is best effort and
/// skipped when no account is configured.
pub async fn get_config(State(app): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let result = tokio::task::spawn_blocking(move || {
        let snapshot = app.cache.get_states(false);
        let installed_urls = snapshot.origins_under(&app.layout.installed);
        let avatar_url = if app.identity.username != "Unknown" {
            app.github()
                .map(|client| client.avatar_url())
                .unwrap_or_default()
        } else {
            String::new()
        };
        serde_json::json!({
            "username": app.identity.username,
            "avatar_url": avatar_url,
            "installed_count": installed_urls.len(),
            "installed_urls": installed_urls,
            "default_push_message": app.settings.ui.default_push_message,
        })
    })
    .await
    .map_err(AppError::join)?;

    Ok(Json(result))
}
