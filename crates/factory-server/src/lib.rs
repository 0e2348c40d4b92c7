pub mod access;
pub mod embed;
pub mod error;
pub mod routes;
pub mod state;

use std::net::SocketAddr;

use axum::routing::{get, post};
use axum::{middleware, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Build the axum Router with all API routes and middleware.
/// Used by `serve()` and available for integration testing.
///
/// Write routes sit behind [`access::require_local`], so the service must be
/// driven with `ConnectInfo<SocketAddr>` (tests use `MockConnectInfo`).
pub fn build_router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let reads = Router::new()
        .route("/api/config", get(routes::config::get_config))
        .route("/api/repos", get(routes::repos::list_repos))
        .route("/api/push-states", get(routes::repos::push_states))
        .route(
            "/api/project-screenshots",
            get(routes::screenshots::list_project_screenshots),
        )
        .route(
            factory_core::screenshots::FILE_ROUTE,
            get(routes::screenshots::get_screenshot_file),
        );

    let writes = Router::new()
        // Catalog
        .route("/api/refresh", post(routes::repos::refresh_catalog))
        // Folders
        .route("/api/create-project", post(routes::folders::create_project))
        .route("/api/add-to-github", post(routes::folders::add_to_github))
        .route("/api/install", post(routes::folders::install))
        .route("/api/delete", post(routes::folders::delete))
        .route("/api/rename", post(routes::folders::rename))
        // GitHub
        .route("/api/rename-github", post(routes::github::rename_github))
        .route("/api/delete-github", post(routes::github::delete_github))
        .route(
            "/api/update-description",
            post(routes::github::update_description),
        )
        // Desktop
        .route("/api/open-folder", post(routes::open::open_folder))
        .route(
            "/api/open-folder-explorer",
            post(routes::open::open_folder_explorer),
        )
        // Push
        .route("/api/push", post(routes::push::push))
        .route_layer(middleware::from_fn(access::require_local));

    reads
        .merge(writes)
        .fallback(embed::static_handler)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Start the web UI server on `host:port`.
pub async fn serve(
    app_state: AppState,
    host: &str,
    port: u16,
    open_browser: bool,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    serve_on(app_state, listener, open_browser).await
}

/// Start the web UI server on a pre-bound listener.
///
/// The caller can read the actual port before starting (useful when
/// `port = 0` and the OS picks a free port).
pub async fn serve_on(
    app_state: AppState,
    listener: tokio::net::TcpListener,
    open_browser: bool,
) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    let app = build_router(app_state);

    let url = if addr.ip().is_unspecified() {
        format!("http://localhost:{}", addr.port())
    } else {
        format!("http://{addr}")
    };
    tracing::info!("projects-factory listening on {url}");

    if open_browser {
        if let Err(e) = open::that(&url) {
            tracing::debug!(error = %e, "could not open browser");
        }
    }

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
