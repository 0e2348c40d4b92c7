use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::AppError;

/// Middleware for mutating routes: only loopback peers may write.
///
/// The peer address comes from `ConnectInfo`, which `serve` installs via
/// `into_make_service_with_connect_info`. A request without it is refused.
pub async fn require_local(req: Request, next: Next) -> Response {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    match peer {
        Some(addr) if addr.ip().to_canonical().is_loopback() => next.run(req).await,
        _ => {
            tracing::warn!(peer = ?peer, path = %req.uri().path(), "rejected non-local write");
            AppError::forbidden("Write access is limited to local requests").into_response()
        }
    }
}
