use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use factory_core::error::FactoryError;

// ---------------------------------------------------------------------------
// Internal sentinel for non-local write attempts
// ---------------------------------------------------------------------------

/// Carries an explicit HTTP 403 through the `anyhow::Error` chain.
#[derive(Debug)]
struct ForbiddenError(String);

impl std::fmt::Display for ForbiddenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ForbiddenError {}

// ---------------------------------------------------------------------------
// AppError: unified error type for HTTP responses
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self(ForbiddenError(msg.into()).into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self(FactoryError::FolderNotFound(msg.into()).into())
    }

    /// Wrap a `spawn_blocking` join failure.
    pub fn join(err: tokio::task::JoinError) -> Self {
        Self(anyhow::anyhow!("task join error: {err}"))
    }
}

pub fn status_for(err: &FactoryError) -> StatusCode {
    match err {
        FactoryError::InvalidSettings(_)
        | FactoryError::InvalidName(_)
        | FactoryError::NotARepository(_)
        | FactoryError::NothingSelected
        | FactoryError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        FactoryError::FolderNotFound(_) | FactoryError::FileNotFound(_) => StatusCode::NOT_FOUND,
        FactoryError::FolderExists(_) => StatusCode::CONFLICT,
        FactoryError::NoVersionLine => StatusCode::UNPROCESSABLE_ENTITY,
        FactoryError::GitHub { .. } | FactoryError::RateLimited(_) | FactoryError::Http(_) => {
            StatusCode::BAD_GATEWAY
        }
        FactoryError::MissingToken | FactoryError::MissingExecutable(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        FactoryError::CommandTimedOut { .. } => StatusCode::GATEWAY_TIMEOUT,
        FactoryError::CommandFailed { .. }
        | FactoryError::Io(_)
        | FactoryError::Yaml(_)
        | FactoryError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = if self.0.downcast_ref::<ForbiddenError>().is_some() {
            StatusCode::FORBIDDEN
        } else if let Some(e) = self.0.downcast_ref::<FactoryError>() {
            status_for(e)
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        if status.is_server_error() {
            tracing::warn!(%status, error = %self.0, "request failed");
        }
        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
