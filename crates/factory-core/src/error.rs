use thiserror::Error;

#[derive(Debug, Error)]
pub enum FactoryError {
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("invalid folder name '{0}': must be a single folder name, no paths")]
    InvalidName(String),

    #[error("folder not found: {0}")]
    FolderNotFound(String),

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("folder already exists: {0}")]
    FolderExists(String),

    #[error("not a git repository: {0}")]
    NotARepository(String),

    #[error("no repositories selected")]
    NothingSelected,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("VERSION.md has no version lines; generate a version and try again")]
    NoVersionLine,

    #[error("GITHUB_TOKEN is not configured")]
    MissingToken,

    #[error("'{0}' was not found in PATH")]
    MissingExecutable(String),

    #[error("`{command}` timed out after {seconds}s")]
    CommandTimedOut { command: String, seconds: u64 },

    #[error("`{command}` failed: {detail}")]
    CommandFailed { command: String, detail: String },

    #[error("GitHub API error {status}: {message}")]
    GitHub { status: u16, message: String },

    #[error("GitHub rate limit exceeded (X-RateLimit-Reset={0})")]
    RateLimited(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, FactoryError>;
