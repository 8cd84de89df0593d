use reqwest::StatusCode;
use thiserror::Error;

/// Errors surfaced by session construction, token storage and refresh.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("you must provide a clientId for implicit grant flow")]
    MissingClientId,
    #[error("you must provide an apiAuthenticateUrl for auth code flow")]
    MissingAuthenticateUrl,
    #[error("tokenTtlHours must be between 1 and {max}, got {hours}")]
    InvalidTokenTtl { hours: i64, max: i64 },
    #[error("unsupported cookie jar version {0}")]
    UnsupportedJarVersion(u32),
    #[error("refresh endpoint error {status}: {body}")]
    RefreshEndpoint { status: StatusCode, body: String },
    #[error("failed to launch system browser: {0}")]
    BrowserLaunch(String),
}
