use reqwest::StatusCode;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors raised by credential storage backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("secure storage error: {0}")]
    Keyring(#[from] keyring::Error),
}

/// Errors surfaced by session management and the authentication endpoints.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("auth endpoint error {status}: {body}")]
    AuthEndpoint { status: StatusCode, body: String },
    #[error("auth response missing {0}")]
    MissingField(&'static str),
    #[error("session must carry both an access and a refresh token")]
    IncompleteSession,
    #[error("no session is stored")]
    NotAuthenticated,
    #[error("auth endpoint timed out")]
    Timeout,
}
