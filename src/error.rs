//! Error types shared by the view-model layer and the platform adapters.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ExplorerError>;

/// Errors surfaced to the UI by view-model operations.
#[derive(Error, Debug)]
pub enum ExplorerError {
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("not signed in")]
    NotAuthenticated,

    #[error("fetch failed: {0}")]
    FetchFailed(String),

    #[error("key must not be empty")]
    InvalidKey,

    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// The write is durable on the platform but the local list could not be refreshed.
    #[error("saved, but the list could not be refreshed: {0}")]
    StaleAfterWrite(String),

    #[error("message is empty")]
    EmptyMessage,

    #[error("a message is already being sent")]
    SendInProgress,

    #[error("file dialog cancelled")]
    FileDialogCancelled,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExplorerError {
    /// Authentication problems block the whole window until the user retries sign-in.
    pub fn is_blocking(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationFailed(_) | Self::NotAuthenticated
        )
    }
}

/// Errors reported by a platform capability.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    #[error("cancelled by user")]
    Cancelled,

    #[error("capability unavailable: {0}")]
    Unavailable(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<reqwest::Error> for PlatformError {
    fn from(err: reqwest::Error) -> Self {
        PlatformError::Transport(err.to_string())
    }
}

impl From<std::io::Error> for PlatformError {
    fn from(err: std::io::Error) -> Self {
        PlatformError::Storage(err.to_string())
    }
}
