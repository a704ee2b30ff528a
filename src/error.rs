use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Root folder not found: {}", .0.display())]
    RootNotFound(PathBuf),

    #[error("Search was cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("Glob error: {0}")]
    Glob(#[from] globset::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal search failure: {0}")]
    Internal(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl SearchError {
    /// True for the terminal error produced by an intentional `cancel()`.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, SearchError::Cancelled)
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        SearchError::InvalidQuery(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, SearchError>;
