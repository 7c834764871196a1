//! Error types for the pattern catalog.

use weft_core::error::WeftError;

/// Errors from loading or querying the pattern catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("pattern not found: {0}")]
    NotFound(String),
    #[error("pattern store unreadable: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid pattern {name}: {reason}")]
    Invalid { name: String, reason: String },
    #[error("pattern store contains no patterns: {0}")]
    Empty(String),
}

impl From<CatalogError> for WeftError {
    fn from(err: CatalogError) -> Self {
        WeftError::Catalog(err.to_string())
    }
}
