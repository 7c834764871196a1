//! Error types for the pattern engine.

use weft_core::error::WeftError;
use weft_patterns::CatalogError;

use crate::backend::BackendError;

/// Errors from pattern execution and the interaction flow.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
    #[error("content exceeds the model context window: {0}")]
    ContentTooLarge(String),
    #[error("pattern not found: {0}")]
    PatternNotFound(String),
    #[error("a pattern operation is already running for user {0}")]
    Busy(String),
    #[error("invalid action: {0}")]
    InvalidAction(String),
    #[error("no content to process")]
    NoContent,
    #[error("export error: {0}")]
    Export(String),
    #[error("catalog error: {0}")]
    Catalog(String),
    #[error("session store error: {0}")]
    Store(String),
}

impl EngineError {
    /// Whether a later attempt may succeed: reset, abort, timeout, rate limit.
    pub fn is_transient(&self) -> bool {
        match self {
            EngineError::Backend(e) => e.is_transient(),
            _ => false,
        }
    }

    /// Text suitable for showing to the end user.
    pub fn user_message(&self) -> String {
        match self {
            EngineError::Backend(e) if e.is_transient() => {
                "The language service is busy or timed out. Please try again in a moment."
                    .to_string()
            }
            EngineError::Backend(_) => {
                "The language service could not process this request.".to_string()
            }
            EngineError::ContentTooLarge(_) => {
                "This text is too large for the model. Select a single chunk or send a shorter text."
                    .to_string()
            }
            EngineError::PatternNotFound(name) => format!("Pattern '{}' is not available.", name),
            EngineError::Busy(_) => {
                "Still working on your previous request. Please wait for it to finish.".to_string()
            }
            EngineError::InvalidAction(_) => "That action is not available right now.".to_string(),
            EngineError::NoContent => "There is no text to process. Send some text first.".to_string(),
            EngineError::Export(_) => "The result could not be exported.".to_string(),
            EngineError::Catalog(_) => "Patterns are unavailable at the moment.".to_string(),
            EngineError::Store(_) => "Your session could not be saved. Please try again.".to_string(),
        }
    }
}

impl From<CatalogError> for EngineError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound(name) => EngineError::PatternNotFound(name),
            other => EngineError::Catalog(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Store(err.to_string())
    }
}

impl From<EngineError> for WeftError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Backend(e) => WeftError::Backend(e.to_string()),
            EngineError::Catalog(msg) => WeftError::Catalog(msg),
            EngineError::Export(msg) => WeftError::Export(msg),
            EngineError::Store(msg) => WeftError::Store(msg),
            other => WeftError::Backend(other.to_string()),
        }
    }
}
