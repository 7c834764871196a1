//! Generation backend seam.
//!
//! Defines the `GenerationBackend` async trait, the message types sent to
//! it, and the structured failure reasons adapters must report. Adapters
//! classify provider failures once; the rest of the engine only looks at
//! [`FailureReason`].

pub mod http;
pub mod mock;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use http::HttpBackend;
pub use mock::MockBackend;

// =============================================================================
// Messages
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message of a generation request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// A single backend invocation against one model tier.
#[derive(Clone, Debug)]
pub struct GenerationRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub timeout: Duration,
    pub temperature: f32,
}

/// Raw backend output.
#[derive(Clone, Debug, PartialEq)]
pub struct Generation {
    pub content: String,
    pub model: String,
}

// =============================================================================
// Failures
// =============================================================================

/// Structured reason a backend call failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailureReason {
    ConnectionReset,
    Aborted,
    Timeout,
    RateLimited,
    /// The request exceeded the model's context window.
    ContextLength,
    /// The backend could not be reached at all.
    Unavailable,
    InvalidResponse,
    Other,
}

impl FailureReason {
    /// Failures worth retrying after a pause.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FailureReason::ConnectionReset
                | FailureReason::Aborted
                | FailureReason::Timeout
                | FailureReason::RateLimited
        )
    }

    /// Classify a provider error message by its known signatures.
    ///
    /// Only adapters call this, for error bodies that carry no structured code.
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("context_length")
            || lower.contains("context length")
            || lower.contains("maximum context")
            || lower.contains("too many tokens")
        {
            FailureReason::ContextLength
        } else if lower.contains("rate limit")
            || lower.contains("rate_limit")
            || lower.contains("too many requests")
            || lower.contains("429")
        {
            FailureReason::RateLimited
        } else if lower.contains("econnreset") || lower.contains("connection reset") {
            FailureReason::ConnectionReset
        } else if lower.contains("timed out") || lower.contains("timeout") {
            FailureReason::Timeout
        } else if lower.contains("abort") {
            FailureReason::Aborted
        } else if lower.contains("connection refused")
            || lower.contains("dns error")
            || lower.contains("unreachable")
        {
            FailureReason::Unavailable
        } else {
            FailureReason::Other
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureReason::ConnectionReset => "connection reset",
            FailureReason::Aborted => "aborted",
            FailureReason::Timeout => "timeout",
            FailureReason::RateLimited => "rate limited",
            FailureReason::ContextLength => "context length exceeded",
            FailureReason::Unavailable => "unavailable",
            FailureReason::InvalidResponse => "invalid response",
            FailureReason::Other => "backend failure",
        };
        f.write_str(s)
    }
}

/// A failed backend call.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[error("{reason}: {message}")]
pub struct BackendError {
    pub reason: FailureReason,
    pub message: String,
}

impl BackendError {
    pub fn new(reason: FailureReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        self.reason.is_transient()
    }
}

// =============================================================================
// Trait
// =============================================================================

/// A text generation service.
///
/// Implementations perform one call against one model and report failures
/// with a [`FailureReason`]. Retries, timeouts and model fallback live in
/// the executor, not in adapters.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Short adapter name for logs.
    fn name(&self) -> &str;

    async fn invoke(&self, request: &GenerationRequest) -> Result<Generation, BackendError>;
}
