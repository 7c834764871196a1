//! OpenAI-compatible chat completions adapter.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{BackendError, ChatMessage, FailureReason, Generation, GenerationBackend, GenerationRequest};

/// Backend speaking the OpenAI chat completions protocol over HTTP.
#[derive(Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpBackend {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key,
        }
    }

    /// Build from an endpoint and the name of the env var holding the key.
    ///
    /// A missing key is allowed; local servers often need none.
    pub fn from_env(endpoint: impl Into<String>, api_key_env: &str) -> Self {
        let api_key = std::env::var(api_key_env).ok().filter(|k| !k.is_empty());
        Self::new(endpoint, api_key)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[derive(Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl GenerationBackend for HttpBackend {
    fn name(&self) -> &str {
        "http"
    }

    async fn invoke(&self, request: &GenerationRequest) -> Result<Generation, BackendError> {
        let body = CompletionBody {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
        };

        let mut builder = self
            .client
            .post(&self.endpoint)
            .timeout(request.timeout)
            .json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(status, &text));
        }

        let text = response.text().await.map_err(transport_error)?;
        debug!(model = %request.model, bytes = text.len(), "completion received");

        let parsed: CompletionResponse = serde_json::from_str(&text).map_err(|e| {
            BackendError::new(
                FailureReason::InvalidResponse,
                format!("malformed completion: {}", e),
            )
        })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| {
                BackendError::new(FailureReason::InvalidResponse, "completion has no choices")
            })?;

        Ok(Generation {
            content,
            model: parsed.model.unwrap_or_else(|| request.model.clone()),
        })
    }
}

fn transport_error(err: reqwest::Error) -> BackendError {
    let reason = if err.is_timeout() {
        FailureReason::Timeout
    } else if err.is_connect() {
        FailureReason::Unavailable
    } else {
        FailureReason::classify(&err.to_string())
    };
    BackendError::new(reason, err.to_string())
}

fn status_error(status: reqwest::StatusCode, body: &str) -> BackendError {
    let reason = match status.as_u16() {
        429 => FailureReason::RateLimited,
        408 | 504 => FailureReason::Timeout,
        503 => FailureReason::Unavailable,
        _ => match FailureReason::classify(body) {
            FailureReason::ContextLength => FailureReason::ContextLength,
            _ => FailureReason::Other,
        },
    };
    BackendError::new(reason, format!("HTTP {}: {}", status, truncate(body, 500)))
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_status_error_rate_limited() {
        let err = status_error(StatusCode::TOO_MANY_REQUESTS, "{}");
        assert_eq!(err.reason, FailureReason::RateLimited);
        assert!(err.is_transient());
    }

    #[test]
    fn test_status_error_gateway_timeout() {
        assert_eq!(
            status_error(StatusCode::GATEWAY_TIMEOUT, "").reason,
            FailureReason::Timeout
        );
        assert_eq!(
            status_error(StatusCode::SERVICE_UNAVAILABLE, "").reason,
            FailureReason::Unavailable
        );
    }

    #[test]
    fn test_status_error_context_length_from_body() {
        let body = r#"{"error":{"code":"context_length_exceeded","message":"too long"}}"#;
        let err = status_error(StatusCode::BAD_REQUEST, body);
        assert_eq!(err.reason, FailureReason::ContextLength);
        assert!(!err.is_transient());
    }

    #[test]
    fn test_status_error_other_body_not_transient() {
        // A 400 body mentioning a timeout setting must not become retryable.
        let err = status_error(StatusCode::BAD_REQUEST, "invalid timeout parameter");
        assert_eq!(err.reason, FailureReason::Other);
    }

    #[test]
    fn test_truncate_on_char_boundary() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("hi", 10), "hi");
    }

    #[test]
    fn test_completion_response_parse() {
        let raw = r#"{"model":"gpt-4o","choices":[{"message":{"role":"assistant","content":"ok"}}]}"#;
        let parsed: CompletionResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.model.as_deref(), Some("gpt-4o"));
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("ok"));
    }

    #[test]
    fn test_from_env_without_key() {
        let backend = HttpBackend::from_env("http://localhost:1/v1", "WEFT_TEST_UNSET_KEY_VAR");
        assert!(backend.api_key.is_none());
        assert_eq!(backend.endpoint(), "http://localhost:1/v1");
    }
}
