//! Scripted backend for tests and offline runs.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{BackendError, Generation, GenerationBackend, GenerationRequest, Role};

type Responder = dyn Fn(&GenerationRequest) -> Result<String, BackendError> + Send + Sync;

/// Backend returning scripted replies and recording every request.
///
/// Queued replies are consumed first, in order. Once the queue is empty the
/// responder decides. The default responder echoes a short digest of the last
/// user message.
pub struct MockBackend {
    queue: Mutex<VecDeque<Result<String, BackendError>>>,
    responder: Box<Responder>,
    calls: Mutex<Vec<GenerationRequest>>,
    delay: Option<Duration>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::with_responder(|req| Ok(echo_digest(req)))
    }

    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&GenerationRequest) -> Result<String, BackendError> + Send + Sync + 'static,
    {
        Self {
            queue: Mutex::new(VecDeque::new()),
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Sleep before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue one reply ahead of the responder.
    pub fn push_reply(&self, reply: Result<String, BackendError>) {
        if let Ok(mut queue) = self.queue.lock() {
            queue.push_back(reply);
        }
    }

    pub fn push_ok(&self, content: impl Into<String>) {
        self.push_reply(Ok(content.into()));
    }

    pub fn calls(&self) -> Vec<GenerationRequest> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Last user message of a request.
pub fn last_user_message(request: &GenerationRequest) -> &str {
    request
        .messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| m.content.as_str())
        .unwrap_or("")
}

fn echo_digest(request: &GenerationRequest) -> String {
    let text = last_user_message(request);
    let head: String = text.chars().take(40).collect();
    format!("Processed {} chars: {}", text.chars().count(), head)
}

#[async_trait]
impl GenerationBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn invoke(&self, request: &GenerationRequest) -> Result<Generation, BackendError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(request.clone());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let queued = self.queue.lock().ok().and_then(|mut q| q.pop_front());
        let content = match queued {
            Some(reply) => reply?,
            None => (self.responder)(request)?,
        };

        Ok(Generation {
            content,
            model: request.model.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ChatMessage, FailureReason};

    fn request(text: &str) -> GenerationRequest {
        GenerationRequest {
            model: "m1".to_string(),
            messages: vec![ChatMessage::system("sys"), ChatMessage::user(text)],
            timeout: Duration::from_secs(1),
            temperature: 0.5,
        }
    }

    #[tokio::test]
    async fn test_queue_consumed_before_responder() {
        let mock = MockBackend::new();
        mock.push_ok("first");
        mock.push_reply(Err(BackendError::new(FailureReason::Timeout, "slow")));

        assert_eq!(mock.invoke(&request("a")).await.unwrap().content, "first");
        let err = mock.invoke(&request("b")).await.unwrap_err();
        assert_eq!(err.reason, FailureReason::Timeout);
        let echo = mock.invoke(&request("hello")).await.unwrap();
        assert_eq!(echo.content, "Processed 5 chars: hello");
        assert_eq!(echo.model, "m1");
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test]
    async fn test_custom_responder_sees_request() {
        let mock = MockBackend::with_responder(|req| Ok(req.model.to_uppercase()));
        let out = mock.invoke(&request("x")).await.unwrap();
        assert_eq!(out.content, "M1");
        assert_eq!(last_user_message(&mock.calls()[0]), "x");
    }
}
