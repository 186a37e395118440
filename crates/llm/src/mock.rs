//! Deterministic, network-free stand-in for tests and standalone runs.
//!
//! Grounded on the personal-assistant's mock tool pattern: canned, queued
//! responses rather than anything resembling real generation.

use std::sync::Mutex;

use aigent_core::{AgentError, AgentResult};
use async_trait::async_trait;

use crate::chat::{ChatMessage, ResponseFormat};
use crate::client::LlmClient;

/// Returns queued `chat` responses in order, falling back to `default_chat`
/// once the queue is empty. Embeddings are a deterministic hash of the input
/// text so repeated calls with the same text produce the same vector.
pub struct MockLlmClient {
    queue: Mutex<Vec<String>>,
    default_chat: String,
    embed_dims: usize,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(Vec::new()),
            default_chat: "{}".to_string(),
            embed_dims: 8,
        }
    }

    pub fn with_default_chat(mut self, response: impl Into<String>) -> Self {
        self.default_chat = response.into();
        self
    }

    /// Queues a response to be returned by the next `chat` call, FIFO.
    pub fn push_response(&self, response: impl Into<String>) {
        self.queue.lock().unwrap().push(response.into());
    }
}

impl Default for MockLlmClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn chat(
        &self,
        _messages: &[ChatMessage],
        _temperature: f32,
        _response_format: Option<ResponseFormat>,
    ) -> AgentResult<String> {
        let mut queue = self.queue.lock().unwrap();
        if queue.is_empty() {
            Ok(self.default_chat.clone())
        } else {
            Ok(queue.remove(0))
        }
    }

    async fn embed(&self, text: &str) -> AgentResult<Vec<f32>> {
        if text.is_empty() {
            return Err(AgentError::InvalidArgument("cannot embed empty text".into()));
        }
        let mut vec = vec![0.0f32; self.embed_dims];
        for (i, byte) in text.bytes().enumerate() {
            vec[i % self.embed_dims] += byte as f32 / 255.0;
        }
        let norm: f32 = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in vec.iter_mut() {
                *v /= norm;
            }
        }
        Ok(vec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_chat_used_when_queue_empty() {
        let mock = MockLlmClient::new().with_default_chat(r#"{"ok":true}"#);
        let out = mock.chat(&[ChatMessage::user("hi")], 0.0, None).await.unwrap();
        assert_eq!(out, r#"{"ok":true}"#);
    }

    #[tokio::test]
    async fn queued_responses_are_returned_in_order() {
        let mock = MockLlmClient::new();
        mock.push_response("first");
        mock.push_response("second");
        assert_eq!(mock.chat(&[], 0.0, None).await.unwrap(), "first");
        assert_eq!(mock.chat(&[], 0.0, None).await.unwrap(), "second");
    }

    #[tokio::test]
    async fn embed_is_deterministic_for_same_text() {
        let mock = MockLlmClient::new();
        let a = mock.embed("hello world").await.unwrap();
        let b = mock.embed("hello world").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn embed_differs_for_different_text() {
        let mock = MockLlmClient::new();
        let a = mock.embed("hello").await.unwrap();
        let b = mock.embed("goodbye").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn embed_rejects_empty_text() {
        let mock = MockLlmClient::new();
        assert!(mock.embed("").await.is_err());
    }
}
