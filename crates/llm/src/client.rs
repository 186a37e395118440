use aigent_core::{AgentError, AgentResult};
use async_trait::async_trait;
use serde_json::json;

use crate::chat::{ChatMessage, ChatRole, ResponseFormat};

/// Capability interface the planner, thinker and learning engine consume.
/// Implementations back onto whatever provider the deployment configures;
/// the core never depends on a concrete one.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        response_format: Option<ResponseFormat>,
    ) -> AgentResult<String>;

    async fn embed(&self, text: &str) -> AgentResult<Vec<f32>>;
}

#[derive(Debug, Clone)]
pub struct OllamaLlmClient {
    client: reqwest::Client,
    base_url: String,
    chat_model: String,
    embed_model: String,
}

impl OllamaLlmClient {
    pub fn new(chat_model: impl Into<String>, embed_model: impl Into<String>) -> Self {
        let base_url = std::env::var("OLLAMA_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:11434".to_string());
        Self {
            client: reqwest::Client::new(),
            base_url,
            chat_model: chat_model.into(),
            embed_model: embed_model.into(),
        }
    }
}

#[async_trait]
impl LlmClient for OllamaLlmClient {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        response_format: Option<ResponseFormat>,
    ) -> AgentResult<String> {
        let endpoint = format!("{}/api/chat", self.base_url.trim_end_matches('/'));
        let wire_messages = messages_to_wire(messages);
        let mut payload = json!({
            "model": self.chat_model,
            "messages": wire_messages,
            "stream": false,
            "options": { "temperature": temperature },
        });
        if let Some(format) = response_format.and_then(|f| f.as_wire()) {
            payload["format"] = format["type"].clone();
        }

        let response = self
            .client
            .post(&endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AgentError::LlmFailure(format!("ollama unreachable at {}: {e}", self.base_url)))?;

        let status = response.status();
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AgentError::LlmFailure(format!("ollama response not JSON: {e}")))?;
        if !status.is_success() {
            return Err(AgentError::LlmFailure(format!("ollama error ({status}): {body}")));
        }

        body.get("message")
            .and_then(|m| m.get("content"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| AgentError::LlmFailure(format!("ollama response missing content: {body}")))
    }

    async fn embed(&self, text: &str) -> AgentResult<Vec<f32>> {
        let endpoint = format!("{}/api/embeddings", self.base_url.trim_end_matches('/'));
        let payload = json!({ "model": self.embed_model, "prompt": text });

        let response = self
            .client
            .post(&endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AgentError::LlmFailure(format!("ollama unreachable at {}: {e}", self.base_url)))?;

        let status = response.status();
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AgentError::LlmFailure(format!("ollama response not JSON: {e}")))?;
        if !status.is_success() {
            return Err(AgentError::LlmFailure(format!("ollama error ({status}): {body}")));
        }

        body.get("embedding")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|n| n.as_f64()).map(|n| n as f32).collect())
            .ok_or_else(|| AgentError::LlmFailure(format!("ollama response missing embedding: {body}")))
    }
}

#[derive(Debug, Clone)]
pub struct OpenRouterLlmClient {
    client: reqwest::Client,
    chat_model: String,
    embed_model: String,
}

impl OpenRouterLlmClient {
    pub fn new(chat_model: impl Into<String>, embed_model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            chat_model: chat_model.into(),
            embed_model: embed_model.into(),
        }
    }

    fn api_key(&self) -> AgentResult<String> {
        std::env::var("OPENROUTER_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AgentError::LlmFailure("OPENROUTER_API_KEY not set".into()))
    }
}

#[async_trait]
impl LlmClient for OpenRouterLlmClient {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        response_format: Option<ResponseFormat>,
    ) -> AgentResult<String> {
        let api_key = self.api_key()?;
        let wire_messages = messages_to_wire(messages);
        let mut payload = json!({
            "model": self.chat_model,
            "messages": wire_messages,
            "temperature": temperature,
        });
        if let Some(format) = response_format.and_then(|f| f.as_wire()) {
            payload["response_format"] = format;
        }

        let response = self
            .client
            .post("https://openrouter.ai/api/v1/chat/completions")
            .bearer_auth(&api_key)
            .header("HTTP-Referer", "https://aigent.local")
            .header("X-Title", "Aigent")
            .json(&payload)
            .send()
            .await
            .map_err(|e| AgentError::LlmFailure(format!("openrouter request failed: {e}")))?;

        let status = response.status();
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AgentError::LlmFailure(format!("openrouter response not JSON: {e}")))?;
        if !status.is_success() {
            return Err(AgentError::LlmFailure(format!("openrouter error ({status}): {body}")));
        }

        body.get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| AgentError::LlmFailure(format!("openrouter response missing content: {body}")))
    }

    async fn embed(&self, text: &str) -> AgentResult<Vec<f32>> {
        let api_key = self.api_key()?;
        let payload = json!({ "model": self.embed_model, "input": text });

        let response = self
            .client
            .post("https://openrouter.ai/api/v1/embeddings")
            .bearer_auth(&api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AgentError::LlmFailure(format!("openrouter request failed: {e}")))?;

        let status = response.status();
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AgentError::LlmFailure(format!("openrouter response not JSON: {e}")))?;
        if !status.is_success() {
            return Err(AgentError::LlmFailure(format!("openrouter error ({status}): {body}")));
        }

        body.get("data")
            .and_then(|d| d.get(0))
            .and_then(|d| d.get("embedding"))
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|n| n.as_f64()).map(|n| n as f32).collect())
            .ok_or_else(|| AgentError::LlmFailure(format!("openrouter response missing embedding: {body}")))
    }
}

fn messages_to_wire(messages: &[ChatMessage]) -> Vec<serde_json::Value> {
    messages
        .iter()
        .map(|m| {
            let role = match m.role {
                ChatRole::System => "system",
                ChatRole::User => "user",
                ChatRole::Assistant => "assistant",
            };
            json!({ "role": role, "content": m.content })
        })
        .collect()
}
