pub mod chat;
pub mod client;
pub mod json;
pub mod mock;

pub use chat::{ChatMessage, ChatRole, ResponseFormat};
pub use client::{LlmClient, OllamaLlmClient, OpenRouterLlmClient};
pub use json::extract_json_object;
pub use mock::MockLlmClient;
