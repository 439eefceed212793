// src/provider/mod.rs — Streaming text-generation layer

pub mod gemini;
pub mod retry;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::sync::Arc;

use crate::infra::config::Config;
use crate::infra::errors::MentorError;

/// Incrementally delivered reply. Items arrive in transport order; the
/// stream ends after the last chunk, or right after the first `Err`.
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<ChatChunk, MentorError>> + Send>>;

/// Core trait that all model providers implement.
///
/// An `Err` from `chat_stream` means the exchange never started
/// (missing credential, rejected request, retries exhausted).
#[async_trait]
pub trait ModelProvider: Send + Sync {
    fn id(&self) -> &str;
    fn name(&self) -> &str;

    async fn chat_stream(&self, request: ChatRequest) -> Result<ChatStream, MentorError>;
}

#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub system: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ChatChunk {
    pub delta: String,
    pub usage: Option<TokenUsage>,
}

impl ChatChunk {
    pub fn text(delta: impl Into<String>) -> Self {
        Self {
            delta: delta.into(),
            usage: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// Build the Gemini provider from config, wrapped in the retry layer.
///
/// The API key is read from the configured variable, then `GEMINI_API_KEY`.
/// A missing key is not an error here; the first request reports it.
pub fn build_provider(config: &Config) -> Arc<dyn ModelProvider> {
    let var = config.mentor.api_key_env.clone();
    let api_key = std::env::var(&var)
        .ok()
        .or_else(|| std::env::var("GEMINI_API_KEY").ok())
        .filter(|k| !k.trim().is_empty());

    if api_key.is_none() {
        tracing::warn!("{} is not set; mentor replies will fail until it is", var);
    }

    let mut gemini = gemini::GeminiProvider::new(api_key, var);
    if let Some(ref url) = config.mentor.base_url {
        gemini = gemini.with_base_url(url.clone());
    }

    Arc::new(retry::RetryProvider::with_config(
        Arc::new(gemini),
        (&config.retry).into(),
    ))
}
