//! Chat-completion transport abstraction.
//!
//! A [`ChatTransport`] performs the raw `createChatCompletion` call against an
//! upstream API. [`CompletionClient`] wraps a transport together with the
//! caller's credentials and builds requests from an agent's settings.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use agent_forge_core::error::{AgentForgeError, UpstreamKind};
use agent_forge_core::types::{ConversationMessage, ToolCall, ToolDeclaration};

pub mod client;
pub mod openai;

pub use client::{CompletionClient, validate_api_key};

/// Credentials for authenticating with the completion API.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Credentials {
    #[serde(rename = "api_key")]
    ApiKey { api_key: String },
}

impl Credentials {
    pub fn api_key(key: impl Into<String>) -> Self {
        Credentials::ApiKey {
            api_key: key.into(),
        }
    }

    /// Parse a user-supplied key, rejecting ones that are not OpenAI secret keys.
    pub fn parse(key: &str) -> agent_forge_core::error::Result<Self> {
        let key = key.trim();
        if !key.starts_with("sk-") {
            return Err(AgentForgeError::InvalidConfig(
                "Invalid API key format".into(),
            ));
        }
        Ok(Self::api_key(key))
    }

    pub fn secret(&self) -> &str {
        match self {
            Credentials::ApiKey { api_key } => api_key,
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let secret = self.secret();
        let shown: String = secret.chars().take(3).collect();
        f.debug_struct("ApiKey")
            .field("api_key", &format!("{shown}…"))
            .finish()
    }
}

/// Body of a `POST /v1/chat/completions` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ConversationMessage>,
    pub temperature: f64,
    pub top_p: f64,
    pub frequency_penalty: f64,
    pub presence_penalty: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDeclaration>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub message: CompletionMessage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// The assistant message of the first choice, as returned by the API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionMessage {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl CompletionMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: None,
        }
    }

    pub fn with_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content: None,
            tool_calls: Some(tool_calls),
        }
    }

    /// Tool calls in the order the model returned them; empty when there are none.
    pub fn tool_calls(&self) -> &[ToolCall] {
        self.tool_calls.as_deref().unwrap_or_default()
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls().is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
}

/// A failed transport call.
///
/// `status` and `hint` are structured signals from the transport; `message`
/// is only inspected when neither is present.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TransportError {
    pub status: Option<u16>,
    pub hint: Option<UpstreamKind>,
    pub message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            hint: None,
            message: message.into(),
        }
    }

    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            hint: None,
            message: message.into(),
        }
    }

    pub fn with_hint(hint: UpstreamKind, message: impl Into<String>) -> Self {
        Self {
            status: None,
            hint: Some(hint),
            message: message.into(),
        }
    }

    /// Classify this failure, preferring structured signals.
    pub fn classify(&self) -> UpstreamKind {
        if let Some(kind) = self.status.and_then(classify_status) {
            return kind;
        }
        if let Some(kind) = self.hint {
            return kind;
        }
        classify_message(&self.message)
    }
}

impl From<TransportError> for AgentForgeError {
    fn from(e: TransportError) -> Self {
        AgentForgeError::Upstream {
            kind: e.classify(),
            detail: e.message,
        }
    }
}

fn classify_status(status: u16) -> Option<UpstreamKind> {
    match status {
        401 | 403 => Some(UpstreamKind::Unauthorized),
        408 | 504 => Some(UpstreamKind::Timeout),
        429 => Some(UpstreamKind::RateLimited),
        500..=599 => Some(UpstreamKind::ServerError),
        _ => None,
    }
}

/// Best-effort classification from free-form error text, for transports
/// that expose no status code.
pub fn classify_message(message: &str) -> UpstreamKind {
    let lower = message.to_lowercase();
    if lower.contains("network error") {
        UpstreamKind::Network
    } else if lower.contains("timeout") || lower.contains("timed out") {
        UpstreamKind::Timeout
    } else if message.contains("401") {
        UpstreamKind::Unauthorized
    } else if message.contains("429") {
        UpstreamKind::RateLimited
    } else if message.contains("500") {
        UpstreamKind::ServerError
    } else {
        UpstreamKind::Unknown
    }
}

/// The upstream chat-completion API.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Transport identifier (e.g., "openai").
    fn id(&self) -> &str;

    async fn create_chat_completion(
        &self,
        request: &ChatCompletionRequest,
        credentials: &Credentials,
    ) -> Result<ChatCompletionResponse, TransportError>;

    /// List model ids visible to these credentials.
    async fn list_models(&self, credentials: &Credentials) -> Result<Vec<String>, TransportError>;
}
