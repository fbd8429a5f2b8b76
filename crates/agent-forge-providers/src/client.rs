//! Completion client: binds a transport to the caller's credentials.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error};

use agent_forge_core::config::Config;
use agent_forge_core::error::{AgentForgeError, Result, UpstreamKind};
use agent_forge_core::types::{
    ConversationMessage, DEFAULT_FREQUENCY_PENALTY, DEFAULT_PRESENCE_PENALTY, DEFAULT_TEMPERATURE,
    DEFAULT_TOP_P, Model, ModelSettings, ToolDeclaration,
};

use crate::openai::OpenAiTransport;
use crate::{ChatCompletionRequest, ChatTransport, CompletionMessage, Credentials};

/// Handle used by the run pipeline to talk to the completion API.
///
/// Constructed once from a credential and passed explicitly to whoever needs it.
#[derive(Clone)]
pub struct CompletionClient {
    transport: Arc<dyn ChatTransport>,
    credentials: Option<Credentials>,
}

impl CompletionClient {
    pub fn new(transport: Arc<dyn ChatTransport>, credentials: Option<Credentials>) -> Self {
        Self {
            transport,
            credentials,
        }
    }

    /// Build an OpenAI-backed client from app config. A missing key is not an
    /// error here; it surfaces when a run is attempted.
    pub fn from_config(config: &Config) -> Result<Self> {
        let transport = OpenAiTransport::new(
            Some(&config.base_url()),
            config.timeout_secs().map(Duration::from_secs),
        )?;
        let credentials = config.resolve_api_key().map(Credentials::api_key);
        Ok(Self::new(Arc::new(transport), credentials))
    }

    pub fn has_credential(&self) -> bool {
        self.credentials.is_some()
    }

    /// Send one chat completion and return the first choice's message.
    ///
    /// `tools` is only attached (with automatic tool choice) when non-empty.
    pub async fn complete(
        &self,
        model: Model,
        messages: &[ConversationMessage],
        sampling: &ModelSettings,
        tools: Option<&[ToolDeclaration]>,
    ) -> Result<CompletionMessage> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or(AgentForgeError::NoCredential)?;

        let request = build_request(model, messages, sampling, tools);
        debug!(
            transport = self.transport.id(),
            model = %request.model,
            with_tools = request.tools.is_some(),
            "Sending chat completion"
        );

        let response = self
            .transport
            .create_chat_completion(&request, credentials)
            .await
            .map_err(|e| {
                error!(kind = ?e.classify(), status = ?e.status, error = %e, "Completion request failed");
                AgentForgeError::from(e)
            })?;

        response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| AgentForgeError::Upstream {
                kind: UpstreamKind::Unknown,
                detail: "completion response contained no choices".into(),
            })
    }
}

/// Assemble the request body, defaulting absent sampling fields.
pub fn build_request(
    model: Model,
    messages: &[ConversationMessage],
    sampling: &ModelSettings,
    tools: Option<&[ToolDeclaration]>,
) -> ChatCompletionRequest {
    let tools = tools.filter(|t| !t.is_empty()).map(|t| t.to_vec());
    let tool_choice = tools.as_ref().map(|_| "auto".to_string());

    ChatCompletionRequest {
        model: model.as_str().to_string(),
        messages: messages.to_vec(),
        temperature: sampling.temperature.unwrap_or(DEFAULT_TEMPERATURE),
        top_p: sampling.top_p.unwrap_or(DEFAULT_TOP_P),
        frequency_penalty: sampling.frequency_penalty.unwrap_or(DEFAULT_FREQUENCY_PENALTY),
        presence_penalty: sampling.presence_penalty.unwrap_or(DEFAULT_PRESENCE_PENALTY),
        tools,
        tool_choice,
    }
}

/// Check a user-supplied key: format first, then a live model listing.
/// Returns the number of models the key can see.
pub async fn validate_api_key(transport: &dyn ChatTransport, key: &str) -> Result<usize> {
    let credentials = Credentials::parse(key)?;
    let models = transport.list_models(&credentials).await?;
    debug!(count = models.len(), "API key validated");
    Ok(models.len())
}
