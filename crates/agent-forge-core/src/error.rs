use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of a failed call to the completion API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpstreamKind {
    Network,
    Timeout,
    Unauthorized,
    RateLimited,
    ServerError,
    Unknown,
}

impl UpstreamKind {
    /// User-facing remediation text for this failure class.
    pub fn remediation(&self) -> &'static str {
        match self {
            UpstreamKind::Network => {
                "Network error connecting to OpenAI API. Please check your internet connection and firewall settings."
            }
            UpstreamKind::Timeout => {
                "Request to OpenAI API timed out. The service might be experiencing high load."
            }
            UpstreamKind::Unauthorized => {
                "Invalid API key. Please check your OpenAI API key in the settings."
            }
            UpstreamKind::RateLimited => {
                "Rate limit exceeded. Your OpenAI API key has reached its request limit."
            }
            UpstreamKind::ServerError => "OpenAI API server error. Please try again later.",
            UpstreamKind::Unknown => "Failed to run agent",
        }
    }
}

#[derive(Debug, Error)]
pub enum AgentForgeError {
    #[error("No API key found. Please set your OpenAI API key in the settings.")]
    NoCredential,

    #[error("Agent with ID {0} not found")]
    AgentNotFound(String),

    #[error("{}", upstream_message(.kind, .detail))]
    Upstream { kind: UpstreamKind, detail: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn upstream_message(kind: &UpstreamKind, detail: &str) -> String {
    match kind {
        UpstreamKind::Unknown if detail.is_empty() => format!("{}: Unknown error", kind.remediation()),
        UpstreamKind::Unknown => format!("{}: {detail}", kind.remediation()),
        _ => kind.remediation().to_string(),
    }
}

impl AgentForgeError {
    /// Upstream failure class, if this error came from the completion API.
    pub fn upstream_kind(&self) -> Option<UpstreamKind> {
        match self {
            AgentForgeError::Upstream { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, AgentForgeError>;
