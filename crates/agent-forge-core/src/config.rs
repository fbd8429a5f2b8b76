//! Configuration loading and validation.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Top-level Agent Forge configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub store: Option<StoreConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

/// Completion API connection settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Transport timeout. Unset means the HTTP client default (none).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path of the agents JSON file. `~` is expanded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "plain" (default) or "json".
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Log level override (trace/debug/info/warn/error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Per-crate log level overrides (e.g. "agent_forge_agent=debug").
    #[serde(default)]
    pub filters: Vec<String>,

    /// Output target: "stderr" (default) or "stdout".
    #[serde(default = "default_log_output")]
    pub output: String,
}

fn default_log_format() -> String {
    "plain".into()
}

fn default_log_output() -> String {
    "stderr".into()
}

/// Resolve a secret: check the direct value first, then the env-var reference.
pub fn resolve_secret_field(direct: &Option<String>, env_var: &Option<String>) -> Option<String> {
    if let Some(val) = direct {
        if !val.is_empty() {
            return Some(val.clone());
        }
    }
    if let Some(env) = env_var {
        if let Ok(val) = std::env::var(env) {
            if !val.is_empty() {
                return Some(val);
            }
        }
    }
    None
}

/// Substitute `${ENV_VAR}` patterns in a string with their environment variable values.
fn substitute_env_vars(input: &str) -> String {
    let re = regex::Regex::new(r"\$\{([^}]+)\}").expect("static regex");
    re.replace_all(input, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_default()
    })
    .into_owned()
}

impl Config {
    /// Load config from a JSON5 file, substituting `${ENV_VAR}` references.
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(crate::error::AgentForgeError::Io)?;

        let substituted = substitute_env_vars(&raw);

        let config: Config = json5::from_str(&substituted)
            .map_err(|e| crate::error::AgentForgeError::Config(e.to_string()))?;

        Ok(config)
    }

    /// Default config file location.
    pub fn config_path() -> PathBuf {
        data_dir().join("config.json")
    }

    /// Resolve the API key: direct value first, then the configured (or default) env var.
    pub fn resolve_api_key(&self) -> Option<String> {
        let provider = self.provider.clone().unwrap_or_default();
        let env = provider
            .api_key_env
            .or_else(|| Some(DEFAULT_API_KEY_ENV.to_string()));
        resolve_secret_field(&provider.api_key, &env)
    }

    pub fn base_url(&self) -> String {
        self.provider
            .as_ref()
            .and_then(|p| p.base_url.clone())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }

    pub fn timeout_secs(&self) -> Option<u64> {
        self.provider.as_ref().and_then(|p| p.timeout_secs)
    }

    /// Resolve the agents file location.
    pub fn store_path(&self) -> PathBuf {
        self.store
            .as_ref()
            .and_then(|s| s.path.as_ref())
            .map(|p| {
                let expanded = shellexpand::tilde(p);
                PathBuf::from(expanded.as_ref())
            })
            .unwrap_or_else(|| data_dir().join("agents.json"))
    }

    /// Validate config, returning (warnings, errors).
    pub fn validate(&self) -> (Vec<String>, Vec<String>) {
        let mut warnings = Vec::new();
        let mut errors = Vec::new();

        if self.resolve_api_key().is_none() {
            warnings.push("No OpenAI API key configured; agent runs will fail".to_string());
        }

        if let Some(url) = self.provider.as_ref().and_then(|p| p.base_url.as_ref()) {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                errors.push(format!("Provider base_url must be an http(s) URL: {url}"));
            }
        }

        if self.timeout_secs() == Some(0) {
            errors.push("Provider timeout_secs cannot be 0".to_string());
        }

        if let Some(logging) = &self.logging {
            if !matches!(logging.format.as_str(), "plain" | "json") {
                warnings.push(format!(
                    "Unknown logging format '{}', falling back to plain",
                    logging.format
                ));
            }
        }

        (warnings, errors)
    }
}

/// Base directory for Agent Forge data: `~/.agent_forge/`
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".agent_forge")
}
