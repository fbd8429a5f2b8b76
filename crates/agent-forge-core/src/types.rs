use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{AgentForgeError, Result};

/// Tool name the wizard uses for the hosted web search capability.
pub const WEB_SEARCH_TOOL: &str = "WebSearchTool";

/// Tool name the wizard uses for the hosted vector-store search capability.
pub const FILE_SEARCH_TOOL: &str = "FileSearchTool";

/// Chat model. Identifiers outside the catalog are kept verbatim and sent as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum Model {
    #[default]
    Gpt4o,
    O3Mini,
    Gpt4oMini,
    Other(String),
}

impl Model {
    /// Model identifier as sent to the completion API.
    pub fn as_str(&self) -> &str {
        match self {
            Model::Gpt4o => "gpt-4o",
            Model::O3Mini => "o3-mini",
            Model::Gpt4oMini => "gpt-4o-mini",
            Model::Other(id) => id,
        }
    }

    /// Map an identifier to a model. An empty identifier means the default.
    pub fn from_id(id: &str) -> Self {
        match id {
            "" | "gpt-4o" => Model::Gpt4o,
            "o3-mini" => Model::O3Mini,
            "gpt-4o-mini" => Model::Gpt4oMini,
            other => Model::Other(other.to_string()),
        }
    }

    /// Whether the model is one of [`MODEL_OPTIONS`].
    pub fn is_listed(&self) -> bool {
        !matches!(self, Model::Other(_))
    }
}

impl Serialize for Model {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Model {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(id) => Ok(Model::from_id(&id)),
            other => {
                debug!(?other, "Model is not a string, using default");
                Ok(Model::default())
            }
        }
    }
}

impl std::fmt::Display for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Catalog entry describing a selectable model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelOption {
    pub value: Model,
    pub label: &'static str,
    pub description: &'static str,
}

pub const MODEL_OPTIONS: [ModelOption; 3] = [
    ModelOption {
        value: Model::Gpt4o,
        label: "GPT-4o",
        description: "Most capable model for a wide range of tasks (default)",
    },
    ModelOption {
        value: Model::O3Mini,
        label: "O3-mini",
        description: "Faster and more cost-effective model for simpler tasks",
    },
    ModelOption {
        value: Model::Gpt4oMini,
        label: "GPT-4o-mini",
        description: "Smaller, faster version of GPT-4o",
    },
];

pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_TOP_P: f64 = 1.0;
pub const DEFAULT_FREQUENCY_PENALTY: f64 = 0.0;
pub const DEFAULT_PRESENCE_PENALTY: f64 = 0.0;

/// Sampling parameters. Absent fields fall back to the defaults at request time.
///
/// Keys the pipeline does not use (the wizard's `maxTokens`, for one) are kept
/// in `extra` so a stored record survives being written back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ModelSettings {
    /// Settings with every field filled with its default.
    pub fn defaults() -> Self {
        Self {
            temperature: Some(DEFAULT_TEMPERATURE),
            top_p: Some(DEFAULT_TOP_P),
            frequency_penalty: Some(DEFAULT_FREQUENCY_PENALTY),
            presence_penalty: Some(DEFAULT_PRESENCE_PENALTY),
            extra: Map::new(),
        }
    }

    /// Fill absent fields from [`ModelSettings::defaults`].
    pub fn with_defaults(self) -> Self {
        let d = Self::defaults();
        Self {
            temperature: self.temperature.or(d.temperature),
            top_p: self.top_p.or(d.top_p),
            frequency_penalty: self.frequency_penalty.or(d.frequency_penalty),
            presence_penalty: self.presence_penalty.or(d.presence_penalty),
            extra: self.extra,
        }
    }

    pub fn validate(&self) -> Result<()> {
        check_range("temperature", self.temperature, 0.0, 1.0)?;
        check_range("topP", self.top_p, 0.0, 1.0)?;
        check_range("frequencyPenalty", self.frequency_penalty, -2.0, 2.0)?;
        check_range("presencePenalty", self.presence_penalty, -2.0, 2.0)?;
        Ok(())
    }
}

fn check_range(field: &str, value: Option<f64>, min: f64, max: f64) -> Result<()> {
    match value {
        Some(v) if !(min..=max).contains(&v) => Err(AgentForgeError::InvalidConfig(format!(
            "{field} must be between {min} and {max}, got {v}"
        ))),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToolCategory {
    #[serde(rename = "Built-in")]
    BuiltIn,
    #[default]
    Function,
}

/// A tool declared on an agent. Every field decodes leniently: a malformed
/// entry degrades to defaults instead of failing the whole agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_category")]
    pub category: ToolCategory,
    #[serde(
        default,
        deserialize_with = "lenient_opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<String>,
    /// Parameter name to descriptor. Built-in tools store plain settings here
    /// (e.g. `max_num_results: 3`), so values are decoded leniently.
    #[serde(default, deserialize_with = "lenient_object")]
    pub parameters: Map<String, Value>,
    /// Source shown by the code preview; never executed.
    #[serde(
        default,
        deserialize_with = "lenient_opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub code: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ToolSpec {
    pub fn web_search() -> Self {
        Self {
            id: "websearch".into(),
            name: WEB_SEARCH_TOOL.into(),
            category: ToolCategory::BuiltIn,
            description: Some("Search the web for information".into()),
            parameters: Map::new(),
            code: None,
            extra: Map::new(),
        }
    }

    pub fn file_search() -> Self {
        let mut parameters = Map::new();
        parameters.insert("max_num_results".into(), serde_json::json!(3));
        parameters.insert("vector_store_ids".into(), serde_json::json!([]));
        Self {
            id: "filesearch".into(),
            name: FILE_SEARCH_TOOL.into(),
            category: ToolCategory::BuiltIn,
            description: Some("Search through vector stores of documents".into()),
            parameters,
            code: None,
            extra: Map::new(),
        }
    }

    /// A user-defined function tool with string parameters.
    fn function(
        id: &str,
        name: &str,
        description: &str,
        params: &[(&str, &str)],
        code: &str,
    ) -> Self {
        let parameters = params
            .iter()
            .map(|(param, about)| {
                (
                    param.to_string(),
                    serde_json::json!({ "type": "string", "description": about }),
                )
            })
            .collect();
        Self {
            id: id.into(),
            name: name.into(),
            category: ToolCategory::Function,
            description: Some(description.into()),
            parameters,
            code: Some(code.into()),
            extra: Map::new(),
        }
    }
}

/// The built-in tools offered by the wizard.
pub fn builtin_tool_specs() -> Vec<ToolSpec> {
    vec![ToolSpec::web_search(), ToolSpec::file_search()]
}

const GET_WEATHER_CODE: &str = r#"@function_tool
def get_weather(city: str) -> str:
    """Fetch weather for a city.

    Args:
        city: The city to get weather for.
    """
    return f"The weather in {city} is sunny""#;

const CALCULATE_CODE: &str = r#"@function_tool
def calculate(expression: str) -> str:
    """Evaluate a mathematical expression.

    Args:
        expression: The expression to evaluate.
    """
    try:
        result = eval(expression, {"__builtins__": {}}, {"sin": math.sin, "cos": math.cos})
        return f"Result: {result}"
    except Exception as e:
        return f"Error: {str(e)}""#;

/// Starter function tools the wizard offers as templates.
pub fn example_function_tools() -> Vec<ToolSpec> {
    vec![
        ToolSpec::function(
            "weather",
            "get_weather",
            "Get weather information for a city",
            &[("city", "The city to get weather for")],
            GET_WEATHER_CODE,
        ),
        ToolSpec::function(
            "calculator",
            "calculate",
            "Perform a calculation",
            &[("expression", "The mathematical expression to evaluate")],
            CALCULATE_CODE,
        ),
    ]
}

fn lenient_object<'de, D>(deserializer: D) -> std::result::Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Object(map) => Ok(map),
        other => {
            debug!(?other, "Tool parameters are not an object, using empty map");
            Ok(Map::new())
        }
    }
}

fn lenient_opt_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(Some(s)),
        Value::Null => Ok(None),
        other => {
            debug!(?other, "Expected a string, ignoring value");
            Ok(None)
        }
    }
}

fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_opt_string(deserializer)?.unwrap_or_default())
}

fn lenient_category<'de, D>(deserializer: D) -> std::result::Result<ToolCategory, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(ToolCategory::deserialize(&value).unwrap_or_else(|_| {
        debug!(?value, "Unknown tool category, treating as a function tool");
        ToolCategory::default()
    }))
}

/// A decoded parameter descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub param_type: String,
    pub description: String,
    pub required: bool,
}

impl ParamSpec {
    /// Decode a parameter descriptor, defaulting every missing or malformed field.
    pub fn decode_lenient(value: &Value) -> Self {
        let param_type = value
            .get("type")
            .and_then(|v| v.as_str())
            .unwrap_or("string")
            .to_string();
        let description = value
            .get("description")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let required = value
            .get("required")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        Self {
            param_type,
            description,
            required,
        }
    }
}

/// A stored agent definition, as produced by the builder wizard.
///
/// The pipeline only reads it. Fields it has no use for are kept in `extra`,
/// so writing a record back never drops what the wizard stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub instructions: String,
    #[serde(default)]
    pub model: Model,
    #[serde(default, rename = "modelSettings")]
    pub model_settings: ModelSettings,
    #[serde(default)]
    pub tools: Vec<ToolSpec>,
    /// Delegation targets; carried through untouched.
    #[serde(default)]
    pub handoffs: Vec<Value>,
    /// Validation hooks; declared only, never enforced.
    #[serde(default, rename = "inputGuardrails")]
    pub input_guardrails: Vec<Value>,
    #[serde(default, rename = "outputGuardrails")]
    pub output_guardrails: Vec<Value>,
    /// Structured output type chosen in the wizard, if any.
    #[serde(default, rename = "outputType")]
    pub output_type: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AgentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AgentForgeError::InvalidConfig("agent name is required".into()));
        }
        self.model_settings.validate()?;
        let mut seen = std::collections::HashSet::new();
        for tool in &self.tools {
            if !tool.id.is_empty() && !seen.insert(tool.id.as_str()) {
                return Err(AgentForgeError::InvalidConfig(format!(
                    "duplicate tool id: {}",
                    tool.id
                )));
            }
        }
        Ok(())
    }

    /// "Last used" label relative to `now`, if the agent has been run.
    pub fn last_used_label(&self, now: DateTime<Utc>) -> Option<String> {
        self.last_used.map(|t| relative_time_label(t, now))
    }
}

/// Render a past instant relative to `now` ("Just now", "3 minutes ago", ...).
pub fn relative_time_label(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - then).num_seconds();
    let mins = secs / 60;
    let hours = mins / 60;
    let days = hours / 24;

    if secs < 60 {
        "Just now".into()
    } else if mins < 60 {
        format!("{mins} minute{} ago", plural(mins))
    } else if hours < 24 {
        format!("{hours} hour{} ago", plural(hours))
    } else if days < 7 {
        format!("{days} day{} ago", plural(days))
    } else {
        then.format("%Y-%m-%d").to_string()
    }
}

fn plural(n: i64) -> &'static str {
    if n > 1 { "s" } else { "" }
}

/// A function declaration in the shape the completion API's `tools` field expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDeclaration {
    #[serde(rename = "type")]
    pub decl_type: String,
    pub function: FunctionSchema,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolDeclaration {
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
    ) -> Self {
        Self {
            decl_type: "function".into(),
            function: FunctionSchema {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }
}

/// Message role in a chat-completion exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A function invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "default_call_type")]
    pub call_type: String,
    pub function: FunctionCall,
}

fn default_call_type() -> String {
    "function".into()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded arguments, exactly as the model produced them.
    #[serde(default)]
    pub arguments: String,
}

impl ToolCall {
    pub fn function(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            call_type: default_call_type(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

/// One entry of the message list sent to the completion API. Lives for a single run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl ConversationMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::text(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text(Role::User, content)
    }

    pub fn assistant_tool_call(call: ToolCall) -> Self {
        Self {
            role: Role::Assistant,
            content: None,
            tool_call_id: None,
            tool_calls: Some(vec![call]),
        }
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_call_id: Some(call_id.into()),
            tool_calls: None,
        }
    }

    fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_call_id: None,
            tool_calls: None,
        }
    }
}
