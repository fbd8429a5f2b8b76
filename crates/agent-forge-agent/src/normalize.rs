//! Display-string extraction for run responses.
//!
//! Responses come in a handful of shapes: a bare string, our own
//! [`RunResult`], or objects from other runners that carry `final_output`,
//! a nested `output.content`/`output.text`, or a top-level `content`. They
//! are decoded once into [`RunResponse`] and rendered from there.

use serde_json::Value;

use crate::RunResult;

/// Shown when a response carries nothing displayable.
pub const NO_RESPONSE: &str = "No response generated";

/// A run response, decoded by precedence: string `output`, then a non-empty
/// `final_output`, then `output.content`, `output.text`, top-level `content`,
/// and finally a bare string.
#[derive(Debug, Clone, PartialEq)]
pub enum RunResponse {
    /// `output` was a string. Wins even when empty.
    Output(String),
    /// Any non-empty `final_output`; non-strings are pretty-printed.
    FinalOutput(Value),
    OutputContent(Value),
    OutputText(Value),
    Content(Value),
    Text(String),
    Empty,
}

impl RunResponse {
    pub fn from_value(raw: &Value) -> Self {
        if let Value::String(s) = raw {
            return Self::Text(s.clone());
        }
        let Value::Object(obj) = raw else {
            return Self::Empty;
        };

        let output = obj.get("output");
        if let Some(Value::String(s)) = output {
            return Self::Output(s.clone());
        }
        if let Some(v) = obj.get("final_output").filter(|v| is_present(v)) {
            return Self::FinalOutput(v.clone());
        }
        if let Some(v) = nested(output, "content") {
            return Self::OutputContent(v.clone());
        }
        if let Some(v) = nested(output, "text") {
            return Self::OutputText(v.clone());
        }
        if let Some(v) = obj.get("content").filter(|v| is_present(v)) {
            return Self::Content(v.clone());
        }
        Self::Empty
    }

    /// The string a chat UI shows for this response.
    pub fn display(&self) -> String {
        match self {
            Self::Output(s) | Self::Text(s) => s.clone(),
            Self::FinalOutput(v) | Self::OutputContent(v) | Self::OutputText(v) | Self::Content(v) => {
                render(v)
            }
            Self::Empty => NO_RESPONSE.to_string(),
        }
    }
}

impl From<&RunResult> for RunResponse {
    fn from(result: &RunResult) -> Self {
        Self::Output(result.output.clone())
    }
}

/// Resolve any response shape to its display string.
pub fn normalize(raw: &Value) -> String {
    RunResponse::from_value(raw).display()
}

fn nested<'a>(output: Option<&'a Value>, key: &str) -> Option<&'a Value> {
    output.and_then(|o| o.get(key)).filter(|v| is_present(v))
}

/// Values that count as "set": not null, false, zero, or an empty string.
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}
