//! Agent runtime: runs a configured agent against the completion API.
//!
//! A run is at most two completions: the first may ask for tools, each tool
//! call is simulated in order, and a second completion (without tools) turns
//! the results into the final answer. The outcome is a [`RunResult`] whose
//! [`TranscriptItem`]s a chat UI can render directly.

use serde::{Deserialize, Serialize};

pub mod normalize;
pub mod runtime;
pub mod session;

pub use normalize::{NO_RESPONSE, RunResponse, normalize};
pub use runtime::{AgentRunner, AgentTarget, run_agent};
pub use session::{ChatMessage, ChatMessageKind, ChatRole, ChatSession};

/// One entry in a run's transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TranscriptItem {
    /// The model asked for a tool.
    ToolCallItem {
        call_id: String,
        name: String,
        arguments: String,
    },

    /// The simulated result for the call with the same `call_id`.
    ToolCallOutputItem { call_id: String, output: String },

    /// Assistant text. `content` is the raw completion content.
    MessageOutputItem { content: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    #[default]
    Completed,
}

/// Result of a completed agent run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub status: RunStatus,
    pub input: String,
    pub output: String,
    pub final_output: String,
    #[serde(default)]
    pub new_items: Vec<TranscriptItem>,
}

/// A tool call joined with its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolExchange<'a> {
    pub call_id: &'a str,
    pub name: &'a str,
    pub arguments: &'a str,
    pub output: Option<&'a str>,
}

impl RunResult {
    /// Tool calls in call order, each with its paired output if one was recorded.
    pub fn tool_exchanges(&self) -> Vec<ToolExchange<'_>> {
        self.new_items
            .iter()
            .filter_map(|item| match item {
                TranscriptItem::ToolCallItem {
                    call_id,
                    name,
                    arguments,
                } => Some(ToolExchange {
                    call_id,
                    name,
                    arguments,
                    output: self.output_for(call_id),
                }),
                _ => None,
            })
            .collect()
    }

    fn output_for(&self, call_id: &str) -> Option<&str> {
        self.new_items.iter().find_map(|item| match item {
            TranscriptItem::ToolCallOutputItem { call_id: id, output } if id == call_id => {
                Some(output.as_str())
            }
            _ => None,
        })
    }
}
