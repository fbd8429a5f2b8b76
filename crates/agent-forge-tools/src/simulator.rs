//! Simulated tool execution.
//!
//! Nothing here touches the network or the filesystem. Every execution path
//! returns a non-empty string, whatever the tool name or argument payload.

use serde_json::Value;
use tracing::{debug, warn};

use crate::file_search::FileSearchSimulator;
use crate::web_search::WebSearchSimulator;

/// A tool whose result is fabricated locally.
pub trait SimulatedTool: Send + Sync {
    /// Function name the model uses to call this tool.
    fn name(&self) -> &str;

    /// Produce a result for already-parsed arguments.
    fn simulate(&self, args: &Value) -> String;
}

/// Registry of simulated tools keyed by function name.
pub struct ToolSimulator {
    tools: Vec<Box<dyn SimulatedTool>>,
}

impl Default for ToolSimulator {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl ToolSimulator {
    /// A simulator with no registered tools; every call falls back to an echo.
    pub fn empty() -> Self {
        Self { tools: Vec::new() }
    }

    pub fn with_builtins() -> Self {
        let mut sim = Self::empty();
        sim.register(Box::new(WebSearchSimulator));
        sim.register(Box::new(FileSearchSimulator));
        sim
    }

    /// Register a tool, replacing any existing one with the same name.
    pub fn register(&mut self, tool: Box<dyn SimulatedTool>) {
        self.tools.retain(|t| t.name() != tool.name());
        self.tools.push(tool);
    }

    pub fn get(&self, name: &str) -> Option<&dyn SimulatedTool> {
        self.tools.iter().find(|t| t.name() == name).map(|t| t.as_ref())
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Run the named tool against a raw JSON argument string.
    pub fn execute(&self, name: &str, arguments_json: &str) -> String {
        let Some(tool) = self.get(name) else {
            debug!(tool = name, "No simulator registered, echoing call");
            return echo_call(name, arguments_json);
        };

        let args = parse_arguments_lenient(arguments_json);
        let output = tool.simulate(&args);
        debug!(tool = name, output_len = output.len(), "Simulated tool call");
        if output.is_empty() {
            return echo_call(name, arguments_json);
        }
        output
    }
}

/// Parse tool-call arguments, treating anything unparseable as no arguments.
pub fn parse_arguments_lenient(arguments_json: &str) -> Value {
    if arguments_json.trim().is_empty() {
        return Value::Object(Default::default());
    }
    match serde_json::from_str(arguments_json) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "Unparseable tool arguments, using empty arguments");
            Value::Object(Default::default())
        }
    }
}

/// String argument lookup that tolerates missing keys and non-object payloads.
pub(crate) fn string_arg<'a>(args: &'a Value, key: &str) -> &'a str {
    args.get(key).and_then(Value::as_str).unwrap_or_default()
}

fn echo_call(name: &str, arguments_json: &str) -> String {
    format!("Tool {name} was called with arguments: {arguments_json}")
}
