//! Chat session: a running transcript against one agent.
//!
//! Each [`ChatSession::send`] runs the agent once and appends what a chat UI
//! shows: the user's message, a "Using <tool>..." note plus the tool output
//! for every tool call, and the assistant's reply. A failed run appends one
//! `system` entry with the error text instead. Sends on the same session are
//! serialised, so replies always land in submission order.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::normalize::RunResponse;
use crate::runtime::{AgentRunner, AgentTarget};
use crate::RunResult;

/// Shown for a tool call whose output was empty or missing.
const TOOL_COMPLETED: &str = "Tool execution completed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
    Tool,
    System,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatMessageKind {
    #[default]
    Text,
    ToolCall,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: u64,
    pub role: ChatRole,
    #[serde(default)]
    pub kind: ChatMessageKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    pub content: String,
}

pub struct ChatSession {
    runner: AgentRunner,
    target: AgentTarget,
    transcript: RwLock<Vec<ChatMessage>>,
    // Held for the whole of a send.
    turn: Mutex<()>,
    next_id: AtomicU64,
}

impl ChatSession {
    pub fn new(runner: AgentRunner, target: AgentTarget) -> Self {
        Self {
            runner,
            target,
            transcript: RwLock::new(Vec::new()),
            turn: Mutex::new(()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Snapshot of the transcript so far.
    pub async fn messages(&self) -> Vec<ChatMessage> {
        self.transcript.read().await.clone()
    }

    /// Run the agent on `input` and return the entries this turn appended,
    /// user message first. Blank input appends nothing.
    pub async fn send(&self, input: &str) -> Vec<ChatMessage> {
        let input = input.trim();
        if input.is_empty() {
            return Vec::new();
        }

        let _turn = self.turn.lock().await;
        let user = self.message(ChatRole::User, ChatMessageKind::Text, None, input.to_string());
        self.transcript.write().await.push(user.clone());

        let mut appended = vec![user];
        match self.runner.run(self.target.clone(), input).await {
            Ok(result) => appended.extend(self.render(&result)),
            Err(e) => {
                warn!(error = %e, "Chat turn failed");
                appended.push(self.message(
                    ChatRole::System,
                    ChatMessageKind::Text,
                    None,
                    format!("Error: {e}"),
                ));
            }
        }

        self.transcript.write().await.extend(appended[1..].iter().cloned());
        debug!(appended = appended.len(), "Chat turn finished");
        appended
    }

    /// Drop every entry from the transcript. Waits for an in-flight turn to
    /// finish so its reply is cleared along with the user message.
    pub async fn clear(&self) {
        let _turn = self.turn.lock().await;
        self.transcript.write().await.clear();
    }

    fn render(&self, result: &RunResult) -> Vec<ChatMessage> {
        let mut out = Vec::new();
        for exchange in result.tool_exchanges() {
            let tool = Some(exchange.name.to_string());
            out.push(self.message(
                ChatRole::Assistant,
                ChatMessageKind::ToolCall,
                tool.clone(),
                format!("Using {}...", exchange.name),
            ));
            let output = exchange
                .output
                .filter(|o| !o.is_empty())
                .unwrap_or(TOOL_COMPLETED);
            out.push(self.message(ChatRole::Tool, ChatMessageKind::Text, tool, output.to_string()));
        }
        out.push(self.message(
            ChatRole::Assistant,
            ChatMessageKind::Text,
            None,
            RunResponse::from(result).display(),
        ));
        out
    }

    fn message(
        &self,
        role: ChatRole,
        kind: ChatMessageKind,
        tool: Option<String>,
        content: String,
    ) -> ChatMessage {
        ChatMessage {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            role,
            kind,
            tool,
            content,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;

    use agent_forge_core::agent_store::MemoryAgentStore;
    use agent_forge_core::types::{AgentConfig, ToolCall, ToolSpec};
    use agent_forge_providers::{
        ChatCompletionRequest, ChatCompletionResponse, ChatTransport, Choice, CompletionClient,
        CompletionMessage, Credentials, TransportError,
    };

    use super::*;

    /// Echoes the last user message back, optionally after a delay.
    struct EchoTransport {
        delay: Duration,
    }

    #[async_trait]
    impl ChatTransport for EchoTransport {
        fn id(&self) -> &str {
            "echo"
        }

        async fn create_chat_completion(
            &self,
            request: &ChatCompletionRequest,
            _credentials: &Credentials,
        ) -> Result<ChatCompletionResponse, TransportError> {
            let last = request
                .messages
                .last()
                .and_then(|m| m.content.clone())
                .unwrap_or_default();
            // Longer inputs finish sooner, to provoke reordering if sends overlapped.
            let wait = self.delay.saturating_sub(Duration::from_millis(last.len() as u64 * 10));
            tokio::time::sleep(wait).await;
            Ok(ChatCompletionResponse {
                choices: vec![Choice {
                    message: CompletionMessage::text(format!("echo: {last}")),
                    finish_reason: None,
                }],
                usage: None,
            })
        }

        async fn list_models(&self, _credentials: &Credentials) -> Result<Vec<String>, TransportError> {
            Ok(Vec::new())
        }
    }

    /// First call asks for a search, second call answers.
    struct SearchingTransport {
        calls: std::sync::Mutex<usize>,
    }

    #[async_trait]
    impl ChatTransport for SearchingTransport {
        fn id(&self) -> &str {
            "searching"
        }

        async fn create_chat_completion(
            &self,
            _request: &ChatCompletionRequest,
            _credentials: &Credentials,
        ) -> Result<ChatCompletionResponse, TransportError> {
            let n = {
                let mut calls = self.calls.lock().unwrap();
                *calls += 1;
                *calls
            };
            let message = if n == 1 {
                CompletionMessage::with_tool_calls(vec![ToolCall::function(
                    "call_1",
                    "web_search",
                    r#"{"query":"rust editions"}"#,
                )])
            } else {
                CompletionMessage::text("Editions ship every three years.")
            };
            Ok(ChatCompletionResponse {
                choices: vec![Choice {
                    message,
                    finish_reason: None,
                }],
                usage: None,
            })
        }

        async fn list_models(&self, _credentials: &Credentials) -> Result<Vec<String>, TransportError> {
            Ok(Vec::new())
        }
    }

    fn agent(tools: Vec<ToolSpec>) -> AgentConfig {
        AgentConfig {
            name: "Helper".into(),
            instructions: "You are helpful.".into(),
            tools,
            ..Default::default()
        }
    }

    fn session(transport: Arc<dyn ChatTransport>, credentials: Option<Credentials>, tools: Vec<ToolSpec>) -> ChatSession {
        let client = CompletionClient::new(transport, credentials);
        let runner = AgentRunner::new(client, Arc::new(MemoryAgentStore::new()));
        ChatSession::new(runner, AgentTarget::Config(agent(tools)))
    }

    fn echo_session(delay: Duration) -> ChatSession {
        session(
            Arc::new(EchoTransport { delay }),
            Some(Credentials::api_key("sk-test")),
            vec![],
        )
    }

    #[tokio::test]
    async fn test_blank_input_is_ignored() {
        let session = echo_session(Duration::ZERO);
        assert!(session.send("   ").await.is_empty());
        assert!(session.messages().await.is_empty());
    }

    #[tokio::test]
    async fn test_plain_turn() {
        let session = echo_session(Duration::ZERO);
        let appended = session.send("Hi").await;

        assert_eq!(appended.len(), 2);
        assert_eq!(appended[0].role, ChatRole::User);
        assert_eq!(appended[0].content, "Hi");
        assert_eq!(appended[1].role, ChatRole::Assistant);
        assert_eq!(appended[1].content, "echo: Hi");
        assert_eq!(session.messages().await, appended);
    }

    #[tokio::test]
    async fn test_tool_turn_renders_call_and_output() {
        let transport = Arc::new(SearchingTransport {
            calls: std::sync::Mutex::new(0),
        });
        let session = session(
            transport,
            Some(Credentials::api_key("sk-test")),
            vec![ToolSpec::web_search()],
        );
        let appended = session.send("When do editions ship?").await;

        let roles: Vec<ChatRole> = appended.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![ChatRole::User, ChatRole::Assistant, ChatRole::Tool, ChatRole::Assistant]
        );
        assert_eq!(appended[1].kind, ChatMessageKind::ToolCall);
        assert_eq!(appended[1].content, "Using web_search...");
        assert_eq!(appended[2].tool.as_deref(), Some("web_search"));
        assert!(appended[2].content.contains("rust editions"));
        assert_eq!(appended[3].content, "Editions ship every three years.");
    }

    #[tokio::test]
    async fn test_failure_appends_system_entry() {
        let session = session(Arc::new(EchoTransport { delay: Duration::ZERO }), None, vec![]);
        let appended = session.send("Hi").await;

        assert_eq!(appended.len(), 2);
        assert_eq!(appended[1].role, ChatRole::System);
        assert_eq!(
            appended[1].content,
            "Error: No API key found. Please set your OpenAI API key in the settings."
        );
    }

    #[tokio::test]
    async fn test_concurrent_sends_keep_submission_order() {
        let session = Arc::new(echo_session(Duration::from_millis(100)));

        let first = {
            let session = session.clone();
            tokio::spawn(async move { session.send("a").await })
        };
        // Let the first send take the turn lock.
        tokio::time::sleep(Duration::from_millis(20)).await;
        let second = {
            let session = session.clone();
            tokio::spawn(async move { session.send("a much longer message").await })
        };
        first.await.unwrap();
        second.await.unwrap();

        let contents: Vec<String> = session.messages().await.into_iter().map(|m| m.content).collect();
        assert_eq!(
            contents,
            vec![
                "a".to_string(),
                "echo: a".to_string(),
                "a much longer message".to_string(),
                "echo: a much longer message".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_clear_waits_for_in_flight_turn() {
        let session = Arc::new(echo_session(Duration::from_millis(100)));

        let send = {
            let session = session.clone();
            tokio::spawn(async move { session.send("Hi").await })
        };
        // Let the send take the turn lock and append the user message.
        tokio::time::sleep(Duration::from_millis(20)).await;
        session.clear().await;
        send.await.unwrap();

        assert!(session.messages().await.is_empty());
    }

    #[tokio::test]
    async fn test_clear() {
        let session = echo_session(Duration::ZERO);
        session.send("Hi").await;
        session.clear().await;
        assert!(session.messages().await.is_empty());

        let appended = session.send("again").await;
        assert!(appended[0].id > 2);
    }
}
