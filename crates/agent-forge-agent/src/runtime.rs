//! Agent run loop: one completion, optional simulated tools, one more completion.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use agent_forge_core::agent_store::AgentStore;
use agent_forge_core::error::{AgentForgeError, Result};
use agent_forge_core::types::{AgentConfig, ConversationMessage, ToolCall};
use agent_forge_providers::CompletionClient;
use agent_forge_tools::{ToolSimulator, build_declarations};

use crate::normalize::NO_RESPONSE;
use crate::{RunResult, RunStatus, TranscriptItem};

/// What to run: a stored agent by id, or an in-memory (possibly unsaved) config.
#[derive(Debug, Clone)]
pub enum AgentTarget {
    Id(String),
    Config(AgentConfig),
}

impl From<AgentConfig> for AgentTarget {
    fn from(config: AgentConfig) -> Self {
        Self::Config(config)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunPhase {
    AwaitingFirstCompletion,
    ExecutingTools,
    AwaitingSecondCompletion,
    Done,
}

/// Bundles the collaborators a run needs so callers pass one handle around.
#[derive(Clone)]
pub struct AgentRunner {
    client: CompletionClient,
    store: Arc<dyn AgentStore>,
    simulator: Arc<ToolSimulator>,
}

impl AgentRunner {
    pub fn new(client: CompletionClient, store: Arc<dyn AgentStore>) -> Self {
        Self::with_simulator(client, store, Arc::new(ToolSimulator::with_builtins()))
    }

    pub fn with_simulator(
        client: CompletionClient,
        store: Arc<dyn AgentStore>,
        simulator: Arc<ToolSimulator>,
    ) -> Self {
        Self {
            client,
            store,
            simulator,
        }
    }

    pub async fn run(&self, target: AgentTarget, input: &str) -> Result<RunResult> {
        run_agent(
            &self.client,
            self.store.as_ref(),
            &self.simulator,
            target,
            input,
        )
        .await
    }
}

/// Run an agent on one user input.
///
/// Fails with `NoCredential` before any lookup or network traffic, with
/// `AgentNotFound` for an unknown id, or with the classified upstream error
/// of either completion. Updating the agent's last-used time is best effort.
pub async fn run_agent(
    client: &CompletionClient,
    store: &dyn AgentStore,
    simulator: &ToolSimulator,
    target: AgentTarget,
    input: &str,
) -> Result<RunResult> {
    let start = Instant::now();

    if !client.has_credential() {
        warn!("Agent run attempted without an API key");
        return Err(AgentForgeError::NoCredential);
    }
    let agent = resolve_agent(store, target).await?;
    let run_id = format!("run-{}", uuid::Uuid::new_v4().simple());
    info!(
        run_id = %run_id,
        agent_id = ?agent.id,
        model = %agent.model,
        tools = agent.tools.len(),
        "Starting agent run"
    );
    if !agent.model.is_listed() {
        warn!(model = %agent.model, "Model is not in the catalog, sending it as-is");
    }

    let result = execute(client, simulator, &agent, input).await;
    let (new_items, content) = match result {
        Ok(done) => done,
        Err(e) => {
            error!(run_id = %run_id, error = %e, "Agent run failed");
            return Err(e);
        }
    };

    if let Some(id) = agent.id.as_deref() {
        touch_last_used(store, id).await;
    }

    let final_output = if content.is_empty() {
        NO_RESPONSE.to_string()
    } else {
        content
    };
    info!(
        run_id = %run_id,
        items = new_items.len(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Agent run completed"
    );

    Ok(RunResult {
        id: run_id,
        agent_id: agent.id,
        status: RunStatus::Completed,
        input: input.to_string(),
        output: final_output.clone(),
        final_output,
        new_items,
    })
}

async fn resolve_agent(store: &dyn AgentStore, target: AgentTarget) -> Result<AgentConfig> {
    match target {
        AgentTarget::Config(config) => Ok(config),
        AgentTarget::Id(id) => store
            .get(&id)
            .await?
            .ok_or(AgentForgeError::AgentNotFound(id)),
    }
}

/// Both completion phases. Returns the transcript items and the raw content
/// of the last completion.
async fn execute(
    client: &CompletionClient,
    simulator: &ToolSimulator,
    agent: &AgentConfig,
    input: &str,
) -> Result<(Vec<TranscriptItem>, String)> {
    let messages = vec![
        ConversationMessage::system(&agent.instructions),
        ConversationMessage::user(input),
    ];
    let declarations = build_declarations(&agent.tools);

    debug!(phase = ?RunPhase::AwaitingFirstCompletion);
    let first = client
        .complete(agent.model.clone(), &messages, &agent.model_settings, Some(declarations.as_slice()))
        .await?;

    if !first.has_tool_calls() {
        let content = first.content.unwrap_or_default();
        debug!(phase = ?RunPhase::Done, tool_calls = 0);
        return Ok((vec![TranscriptItem::MessageOutputItem { content: content.clone() }], content));
    }

    let calls = first.tool_calls();
    debug!(phase = ?RunPhase::ExecutingTools, tool_calls = calls.len());
    let (messages, mut items) = calls
        .iter()
        .fold((messages, Vec::with_capacity(calls.len() * 2 + 1)), |acc, call| {
            apply_tool_call(simulator, acc, call)
        });

    debug!(phase = ?RunPhase::AwaitingSecondCompletion, messages = messages.len());
    let second = client
        .complete(agent.model.clone(), &messages, &agent.model_settings, None)
        .await?;
    let content = second.content.unwrap_or_default();
    items.push(TranscriptItem::MessageOutputItem {
        content: content.clone(),
    });
    debug!(phase = ?RunPhase::Done, tool_calls = calls.len());
    Ok((items, content))
}

/// Simulate one tool call and record it in both the message history and the
/// transcript. Calls are applied strictly in order so the second completion
/// sees each call directly followed by its result.
fn apply_tool_call(
    simulator: &ToolSimulator,
    (mut messages, mut items): (Vec<ConversationMessage>, Vec<TranscriptItem>),
    call: &ToolCall,
) -> (Vec<ConversationMessage>, Vec<TranscriptItem>) {
    let name = call.function.name.as_str();
    let arguments = call.function.arguments.as_str();
    info!(tool = name, call_id = %call.id, "Executing tool call");

    items.push(TranscriptItem::ToolCallItem {
        call_id: call.id.clone(),
        name: name.to_string(),
        arguments: arguments.to_string(),
    });
    let output = simulator.execute(name, arguments);
    items.push(TranscriptItem::ToolCallOutputItem {
        call_id: call.id.clone(),
        output: output.clone(),
    });

    messages.push(ConversationMessage::assistant_tool_call(call.clone()));
    messages.push(ConversationMessage::tool_result(&call.id, output));
    (messages, items)
}

/// Stamp the stored record's last-used time. Failures are logged, never returned.
async fn touch_last_used(store: &dyn AgentStore, id: &str) {
    let stored = match store.get(id).await {
        Ok(Some(agent)) => agent,
        Ok(None) => {
            debug!(agent_id = id, "Agent not in store, skipping last-used update");
            return;
        }
        Err(e) => {
            warn!(agent_id = id, error = %e, "Failed to load agent for last-used update");
            return;
        }
    };
    let updated = AgentConfig {
        last_used: Some(Utc::now()),
        ..stored
    };
    if let Err(e) = store.save(&updated).await {
        warn!(agent_id = id, error = %e, "Failed to persist last-used time");
    }
}
