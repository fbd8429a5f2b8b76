//! Agent storage: the list of saved agent definitions.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{AgentForgeError, Result};
use crate::types::AgentConfig;

/// Persistence capability for agent definitions.
#[async_trait]
pub trait AgentStore: Send + Sync {
    async fn list(&self) -> Result<Vec<AgentConfig>>;

    async fn get(&self, id: &str) -> Result<Option<AgentConfig>>;

    /// Insert or replace the agent with the same id.
    async fn save(&self, agent: &AgentConfig) -> Result<()>;

    /// Returns whether an agent was removed.
    async fn delete(&self, id: &str) -> Result<bool>;
}

/// Assign an id and timestamps to a new agent, fill defaults, validate, and save it.
pub async fn create_agent(store: &dyn AgentStore, mut agent: AgentConfig) -> Result<AgentConfig> {
    agent.validate()?;
    let now = Utc::now();
    agent.id = Some(format!("agent-{}", uuid::Uuid::new_v4().simple()));
    agent.model_settings = agent.model_settings.with_defaults();
    agent.created_at = Some(now);
    agent.updated_at = None;
    agent.last_used = Some(now);
    store.save(&agent).await?;
    debug!(id = ?agent.id, name = %agent.name, "Created agent");
    Ok(agent)
}

/// Replace an existing agent's definition, keeping its id and creation time.
pub async fn update_agent(
    store: &dyn AgentStore,
    id: &str,
    mut agent: AgentConfig,
) -> Result<AgentConfig> {
    agent.validate()?;
    let existing = store
        .get(id)
        .await?
        .ok_or_else(|| AgentForgeError::AgentNotFound(id.to_string()))?;
    agent.id = Some(id.to_string());
    agent.created_at = existing.created_at;
    agent.last_used = existing.last_used;
    agent.updated_at = Some(Utc::now());
    store.save(&agent).await?;
    debug!(id, "Updated agent");
    Ok(agent)
}

fn require_id(agent: &AgentConfig) -> Result<&str> {
    agent
        .id
        .as_deref()
        .ok_or_else(|| AgentForgeError::Store("cannot save an agent without an id".into()))
}

/// File-based store: a single JSON array of agents.
pub struct JsonAgentStore {
    path: PathBuf,
    // Serialises read-modify-write cycles within this process.
    lock: tokio::sync::Mutex<()>,
}

impl JsonAgentStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: tokio::sync::Mutex::new(()),
        }
    }

    async fn load_all(&self) -> Result<Vec<AgentConfig>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let data = tokio::fs::read_to_string(&self.path).await?;
        if data.trim().is_empty() {
            return Ok(Vec::new());
        }
        let agents: Vec<AgentConfig> = serde_json::from_str(&data)
            .map_err(|e| AgentForgeError::Store(format!("corrupt agents file: {e}")))?;
        Ok(agents)
    }

    async fn save_all(&self, agents: &[AgentConfig]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let data = serde_json::to_string_pretty(agents)?;
        // Atomic write: write to temp then rename
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, data.as_bytes()).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl AgentStore for JsonAgentStore {
    async fn list(&self) -> Result<Vec<AgentConfig>> {
        self.load_all().await
    }

    async fn get(&self, id: &str) -> Result<Option<AgentConfig>> {
        let agents = self.load_all().await?;
        Ok(agents.into_iter().find(|a| a.id.as_deref() == Some(id)))
    }

    async fn save(&self, agent: &AgentConfig) -> Result<()> {
        let id = require_id(agent)?;
        let _guard = self.lock.lock().await;
        let mut agents = self.load_all().await?;
        match agents.iter_mut().find(|a| a.id.as_deref() == Some(id)) {
            Some(existing) => *existing = agent.clone(),
            None => agents.push(agent.clone()),
        }
        self.save_all(&agents).await?;
        debug!(id, path = %self.path.display(), "Saved agent");
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let mut agents = self.load_all().await?;
        let before = agents.len();
        agents.retain(|a| a.id.as_deref() != Some(id));
        if agents.len() == before {
            return Ok(false);
        }
        self.save_all(&agents).await?;
        debug!(id, "Deleted agent");
        Ok(true)
    }
}

/// In-process store.
#[derive(Default)]
pub struct MemoryAgentStore {
    agents: RwLock<Vec<AgentConfig>>,
}

impl MemoryAgentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_agents(agents: Vec<AgentConfig>) -> Self {
        Self {
            agents: RwLock::new(agents),
        }
    }
}

#[async_trait]
impl AgentStore for MemoryAgentStore {
    async fn list(&self) -> Result<Vec<AgentConfig>> {
        Ok(self.agents.read().await.clone())
    }

    async fn get(&self, id: &str) -> Result<Option<AgentConfig>> {
        Ok(self
            .agents
            .read()
            .await
            .iter()
            .find(|a| a.id.as_deref() == Some(id))
            .cloned())
    }

    async fn save(&self, agent: &AgentConfig) -> Result<()> {
        let id = require_id(agent)?;
        let mut agents = self.agents.write().await;
        match agents.iter_mut().find(|a| a.id.as_deref() == Some(id)) {
            Some(existing) => *existing = agent.clone(),
            None => agents.push(agent.clone()),
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let mut agents = self.agents.write().await;
        let before = agents.len();
        agents.retain(|a| a.id.as_deref() != Some(id));
        Ok(agents.len() != before)
    }
}
