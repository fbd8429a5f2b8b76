use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use dialoguer::{Confirm, Input};

use agent_forge_agent::{AgentRunner, AgentTarget, ChatMessage, ChatRole, ChatSession, RunResponse, RunResult};
use agent_forge_core::agent_store::{AgentStore, JsonAgentStore, create_agent, update_agent};
use agent_forge_core::config::{Config, LoggingConfig};
use agent_forge_core::types::{
    AgentConfig, MODEL_OPTIONS, ToolCategory, builtin_tool_specs, example_function_tools,
};
use agent_forge_providers::openai::OpenAiTransport;
use agent_forge_providers::{CompletionClient, validate_api_key};

#[derive(Parser)]
#[command(
    name = "agent-forge",
    about = "Author agent definitions and test-drive them against the OpenAI chat API",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage saved agents
    Agents {
        #[command(subcommand)]
        action: AgentAction,
    },

    /// Run an agent once and print the transcript
    Run {
        /// Saved agent id
        #[arg(required_unless_present = "file")]
        id: Option<String>,

        /// Run an unsaved agent definition from a JSON file instead
        #[arg(long, conflicts_with = "id")]
        file: Option<PathBuf>,

        /// User message
        #[arg(short, long)]
        message: String,

        /// Print the raw run result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Chat with an agent interactively
    Chat {
        /// Saved agent id
        id: String,
    },

    /// API key management
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },

    /// List the supported models
    Models,

    /// List the built-in tools and the example function tools
    Tools,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum AgentAction {
    /// List saved agents
    List,
    /// Show one agent as JSON
    Show { id: String },
    /// Create an agent from a JSON definition
    Create {
        #[arg(long)]
        file: PathBuf,
    },
    /// Replace an agent's definition, keeping its id
    Update {
        id: String,
        #[arg(long)]
        file: PathBuf,
    },
    /// Delete an agent
    Delete {
        id: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum KeyAction {
    /// Check an API key (defaults to the configured one)
    Validate { key: Option<String> },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Check the configuration for problems
    Validate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::config_path);
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    init_tracing(config.logging.as_ref(), cli.verbose);

    let (warnings, errors) = config.validate();
    for warning in &warnings {
        tracing::warn!("{warning}");
    }
    if !errors.is_empty() && !matches!(cli.command, Commands::Config { .. }) {
        bail!("invalid configuration: {}", errors.join("; "));
    }

    let store: Arc<dyn AgentStore> = Arc::new(JsonAgentStore::new(config.store_path()));

    match cli.command {
        Commands::Agents { action } => agents_command(action, store.as_ref()).await?,
        Commands::Run {
            id,
            file,
            message,
            json,
        } => {
            let target = match (id, file) {
                (_, Some(file)) => AgentTarget::Config(read_agent_file(&file)?),
                (Some(id), None) => AgentTarget::Id(id),
                (None, None) => bail!("either an agent id or --file is required"),
            };
            let runner = AgentRunner::new(CompletionClient::from_config(&config)?, store);
            let result = runner.run(target, &message).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_run(&result);
            }
        }
        Commands::Chat { id } => {
            let agent = store
                .get(&id)
                .await?
                .with_context(|| format!("Agent with ID {id} not found"))?;
            let runner = AgentRunner::new(CompletionClient::from_config(&config)?, store);
            chat_loop(ChatSession::new(runner, AgentTarget::Id(id)), &agent.name).await?;
        }
        Commands::Key { action } => match action {
            KeyAction::Validate { key } => {
                let key = key
                    .or_else(|| config.resolve_api_key())
                    .context("no API key given and none configured")?;
                let transport = OpenAiTransport::new(Some(&config.base_url()), None)?;
                let count = validate_api_key(&transport, &key).await?;
                println!("API key is valid ({count} models available)");
            }
        },
        Commands::Models => {
            for option in MODEL_OPTIONS {
                println!(
                    "{:<12} {:<12} {}",
                    option.value.as_str(),
                    option.label,
                    option.description
                );
            }
        }
        Commands::Tools => {
            for tool in builtin_tool_specs().into_iter().chain(example_function_tools()) {
                let category = match tool.category {
                    ToolCategory::BuiltIn => "built-in",
                    ToolCategory::Function => "function",
                };
                println!(
                    "{:<16} {:<10} {}",
                    tool.name,
                    category,
                    tool.description.as_deref().unwrap_or_default()
                );
            }
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
            ConfigAction::Validate => {
                println!("Config: {}", config_path.display());
                for warning in &warnings {
                    println!("warning: {warning}");
                }
                for error in &errors {
                    println!("error: {error}");
                }
                if !errors.is_empty() {
                    bail!("configuration has {} error(s)", errors.len());
                }
                println!("OK");
            }
        },
    }

    Ok(())
}

/// Install the global subscriber. `RUST_LOG` wins over the config file.
fn init_tracing(logging: Option<&LoggingConfig>, verbose: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter_directives(logging, verbose)));
    let json = logging.is_some_and(|l| l.format == "json");
    let stdout = logging.is_some_and(|l| l.output == "stdout");

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match (json, stdout) {
        (true, true) => builder.json().with_writer(std::io::stdout).init(),
        (true, false) => builder.json().with_writer(std::io::stderr).init(),
        (false, true) => builder.with_writer(std::io::stdout).init(),
        (false, false) => builder.with_writer(std::io::stderr).init(),
    }
}

fn filter_directives(logging: Option<&LoggingConfig>, verbose: bool) -> String {
    let level = if verbose {
        "debug"
    } else {
        logging
            .and_then(|l| l.level.as_deref())
            .unwrap_or("info")
    };
    let mut directives = vec![level.to_string()];
    if let Some(logging) = logging {
        directives.extend(logging.filters.iter().cloned());
    }
    directives.join(",")
}

async fn agents_command(action: AgentAction, store: &dyn AgentStore) -> anyhow::Result<()> {
    match action {
        AgentAction::List => {
            let agents = store.list().await?;
            if agents.is_empty() {
                println!("No agents yet. Create one with `agent-forge agents create --file <json>`.");
                return Ok(());
            }
            let now = chrono::Utc::now();
            for agent in agents {
                println!(
                    "{:<40} {:<24} {:<12} tools={:<2} last used: {}",
                    agent.id.as_deref().unwrap_or("-"),
                    agent.name,
                    agent.model.as_str(),
                    agent.tools.len(),
                    agent.last_used_label(now).as_deref().unwrap_or("never"),
                );
            }
        }
        AgentAction::Show { id } => {
            let agent = store
                .get(&id)
                .await?
                .with_context(|| format!("Agent with ID {id} not found"))?;
            println!("{}", serde_json::to_string_pretty(&agent)?);
        }
        AgentAction::Create { file } => {
            let agent = create_agent(store, read_agent_file(&file)?).await?;
            println!("Created agent {}", agent.id.as_deref().unwrap_or_default());
        }
        AgentAction::Update { id, file } => {
            update_agent(store, &id, read_agent_file(&file)?).await?;
            println!("Updated agent {id}");
        }
        AgentAction::Delete { id, yes } => {
            let confirmed = yes
                || Confirm::new()
                    .with_prompt(format!("Delete agent {id}?"))
                    .default(false)
                    .interact()?;
            if !confirmed {
                println!("Aborted");
                return Ok(());
            }
            if store.delete(&id).await? {
                println!("Deleted agent {id}");
            } else {
                bail!("Agent with ID {id} not found");
            }
        }
    }
    Ok(())
}

fn read_agent_file(path: &Path) -> anyhow::Result<AgentConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid agent definition in {}", path.display()))
}

fn print_run(result: &RunResult) {
    for exchange in result.tool_exchanges() {
        println!("[{}] {}", exchange.name, exchange.arguments);
        if let Some(output) = exchange.output {
            println!("{output}\n");
        }
    }
    println!("{}", RunResponse::from(result).display());
}

async fn chat_loop(session: ChatSession, agent_name: &str) -> anyhow::Result<()> {
    println!("Chatting with {agent_name}. Empty line or /quit exits, /clear clears the transcript.");
    loop {
        let line: String = Input::new()
            .with_prompt("you")
            .allow_empty(true)
            .interact_text()?;
        match line.trim() {
            "" | "/quit" => break,
            "/clear" => {
                session.clear().await;
                println!("(transcript cleared)");
            }
            input => {
                // The user's own line is already on screen.
                for message in session.send(input).await.iter().skip(1) {
                    print_message(message);
                }
            }
        }
    }
    Ok(())
}

fn print_message(message: &ChatMessage) {
    match message.role {
        ChatRole::User => println!("you: {}", message.content),
        ChatRole::Assistant => println!("agent: {}", message.content),
        ChatRole::Tool => println!(
            "  [{}]\n{}",
            message.tool.as_deref().unwrap_or("tool"),
            message.content
        ),
        ChatRole::System => eprintln!("{}", message.content),
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_requires_id_or_file() {
        assert!(Cli::try_parse_from(["agent-forge", "run", "-m", "hi"]).is_err());
        assert!(Cli::try_parse_from(["agent-forge", "run", "agent-1", "-m", "hi"]).is_ok());
        assert!(Cli::try_parse_from(["agent-forge", "run", "--file", "a.json", "-m", "hi"]).is_ok());
    }

    #[test]
    fn test_filter_directives() {
        assert_eq!(filter_directives(None, false), "info");
        assert_eq!(filter_directives(None, true), "debug");

        let logging = LoggingConfig {
            level: Some("info".into()),
            filters: vec!["agent_forge_agent=trace".into()],
            ..Default::default()
        };
        assert_eq!(
            filter_directives(Some(&logging), false),
            "info,agent_forge_agent=trace"
        );
    }

    #[test]
    fn test_read_agent_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.json");
        std::fs::write(
            &path,
            r#"{"name": "Helper", "instructions": "Be brief.", "model": "gpt-4o-mini", "tools": [{"name": "WebSearchTool"}]}"#,
        )
        .unwrap();
        let agent = read_agent_file(&path).unwrap();
        assert_eq!(agent.name, "Helper");
        assert_eq!(agent.tools.len(), 1);
        assert!(read_agent_file(&dir.path().join("missing.json")).is_err());
    }
}
