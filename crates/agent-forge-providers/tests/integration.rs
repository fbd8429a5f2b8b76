//! Live OpenAI tests: real API calls.
//!
//! Skipped when `OPENAI_API_KEY` is not set.
//! Run with: `cargo test -p agent-forge-providers --test integration`

use std::sync::Arc;

use serde_json::json;

use agent_forge_core::types::{ConversationMessage, Model, ModelSettings, ToolDeclaration};
use agent_forge_providers::openai::OpenAiTransport;
use agent_forge_providers::{CompletionClient, Credentials, validate_api_key};

fn openai_key() -> Option<String> {
    std::env::var("OPENAI_API_KEY")
        .ok()
        .filter(|k| !k.is_empty())
}

fn client(key: String) -> CompletionClient {
    let transport = OpenAiTransport::new(None, None).unwrap();
    CompletionClient::new(Arc::new(transport), Some(Credentials::api_key(key)))
}

fn deterministic() -> ModelSettings {
    ModelSettings {
        temperature: Some(0.0),
        ..ModelSettings::defaults()
    }
}

#[tokio::test]
async fn test_openai_simple_completion() {
    let Some(key) = openai_key() else {
        eprintln!("Skipping OpenAI test: OPENAI_API_KEY not set");
        return;
    };

    let messages = [
        ConversationMessage::system("You are a helpful assistant. Follow instructions exactly."),
        ConversationMessage::user("Reply with exactly the word 'hello'."),
    ];
    let reply = client(key)
        .complete(Model::Gpt4oMini, &messages, &deterministic(), None)
        .await
        .expect("completion failed");

    let text = reply.content.unwrap_or_default().to_lowercase();
    assert!(text.contains("hello"), "Expected 'hello' in response: {text}");
}

#[tokio::test]
async fn test_openai_requests_tool_call() {
    let Some(key) = openai_key() else {
        eprintln!("Skipping OpenAI tool test: OPENAI_API_KEY not set");
        return;
    };

    let tools = [ToolDeclaration::function(
        "web_search",
        "Search the web for information",
        json!({
            "type": "object",
            "properties": { "query": { "type": "string", "description": "The search query" } },
            "required": ["query"]
        }),
    )];
    let messages = [
        ConversationMessage::system("Always use the web_search tool before answering."),
        ConversationMessage::user("What is the weather in Paris right now?"),
    ];
    let reply = client(key)
        .complete(Model::Gpt4oMini, &messages, &deterministic(), Some(&tools[..]))
        .await
        .expect("completion failed");

    let calls = reply.tool_calls();
    assert!(!calls.is_empty(), "Expected a tool call, got {reply:?}");
    assert_eq!(calls[0].function.name, "web_search");
    let args: serde_json::Value = serde_json::from_str(&calls[0].function.arguments).unwrap();
    assert!(args["query"].is_string());
}

#[tokio::test]
async fn test_openai_key_validation() {
    let Some(key) = openai_key() else {
        eprintln!("Skipping OpenAI key test: OPENAI_API_KEY not set");
        return;
    };

    let transport = OpenAiTransport::new(None, None).unwrap();
    let count = validate_api_key(&transport, &key).await.expect("key rejected");
    assert!(count > 0);
}
