//! OpenAI Chat Completions API transport.
//!
//! Non-streaming `POST /v1/chat/completions` plus `GET /v1/models` for key
//! validation. Works against any OpenAI-compatible base URL.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, trace};

use agent_forge_core::error::UpstreamKind;

use crate::{ChatCompletionRequest, ChatCompletionResponse, ChatTransport, Credentials, TransportError};

const OPENAI_BASE_URL: &str = "https://api.openai.com";

pub struct OpenAiTransport {
    pub base_url: String,
    client: reqwest::Client,
}

impl OpenAiTransport {
    pub fn new(base_url: Option<&str>, timeout: Option<Duration>) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            base_url: base_url
                .unwrap_or(OPENAI_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            client: builder.build()?,
        })
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        let hint = if e.is_timeout() {
            Some(UpstreamKind::Timeout)
        } else if e.is_connect() || e.is_request() {
            Some(UpstreamKind::Network)
        } else {
            None
        };
        TransportError {
            status: e.status().map(|s| s.as_u16()),
            hint,
            message: e.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

async fn error_for_status(response: reqwest::Response, what: &str) -> TransportError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    TransportError::with_status(status.as_u16(), format!("{what} {status}: {body}"))
}

#[async_trait]
impl ChatTransport for OpenAiTransport {
    fn id(&self) -> &str {
        "openai"
    }

    async fn create_chat_completion(
        &self,
        request: &ChatCompletionRequest,
        credentials: &Credentials,
    ) -> Result<ChatCompletionResponse, TransportError> {
        debug!(
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.as_ref().map_or(0, |t| t.len()),
            base_url = %self.base_url,
            "Calling OpenAI chat completions"
        );

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("content-type", "application/json")
            .header("authorization", format!("Bearer {}", credentials.secret()))
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_for_status(response, "OpenAI API error").await);
        }

        let body = response.text().await?;
        trace!(body = %body, "OpenAI response body");
        serde_json::from_str(&body)
            .map_err(|e| TransportError::new(format!("Invalid completion response: {e}")))
    }

    async fn list_models(&self, credentials: &Credentials) -> Result<Vec<String>, TransportError> {
        let response = self
            .client
            .get(format!("{}/v1/models", self.base_url))
            .header("authorization", format!("Bearer {}", credentials.secret()))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_for_status(response, "Failed to list models").await);
        }

        let body: ModelsResponse = response.json().await?;
        Ok(body.data.into_iter().map(|m| m.id).collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{Value, json};

    use agent_forge_core::types::ConversationMessage;

    use super::*;

    type Seen = Arc<Mutex<Vec<(Option<String>, Value)>>>;

    /// Serve `app` on an ephemeral port and return its base URL.
    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{addr}")
    }

    fn request() -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: "gpt-4o".into(),
            messages: vec![
                ConversationMessage::system("You are helpful."),
                ConversationMessage::user("Hi"),
            ],
            temperature: 0.7,
            top_p: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            tools: None,
            tool_choice: None,
        }
    }

    #[test]
    fn test_custom_base_url() {
        let transport = OpenAiTransport::new(Some("https://my-proxy.example.com/"), None).unwrap();
        assert_eq!(transport.base_url, "https://my-proxy.example.com");
        assert_eq!(transport.id(), "openai");
    }

    #[test]
    fn test_default_base_url() {
        let transport = OpenAiTransport::new(None, Some(Duration::from_secs(5))).unwrap();
        assert_eq!(transport.base_url, OPENAI_BASE_URL);
    }

    #[tokio::test]
    async fn test_completion_roundtrip() {
        let seen: Seen = Arc::default();
        let app = Router::new()
            .route(
                "/v1/chat/completions",
                post(|State(seen): State<Seen>, headers: HeaderMap, Json(body): Json<Value>| async move {
                    let auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    seen.lock().unwrap().push((auth, body));
                    Json(json!({
                        "id": "chatcmpl-1",
                        "choices": [{
                            "index": 0,
                            "message": { "role": "assistant", "content": "Hello!" },
                            "finish_reason": "stop"
                        }]
                    }))
                }),
            )
            .with_state(seen.clone());
        let base = serve(app).await;

        let transport = OpenAiTransport::new(Some(&base), None).unwrap();
        let resp = transport
            .create_chat_completion(&request(), &Credentials::api_key("sk-test"))
            .await
            .unwrap();
        assert_eq!(resp.choices[0].message.content.as_deref(), Some("Hello!"));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let (auth, body) = &seen[0];
        assert_eq!(auth.as_deref(), Some("Bearer sk-test"));
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["top_p"], 1.0);
        assert!(body.get("tools").is_none());
    }

    #[tokio::test]
    async fn test_status_codes_are_classified() {
        let app = Router::new()
            .route(
                "/v1/chat/completions",
                post(|| async { (StatusCode::TOO_MANY_REQUESTS, "slow down") }),
            )
            .route(
                "/v1/models",
                get(|| async { (StatusCode::UNAUTHORIZED, "bad key") }),
            );
        let base = serve(app).await;
        let transport = OpenAiTransport::new(Some(&base), None).unwrap();
        let creds = Credentials::api_key("sk-test");

        let err = transport.create_chat_completion(&request(), &creds).await.unwrap_err();
        assert_eq!(err.status, Some(429));
        assert_eq!(err.classify(), UpstreamKind::RateLimited);
        assert!(err.message.contains("slow down"));

        let err = transport.list_models(&creds).await.unwrap_err();
        assert_eq!(err.classify(), UpstreamKind::Unauthorized);
    }

    #[tokio::test]
    async fn test_server_error_classified() {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let base = serve(app).await;
        let transport = OpenAiTransport::new(Some(&base), None).unwrap();
        let err = transport
            .create_chat_completion(&request(), &Credentials::api_key("sk-test"))
            .await
            .unwrap_err();
        assert_eq!(err.classify(), UpstreamKind::ServerError);
    }

    #[tokio::test]
    async fn test_connection_refused_is_network() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let transport = OpenAiTransport::new(Some(&format!("http://127.0.0.1:{port}")), None).unwrap();
        let err = transport
            .create_chat_completion(&request(), &Credentials::api_key("sk-test"))
            .await
            .unwrap_err();
        assert_eq!(err.classify(), UpstreamKind::Network);
    }

    #[tokio::test]
    async fn test_list_models() {
        let app = Router::new().route(
            "/v1/models",
            get(|| async {
                Json(json!({ "object": "list", "data": [{ "id": "gpt-4o" }, { "id": "o3-mini" }] }))
            }),
        );
        let base = serve(app).await;
        let transport = OpenAiTransport::new(Some(&base), None).unwrap();
        let models = transport.list_models(&Credentials::api_key("sk-test")).await.unwrap();
        assert_eq!(models, vec!["gpt-4o".to_string(), "o3-mini".to_string()]);
    }

    #[tokio::test]
    async fn test_invalid_body_is_unknown() {
        let app = Router::new().route("/v1/chat/completions", post(|| async { "not json" }));
        let base = serve(app).await;
        let transport = OpenAiTransport::new(Some(&base), None).unwrap();
        let err = transport
            .create_chat_completion(&request(), &Credentials::api_key("sk-test"))
            .await
            .unwrap_err();
        assert_eq!(err.classify(), UpstreamKind::Unknown);
    }
}
