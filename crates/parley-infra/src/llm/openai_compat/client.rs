//! OpenAiCompatClient -- concrete [`CompletionService`] for OpenAI-compatible APIs.
//!
//! The API key is wrapped in [`secrecy::SecretString`] and is only exposed
//! when the `Authorization` header is built.

use std::time::Duration;

use secrecy::SecretString;

use parley_core::llm::provider::{CompletionService, CompletionStream};
use parley_types::config::AppConfig;
use parley_types::error::CompletionError;
use parley_types::stream::CompletionRequest;

use super::streaming::create_chat_stream;
use super::types::ChatRequest;

pub struct OpenAiCompatClient {
    client: reqwest::Client,
    api_key: Option<SecretString>,
    url: String,
}

impl OpenAiCompatClient {
    /// Overall timeout of one streamed completion.
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

    /// Create a client for `api_base` (e.g. `https://api.openai.com/v1`).
    ///
    /// A missing key is allowed for local servers that do not check it.
    pub fn new(api_base: &str, api_key: Option<SecretString>) -> Result<Self, CompletionError> {
        let client = reqwest::Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .build()
            .map_err(|e| CompletionError::Provider {
                message: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            api_key,
            url: format!("{}/chat/completions", api_base.trim_end_matches('/')),
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, CompletionError> {
        if config.api_key.is_none() {
            tracing::warn!("No API key configured; requests are sent without authorization");
        }
        Self::new(&config.api_base, config.api_key.clone())
    }

    /// Full URL of the completions endpoint.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Build the JSON body sent for `request`.
    pub fn request_body(request: &CompletionRequest) -> Result<serde_json::Value, CompletionError> {
        let body = ChatRequest {
            model: &request.model,
            messages: &request.messages,
            functions: &request.functions,
            function_call: (!request.functions.is_empty()).then_some("auto"),
            temperature: request.temperature,
            stream: true,
        };
        serde_json::to_value(&body)
            .map_err(|e| CompletionError::Deserialization(format!("request body: {e}")))
    }
}

impl CompletionService for OpenAiCompatClient {
    fn name(&self) -> &str {
        "openai_compatible"
    }

    fn stream(&self, request: CompletionRequest) -> CompletionStream {
        match Self::request_body(&request) {
            Ok(body) => {
                tracing::debug!(
                    model = %request.model,
                    messages = request.messages.len(),
                    functions = request.functions.len(),
                    "opening chat completion stream"
                );
                create_chat_stream(&self.client, &self.url, body, self.api_key.as_ref())
            }
            Err(err) => Box::pin(futures_util::stream::once(async move { Err(err) })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::Router;
    use axum::http::{HeaderMap, StatusCode, header};
    use axum::routing::post;
    use futures_util::StreamExt;
    use secrecy::ExposeSecret;

    use parley_types::function::FunctionDescriptor;
    use parley_types::stream::FinishReason;
    use parley_types::turn::Turn;

    fn request(functions: Vec<FunctionDescriptor>) -> CompletionRequest {
        CompletionRequest {
            model: "gpt-4".to_string(),
            messages: vec![Turn::system("be brief"), Turn::user("hi")],
            functions,
            temperature: 0.0,
        }
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/v1")
    }

    fn sse(events: &[&str]) -> String {
        events.iter().map(|data| format!("data: {data}\n\n")).collect()
    }

    #[test]
    fn test_url_joins_base() {
        let client = OpenAiCompatClient::new("http://localhost:8080/v1/", None).unwrap();
        assert_eq!(client.url(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn test_from_config_keeps_key() {
        let mut config = AppConfig::default();
        config.api_key = Some(SecretString::from("sk-test".to_string()));
        let client = OpenAiCompatClient::from_config(&config).unwrap();
        assert_eq!(client.api_key.as_ref().unwrap().expose_secret(), "sk-test");
        assert_eq!(client.url(), "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn test_request_body_without_functions() {
        let body = OpenAiCompatClient::request_body(&request(vec![])).unwrap();
        assert_eq!(body["model"], "gpt-4");
        assert_eq!(body["stream"], true);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hi");
        assert!(body.get("functions").is_none());
        assert!(body.get("function_call").is_none());
    }

    #[test]
    fn test_request_body_with_functions() {
        let functions = vec![FunctionDescriptor::new(
            "python_exec",
            "Run python code",
            serde_json::json!({"type": "object", "properties": {"code": {"type": "string"}}}),
        )];
        let body = OpenAiCompatClient::request_body(&request(functions)).unwrap();
        assert_eq!(body["function_call"], "auto");
        assert_eq!(body["functions"][0]["name"], "python_exec");
        assert!(body["functions"][0].get("target").is_none());
    }

    #[tokio::test]
    async fn test_stream_yields_chunks_until_done() {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(|headers: HeaderMap| async move {
                assert_eq!(
                    headers.get(header::AUTHORIZATION).unwrap().to_str().unwrap(),
                    "Bearer sk-test"
                );
                (
                    [(header::CONTENT_TYPE, "text/event-stream")],
                    sse(&[
                        r#"{"choices":[{"index":0,"delta":{"role":"assistant","content":""},"finish_reason":null}]}"#,
                        r#"{"choices":[{"index":0,"delta":{"content":"Hello"},"finish_reason":null}]}"#,
                        r#"{"choices":[{"index":0,"delta":{},"finish_reason":"stop"}]}"#,
                        "[DONE]",
                    ]),
                )
            }),
        );
        let base = serve(app).await;
        let client =
            OpenAiCompatClient::new(&base, Some(SecretString::from("sk-test".to_string()))).unwrap();

        let chunks: Vec<_> = client.stream(request(vec![])).collect().await;
        assert_eq!(chunks.len(), 3);
        let chunks: Vec<_> = chunks.into_iter().map(Result::unwrap).collect();
        assert_eq!(chunks[1].delta.content.as_deref(), Some("Hello"));
        assert_eq!(chunks[2].finish_reason, Some(FinishReason::Stop));
    }

    #[tokio::test]
    async fn test_stream_function_call_deltas() {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(|| async {
                (
                    [(header::CONTENT_TYPE, "text/event-stream")],
                    sse(&[
                        r#"{"choices":[{"index":0,"delta":{"role":"assistant","content":null,"function_call":{"name":"python","arguments":""}},"finish_reason":null}]}"#,
                        r#"{"choices":[{"index":0,"delta":{"function_call":{"arguments":"print(1)"}},"finish_reason":null}]}"#,
                        r#"{"choices":[{"index":0,"delta":{},"finish_reason":"function_call"}]}"#,
                        "[DONE]",
                    ]),
                )
            }),
        );
        let base = serve(app).await;
        let client = OpenAiCompatClient::new(&base, None).unwrap();

        let chunks: Vec<_> = client
            .stream(request(vec![]))
            .map(Result::unwrap)
            .collect()
            .await;
        let call = chunks[0].delta.function_call.as_ref().unwrap();
        assert_eq!(call.name.as_deref(), Some("python"));
        assert_eq!(
            chunks[1].delta.function_call.as_ref().unwrap().arguments.as_deref(),
            Some("print(1)")
        );
        assert_eq!(chunks[2].finish_reason, Some(FinishReason::FunctionCall));
    }

    #[tokio::test]
    async fn test_stream_maps_auth_failure() {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(|| async {
                (
                    StatusCode::UNAUTHORIZED,
                    r#"{"error":{"message":"Incorrect API key provided"}}"#,
                )
            }),
        );
        let base = serve(app).await;
        let client = OpenAiCompatClient::new(&base, None).unwrap();

        let items: Vec<_> = client.stream(request(vec![])).collect().await;
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(CompletionError::AuthenticationFailed)));
    }

    #[tokio::test]
    async fn test_stream_connection_refused_is_error_item() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let client = OpenAiCompatClient::new(&format!("http://{addr}/v1"), None).unwrap();

        let items: Vec<_> = client.stream(request(vec![])).collect().await;
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(CompletionError::Provider { .. })));
    }
}
