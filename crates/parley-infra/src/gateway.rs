//! HttpGateway -- reqwest-backed [`RemoteGateway`].
//!
//! Bound endpoints are called as `{url}/{operation}`; third-party plugin
//! APIs as `{plugin.url}/{api.path or api.name}` with the plugin's headers.
//! `GET` and `DELETE` send the arguments as query parameters, every other
//! method as a JSON body. Response bodies are returned as text, unparsed.

use std::path::PathBuf;
use std::time::Duration;

use reqwest::Method;
use serde_json::Value;

use parley_core::dispatch::remote::RemoteGateway;
use parley_types::config::AppConfig;
use parley_types::error::DispatchError;
use parley_types::function::{BoundEndpoint, PluginRegistry, RegistryApi, RegistryPlugin};

pub struct HttpGateway {
    client: reqwest::Client,
    timeout: Duration,
    registry_path: PathBuf,
}

impl HttpGateway {
    pub fn new(timeout: Duration, registry_path: impl Into<PathBuf>) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
            registry_path: registry_path.into(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            Duration::from_secs(config.http_timeout_secs),
            &config.plugin_registry_path,
        )
    }

    async fn send(
        &self,
        method: &str,
        url: &str,
        headers: impl IntoIterator<Item = (&String, &String)>,
        arguments: &Value,
    ) -> Result<String, DispatchError> {
        let method = Method::from_bytes(method.to_uppercase().as_bytes())
            .map_err(|e| DispatchError::Request(format!("invalid HTTP method '{method}': {e}")))?;

        let mut request = self.client.request(method.clone(), url).timeout(self.timeout);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
        request = if method == Method::GET || method == Method::DELETE {
            request.query(&query_pairs(arguments))
        } else {
            request.json(arguments)
        };

        tracing::debug!(%method, url, "sending remote function request");
        let response = request.send().await.map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        if !status.is_success() {
            tracing::warn!(status = %status, url, "remote function returned an error status");
            return Err(DispatchError::Http {
                status: status.as_u16(),
                body,
            });
        }

        Ok(body)
    }

    fn transport_error(&self, err: reqwest::Error) -> DispatchError {
        if err.is_timeout() {
            DispatchError::Timeout(self.timeout)
        } else {
            DispatchError::Request(err.to_string())
        }
    }
}

/// Flatten an arguments object into query pairs.
///
/// Strings are sent as-is, other values as their JSON text. A non-object
/// value yields no pairs.
fn query_pairs(arguments: &Value) -> Vec<(String, String)> {
    match arguments {
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| {
                let value = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.clone(), value)
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn join_url(base: &str, segment: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        segment.trim_start_matches('/')
    )
}

impl RemoteGateway for HttpGateway {
    async fn load_plugin_registry(&self) -> Result<PluginRegistry, DispatchError> {
        let content = match tokio::fs::read_to_string(&self.registry_path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(
                    "No plugin registry at {}, using an empty registry",
                    self.registry_path.display()
                );
                return Ok(PluginRegistry::default());
            }
            Err(err) => {
                return Err(DispatchError::RegistryLoad(format!(
                    "{}: {err}",
                    self.registry_path.display()
                )));
            }
        };

        let registry: PluginRegistry = serde_json::from_str(&content).map_err(|e| {
            DispatchError::RegistryLoad(format!("{}: {e}", self.registry_path.display()))
        })?;
        tracing::info!(plugins = registry.plugins.len(), "loaded plugin registry");
        Ok(registry)
    }

    async fn call_bound_endpoint(
        &self,
        endpoint: &BoundEndpoint,
        method: &str,
        operation: &str,
        arguments: &Value,
    ) -> Result<String, DispatchError> {
        let url = join_url(&endpoint.url, operation);
        self.send(method, &url, std::iter::empty(), arguments).await
    }

    async fn call_plugin_api(
        &self,
        plugin: &RegistryPlugin,
        api: &RegistryApi,
        arguments: &Value,
    ) -> Result<String, DispatchError> {
        let url = join_url(&plugin.url, api.path.as_deref().unwrap_or(&api.name));
        self.send(&api.method, &url, &plugin.headers, arguments).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BTreeMap;

    use axum::Json;
    use axum::Router;
    use axum::extract::Query;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use serde_json::json;
    use tempfile::TempDir;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn gateway() -> HttpGateway {
        HttpGateway::new(Duration::from_secs(5), "/nonexistent/plugin_registry.json")
    }

    fn parsed(body: &str) -> Value {
        serde_json::from_str(body).unwrap()
    }

    fn endpoint(url: String) -> BoundEndpoint {
        BoundEndpoint {
            url,
            url_md5: "abc123".to_string(),
            api_info: vec![],
        }
    }

    #[test]
    fn test_query_pairs() {
        let pairs = query_pairs(&json!({"q": "rust", "limit": 5}));
        assert!(pairs.contains(&("q".to_string(), "rust".to_string())));
        assert!(pairs.contains(&("limit".to_string(), "5".to_string())));
        assert!(query_pairs(&json!([1, 2])).is_empty());
    }

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("http://h/api/", "search"), "http://h/api/search");
        assert_eq!(join_url("http://h/api", "/v1/search"), "http://h/api/v1/search");
    }

    #[tokio::test]
    async fn test_get_sends_query_parameters() {
        let app = Router::new().route(
            "/search",
            get(|Query(params): Query<BTreeMap<String, String>>| async move {
                Json(json!({"echo": params}))
            }),
        );
        let base = serve(app).await;

        let result = gateway()
            .call_bound_endpoint(&endpoint(base), "GET", "search", &json!({"q": "rust"}))
            .await
            .unwrap();
        assert_eq!(parsed(&result), json!({"echo": {"q": "rust"}}));
    }

    #[tokio::test]
    async fn test_post_sends_json_body() {
        let app = Router::new().route(
            "/api/create",
            post(|Json(body): Json<Value>| async move { Json(json!({"received": body})) }),
        );
        let base = serve(app).await;

        let result = gateway()
            .call_bound_endpoint(
                &endpoint(format!("{base}/api/")),
                "post",
                "create",
                &json!({"title": "x"}),
            )
            .await
            .unwrap();
        assert_eq!(parsed(&result), json!({"received": {"title": "x"}}));
    }

    #[tokio::test]
    async fn test_plain_text_response_is_returned_as_is() {
        let app = Router::new().route("/ping", get(|| async { "pong" }));
        let base = serve(app).await;

        let result = gateway()
            .call_bound_endpoint(&endpoint(base), "GET", "ping", &json!({}))
            .await
            .unwrap();
        assert_eq!(result, "pong");
    }

    #[tokio::test]
    async fn test_json_response_keeps_key_order_and_big_numbers() {
        const BODY: &str = r#"{"zeta": 1, "alpha": 12345678901234567890123}"#;
        let app = Router::new().route(
            "/raw",
            get(|| async { ([("content-type", "application/json")], BODY) }),
        );
        let base = serve(app).await;

        let result = gateway()
            .call_bound_endpoint(&endpoint(base), "GET", "raw", &json!({}))
            .await
            .unwrap();
        assert_eq!(result, BODY);
    }

    #[tokio::test]
    async fn test_error_status_is_http_error() {
        let app = Router::new().route(
            "/broken",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let base = serve(app).await;

        let err = gateway()
            .call_bound_endpoint(&endpoint(base), "POST", "broken", &json!({}))
            .await
            .unwrap_err();
        match err {
            DispatchError::Http { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_slow_endpoint_times_out() {
        let app = Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        );
        let base = serve(app).await;
        let gateway = HttpGateway::new(Duration::from_millis(100), "/nonexistent.json");

        let err = gateway
            .call_bound_endpoint(&endpoint(base), "GET", "slow", &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Timeout(d) if d == Duration::from_millis(100)));
    }

    #[tokio::test]
    async fn test_plugin_api_uses_path_and_headers() {
        let app = Router::new().route(
            "/v2/weather",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                let token = headers
                    .get("x-api-token")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                Json(json!({"token": token, "city": body["city"]}))
            }),
        );
        let base = serve(app).await;
        let plugin = RegistryPlugin {
            url: base,
            headers: BTreeMap::from([("x-api-token".to_string(), "t0k".to_string())]),
            apis: vec![],
        };
        let api = RegistryApi {
            name: "weather".to_string(),
            method: "POST".to_string(),
            path: Some("/v2/weather".to_string()),
            description: String::new(),
            parameters: json!({}),
        };

        let result = gateway()
            .call_plugin_api(&plugin, &api, &json!({"city": "Paris"}))
            .await
            .unwrap();
        assert_eq!(parsed(&result), json!({"token": "t0k", "city": "Paris"}));
    }

    #[tokio::test]
    async fn test_missing_registry_is_empty() {
        let registry = gateway().load_plugin_registry().await.unwrap();
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_registry_file_is_parsed() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("plugin_registry.json");
        tokio::fs::write(
            &path,
            r#"{"weather": {"url": "http://localhost:9000", "apis": [{"name": "forecast", "method": "GET"}]}}"#,
        )
        .await
        .unwrap();

        let registry = HttpGateway::new(Duration::from_secs(1), &path)
            .load_plugin_registry()
            .await
            .unwrap();
        let (plugin_id, _, api) = registry.find_api("forecast").unwrap();
        assert_eq!(plugin_id, "weather");
        assert_eq!(api.method, "GET");
    }

    #[tokio::test]
    async fn test_malformed_registry_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("plugin_registry.json");
        tokio::fs::write(&path, "[not a registry").await.unwrap();

        let err = HttpGateway::new(Duration::from_secs(1), &path)
            .load_plugin_registry()
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::RegistryLoad(_)));
    }
}
