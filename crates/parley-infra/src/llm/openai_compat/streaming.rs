//! SSE stream creation for the OpenAI chat completions API.
//!
//! The response body is a `text/event-stream`. Every `data:` line carries a
//! JSON chunk whose first choice holds one delta and, on the last chunk of
//! the turn, the finish reason. The stream ends with `data: [DONE]`.

use std::pin::Pin;

use eventsource_stream::Eventsource;
use futures_util::{Stream, StreamExt};
use secrecy::{ExposeSecret, SecretString};

use parley_types::error::CompletionError;
use parley_types::stream::CompletionChunk;

use super::types::{ApiErrorBody, ChatChunk};

/// Sentinel data of the last SSE event.
const DONE: &str = "[DONE]";

/// Parse one SSE `data` payload.
///
/// Returns `Ok(None)` for chunks without choices (usage-only chunks, for
/// example).
pub fn parse_chunk(data: &str) -> Result<Option<CompletionChunk>, CompletionError> {
    let chunk: ChatChunk = serde_json::from_str(data)
        .map_err(|e| CompletionError::Deserialization(format!("stream chunk: {e}")))?;
    Ok(chunk.choices.into_iter().next().map(|choice| CompletionChunk {
        delta: choice.delta,
        finish_reason: choice.finish_reason,
    }))
}

/// Map a non-2xx response to an error.
pub fn status_error(status: reqwest::StatusCode, retry_after: Option<u64>, body: &str) -> CompletionError {
    let message = serde_json::from_str::<ApiErrorBody>(body)
        .map(|parsed| match parsed.error.code {
            Some(code) => format!("{} ({code})", parsed.error.message),
            None => parsed.error.message,
        })
        .unwrap_or_else(|_| body.to_string());

    match status.as_u16() {
        401 | 403 => CompletionError::AuthenticationFailed,
        429 => CompletionError::RateLimited {
            retry_after_ms: retry_after.map(|secs| secs * 1000),
        },
        503 | 529 => CompletionError::Overloaded(message),
        _ => CompletionError::Provider {
            message: format!("HTTP {status}: {message}"),
        },
    }
}

/// Open a streaming request against `url` and yield completion chunks.
pub fn create_chat_stream(
    client: &reqwest::Client,
    url: &str,
    body: serde_json::Value,
    api_key: Option<&SecretString>,
) -> Pin<Box<dyn Stream<Item = Result<CompletionChunk, CompletionError>> + Send + 'static>> {
    let client = client.clone();
    let url = url.to_string();
    let bearer = api_key.map(|key| format!("Bearer {}", key.expose_secret()));

    Box::pin(async_stream::try_stream! {
        let mut request = client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .json(&body);
        if let Some(bearer) = &bearer {
            request = request.header("Authorization", bearer);
        }

        let response = request.send().await.map_err(|e| CompletionError::Provider {
            message: format!("HTTP request failed: {e}"),
        })?;

        let status = response.status();
        let response = if !status.is_success() {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.parse::<u64>().ok());
            let error_body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, body = %error_body, "chat completions API error response");
            Err(status_error(status, retry_after, &error_body))?;
            unreachable!()
        } else {
            response
        };

        let mut events = response.bytes_stream().eventsource();
        while let Some(event) = events.next().await {
            let event = event.map_err(|e| CompletionError::Stream(format!("event stream: {e}")))?;
            let data = event.data.trim();
            if data.is_empty() {
                continue;
            }
            if data == DONE {
                break;
            }
            if let Some(chunk) = parse_chunk(data)? {
                yield chunk;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_types::stream::FinishReason;

    #[test]
    fn test_parse_content_chunk() {
        let data = r#"{"id":"c1","object":"chat.completion.chunk","choices":[{"index":0,"delta":{"content":"Hel"},"finish_reason":null}]}"#;
        let chunk = parse_chunk(data).unwrap().unwrap();
        assert_eq!(chunk.delta.content.as_deref(), Some("Hel"));
        assert!(chunk.finish_reason.is_none());
    }

    #[test]
    fn test_parse_finish_chunk() {
        let data = r#"{"choices":[{"index":0,"delta":{},"finish_reason":"function_call"}]}"#;
        let chunk = parse_chunk(data).unwrap().unwrap();
        assert_eq!(chunk.finish_reason, Some(FinishReason::FunctionCall));
    }

    #[test]
    fn test_parse_chunk_without_choices() {
        let data = r#"{"choices":[],"usage":{"prompt_tokens":10,"completion_tokens":2}}"#;
        assert!(parse_chunk(data).unwrap().is_none());
    }

    #[test]
    fn test_parse_invalid_chunk() {
        assert!(matches!(
            parse_chunk("not json"),
            Err(CompletionError::Deserialization(_))
        ));
    }

    #[test]
    fn test_status_error_mapping() {
        assert!(matches!(
            status_error(reqwest::StatusCode::UNAUTHORIZED, None, ""),
            CompletionError::AuthenticationFailed
        ));
        assert!(matches!(
            status_error(reqwest::StatusCode::TOO_MANY_REQUESTS, Some(2), ""),
            CompletionError::RateLimited { retry_after_ms: Some(2000) }
        ));
        let body = r#"{"error":{"message":"This model's maximum context length is 8192 tokens","code":"context_length_exceeded"}}"#;
        match status_error(reqwest::StatusCode::BAD_REQUEST, None, body) {
            CompletionError::Provider { message } => {
                assert!(message.contains("maximum context length"));
                assert!(message.contains("context_length_exceeded"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
