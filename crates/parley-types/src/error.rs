use std::time::Duration;

use thiserror::Error;

/// Errors from the completion service.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("provider error: {message}")]
    Provider { message: String },

    #[error("stream error: {0}")]
    Stream(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("rate limited")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("provider overloaded: {0}")]
    Overloaded(String),
}

/// Errors from resolving and invoking a model-requested function.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("could not parse arguments for '{name}': {message}")]
    ArgumentParse { name: String, message: String },

    #[error("function not found: {0}")]
    NotFound(String),

    #[error("endpoint not bound: {0}")]
    EndpointNotBound(String),

    #[error("function '{name}' failed: {message}")]
    Invocation { name: String, message: String },

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("request failed: {0}")]
    Request(String),

    #[error("plugin registry unavailable: {0}")]
    RegistryLoad(String),
}

impl DispatchError {
    /// Whether this error only says that a route had nothing under the name.
    ///
    /// The dispatcher keeps an earlier real failure over a later miss.
    pub fn is_miss(&self) -> bool {
        matches!(
            self,
            DispatchError::NotFound(_) | DispatchError::EndpointNotBound(_)
        )
    }
}

/// Errors that abort one user turn.
///
/// Completion failures never appear here: they are retried and, past the
/// failure limit, end the turn as abandoned.
#[derive(Debug, Error)]
pub enum ConversationError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("unexpected finish reason: {0}")]
    UnexpectedFinishReason(String),

    #[error("model finished with function_call but sent no function call")]
    MissingFunctionCall,
}
