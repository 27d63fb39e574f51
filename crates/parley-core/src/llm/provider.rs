//! CompletionService trait definition.
//!
//! The conversation loop only needs one operation from a model backend: open
//! a streamed completion. The stream is boxed so the service can sit behind a
//! trait object as well as a generic parameter.

use std::pin::Pin;

use futures_util::Stream;

use parley_types::error::CompletionError;
use parley_types::stream::{CompletionChunk, CompletionRequest};

/// Boxed stream of completion chunks.
pub type CompletionStream =
    Pin<Box<dyn Stream<Item = Result<CompletionChunk, CompletionError>> + Send + 'static>>;

/// A chat completion backend that supports the legacy function-calling API.
///
/// Implementations live in parley-infra (e.g. `OpenAiCompatClient`).
pub trait CompletionService: Send + Sync {
    /// Human-readable backend name, recorded on tracing spans.
    fn name(&self) -> &str;

    /// Open a streamed completion.
    ///
    /// Connection failures surface as the first item of the stream, so the
    /// caller handles them at the same place as mid-stream errors.
    fn stream(&self, request: CompletionRequest) -> CompletionStream;
}

impl<T: CompletionService + ?Sized> CompletionService for std::sync::Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn stream(&self, request: CompletionRequest) -> CompletionStream {
        (**self).stream(request)
    }
}
