//! OpenAI-compatible chat completions provider.
//!
//! Speaks the legacy `functions` / `function_call` dialect of the API, which
//! is what the conversation loop's function dispatch is built around.

pub mod client;
pub mod streaming;
pub mod types;

pub use client::OpenAiCompatClient;
