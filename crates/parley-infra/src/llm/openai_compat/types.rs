//! Wire types of the OpenAI chat completions API (legacy function calling).

use serde::{Deserialize, Serialize};

use parley_types::function::FunctionDescriptor;
use parley_types::stream::{DeltaFragment, FinishReason};
use parley_types::turn::Turn;

/// Request body of `POST /chat/completions`.
#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [Turn],
    #[serde(skip_serializing_if = "no_functions")]
    pub functions: &'a [FunctionDescriptor],
    /// `"auto"` whenever functions are sent; the API rejects it otherwise.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_call: Option<&'static str>,
    pub temperature: f32,
    pub stream: bool,
}

fn no_functions(functions: &&[FunctionDescriptor]) -> bool {
    functions.is_empty()
}

/// One `data:` payload of the SSE stream.
#[derive(Debug, Deserialize)]
pub struct ChatChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: DeltaFragment,
    #[serde(default)]
    pub finish_reason: Option<FinishReason>,
}

/// Error body returned with non-2xx statuses.
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorDetail {
    pub message: String,
    #[serde(default)]
    pub code: Option<String>,
}
