//! Streaming completion types.
//!
//! A streamed completion arrives as a sequence of [`CompletionChunk`]s. Each
//! chunk carries one [`DeltaFragment`] and, on the last chunk of a turn, a
//! [`FinishReason`]. The request side is [`CompletionRequest`].

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::function::FunctionDescriptor;
use crate::turn::{Role, Turn};

/// A streamed chat completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Turn>,
    pub functions: Vec<FunctionDescriptor>,
    pub temperature: f32,
}

/// Partial function-call update inside a delta.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCallDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

/// A partial update of the assistant message being generated.
///
/// Any combination of fields may be present, including none of them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaFragment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCallDelta>,
}

impl DeltaFragment {
    pub fn role(role: Role) -> Self {
        Self {
            role: Some(role),
            ..Default::default()
        }
    }

    pub fn content(text: impl Into<String>) -> Self {
        Self {
            content: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn function_name(name: impl Into<String>) -> Self {
        Self {
            function_call: Some(FunctionCallDelta {
                name: Some(name.into()),
                arguments: None,
            }),
            ..Default::default()
        }
    }

    pub fn function_arguments(arguments: impl Into<String>) -> Self {
        Self {
            function_call: Some(FunctionCallDelta {
                name: None,
                arguments: Some(arguments.into()),
            }),
            ..Default::default()
        }
    }
}

/// Why the model stopped generating the current turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FinishReason {
    Stop,
    FunctionCall,
    /// Any reason the loop does not know how to continue from.
    Other(String),
}

impl From<String> for FinishReason {
    fn from(value: String) -> Self {
        match value.as_str() {
            "stop" => FinishReason::Stop,
            "function_call" => FinishReason::FunctionCall,
            _ => FinishReason::Other(value),
        }
    }
}

impl From<FinishReason> for String {
    fn from(value: FinishReason) -> Self {
        value.to_string()
    }
}

impl fmt::Display for FinishReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinishReason::Stop => write!(f, "stop"),
            FinishReason::FunctionCall => write!(f, "function_call"),
            FinishReason::Other(reason) => write!(f, "{reason}"),
        }
    }
}

/// One element of a streamed completion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionChunk {
    #[serde(default)]
    pub delta: DeltaFragment,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

impl CompletionChunk {
    pub fn delta(delta: DeltaFragment) -> Self {
        Self {
            delta,
            finish_reason: None,
        }
    }

    /// An empty delta that only signals the end of the turn.
    pub fn finish(reason: FinishReason) -> Self {
        Self {
            delta: DeltaFragment::default(),
            finish_reason: Some(reason),
        }
    }
}
