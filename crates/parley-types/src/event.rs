//! Events published to the UI surface while a turn is processed.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who a rendered message belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum Author {
    Assistant,
    /// A function-call stream, tagged with the function name.
    Function(String),
}

/// One UI update. Token events are keyed by the id of an open message stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiEvent {
    MessageStarted { id: Uuid, author: Author },
    Token { id: Uuid, text: String },
    MessageFinished { id: Uuid },
    /// A function result, shown as a code block in `language`.
    FunctionResult {
        author: String,
        content: String,
        language: String,
    },
    /// A turn ended without an answer (cancelled, abandoned, failed).
    Notice { message: String },
}
