//! Function-call argument parsing.
//!
//! Raw arguments go through an ordered chain of strategies; the first one
//! that succeeds wins:
//!
//! 1. empty text is an empty object
//! 2. strict JSON
//! 3. Python literal (see [`super::literal`])
//! 4. for the code execution function only, the raw text is taken as the
//!    code itself and wrapped as `{"code": raw}`

use serde_json::Value;

use parley_types::error::DispatchError;
use parley_types::function::{PYTHON_EXEC, canonical_function_name, is_python_exec};

use super::literal::parse_literal;

/// A function call with parsed arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCall {
    /// Normalized function name.
    pub name: String,
    pub arguments: Value,
    /// Set when the arguments were synthesized; this JSON replaces the raw
    /// text recorded on the assistant turn.
    pub rewritten_arguments: Option<String>,
}

type Strategy = fn(&str, &str) -> Result<ParsedCall, String>;

const STRATEGIES: &[(&str, Strategy)] = &[
    ("empty", empty_arguments),
    ("json", strict_json),
    ("python_literal", python_literal),
    ("synthesized_code", synthesized_code),
];

/// Parse the raw arguments of a call to `name`.
pub fn parse_call(name: &str, raw: &str) -> Result<ParsedCall, DispatchError> {
    let mut failures = Vec::new();
    for (label, strategy) in STRATEGIES {
        match strategy(name, raw) {
            Ok(parsed) => {
                if *label != "json" {
                    tracing::debug!(function = %parsed.name, strategy = label, "parsed arguments with fallback");
                }
                return Ok(parsed);
            }
            Err(message) => failures.push(format!("{label}: {message}")),
        }
    }
    Err(DispatchError::ArgumentParse {
        name: name.to_string(),
        message: failures.join("; "),
    })
}

fn parsed(name: &str, arguments: Value) -> ParsedCall {
    ParsedCall {
        name: canonical_function_name(name).to_string(),
        arguments,
        rewritten_arguments: None,
    }
}

fn empty_arguments(name: &str, raw: &str) -> Result<ParsedCall, String> {
    if raw.trim().is_empty() {
        Ok(parsed(name, Value::Object(Default::default())))
    } else {
        Err("not empty".to_string())
    }
}

fn strict_json(name: &str, raw: &str) -> Result<ParsedCall, String> {
    serde_json::from_str(raw)
        .map(|value| parsed(name, value))
        .map_err(|e| e.to_string())
}

fn python_literal(name: &str, raw: &str) -> Result<ParsedCall, String> {
    parse_literal(raw)
        .map(|value| parsed(name, value))
        .map_err(|e| e.to_string())
}

fn synthesized_code(name: &str, raw: &str) -> Result<ParsedCall, String> {
    if !is_python_exec(name) {
        return Err(format!("'{name}' does not take raw code"));
    }
    let arguments = serde_json::json!({ "code": raw });
    Ok(ParsedCall {
        name: PYTHON_EXEC.to_string(),
        rewritten_arguments: Some(arguments.to_string()),
        arguments,
    })
}
