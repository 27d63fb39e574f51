//! `current_time`: the local date and time.

use chrono::{Local, Utc};
use serde_json::{Value, json};

use parley_core::dispatch::local::LocalFunction;
use parley_types::function::FunctionDescriptor;

pub const CURRENT_TIME: &str = "current_time";

#[derive(Debug, Default)]
pub struct CurrentTime;

impl LocalFunction for CurrentTime {
    fn describe(&self) -> FunctionDescriptor {
        FunctionDescriptor::new(
            CURRENT_TIME,
            "Get the current date and time.",
            json!({
                "type": "object",
                "properties": {
                    "utc": {
                        "type": "boolean",
                        "description": "Return UTC instead of local time."
                    }
                }
            }),
        )
    }

    async fn invoke(&self, arguments: Value) -> anyhow::Result<Value> {
        let utc = arguments.get("utc").and_then(Value::as_bool).unwrap_or(false);
        let (now, weekday) = if utc {
            let now = Utc::now();
            (now.to_rfc3339(), now.format("%A").to_string())
        } else {
            let now = Local::now();
            (now.to_rfc3339(), now.format("%A").to_string())
        };
        Ok(json!({"now": now, "weekday": weekday}))
    }
}
