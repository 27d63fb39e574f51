//! FunctionDispatcher: resolve a requested function call and run it.
//!
//! Resolution is an ordered chain. A function in the local registry runs
//! first. If it is absent or fails, the name is decomposed on `_`: three or
//! more parts address an operation on a bound remote endpoint
//! (`{operation}_{method}_{fingerprint}`), anything shorter is looked up in
//! the third-party plugin registry. When every route fails, the error of the
//! most meaningful failure is returned: a real invocation error is never
//! masked by a later "nothing here".

use std::fmt;

use serde_json::Value;
use tracing::Instrument;

use parley_types::error::DispatchError;
use parley_types::function::{FunctionDescriptor, PYTHON_EXEC, RemoteName, decompose_remote_name};
use parley_types::turn::Turn;

use crate::agent::context::SessionContext;

use super::arguments::parse_call;
use super::local::LocalRegistry;
use super::remote::RemoteGateway;

/// Which route served a function call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Local,
    RemoteEndpoint,
    ThirdParty,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Local => write!(f, "local"),
            Route::RemoteEndpoint => write!(f, "remote_endpoint"),
            Route::ThirdParty => write!(f, "third_party"),
        }
    }
}

/// A completed function call.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOutcome {
    /// Normalized function name.
    pub name: String,
    /// The result as text.
    pub content: String,
    pub route: Route,
    /// Replacement arguments to record on the assistant turn, if the raw
    /// arguments were rewritten during parsing.
    pub rewritten_arguments: Option<String>,
}

impl DispatchOutcome {
    /// Turns to append after the assistant turn that requested the call.
    ///
    /// Usually one function turn. A failed code execution whose payload
    /// carries `status`, `error_info` and `error` is split instead: the
    /// `description` becomes a follow-up user turn asking for an answer in
    /// `language`, and the rest of the payload stays in the function turn.
    pub fn into_turns(self, language: &str) -> Vec<Turn> {
        if self.name == PYTHON_EXEC && is_execution_error(&self.content) {
            match split_description(&self.content) {
                Some((payload, description)) => {
                    return vec![
                        Turn::function(self.name, payload),
                        Turn::user(format!("{description}\n\nPlease answer me in {language}")),
                    ];
                }
                None => {
                    tracing::warn!("python_exec error payload is not an object with a description");
                }
            }
        }
        vec![Turn::function(self.name, self.content)]
    }
}

fn is_execution_error(content: &str) -> bool {
    content.contains("status") && content.contains("error_info") && content.contains("error")
}

fn split_description(content: &str) -> Option<(String, String)> {
    let Ok(Value::Object(mut payload)) = serde_json::from_str::<Value>(content) else {
        return None;
    };
    let description = match payload.remove("description")? {
        Value::String(text) => text,
        other => other.to_string(),
    };
    Some((Value::Object(payload).to_string(), description))
}

/// Render a local function result as text; strings pass through unchanged.
pub fn result_text(value: Value) -> String {
    match value {
        Value::String(text) => text,
        other => other.to_string(),
    }
}

/// Routes model-requested calls to local functions, bound endpoints and
/// third-party plugin APIs.
pub struct FunctionDispatcher<G> {
    local: LocalRegistry,
    gateway: G,
}

impl<G: RemoteGateway> FunctionDispatcher<G> {
    pub fn new(local: LocalRegistry, gateway: G) -> Self {
        Self { local, gateway }
    }

    /// Descriptors to advertise: local functions then the session's bindings.
    pub fn descriptors(&self, ctx: &SessionContext) -> Vec<FunctionDescriptor> {
        let mut descriptors = self.local.descriptors();
        descriptors.extend(ctx.bound_descriptors());
        descriptors
    }

    pub fn local(&self) -> &LocalRegistry {
        &self.local
    }

    /// Parse `raw_arguments`, resolve `name` and invoke it.
    pub async fn invoke(
        &self,
        ctx: &SessionContext,
        name: &str,
        raw_arguments: &str,
    ) -> Result<DispatchOutcome, DispatchError> {
        let span = tracing::info_span!(
            "function.dispatch",
            function = %name,
            route = tracing::field::Empty,
        );
        self.invoke_inner(ctx, name, raw_arguments)
            .instrument(span)
            .await
    }

    async fn invoke_inner(
        &self,
        ctx: &SessionContext,
        name: &str,
        raw_arguments: &str,
    ) -> Result<DispatchOutcome, DispatchError> {
        let call = parse_call(name, raw_arguments)?;
        let mut earlier: Option<DispatchError> = None;

        if let Some(function) = self.local.get(&call.name) {
            match function.invoke(call.arguments.clone()).await {
                Ok(value) => {
                    return Ok(self.finish(
                        call.name,
                        call.rewritten_arguments,
                        Route::Local,
                        result_text(value),
                    ));
                }
                Err(err) => {
                    let message = format!("{err:#}");
                    tracing::warn!(function = %call.name, error = %message, "local function failed, trying remote routes");
                    earlier = Some(DispatchError::Invocation {
                        name: call.name.clone(),
                        message,
                    });
                }
            }
        }

        let routed = match decompose_remote_name(&call.name) {
            Some(remote) => self
                .call_remote(ctx, &remote, &call.arguments)
                .await
                .map(|body| (Route::RemoteEndpoint, body)),
            None => self
                .call_third_party(ctx, &call.name, &call.arguments)
                .await
                .map(|body| (Route::ThirdParty, body)),
        };

        match routed {
            Ok((route, body)) => Ok(self.finish(call.name, call.rewritten_arguments, route, body)),
            Err(err) => {
                let err = match earlier {
                    Some(earlier) if err.is_miss() => earlier,
                    _ => err,
                };
                tracing::warn!(function = %call.name, error = %err, "function dispatch failed");
                Err(err)
            }
        }
    }

    async fn call_remote(
        &self,
        ctx: &SessionContext,
        remote: &RemoteName,
        arguments: &Value,
    ) -> Result<String, DispatchError> {
        let endpoint = ctx
            .binding(&remote.fingerprint)
            .ok_or_else(|| DispatchError::EndpointNotBound(remote.fingerprint.clone()))?;
        self.gateway
            .call_bound_endpoint(&endpoint, &remote.method, &remote.operation, arguments)
            .await
    }

    async fn call_third_party(
        &self,
        ctx: &SessionContext,
        operation: &str,
        arguments: &Value,
    ) -> Result<String, DispatchError> {
        let registry = ctx
            .plugin_registry(|| self.gateway.load_plugin_registry())
            .await?;
        let (plugin_id, plugin, api) = registry
            .find_api(operation)
            .ok_or_else(|| DispatchError::NotFound(operation.to_string()))?;
        tracing::debug!(plugin = plugin_id, operation, "calling third-party plugin api");
        self.gateway.call_plugin_api(plugin, api, arguments).await
    }

    fn finish(
        &self,
        name: String,
        rewritten_arguments: Option<String>,
        route: Route,
        content: String,
    ) -> DispatchOutcome {
        tracing::Span::current().record("route", tracing::field::display(route));
        tracing::info!(function = %name, %route, "function call succeeded");
        DispatchOutcome {
            name,
            content,
            route,
            rewritten_arguments,
        }
    }
}
