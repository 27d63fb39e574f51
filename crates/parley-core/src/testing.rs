//! Test doubles shared by the unit tests of this crate.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use serde_json::{Value, json};

use parley_types::error::{CompletionError, DispatchError};
use parley_types::function::{
    BoundEndpoint, FunctionDescriptor, PluginRegistry, RegistryApi, RegistryPlugin,
};
use parley_types::stream::{CompletionChunk, CompletionRequest, DeltaFragment, FinishReason};
use parley_types::turn::Role;

use crate::dispatch::local::LocalFunction;
use crate::dispatch::remote::RemoteGateway;
use crate::llm::provider::{CompletionService, CompletionStream};

/// Returns its arguments unchanged.
pub struct EchoFunction {
    name: String,
}

impl EchoFunction {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string() }
    }
}

impl LocalFunction for EchoFunction {
    fn describe(&self) -> FunctionDescriptor {
        FunctionDescriptor::new(&self.name, "Echo the arguments", json!({"type": "object"}))
    }

    async fn invoke(&self, arguments: Value) -> anyhow::Result<Value> {
        Ok(arguments)
    }
}

/// Always fails.
pub struct FailingFunction {
    name: String,
}

impl FailingFunction {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string() }
    }
}

impl LocalFunction for FailingFunction {
    fn describe(&self) -> FunctionDescriptor {
        FunctionDescriptor::new(&self.name, "Always fails", json!({"type": "object"}))
    }

    async fn invoke(&self, _arguments: Value) -> anyhow::Result<Value> {
        anyhow::bail!("{} always fails", self.name)
    }
}

/// Answers every call with the same value.
pub struct CannedFunction {
    name: String,
    reply: Value,
}

impl CannedFunction {
    pub fn new(name: &str, reply: Value) -> Self {
        Self {
            name: name.to_string(),
            reply,
        }
    }
}

impl LocalFunction for CannedFunction {
    fn describe(&self) -> FunctionDescriptor {
        FunctionDescriptor::new(&self.name, "Canned reply", json!({"type": "object"}))
    }

    async fn invoke(&self, _arguments: Value) -> anyhow::Result<Value> {
        Ok(self.reply.clone())
    }
}

pub fn endpoint(fingerprint: &str) -> BoundEndpoint {
    BoundEndpoint {
        url: format!("http://localhost:9000/{fingerprint}"),
        url_md5: fingerprint.to_string(),
        api_info: vec![FunctionDescriptor::new(
            format!("search_get_{fingerprint}"),
            "Search",
            json!({"type": "object"}),
        )],
    }
}

#[derive(Default)]
struct GatewayLog {
    endpoint_calls: Vec<(String, String, Value)>,
    plugin_calls: Vec<String>,
    registry_loads: usize,
}

/// Gateway that records calls and answers `{"ok": true}` unless told
/// otherwise.
#[derive(Clone, Default)]
pub struct RecordingGateway {
    log: Arc<Mutex<GatewayLog>>,
    registry: Option<Value>,
    reply: Option<String>,
}

impl RecordingGateway {
    pub fn with_registry(registry: Value) -> Self {
        Self {
            registry: Some(registry),
            ..Default::default()
        }
    }

    /// Answer every remote call with `body`.
    pub fn replying(body: &str) -> Self {
        Self {
            reply: Some(body.to_string()),
            ..Default::default()
        }
    }

    fn reply(&self) -> String {
        self.reply.clone().unwrap_or_else(|| r#"{"ok": true}"#.to_string())
    }

    pub fn endpoint_calls(&self) -> Vec<(String, String, Value)> {
        self.log.lock().unwrap().endpoint_calls.clone()
    }

    pub fn plugin_calls(&self) -> Vec<String> {
        self.log.lock().unwrap().plugin_calls.clone()
    }

    pub fn registry_loads(&self) -> usize {
        self.log.lock().unwrap().registry_loads
    }
}

impl RemoteGateway for RecordingGateway {
    async fn load_plugin_registry(&self) -> Result<PluginRegistry, DispatchError> {
        self.log.lock().unwrap().registry_loads += 1;
        match &self.registry {
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|e| DispatchError::RegistryLoad(e.to_string())),
            None => Ok(PluginRegistry::default()),
        }
    }

    async fn call_bound_endpoint(
        &self,
        _endpoint: &BoundEndpoint,
        method: &str,
        operation: &str,
        arguments: &Value,
    ) -> Result<String, DispatchError> {
        self.log.lock().unwrap().endpoint_calls.push((
            method.to_string(),
            operation.to_string(),
            arguments.clone(),
        ));
        Ok(self.reply())
    }

    async fn call_plugin_api(
        &self,
        _plugin: &RegistryPlugin,
        api: &RegistryApi,
        _arguments: &Value,
    ) -> Result<String, DispatchError> {
        self.log.lock().unwrap().plugin_calls.push(api.name.clone());
        Ok(self.reply())
    }
}

/// One scripted response of [`ScriptedService`].
pub enum Step {
    /// Yield these items, then end.
    Items(Vec<Result<CompletionChunk, CompletionError>>),
    /// Yield these chunks, then never end.
    Hang(Vec<CompletionChunk>),
}

/// Completion service that replays scripted responses in order.
#[derive(Default)]
pub struct ScriptedService {
    steps: Mutex<VecDeque<Step>>,
    repeat: Option<Vec<CompletionChunk>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedService {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            ..Default::default()
        }
    }

    /// Answer every request with `chunks`.
    pub fn repeating(chunks: Vec<CompletionChunk>) -> Self {
        Self {
            repeat: Some(chunks),
            ..Default::default()
        }
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl CompletionService for ScriptedService {
    fn name(&self) -> &str {
        "scripted"
    }

    fn stream(&self, request: CompletionRequest) -> CompletionStream {
        self.requests.lock().unwrap().push(request);
        let step = self.steps.lock().unwrap().pop_front();
        match (step, &self.repeat) {
            (Some(Step::Items(items)), _) => Box::pin(futures_util::stream::iter(items)),
            (Some(Step::Hang(chunks)), _) => Box::pin(futures_util::StreamExt::chain(
                futures_util::stream::iter(chunks.into_iter().map(Ok::<_, CompletionError>)),
                futures_util::stream::pending(),
            )),
            (None, Some(chunks)) => Box::pin(futures_util::stream::iter(
                chunks.clone().into_iter().map(Ok::<_, CompletionError>),
            )),
            (None, None) => Box::pin(futures_util::stream::iter(vec![Err::<CompletionChunk, _>(
                CompletionError::Provider {
                    message: "script exhausted".to_string(),
                },
            )])),
        }
    }
}

/// Chunks of a plain text answer, split into two fragments.
pub fn text_reply(first: &str, second: &str) -> Vec<CompletionChunk> {
    vec![
        CompletionChunk::delta(DeltaFragment::role(Role::Assistant)),
        CompletionChunk::delta(DeltaFragment::content(first)),
        CompletionChunk::delta(DeltaFragment::content(second)),
        CompletionChunk::finish(FinishReason::Stop),
    ]
}

/// Chunks of a function call answer.
pub fn function_call_reply(name: &str, arguments: &str) -> Vec<CompletionChunk> {
    vec![
        CompletionChunk::delta(DeltaFragment::role(Role::Assistant)),
        CompletionChunk::delta(DeltaFragment::function_name(name)),
        CompletionChunk::delta(DeltaFragment::function_arguments(arguments)),
        CompletionChunk::finish(FinishReason::FunctionCall),
    ]
}

pub fn ok(chunks: Vec<CompletionChunk>) -> Step {
    Step::Items(chunks.into_iter().map(Ok).collect())
}
