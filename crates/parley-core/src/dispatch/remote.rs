//! RemoteGateway trait definition.
//!
//! The dispatcher reaches bound remote endpoints and third-party plugin
//! APIs through this port. The HTTP implementation lives in parley-infra.
//!
//! Calls return the response body as received. It is handed to the model
//! verbatim, so key order and number formatting survive.

use std::future::Future;

use serde_json::Value;

use parley_types::error::DispatchError;
use parley_types::function::{BoundEndpoint, PluginRegistry, RegistryApi, RegistryPlugin};

pub trait RemoteGateway: Send + Sync {
    /// Load the third-party plugin registry. Called at most once per session
    /// unless loading fails.
    fn load_plugin_registry(&self) -> impl Future<Output = Result<PluginRegistry, DispatchError>> + Send;

    /// Call `operation` on a bound endpoint with the given HTTP method.
    fn call_bound_endpoint(
        &self,
        endpoint: &BoundEndpoint,
        method: &str,
        operation: &str,
        arguments: &Value,
    ) -> impl Future<Output = Result<String, DispatchError>> + Send;

    /// Call one API of a third-party plugin.
    fn call_plugin_api(
        &self,
        plugin: &RegistryPlugin,
        api: &RegistryApi,
        arguments: &Value,
    ) -> impl Future<Output = Result<String, DispatchError>> + Send;
}
