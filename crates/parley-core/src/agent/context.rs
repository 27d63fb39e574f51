//! Session-scoped state shared between the UI side and the conversation loop.
//!
//! `SessionContext` carries the stop signal, the table of remote endpoints
//! bound to the session and the lazily loaded third-party plugin registry.
//! It is passed by reference through the call chain; nothing here is global.

use std::future::Future;
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use parley_types::error::DispatchError;
use parley_types::function::{BoundEndpoint, FunctionDescriptor, PluginRegistry};

/// Resettable stop request for the turn currently streaming.
///
/// A `CancellationToken` cannot be un-cancelled, so resetting swaps in a
/// fresh token. Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    token: Arc<Mutex<CancellationToken>>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the loop to stop at the next fragment boundary.
    pub fn stop(&self) {
        self.lock().cancel();
    }

    /// Clear a previous stop request.
    pub fn reset(&self) {
        *self.lock() = CancellationToken::new();
    }

    pub fn is_stopped(&self) -> bool {
        self.lock().is_cancelled()
    }

    /// The token to wait on for the current request.
    pub fn token(&self) -> CancellationToken {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CancellationToken> {
        self.token.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// State owned by one chat session.
#[derive(Debug)]
pub struct SessionContext {
    pub session_id: Uuid,
    stop: StopSignal,
    /// Bound remote endpoints keyed by URL fingerprint.
    bindings: DashMap<String, BoundEndpoint>,
    registry: OnceCell<PluginRegistry>,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionContext {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::now_v7(),
            stop: StopSignal::new(),
            bindings: DashMap::new(),
            registry: OnceCell::new(),
        }
    }

    pub fn stop_signal(&self) -> &StopSignal {
        &self.stop
    }

    /// Bind a remote endpoint, replacing any binding with the same fingerprint.
    pub fn bind(&self, endpoint: BoundEndpoint) {
        tracing::info!(
            fingerprint = %endpoint.url_md5,
            url = %endpoint.url,
            functions = endpoint.api_info.len(),
            "bound remote endpoint"
        );
        self.bindings.insert(endpoint.url_md5.clone(), endpoint);
    }

    pub fn binding(&self, fingerprint: &str) -> Option<BoundEndpoint> {
        self.bindings.get(fingerprint).map(|entry| entry.value().clone())
    }

    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    /// Drop every bound endpoint.
    pub fn clear_bindings(&self) {
        if !self.bindings.is_empty() {
            tracing::info!(count = self.bindings.len(), "clearing remote endpoint bindings");
        }
        self.bindings.clear();
    }

    /// Descriptors of all bound endpoints, sorted by name.
    pub fn bound_descriptors(&self) -> Vec<FunctionDescriptor> {
        let mut descriptors: Vec<FunctionDescriptor> = self
            .bindings
            .iter()
            .flat_map(|entry| entry.value().descriptors())
            .collect();
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));
        descriptors
    }

    /// The plugin registry, loaded with `load` on first use.
    ///
    /// A failed load is not cached; the next call tries again.
    pub async fn plugin_registry<F, Fut>(&self, load: F) -> Result<&PluginRegistry, DispatchError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<PluginRegistry, DispatchError>>,
    {
        self.registry.get_or_try_init(load).await
    }
}
