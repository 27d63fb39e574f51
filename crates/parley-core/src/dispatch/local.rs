//! Local functions and their registry.
//!
//! `LocalFunction` uses native async fn in traits, so it is not object safe.
//! The registry stores `BoxLocalFunction`s, built with the usual pattern:
//! an object-safe `LocalFunctionDyn` with boxed futures, a blanket impl for
//! every `LocalFunction`, and a wrapper that delegates to it.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use serde_json::Value;

use parley_types::function::FunctionDescriptor;

/// A function that runs in-process.
///
/// Built-in plugins in parley-infra implement this.
pub trait LocalFunction: Send + Sync {
    /// Descriptor advertised to the model. Its `name` is the registry key.
    fn describe(&self) -> FunctionDescriptor;

    /// Run the function with parsed arguments.
    fn invoke(&self, arguments: Value) -> impl Future<Output = anyhow::Result<Value>> + Send;
}

/// Object-safe version of [`LocalFunction`] with a boxed future.
pub trait LocalFunctionDyn: Send + Sync {
    fn describe(&self) -> FunctionDescriptor;

    fn invoke_boxed<'a>(
        &'a self,
        arguments: Value,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Value>> + Send + 'a>>;
}

impl<T: LocalFunction> LocalFunctionDyn for T {
    fn describe(&self) -> FunctionDescriptor {
        LocalFunction::describe(self)
    }

    fn invoke_boxed<'a>(
        &'a self,
        arguments: Value,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Value>> + Send + 'a>> {
        Box::pin(self.invoke(arguments))
    }
}

/// Type-erased local function.
pub struct BoxLocalFunction {
    inner: Box<dyn LocalFunctionDyn>,
}

impl BoxLocalFunction {
    pub fn new<T: LocalFunction + 'static>(function: T) -> Self {
        Self {
            inner: Box::new(function),
        }
    }

    pub fn describe(&self) -> FunctionDescriptor {
        self.inner.describe()
    }

    pub async fn invoke(&self, arguments: Value) -> anyhow::Result<Value> {
        self.inner.invoke_boxed(arguments).await
    }
}

/// Local functions by name. Filled once at startup, read-only afterwards.
#[derive(Default)]
pub struct LocalRegistry {
    functions: HashMap<String, BoxLocalFunction>,
}

impl LocalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `function` under its descriptor name, replacing any previous
    /// function with that name.
    pub fn register(&mut self, function: BoxLocalFunction) {
        let name = function.describe().name;
        if self.functions.insert(name.clone(), function).is_some() {
            tracing::warn!(function = %name, "local function registered twice, keeping the last one");
        }
    }

    pub fn get(&self, name: &str) -> Option<&BoxLocalFunction> {
        self.functions.get(name)
    }

    /// Descriptors of every registered function, sorted by name.
    pub fn descriptors(&self) -> Vec<FunctionDescriptor> {
        let mut descriptors: Vec<_> = self.functions.values().map(|f| f.describe()).collect();
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));
        descriptors
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl FromIterator<BoxLocalFunction> for LocalRegistry {
    fn from_iter<I: IntoIterator<Item = BoxLocalFunction>>(iter: I) -> Self {
        let mut registry = Self::new();
        for function in iter {
            registry.register(function);
        }
        registry
    }
}
