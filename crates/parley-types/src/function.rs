//! Function descriptors and remote bindings.
//!
//! Descriptors are what the model sees in the `functions` field of a
//! completion request. The dispatcher routes a call by its name alone, see
//! [`decompose_remote_name`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Name of the built-in code execution function.
pub const PYTHON_EXEC: &str = "python_exec";

/// Name the model sometimes uses for [`PYTHON_EXEC`].
pub const PYTHON_ALIAS: &str = "python";

/// Map a function name to the name the rest of the system uses.
///
/// `python` is read back as `python_exec`; every other name is unchanged.
pub fn canonical_function_name(name: &str) -> &str {
    if name == PYTHON_ALIAS { PYTHON_EXEC } else { name }
}

/// Whether `name` refers to the code execution function.
pub fn is_python_exec(name: &str) -> bool {
    name == PYTHON_EXEC || name == PYTHON_ALIAS
}

/// A callable the model may request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// JSON schema of the arguments object.
    #[serde(default = "empty_parameters")]
    pub parameters: serde_json::Value,
}

fn empty_parameters() -> serde_json::Value {
    serde_json::json!({"type": "object", "properties": {}})
}

impl FunctionDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// A composite remote function name split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteName {
    pub operation: String,
    pub method: String,
    pub fingerprint: String,
}

/// Split `{operation}_{method}_{fingerprint}` on `_`.
///
/// Returns `None` when the name has fewer than three parts. The operation is
/// the prefix joined back with `_`, so it may itself contain underscores.
pub fn decompose_remote_name(name: &str) -> Option<RemoteName> {
    let parts: Vec<&str> = name.split('_').collect();
    if parts.len() < 3 {
        return None;
    }
    let n = parts.len();
    Some(RemoteName {
        operation: parts[..n - 2].join("_"),
        method: parts[n - 2].to_uppercase(),
        fingerprint: parts[n - 1].to_string(),
    })
}

/// A remote HTTP endpoint bound to one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundEndpoint {
    pub url: String,
    /// Stable fingerprint of `url`, the last segment of composite names.
    pub url_md5: String,
    /// Descriptors advertised for this endpoint, already carrying composite names.
    #[serde(default)]
    pub api_info: Vec<FunctionDescriptor>,
}

impl BoundEndpoint {
    /// Descriptors advertised for this endpoint.
    pub fn descriptors(&self) -> Vec<FunctionDescriptor> {
        self.api_info.clone()
    }
}

/// One API of a third-party plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryApi {
    pub name: String,
    #[serde(default = "default_method")]
    pub method: String,
    /// Path appended to the plugin URL; defaults to the API name.
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default = "empty_parameters")]
    pub parameters: serde_json::Value,
}

fn default_method() -> String {
    "POST".to_string()
}

/// A third-party plugin entry of the registry file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryPlugin {
    pub url: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub apis: Vec<RegistryApi>,
}

/// The third-party plugin registry, keyed by plugin id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PluginRegistry {
    pub plugins: BTreeMap<String, RegistryPlugin>,
}

impl PluginRegistry {
    /// Find the first API named `operation`, searching plugins in id order.
    pub fn find_api(&self, operation: &str) -> Option<(&str, &RegistryPlugin, &RegistryApi)> {
        self.plugins.iter().find_map(|(id, plugin)| {
            plugin
                .apis
                .iter()
                .find(|api| api.name == operation)
                .map(|api| (id.as_str(), plugin, api))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_function_name() {
        assert_eq!(canonical_function_name("python"), "python_exec");
        assert_eq!(canonical_function_name("python_exec"), "python_exec");
        assert_eq!(canonical_function_name("search"), "search");
    }

    #[test]
    fn test_decompose_remote_name() {
        let remote = decompose_remote_name("search_get_abc123").unwrap();
        assert_eq!(remote.operation, "search");
        assert_eq!(remote.method, "GET");
        assert_eq!(remote.fingerprint, "abc123");

        let nested = decompose_remote_name("list_open_issues_post_ff00").unwrap();
        assert_eq!(nested.operation, "list_open_issues");
        assert_eq!(nested.method, "POST");
    }

    #[test]
    fn test_decompose_short_names() {
        assert!(decompose_remote_name("weather").is_none());
        assert!(decompose_remote_name("current_time").is_none());
    }

    #[test]
    fn test_descriptor_serializes_wire_fields_only() {
        let descriptor = FunctionDescriptor::new("now", "Current time", empty_parameters());
        let json = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "name": "now",
                "description": "Current time",
                "parameters": {"type": "object", "properties": {}}
            })
        );
    }

    #[test]
    fn test_bound_endpoint_names_route_back_to_it() {
        let endpoint: BoundEndpoint = serde_json::from_value(serde_json::json!({
            "url": "http://localhost:9000/api",
            "url_md5": "abc123",
            "api_info": [{"name": "search_get_abc123", "description": "Search"}]
        }))
        .unwrap();

        let descriptors = endpoint.descriptors();
        assert_eq!(descriptors.len(), 1);
        let remote = decompose_remote_name(&descriptors[0].name).unwrap();
        assert_eq!(remote.fingerprint, endpoint.url_md5);
        assert_eq!(remote.method, "GET");
    }

    #[test]
    fn test_registry_find_api() {
        let registry: PluginRegistry = serde_json::from_value(serde_json::json!({
            "weather": {
                "url": "http://weather.local",
                "apis": [{"name": "forecast", "method": "GET"}]
            },
            "notes": {
                "url": "http://notes.local",
                "apis": [{"name": "append"}]
            }
        }))
        .unwrap();

        let (id, plugin, api) = registry.find_api("append").unwrap();
        assert_eq!(id, "notes");
        assert_eq!(plugin.url, "http://notes.local");
        assert_eq!(api.method, "POST");
        assert!(registry.find_api("missing").is_none());
    }
}
