//! Plugin discovery.
//!
//! Every sub-directory of the plugin directory is a plugin. An optional
//! `config.json` inside it may set `"enabled": false`. The directory name
//! picks the implementation from the built-in catalog:
//!
//! | directory | function       |
//! |-----------|----------------|
//! | `python`  | `python_exec`  |
//! | `time`    | `current_time` |

pub mod python_exec;
pub mod time;

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use parley_core::dispatch::local::{BoxLocalFunction, LocalRegistry};

use self::python_exec::PythonExec;
use self::time::CurrentTime;

#[derive(Debug, Deserialize)]
struct PluginConfig {
    #[serde(default = "default_enabled")]
    enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Built-in implementation for a plugin directory name.
fn builtin(name: &str) -> Option<BoxLocalFunction> {
    match name {
        "python" => Some(BoxLocalFunction::new(PythonExec::default())),
        "time" => Some(BoxLocalFunction::new(CurrentTime)),
        _ => None,
    }
}

async fn read_plugin_config(plugin_dir: &Path) -> PluginConfig {
    let path = plugin_dir.join("config.json");
    let content = match tokio::fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return PluginConfig::default(),
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, treating plugin as enabled", path.display());
            return PluginConfig::default();
        }
    };
    match serde_json::from_str(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!("Failed to parse {}: {err}, treating plugin as enabled", path.display());
            PluginConfig::default()
        }
    }
}

/// Scan `dir` and build the local function registry.
///
/// A missing directory yields an empty registry. Plugins are visited in
/// name order; hidden directories and `__pycache__` are ignored.
pub async fn discover_plugins(dir: &Path) -> anyhow::Result<LocalRegistry> {
    let mut registry = LocalRegistry::new();

    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!("No plugin directory at {}, no local functions", dir.display());
            return Ok(registry);
        }
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read plugin directory {}", dir.display()));
        }
    };

    let mut names = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .with_context(|| format!("failed to read plugin directory {}", dir.display()))?
    {
        if !entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') || name == "__pycache__" {
            continue;
        }
        names.push(name);
    }
    names.sort();

    for name in names {
        let config = read_plugin_config(&dir.join(&name)).await;
        if !config.enabled {
            tracing::info!(plugin = %name, "plugin disabled, skipping");
            continue;
        }
        match builtin(&name) {
            Some(function) => {
                tracing::info!(plugin = %name, function = %function.describe().name, "loaded plugin");
                registry.register(function);
            }
            None => tracing::warn!(plugin = %name, "unknown plugin, skipping"),
        }
    }

    Ok(registry)
}
