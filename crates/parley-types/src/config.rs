//! Application configuration types for Parley.
//!
//! `AppConfig` is the contents of `parley.toml`. Every field has a default,
//! so an empty file (or no file at all) yields a usable configuration.

use secrecy::SecretString;
use serde::Deserialize;

/// Top-level configuration.
///
/// The API key is a [`SecretString`]; it is redacted from `Debug` output.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub api_key: Option<SecretString>,

    /// Base URL of the OpenAI-compatible API, without `/chat/completions`.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Token budget the conversation window is truncated to.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Language the assistant is asked to answer in.
    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default)]
    pub temperature: f32,

    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,

    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    #[serde(default = "default_plugin_dir")]
    pub plugin_dir: String,

    #[serde(default = "default_plugin_registry_path")]
    pub plugin_registry_path: String,
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4".to_string()
}

fn default_max_tokens() -> usize {
    5000
}

fn default_language() -> String {
    "chinese".to_string()
}

fn default_max_iterations() -> u32 {
    100
}

fn default_max_consecutive_failures() -> u32 {
    3
}

fn default_http_timeout_secs() -> u64 {
    30
}

fn default_plugin_dir() -> String {
    "plugins".to_string()
}

fn default_plugin_registry_path() -> String {
    "plugins/plugin_registry.json".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: default_api_base(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            language: default_language(),
            temperature: 0.0,
            max_iterations: default_max_iterations(),
            max_consecutive_failures: default_max_consecutive_failures(),
            http_timeout_secs: default_http_timeout_secs(),
            plugin_dir: default_plugin_dir(),
            plugin_registry_path: default_plugin_registry_path(),
        }
    }
}

/// Settings the conversation loop needs, split off from [`AppConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct LoopSettings {
    pub model: String,
    pub temperature: f32,
    pub token_budget: usize,
    pub language: String,
    pub max_iterations: u32,
    pub max_consecutive_failures: u32,
    /// Pause between retries after a failed completion request.
    pub retry_delay_ms: u64,
}

impl From<&AppConfig> for LoopSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            token_budget: config.max_tokens,
            language: config.language.clone(),
            max_iterations: config.max_iterations,
            max_consecutive_failures: config.max_consecutive_failures,
            retry_delay_ms: 1000,
        }
    }
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}
