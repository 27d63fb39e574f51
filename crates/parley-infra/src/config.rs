//! Configuration loader for Parley.
//!
//! Reads `parley.toml` (by default `~/.parley/parley.toml`) into
//! [`AppConfig`], falling back to defaults when the file is missing or
//! malformed, then applies environment variable overrides.

use std::path::{Path, PathBuf};

use secrecy::SecretString;

use parley_types::config::AppConfig;

/// `~/.parley/parley.toml`, if a home directory is known.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".parley").join("parley.toml"))
}

/// Load the configuration from `path` (or the default path) and the
/// process environment.
pub async fn load_app_config(path: Option<&Path>) -> AppConfig {
    let path = path.map(Path::to_path_buf).or_else(default_config_path);
    let mut config = match path {
        Some(path) => load_config_file(&path).await,
        None => {
            tracing::debug!("No home directory, using default config");
            AppConfig::default()
        }
    };
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    config
}

/// Load `path` as TOML.
///
/// - If the file does not exist, returns [`AppConfig::default()`].
/// - If the file exists but fails to read or parse, logs a warning and returns the default.
pub async fn load_config_file(path: &Path) -> AppConfig {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return AppConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", path.display());
            return AppConfig::default();
        }
    };

    match toml::from_str::<AppConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!("Failed to parse {}: {err}, using defaults", path.display());
            AppConfig::default()
        }
    }
}

/// Override fields from environment variables looked up with `lookup`.
///
/// Empty values are ignored. An unparsable `MAX_TOKENS` keeps the current
/// budget.
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

    if let Some(key) = get("OPENAI_API_KEY") {
        config.api_key = Some(SecretString::from(key));
    }
    if let Some(base) = get("OPENAI_API_BASE") {
        config.api_base = base;
    }
    if let Some(model) = get("OPENAI_MODEL") {
        config.model = model;
    }
    if let Some(language) = get("OPENAI_LANGUAGE") {
        config.language = language;
    }
    if let Some(raw) = get("MAX_TOKENS") {
        match raw.trim().parse::<usize>() {
            Ok(max_tokens) => config.max_tokens = max_tokens,
            Err(err) => {
                tracing::warn!(value = %raw, "Ignoring invalid MAX_TOKENS: {err}");
            }
        }
    }
}
