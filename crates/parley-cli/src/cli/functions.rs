//! `parley functions`: print the local function descriptors.

use std::path::Path;

use parley_infra::plugins::discover_plugins;
use parley_types::config::AppConfig;

pub async fn print_functions(config: &AppConfig) -> anyhow::Result<()> {
    let registry = discover_plugins(Path::new(&config.plugin_dir)).await?;
    let descriptors = registry.descriptors();
    println!("{}", serde_json::to_string_pretty(&descriptors)?);
    Ok(())
}
