//! Parley entry point.
//!
//! Binary name: `parley`
//!
//! Parses CLI arguments, sets up tracing, loads the configuration and
//! dispatches to the command handler.

mod cli;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Verbosity picks the default filter; RUST_LOG wins when set.
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,parley=debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = parley_infra::config::load_app_config(cli.config.as_deref()).await;

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => cli::chat::loop_runner::run_chat_loop(&config).await?,
        Commands::Functions => cli::functions::print_functions(&config).await?,
    }

    Ok(())
}
