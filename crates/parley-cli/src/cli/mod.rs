//! CLI command definitions for the `parley` binary.

pub mod chat;
pub mod functions;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Chat with an OpenAI-compatible model that can call functions.
#[derive(Parser)]
#[command(name = "parley", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Suppress all log output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (default: ~/.parley/parley.toml).
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Start an interactive chat session (default).
    Chat,

    /// Print the descriptors of the discovered local functions as JSON.
    #[command(alias = "fns")]
    Functions,
}
