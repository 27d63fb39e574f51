//! Infrastructure adapters for Parley.
//!
//! - [`llm`]: OpenAI-compatible streaming completion client
//! - [`gateway`]: reqwest-backed remote gateway (bound endpoints, plugin registry)
//! - [`bindings`]: endpoint binding files
//! - [`plugins`]: plugin discovery and the built-in local functions
//! - [`config`]: `parley.toml` and environment loading

pub mod bindings;
pub mod config;
pub mod gateway;
pub mod llm;
pub mod plugins;
