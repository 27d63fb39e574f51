//! Shared domain types for Parley.
//!
//! Conversation turns, streamed completion chunks, function descriptors and
//! bindings, UI events, configuration and the error enums used across the
//! workspace.
//!
//! Zero infrastructure dependencies -- only serde, uuid, secrecy, thiserror.

pub mod config;
pub mod error;
pub mod event;
pub mod function;
pub mod stream;
pub mod turn;
