//! Core logic for Parley.
//!
//! Holds the four pieces a chat session is built from: the token budgeter,
//! the delta assembler, the function dispatcher and the conversation loop.
//! The ports they need from the outside world (`CompletionService`,
//! `LocalFunction`, `RemoteGateway`) are defined here and implemented in
//! parley-infra.

pub mod agent;
pub mod chat;
pub mod dispatch;
pub mod llm;

#[cfg(test)]
pub(crate) mod testing;
