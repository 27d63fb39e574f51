//! Conversation state and streamed turn assembly.

pub mod assembler;
pub mod conversation;
