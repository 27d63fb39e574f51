//! Session context and the conversation loop that drives a session.

pub mod context;
pub mod conversation_loop;
pub mod span_stream;
