//! Function-call dispatch: argument parsing, local registry, remote port
//! and the dispatcher that routes between them.

pub mod arguments;
pub mod dispatcher;
pub mod literal;
pub mod local;
pub mod remote;
