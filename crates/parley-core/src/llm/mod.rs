//! Model-facing abstractions: the completion port and the token budgeter.

pub mod provider;
pub mod token_budget;
