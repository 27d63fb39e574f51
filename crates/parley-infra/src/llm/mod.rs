//! Completion backends implementing
//! [`CompletionService`](parley_core::llm::provider::CompletionService).

pub mod openai_compat;
