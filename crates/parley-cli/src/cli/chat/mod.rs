//! Interactive terminal chat.
//!
//! The conversation loop runs on the input task; a renderer task consumes
//! its `UiEvent`s and writes them above the prompt. Entry point:
//! `loop_runner::run_chat_loop`.

pub mod banner;
pub mod commands;
pub mod input;
pub mod loop_runner;
pub mod renderer;
