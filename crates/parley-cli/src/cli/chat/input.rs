//! Async readline input for the chat loop.
//!
//! The terminal is in raw mode while a [`ChatInput`] exists, so Ctrl+C
//! reaches us as [`InputEvent::Interrupted`] rather than as a signal. The
//! loop keeps reading input while a response streams in order to see it.

use rustyline_async::{Readline, ReadlineError, ReadlineEvent, SharedWriter};

#[derive(Debug, PartialEq)]
pub enum InputEvent {
    /// A submitted line, trimmed.
    Message(String),
    /// Ctrl+D.
    Eof,
    /// Ctrl+C.
    Interrupted,
}

pub struct ChatInput {
    rl: Readline,
}

impl ChatInput {
    /// Create the input handler and a `SharedWriter` for printing above the
    /// prompt.
    pub fn new(prompt: String) -> Result<(Self, SharedWriter), ReadlineError> {
        let (rl, stdout) = Readline::new(prompt)?;
        Ok((Self { rl }, stdout))
    }

    pub async fn read_line(&mut self) -> InputEvent {
        match self.rl.readline().await {
            Ok(ReadlineEvent::Line(line)) => {
                let trimmed = line.trim().to_string();
                if !trimmed.is_empty() {
                    self.rl.add_history_entry(trimmed.clone());
                }
                InputEvent::Message(trimmed)
            }
            Ok(ReadlineEvent::Eof) => InputEvent::Eof,
            Ok(ReadlineEvent::Interrupted) => InputEvent::Interrupted,
            Err(err) => {
                tracing::debug!("readline error: {err}");
                InputEvent::Eof
            }
        }
    }

    /// Clear the terminal screen.
    pub fn clear(&mut self) {
        let _ = self.rl.clear();
    }

    /// Restore the terminal before exit.
    pub fn flush(&mut self) {
        let _ = self.rl.flush();
    }
}
