//! Append-only conversation history.

use parley_types::turn::{Role, Turn};

/// The turns of one session, starting with the system turn.
///
/// Turns are only ever appended. [`Conversation::reset`] is the one way back
/// to an empty history and keeps the system turn.
#[derive(Debug, Clone)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            turns: vec![Turn::system(system_prompt)],
        }
    }

    pub fn push(&mut self, turn: Turn) {
        debug_assert!(turn.role != Role::System, "only the first turn is a system turn");
        self.turns.push(turn);
    }

    pub fn extend(&mut self, turns: impl IntoIterator<Item = Turn>) {
        for turn in turns {
            self.push(turn);
        }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn system(&self) -> &Turn {
        &self.turns[0]
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether the conversation holds nothing besides the system turn.
    pub fn is_empty(&self) -> bool {
        self.turns.len() <= 1
    }

    /// Drop every turn except the system turn.
    pub fn reset(&mut self) {
        self.turns.truncate(1);
    }
}

/// System prompt used by the chat session, asking for answers in `language`.
pub fn default_system_prompt(language: &str) -> String {
    format!(
        "1. You are a helper bot. You can generate Python code to analyze data and \
         run it with the python_exec function.\n\
         2. If the code produces images or files, save them to the ./tmp folder and \
         end the code with `print('path', './tmp/xxx.png')`.\n\
         3. To show an image, respond with ![image](./tmp/xxx.png); to offer a \
         download, respond with [file](./tmp/xxx.png).\n\
         4. Never use a graphical interface in the code: no plt.show(), no \
         cv2.imshow().\n\n\
         Please answer me in {language}"
    )
}
