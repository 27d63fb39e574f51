//! Delta assembly for streamed assistant turns.
//!
//! [`DeltaAssembler`] folds the fragments of one streamed completion into a
//! single assistant [`Turn`] and mirrors them to the UI as message streams:
//! one for the text content and, once the model starts a function call, one
//! tagged with the function name that shows the call as it is generated.

use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use parley_types::event::{Author, UiEvent};
use parley_types::function::canonical_function_name;
use parley_types::stream::DeltaFragment;
use parley_types::turn::{FunctionCall, Role, Turn};

/// Result of one assembled stream.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledTurn {
    pub turn: Turn,
    /// Ids of every UI message stream opened while assembling, in order.
    pub stream_ids: Vec<Uuid>,
}

/// Accumulates delta fragments into one assistant turn.
pub struct DeltaAssembler {
    turn: Turn,
    events: UnboundedSender<UiEvent>,
    content_stream: Option<Uuid>,
    function_stream: Option<Uuid>,
    stream_ids: Vec<Uuid>,
    name_seen: bool,
}

impl DeltaAssembler {
    pub fn new(events: UnboundedSender<UiEvent>) -> Self {
        Self {
            turn: Turn::assistant(""),
            events,
            content_stream: None,
            function_stream: None,
            stream_ids: Vec::new(),
            name_seen: false,
        }
    }

    /// The turn accumulated so far.
    pub fn turn(&self) -> &Turn {
        &self.turn
    }

    /// Fold one fragment into the turn.
    pub fn push(&mut self, delta: &DeltaFragment) {
        if let Some(role) = delta.role {
            self.turn.role = role;
        }

        if let Some(content) = &delta.content {
            self.push_content(content);
        }

        if let Some(call) = &delta.function_call {
            if let Some(name) = &call.name {
                self.push_function_name(name);
            }
            if let Some(arguments) = &call.arguments {
                self.push_function_arguments(arguments);
            }
        }
    }

    fn push_content(&mut self, content: &str) {
        self.turn.content.push_str(content);
        if content.is_empty() {
            return;
        }
        if self.function_stream.is_some() {
            tracing::trace!("content after function call start, not forwarded");
            return;
        }
        let id = match self.content_stream {
            Some(id) => id,
            None => self.open_stream(Author::Assistant),
        };
        self.content_stream = Some(id);
        self.emit(UiEvent::Token {
            id,
            text: content.to_string(),
        });
    }

    fn push_function_name(&mut self, name: &str) {
        if self.name_seen {
            tracing::debug!(name, "ignoring repeated function name fragment");
            return;
        }
        self.name_seen = true;

        let name = canonical_function_name(name).to_string();
        self.close_content_stream();

        let id = match self.function_stream {
            Some(id) => id,
            None => self.open_stream(Author::Function(name.clone())),
        };
        self.function_stream = Some(id);
        self.emit(UiEvent::Token {
            id,
            text: name.clone(),
        });

        self.turn.function_call.get_or_insert_with(FunctionCall::default).name = name;
    }

    fn push_function_arguments(&mut self, arguments: &str) {
        let call = self.turn.function_call.get_or_insert_with(FunctionCall::default);
        call.arguments.push_str(arguments);

        let id = match self.function_stream {
            Some(id) => id,
            None => {
                self.close_content_stream();
                self.open_stream(Author::Function(String::new()))
            }
        };
        self.function_stream = Some(id);
        if !arguments.is_empty() {
            self.emit(UiEvent::Token {
                id,
                text: arguments.to_string(),
            });
        }
    }

    /// Close every open stream and return the accumulated turn.
    pub fn finish(mut self) -> AssembledTurn {
        self.close_content_stream();
        if let Some(id) = self.function_stream.take() {
            self.emit(UiEvent::MessageFinished { id });
        }
        if self.turn.role != Role::Assistant {
            tracing::debug!(role = %self.turn.role, "stream declared a non-assistant role");
        }
        AssembledTurn {
            turn: self.turn,
            stream_ids: self.stream_ids,
        }
    }

    fn open_stream(&mut self, author: Author) -> Uuid {
        let id = Uuid::now_v7();
        self.stream_ids.push(id);
        self.emit(UiEvent::MessageStarted { id, author });
        id
    }

    fn close_content_stream(&mut self) {
        if let Some(id) = self.content_stream.take() {
            self.emit(UiEvent::MessageFinished { id });
        }
    }

    fn emit(&self, event: UiEvent) {
        // A closed receiver only means nobody is watching.
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn drain(rx: &mut mpsc::UnboundedReceiver<UiEvent>) -> Vec<UiEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_content_fragments_concatenate() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut assembler = DeltaAssembler::new(tx);
        assembler.push(&DeltaFragment::role(Role::Assistant));
        assembler.push(&DeltaFragment::content("Hel"));
        assembler.push(&DeltaFragment::content("lo"));
        let assembled = assembler.finish();

        assert_eq!(assembled.turn.role, Role::Assistant);
        assert_eq!(assembled.turn.content, "Hello");
        assert!(assembled.turn.function_call.is_none());
        assert_eq!(assembled.stream_ids.len(), 1);

        let id = assembled.stream_ids[0];
        assert_eq!(
            drain(&mut rx),
            vec![
                UiEvent::MessageStarted { id, author: Author::Assistant },
                UiEvent::Token { id, text: "Hel".to_string() },
                UiEvent::Token { id, text: "lo".to_string() },
                UiEvent::MessageFinished { id },
            ]
        );
    }

    #[test]
    fn test_python_function_call_is_renamed() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut assembler = DeltaAssembler::new(tx);
        assembler.push(&DeltaFragment::function_name("python"));
        assembler.push(&DeltaFragment::function_arguments("{\"a\":1"));
        assembler.push(&DeltaFragment::function_arguments("}"));
        let assembled = assembler.finish();

        let call = assembled.turn.function_call.unwrap();
        assert_eq!(call.name, "python_exec");
        assert_eq!(call.arguments, "{\"a\":1}");
    }

    #[test]
    fn test_function_name_closes_content_stream() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut assembler = DeltaAssembler::new(tx);
        assembler.push(&DeltaFragment::content("Let me check."));
        assembler.push(&DeltaFragment::function_name("search"));
        assembler.push(&DeltaFragment::function_arguments("{}"));
        let assembled = assembler.finish();

        assert_eq!(assembled.stream_ids.len(), 2);
        let (content_id, function_id) = (assembled.stream_ids[0], assembled.stream_ids[1]);
        let events = drain(&mut rx);
        assert_eq!(events[2], UiEvent::MessageFinished { id: content_id });
        assert_eq!(
            events[3],
            UiEvent::MessageStarted {
                id: function_id,
                author: Author::Function("search".to_string()),
            }
        );
        assert_eq!(
            events[4],
            UiEvent::Token { id: function_id, text: "search".to_string() }
        );
        assert_eq!(events.last(), Some(&UiEvent::MessageFinished { id: function_id }));
    }

    #[test]
    fn test_second_name_fragment_is_ignored() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut assembler = DeltaAssembler::new(tx);
        assembler.push(&DeltaFragment::function_name("search"));
        assembler.push(&DeltaFragment::function_name("other"));
        let assembled = assembler.finish();
        assert_eq!(assembled.turn.function_call.unwrap().name, "search");
        assert_eq!(assembled.stream_ids.len(), 1);
    }

    #[test]
    fn test_arguments_before_name_start_a_call() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut assembler = DeltaAssembler::new(tx);
        assembler.push(&DeltaFragment::function_arguments("{\"q\":"));
        assembler.push(&DeltaFragment::function_name("search"));
        assembler.push(&DeltaFragment::function_arguments("1}"));
        let assembled = assembler.finish();

        let call = assembled.turn.function_call.unwrap();
        assert_eq!(call.name, "search");
        assert_eq!(call.arguments, "{\"q\":1}");
        assert_eq!(assembled.stream_ids.len(), 1);
    }

    #[test]
    fn test_empty_content_is_not_forwarded() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut assembler = DeltaAssembler::new(tx);
        assembler.push(&DeltaFragment::content(""));
        assembler.push(&DeltaFragment::default());
        let assembled = assembler.finish();
        assert!(assembled.stream_ids.is_empty());
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_closed_receiver_does_not_break_assembly() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let mut assembler = DeltaAssembler::new(tx);
        assembler.push(&DeltaFragment::content("still works"));
        assert_eq!(assembler.finish().turn.content, "still works");
    }
}
