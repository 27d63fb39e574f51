//! The turn-processing loop.
//!
//! One user turn runs as a sequence of iterations. Each iteration truncates
//! the conversation to the token budget, opens a streamed completion, folds
//! its fragments with a [`DeltaAssembler`] and then decides on the finish
//! reason:
//!
//! - `stop`: the answer is appended and the turn is complete
//! - `function_call`: the call is dispatched, the assistant turn and the
//!   result turns are appended, and the next iteration starts
//! - anything else aborts the turn
//!
//! Connection and stream errors are retried after a short pause. Too many
//! consecutive failures abandon the turn and clear the session's endpoint
//! bindings. The iteration cap ends the turn quietly.

use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{Instrument, info_span};

use parley_types::config::LoopSettings;
use parley_types::error::{CompletionError, ConversationError};
use parley_types::event::UiEvent;
use parley_types::stream::{CompletionRequest, FinishReason};
use parley_types::turn::{Role, Turn};

use crate::chat::assembler::{AssembledTurn, DeltaAssembler};
use crate::chat::conversation::Conversation;
use crate::dispatch::dispatcher::FunctionDispatcher;
use crate::dispatch::remote::RemoteGateway;
use crate::llm::provider::CompletionService;
use crate::llm::token_budget::{TokenBudgeter, TokenEncoder};

use super::context::SessionContext;
use super::span_stream::InSpan;

/// How a user turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The model answered.
    Completed,
    /// The iteration cap was reached first.
    IterationLimit,
    /// The stop signal was set while streaming.
    Cancelled,
    /// Too many consecutive completion failures.
    Abandoned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnReport {
    pub outcome: TurnOutcome,
    /// Iterations used, failed ones included.
    pub iterations: u32,
}

/// Result of reading one completion stream.
enum StreamResult {
    Finished {
        assembled: AssembledTurn,
        reason: FinishReason,
    },
    Failed(CompletionError),
    Cancelled,
}

/// Drives completions, dispatch and history for one session.
pub struct ConversationLoop<S, G, E> {
    service: S,
    dispatcher: FunctionDispatcher<G>,
    budgeter: TokenBudgeter<E>,
    settings: LoopSettings,
    events: UnboundedSender<UiEvent>,
}

impl<S, G, E> ConversationLoop<S, G, E>
where
    S: CompletionService,
    G: RemoteGateway,
    E: TokenEncoder,
{
    pub fn new(
        service: S,
        dispatcher: FunctionDispatcher<G>,
        budgeter: TokenBudgeter<E>,
        settings: LoopSettings,
        events: UnboundedSender<UiEvent>,
    ) -> Self {
        Self {
            service,
            dispatcher,
            budgeter,
            settings,
            events,
        }
    }

    pub fn dispatcher(&self) -> &FunctionDispatcher<G> {
        &self.dispatcher
    }

    pub fn settings(&self) -> &LoopSettings {
        &self.settings
    }

    /// Append `user_input` and run the loop until the model answers.
    ///
    /// On error the turns of the failing iteration are not appended; the
    /// user turn and earlier iterations stay in the conversation.
    pub async fn run_turn(
        &self,
        ctx: &SessionContext,
        conversation: &mut Conversation,
        user_input: &str,
    ) -> Result<TurnReport, ConversationError> {
        conversation.push(Turn::user(user_input));
        let span = info_span!(
            "conversation.turn",
            session_id = %ctx.session_id,
            history = conversation.len(),
        );
        self.iterate(ctx, conversation).instrument(span).await
    }

    async fn iterate(
        &self,
        ctx: &SessionContext,
        conversation: &mut Conversation,
    ) -> Result<TurnReport, ConversationError> {
        let mut iteration: u32 = 0;
        let mut consecutive_failures: u32 = 0;

        while iteration < self.settings.max_iterations {
            let request = CompletionRequest {
                model: self.settings.model.clone(),
                messages: self
                    .budgeter
                    .truncate(conversation.turns(), self.settings.token_budget),
                functions: self.dispatcher.descriptors(ctx),
                temperature: self.settings.temperature,
            };

            let (assembled, reason) = match self.stream_once(ctx, request, iteration).await {
                StreamResult::Finished { assembled, reason } => (assembled, reason),
                StreamResult::Cancelled => {
                    ctx.stop_signal().reset();
                    tracing::info!(iteration, "turn cancelled by stop signal");
                    self.notice("Stopped.");
                    return Ok(report(TurnOutcome::Cancelled, iteration));
                }
                StreamResult::Failed(err) => {
                    iteration += 1;
                    consecutive_failures += 1;
                    tracing::warn!(
                        iteration,
                        consecutive_failures,
                        error = %err,
                        "completion request failed"
                    );
                    if consecutive_failures > self.settings.max_consecutive_failures {
                        ctx.clear_bindings();
                        tracing::warn!(consecutive_failures, "giving up on this turn");
                        self.notice(&format!("Giving up after {consecutive_failures} failed requests: {err}"));
                        return Ok(report(TurnOutcome::Abandoned, iteration));
                    }
                    tokio::time::sleep(Duration::from_millis(self.settings.retry_delay_ms)).await;
                    continue;
                }
            };
            consecutive_failures = 0;

            match reason {
                FinishReason::Stop => {
                    conversation.push(Turn::assistant(assembled.turn.content));
                    return Ok(report(TurnOutcome::Completed, iteration + 1));
                }
                FinishReason::FunctionCall => {
                    let turns = self.dispatch(ctx, assembled.turn).await?;
                    conversation.extend(turns);
                    iteration += 1;
                }
                FinishReason::Other(reason) => {
                    tracing::error!(%reason, "unexpected finish reason");
                    return Err(ConversationError::UnexpectedFinishReason(reason));
                }
            }
        }

        tracing::info!(iterations = iteration, "iteration limit reached");
        Ok(report(TurnOutcome::IterationLimit, iteration))
    }

    /// Open one completion and read it to its finish reason.
    async fn stream_once(
        &self,
        ctx: &SessionContext,
        request: CompletionRequest,
        iteration: u32,
    ) -> StreamResult {
        let span = info_span!(
            "gen_ai.stream",
            gen_ai.system = self.service.name(),
            gen_ai.request.model = %request.model,
            iteration,
            messages = request.messages.len(),
            functions = request.functions.len(),
        );
        let mut stream = InSpan::new(self.service.stream(request), span);
        let token = ctx.stop_signal().token();
        let mut assembler = DeltaAssembler::new(self.events.clone());

        let reason = loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    assembler.finish();
                    return StreamResult::Cancelled;
                }
                next = stream.next() => next,
            };

            match next {
                Some(Ok(chunk)) => {
                    tracing::trace!(?chunk.delta, "delta");
                    assembler.push(&chunk.delta);
                    if let Some(reason) = chunk.finish_reason {
                        break Some(reason);
                    }
                }
                Some(Err(err)) => {
                    assembler.finish();
                    return StreamResult::Failed(err);
                }
                None => break None,
            }
        };

        let assembled = assembler.finish();
        match reason {
            Some(reason) => {
                tracing::debug!(%reason, "completion finished");
                StreamResult::Finished { assembled, reason }
            }
            None => StreamResult::Failed(CompletionError::Stream(
                "stream ended without a finish reason".to_string(),
            )),
        }
    }

    /// Run the requested call and build the turns of this iteration.
    async fn dispatch(
        &self,
        ctx: &SessionContext,
        mut assistant: Turn,
    ) -> Result<Vec<Turn>, ConversationError> {
        let call = assistant
            .function_call
            .as_mut()
            .ok_or(ConversationError::MissingFunctionCall)?;

        let outcome = self
            .dispatcher
            .invoke(ctx, &call.name, &call.arguments)
            .await?;

        call.name = outcome.name.clone();
        if let Some(rewritten) = &outcome.rewritten_arguments {
            call.arguments = rewritten.clone();
        }
        assistant.role = Role::Assistant;

        let author = outcome.name.clone();
        let result_turns = outcome.into_turns(&self.settings.language);
        if let Some(result) = result_turns.first() {
            let _ = self.events.send(UiEvent::FunctionResult {
                author,
                content: result.content.clone(),
                language: "json".to_string(),
            });
        }

        let mut turns = Vec::with_capacity(1 + result_turns.len());
        turns.push(assistant);
        turns.extend(result_turns);
        Ok(turns)
    }

    fn notice(&self, message: &str) {
        let _ = self.events.send(UiEvent::Notice {
            message: message.to_string(),
        });
    }
}

fn report(outcome: TurnOutcome, iterations: u32) -> TurnReport {
    TurnReport {
        outcome,
        iterations,
    }
}
