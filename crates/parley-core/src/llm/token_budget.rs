//! Token budgeting for the conversation window.
//!
//! Before every request the conversation is cut down to a configured budget
//! by evicting the oldest non-system turns. The system turn and the most
//! recent turn always survive.

use parley_types::turn::Turn;

/// Per-turn overhead of the chat message format.
const TOKENS_PER_TURN: usize = 4;

/// Tokens that priming the assistant reply costs, once per request.
const REPLY_PRIMING_TOKENS: usize = 2;

/// Counts encoded tokens of a text.
pub trait TokenEncoder: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

/// [`TokenEncoder`] backed by a tiktoken BPE.
pub struct TiktokenEncoder {
    bpe: tiktoken_rs::CoreBPE,
}

impl TiktokenEncoder {
    /// BPE for `model`, falling back to `cl100k_base` for unknown models.
    pub fn for_model(model: &str) -> anyhow::Result<Self> {
        let bpe = match tiktoken_rs::get_bpe_from_model(model) {
            Ok(bpe) => bpe,
            Err(err) => {
                tracing::debug!(model, error = %err, "unknown model for tokenizer, using cl100k_base");
                tiktoken_rs::cl100k_base()?
            }
        };
        Ok(Self { bpe })
    }
}

impl TokenEncoder for TiktokenEncoder {
    fn count(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }
}

/// Estimates and trims conversations against a token budget.
pub struct TokenBudgeter<E> {
    encoder: E,
}

impl<E: TokenEncoder> TokenBudgeter<E> {
    pub fn new(encoder: E) -> Self {
        Self { encoder }
    }

    /// Estimated token length of `turns` as sent to the model.
    ///
    /// Each turn costs a fixed overhead plus the encoded length of every
    /// field it carries; a `name` field saves one token. The reply priming
    /// is added once.
    pub fn estimate(&self, turns: &[Turn]) -> usize {
        let total: usize = turns.iter().map(|turn| self.turn_cost(turn)).sum();
        total + REPLY_PRIMING_TOKENS
    }

    fn turn_cost(&self, turn: &Turn) -> usize {
        let mut cost = TOKENS_PER_TURN;
        cost += self.encoder.count(turn.role.as_str());
        cost += self.encoder.count(&turn.content);
        if let Some(call) = &turn.function_call {
            let encoded = serde_json::to_string(call).unwrap_or_default();
            cost += self.encoder.count(&encoded);
        }
        if let Some(name) = &turn.name {
            cost += self.encoder.count(name);
            cost = cost.saturating_sub(1);
        }
        cost
    }

    /// Return a copy of `turns` that fits `budget`.
    ///
    /// Only the non-system turns are measured. While they exceed the budget
    /// and more than one of them remains, the oldest (index 1) is removed.
    /// The input is never modified.
    pub fn truncate(&self, turns: &[Turn], budget: usize) -> Vec<Turn> {
        let mut window = turns.to_vec();
        if window.len() <= 2 {
            return window;
        }

        let mut estimate = self.estimate(&window[1..]);
        while estimate > budget && window.len() > 2 {
            let evicted = window.remove(1);
            estimate -= self.turn_cost(&evicted);
        }

        if window.len() < turns.len() {
            tracing::debug!(
                evicted = turns.len() - window.len(),
                remaining = window.len(),
                estimate,
                budget,
                "truncated conversation window"
            );
        }
        window
    }
}
