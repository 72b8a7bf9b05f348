use crate::request::{ReasoningPart, ToolCallPart};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A raw event emitted by a [`crate::model::LanguageModelBackend`] during
/// streaming generation.
///
/// Text and reasoning deltas here are the *provider's native* framing, which
/// may be additive (only the new suffix) rather than cumulative. Consumers
/// that need the spec-level cumulative semantics should drive these through
/// a decoder that accumulates — see `agnt_core`'s stream decoder, which is
/// the only place cumulative `TextDelta` content is guaranteed.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// A chunk of text output (provider-native framing; see note above).
    TextDelta(String),

    /// A chunk of reasoning/thinking summary text, interleaved ahead of the
    /// visible text on models that expose one.
    ReasoningDelta(String),

    /// A reasoning block finished.
    ReasoningDone(ReasoningPart),

    /// The current text block finished; carries provider bookkeeping needed
    /// to re-associate this block on a subsequent turn.
    TextDone { metadata: HashMap<String, String> },

    /// A new tool call started.
    ToolCallBegin {
        index: usize,
        id: String,
        name: String,
    },

    /// A delta of tool call arguments (raw JSON string fragment).
    ToolCallDelta {
        index: usize,
        arguments_delta: String,
    },

    /// A tool call is complete and ready to execute.
    ToolCallEnd { index: usize, call: ToolCallPart },

    /// Generation is complete.
    Finish {
        reason: FinishReason,
        usage: Option<Usage>,
    },

    /// An error occurred mid-stream.
    Error(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    ToolCalls,
    Length,
    ContentFilter,
    Cancelled,
    Other(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached_tokens: Option<u32>,
}

impl Usage {
    /// Fold another turn's usage into a running total.
    pub fn accumulate(&mut self, other: &Usage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.reasoning_tokens = match (self.reasoning_tokens, other.reasoning_tokens) {
            (Some(a), Some(b)) => Some(a + b),
            (a, b) => a.or(b),
        };
        self.cached_tokens = match (self.cached_tokens, other.cached_tokens) {
            (Some(a), Some(b)) => Some(a + b),
            (a, b) => a.or(b),
        };
    }
}
