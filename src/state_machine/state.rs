//! Dialogue state types

use crate::graph::{Choice, ConversationGraph};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Latency between a visitor choice and the assistant's reply
pub const DEFAULT_REPLY_DELAY: Duration = Duration::from_millis(1000);

/// Who said a transcript entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    Assistant,
    Visitor,
}

/// One line of the transcript. Never mutated after it is appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub speaker: Speaker,
    pub text: String,
    pub sequence: usize,
}

/// Reply waiting on the typing delay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingReply {
    /// Matches the `ReplyDue` event that completes this reply
    pub reply_id: String,
    /// Node the conversation moves to when the reply lands
    pub target: String,
}

/// Dialogue state
///
/// `current_node` always references a node of the graph the state was built
/// from. The session is composing exactly when a reply is pending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueState {
    pub current_node: String,
    pub transcript: Vec<TranscriptEntry>,
    pub pending: Option<PendingReply>,
}

impl DialogueState {
    /// Fresh state positioned at the start node, greeting already in the transcript
    pub fn initial(graph: &ConversationGraph) -> Self {
        let start = graph.start_node();
        Self {
            current_node: start.id.clone(),
            transcript: vec![TranscriptEntry {
                speaker: Speaker::Assistant,
                text: start.message.clone(),
                sequence: 0,
            }],
            pending: None,
        }
    }

    pub fn is_composing(&self) -> bool {
        self.pending.is_some()
    }

    /// Choices currently offered. Empty while composing.
    pub fn available_choices<'g>(&self, graph: &'g ConversationGraph) -> &'g [Choice] {
        if self.is_composing() {
            return &[];
        }
        graph
            .get(&self.current_node)
            .map(|node| node.choices.as_slice())
            .unwrap_or_default()
    }

    /// Build the next entry without appending it
    pub(crate) fn next_entry(&self, speaker: Speaker, text: impl Into<String>) -> TranscriptEntry {
        TranscriptEntry {
            speaker,
            text: text.into(),
            sequence: self.transcript.len(),
        }
    }
}

/// Context for a dialogue (swapped wholesale on locale change)
#[derive(Debug, Clone)]
pub struct DialogueContext {
    pub graph: Arc<ConversationGraph>,
    pub reply_delay: Duration,
}

impl DialogueContext {
    pub fn new(graph: Arc<ConversationGraph>) -> Self {
        Self {
            graph,
            reply_delay: DEFAULT_REPLY_DELAY,
        }
    }

    pub fn with_reply_delay(mut self, delay: Duration) -> Self {
        self.reply_delay = delay;
        self
    }
}
