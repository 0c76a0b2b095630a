//! Events that can occur in a dialogue

use crate::graph::ConversationGraph;
use crate::locale::Locale;
use std::sync::Arc;

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // Visitor events
    ChoiceSelected {
        index: usize,
        /// Generated by the caller so the transition stays pure
        reply_id: String,
    },
    Reset,

    // Timer events
    ReplyDue {
        reply_id: String,
    },

    // Locale events. The runtime swaps the context graph, then applies `Reset`.
    LocaleChanged {
        locale: Locale,
        graph: Arc<ConversationGraph>,
    },
}

impl Event {
    pub fn choice(index: usize) -> Self {
        Event::ChoiceSelected {
            index,
            reply_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Short name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Event::ChoiceSelected { .. } => "choice_selected",
            Event::Reset => "reset",
            Event::ReplyDue { .. } => "reply_due",
            Event::LocaleChanged { .. } => "locale_changed",
        }
    }
}
