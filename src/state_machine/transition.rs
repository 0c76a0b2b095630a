//! Pure state transition function

use super::{DialogueContext, DialogueState, Effect, Event, PendingReply, Speaker};
use crate::graph::{ConversationGraph, GraphError};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: DialogueState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: DialogueState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition
///
/// On error the caller keeps its previous state: nothing is partially applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("choice {index} is not offered (node has {available} choices)")]
    InvalidChoice { index: usize, available: usize },
    #[error("a reply is still being composed")]
    Composing,
    #[error("reply {reply_id} no longer belongs to this session")]
    StaleReply { reply_id: String },
    #[error(transparent)]
    Graph(#[from] GraphError),
}

impl TransitionError {
    /// Contract violations between the presentation layer and the engine
    pub fn is_programming_error(&self) -> bool {
        matches!(self, Self::InvalidChoice { .. } | Self::Graph(_))
    }
}

/// Pure transition function
///
/// Given the same inputs it always produces the same outputs, with no I/O.
pub fn transition(
    state: &DialogueState,
    context: &DialogueContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match event {
        // Idle + ChoiceSelected -> Composing
        Event::ChoiceSelected { index, reply_id } => {
            if state.is_composing() {
                return Err(TransitionError::Composing);
            }
            let node = context.graph.get(&state.current_node)?;
            let choice = node
                .choices
                .get(index)
                .ok_or(TransitionError::InvalidChoice {
                    index,
                    available: node.choices.len(),
                })?;

            let entry = state.next_entry(Speaker::Visitor, &choice.label);
            let mut new_state = state.clone();
            new_state.transcript.push(entry.clone());
            new_state.pending = Some(PendingReply {
                reply_id: reply_id.clone(),
                target: choice.target.clone(),
            });

            Ok(TransitionResult::new(new_state)
                .with_effect(Effect::publish_entry(entry))
                .with_effect(Effect::PublishState)
                .with_effect(Effect::schedule_reply(reply_id, context.reply_delay)))
        }

        // Composing + matching ReplyDue -> Idle at the target node
        Event::ReplyDue { reply_id } => {
            let pending = match &state.pending {
                Some(pending) if pending.reply_id == reply_id => pending,
                _ => return Err(TransitionError::StaleReply { reply_id }),
            };
            let target = context.graph.get(&pending.target)?;

            let entry = state.next_entry(Speaker::Assistant, &target.message);
            let mut new_state = state.clone();
            new_state.transcript.push(entry.clone());
            new_state.current_node.clone_from(&target.id);
            new_state.pending = None;

            Ok(TransitionResult::new(new_state)
                .with_effect(Effect::publish_entry(entry))
                .with_effect(Effect::PublishState))
        }

        // Any + Reset -> fresh session against the current graph
        Event::Reset => Ok(restart(state, &context.graph)),

        // Any + LocaleChanged -> fresh session against the new graph
        Event::LocaleChanged { graph, .. } => Ok(restart(state, &graph)),
    }
}

fn restart(state: &DialogueState, graph: &ConversationGraph) -> TransitionResult {
    let cancel = state.is_composing().then_some(Effect::CancelReply);
    TransitionResult::new(DialogueState::initial(graph))
        .with_effects(cancel)
        .with_effect(Effect::PublishReset)
}
