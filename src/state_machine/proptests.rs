//! Property-based tests for the state machine
//!
//! These tests verify key invariants hold across all possible inputs.

use super::transition::*;
use super::*;
use crate::graph::proptests::arb_valid_definition;
use crate::graph::ConversationGraph;
use proptest::prelude::*;
use std::sync::Arc;

// ============================================================================
// Test Helpers
// ============================================================================

fn context_for(def: crate::graph::GraphDefinition) -> DialogueContext {
    DialogueContext::new(Arc::new(ConversationGraph::load(def).unwrap()))
}

/// Visitor action replayed against a session
#[derive(Debug, Clone)]
enum Action {
    /// Pick a choice; the index is reduced modulo the offered count
    Pick(prop::sample::Index),
    /// Pick an index past the end of the offered choices
    PickOutOfRange(usize),
    Reset,
}

fn arb_action() -> impl Strategy<Value = Action> {
    prop_oneof![
        6 => any::<prop::sample::Index>().prop_map(Action::Pick),
        1 => (0usize..4).prop_map(Action::PickOutOfRange),
        1 => Just(Action::Reset),
    ]
}

/// Apply a full select-then-reply cycle, or an error that must leave state untouched
fn apply(state: DialogueState, ctx: &DialogueContext, action: &Action, step: usize) -> DialogueState {
    let offered = state.available_choices(&ctx.graph).len();
    match action {
        Action::Pick(pick) if offered > 0 => {
            let reply_id = format!("reply-{step}");
            let selected = transition(
                &state,
                ctx,
                Event::ChoiceSelected {
                    index: pick.index(offered),
                    reply_id: reply_id.clone(),
                },
            )
            .unwrap();
            transition(&selected.new_state, ctx, Event::ReplyDue { reply_id })
                .unwrap()
                .new_state
        }
        Action::Pick(_) => state,
        Action::PickOutOfRange(extra) => {
            let result = transition(
                &state,
                ctx,
                Event::ChoiceSelected {
                    index: offered + extra,
                    reply_id: format!("reply-{step}"),
                },
            );
            assert!(matches!(result, Err(TransitionError::InvalidChoice { .. })));
            state
        }
        Action::Reset => transition(&state, ctx, Event::Reset).unwrap().new_state,
    }
}

fn walk(ctx: &DialogueContext, actions: &[Action]) -> DialogueState {
    actions
        .iter()
        .enumerate()
        .fold(DialogueState::initial(&ctx.graph), |state, (step, action)| {
            apply(state, ctx, action, step)
        })
}

fn sequences_are_contiguous(state: &DialogueState) -> bool {
    state
        .transcript
        .iter()
        .enumerate()
        .all(|(i, entry)| entry.sequence == i)
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #[test]
    fn prop_completed_choice_adds_exactly_two(
        def in arb_valid_definition(),
        actions in proptest::collection::vec(arb_action(), 0..12),
        pick in any::<prop::sample::Index>(),
    ) {
        let ctx = context_for(def);
        let state = walk(&ctx, &actions);
        let offered = state.available_choices(&ctx.graph).len();
        prop_assume!(offered > 0);

        let before = state.transcript.len();
        let selected = transition(
            &state,
            &ctx,
            Event::ChoiceSelected { index: pick.index(offered), reply_id: "final".into() },
        ).unwrap();
        prop_assert_eq!(selected.new_state.transcript.len(), before + 1);
        prop_assert!(selected.new_state.is_composing());

        let replied = transition(&selected.new_state, &ctx, Event::ReplyDue { reply_id: "final".into() })
            .unwrap();
        prop_assert_eq!(replied.new_state.transcript.len(), before + 2);
        prop_assert!(!replied.new_state.is_composing());
        prop_assert_eq!(replied.new_state.transcript[before].speaker, Speaker::Visitor);
        prop_assert_eq!(replied.new_state.transcript[before + 1].speaker, Speaker::Assistant);
    }

    #[test]
    fn prop_reset_always_yields_greeting_only(
        def in arb_valid_definition(),
        actions in proptest::collection::vec(arb_action(), 0..16),
    ) {
        let ctx = context_for(def);
        let state = walk(&ctx, &actions);
        let reset = transition(&state, &ctx, Event::Reset).unwrap().new_state;

        prop_assert_eq!(reset.transcript.len(), 1);
        prop_assert_eq!(&reset.current_node, ctx.graph.start());
        prop_assert_eq!(&reset.transcript[0].text, &ctx.graph.start_node().message);
    }

    #[test]
    fn prop_reset_is_idempotent(
        def in arb_valid_definition(),
        actions in proptest::collection::vec(arb_action(), 0..16),
    ) {
        let ctx = context_for(def);
        let state = walk(&ctx, &actions);
        let once = transition(&state, &ctx, Event::Reset).unwrap().new_state;
        let twice = transition(&once, &ctx, Event::Reset).unwrap().new_state;
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn prop_reset_while_composing_leaves_no_trace(
        def in arb_valid_definition(),
        actions in proptest::collection::vec(arb_action(), 0..8),
        pick in any::<prop::sample::Index>(),
    ) {
        let ctx = context_for(def);
        let state = walk(&ctx, &actions);
        let offered = state.available_choices(&ctx.graph).len();
        prop_assume!(offered > 0);

        let composing = transition(
            &state,
            &ctx,
            Event::ChoiceSelected { index: pick.index(offered), reply_id: "pending".into() },
        ).unwrap().new_state;

        let reset = transition(&composing, &ctx, Event::Reset).unwrap();
        prop_assert!(reset.effects.contains(&Effect::CancelReply));

        // A timer that slipped through cancellation is rejected
        let late = transition(&reset.new_state, &ctx, Event::ReplyDue { reply_id: "pending".into() });
        let is_stale = matches!(late, Err(TransitionError::StaleReply { .. }));
        prop_assert!(is_stale);
        prop_assert_eq!(reset.new_state, DialogueState::initial(&ctx.graph));
    }

    #[test]
    fn prop_state_invariants_hold(
        def in arb_valid_definition(),
        actions in proptest::collection::vec(arb_action(), 0..24),
    ) {
        let ctx = context_for(def);
        let state = walk(&ctx, &actions);

        prop_assert!(ctx.graph.get(&state.current_node).is_ok());
        prop_assert!(sequences_are_contiguous(&state));
        prop_assert_eq!(state.transcript[0].speaker, Speaker::Assistant);
        prop_assert!(state.transcript.len() % 2 == 1);
    }

    #[test]
    fn prop_errors_do_not_mutate(
        def in arb_valid_definition(),
        actions in proptest::collection::vec(arb_action(), 0..8),
        extra in 0usize..5,
    ) {
        let ctx = context_for(def);
        let state = walk(&ctx, &actions);
        let snapshot = state.clone();
        let offered = state.available_choices(&ctx.graph).len();

        let result = transition(
            &state,
            &ctx,
            Event::ChoiceSelected { index: offered + extra, reply_id: "bad".into() },
        );
        prop_assert!(result.is_err());
        prop_assert_eq!(state, snapshot);
    }
}
