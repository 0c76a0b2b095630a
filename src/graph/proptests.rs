//! Property-based tests for graph validation

use super::*;
use proptest::prelude::*;

/// Graph whose choices only target existing nodes
pub(crate) fn arb_valid_definition() -> impl Strategy<Value = GraphDefinition> {
    (1usize..8)
        .prop_flat_map(|size| {
            let choices = proptest::collection::vec(
                proptest::collection::vec(("[A-Za-z ?]{1,12}", 0..size), 0..4),
                size,
            );
            (Just(size), 0..size, choices)
        })
        .prop_map(|(size, start, choices)| {
            let nodes = (0..size)
                .zip(choices)
                .map(|(i, picks)| {
                    Node::new(
                        format!("n{i}"),
                        format!("message {i}"),
                        picks
                            .into_iter()
                            .map(|(label, target)| Choice::new(label, format!("n{target}")))
                            .collect(),
                    )
                })
                .collect();
            GraphDefinition {
                start: format!("n{start}"),
                nodes,
            }
        })
}

proptest! {
    #[test]
    fn prop_valid_graphs_load(def in arb_valid_definition()) {
        let size = def.nodes.len();
        let graph = ConversationGraph::load(def).unwrap();
        prop_assert_eq!(graph.node_count(), size);
        prop_assert!(graph.get(graph.start()).is_ok());
    }

    #[test]
    fn prop_every_target_resolves(def in arb_valid_definition()) {
        let graph = ConversationGraph::load(def.clone()).unwrap();
        for node in &def.nodes {
            for choice in &node.choices {
                prop_assert!(graph.get(&choice.target).is_ok());
            }
        }
    }

    #[test]
    fn prop_injected_dangling_target_rejected(
        def in arb_valid_definition(),
        node_pick in any::<prop::sample::Index>(),
        label in "[A-Za-z]{1,10}",
    ) {
        let mut def = def;
        let victim = node_pick.index(def.nodes.len());
        def.nodes[victim].choices.push(Choice::new(label, "dangling-target"));

        match ConversationGraph::load(def) {
            Err(GraphError::InvalidGraph { defects }) => {
                let is_dangling = |d: &GraphDefect| {
                    matches!(d, GraphDefect::DanglingChoice { target, .. } if target == "dangling-target")
                };
                prop_assert!(defects.iter().any(is_dangling));
            }
            other => prop_assert!(false, "expected InvalidGraph, got {:?}", other),
        }
    }

    #[test]
    fn prop_unknown_start_rejected(def in arb_valid_definition()) {
        let mut def = def;
        def.start = "no-such-start".into();
        let rejected = matches!(
            ConversationGraph::load(def),
            Err(GraphError::InvalidGraph { .. })
        );
        prop_assert!(rejected);
    }
}
