//! Conversation graph
//!
//! An authored, validated lookup table from node id to node. Graphs are
//! loaded once per locale and shared read-only between sessions.

#[cfg(test)]
pub(crate) mod proptests;

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use thiserror::Error;

// ============================================================================
// Authored Definition
// ============================================================================

/// Graph as authored, before validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphDefinition {
    /// Id of the node the conversation opens with
    pub start: String,
    pub nodes: Vec<Node>,
}

/// One step of the dialogue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub message: String,
    /// Offered to the visitor in this order
    #[serde(default)]
    pub choices: Vec<Choice>,
}

/// A labeled transition to another node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub label: String,
    pub target: String,
}

impl Choice {
    pub fn new(label: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            target: target.into(),
        }
    }
}

impl Node {
    pub fn new(id: impl Into<String>, message: impl Into<String>, choices: Vec<Choice>) -> Self {
        Self {
            id: id.into(),
            message: message.into(),
            choices,
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// A single authoring defect found while loading a graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphDefect {
    EmptyGraph,
    EmptyNodeId { position: usize },
    DuplicateNodeId { id: String },
    MissingStart,
    UnknownStart { id: String },
    DanglingChoice {
        node: String,
        index: usize,
        label: String,
        target: String,
    },
}

impl fmt::Display for GraphDefect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphDefect::EmptyGraph => write!(f, "graph has no nodes"),
            GraphDefect::EmptyNodeId { position } => {
                write!(f, "node at position {position} has an empty id")
            }
            GraphDefect::DuplicateNodeId { id } => write!(f, "node id '{id}' is defined twice"),
            GraphDefect::MissingStart => write!(f, "no start node designated"),
            GraphDefect::UnknownStart { id } => write!(f, "start node '{id}' does not exist"),
            GraphDefect::DanglingChoice {
                node,
                index,
                label,
                target,
            } => write!(
                f,
                "choice {index} ('{label}') of node '{node}' targets missing node '{target}'"
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("invalid conversation graph: {}", join_defects(.defects))]
    InvalidGraph { defects: Vec<GraphDefect> },
    #[error("unknown node '{0}'")]
    UnknownNode(String),
}

fn join_defects(defects: &[GraphDefect]) -> String {
    defects
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// ============================================================================
// Validated Graph
// ============================================================================

/// Immutable, validated conversation graph
///
/// Every choice target resolves to a node of the same graph, so a session
/// that only follows its own transitions never reaches an unknown id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationGraph {
    start: String,
    nodes: HashMap<String, Node>,
    /// Authored order, for introspection
    order: Vec<String>,
}

impl ConversationGraph {
    /// Validate an authored definition.
    ///
    /// All defects are collected so an author sees every problem at once.
    pub fn load(definition: GraphDefinition) -> Result<Self, GraphError> {
        let GraphDefinition { start, nodes } = definition;
        let mut defects = Vec::new();

        if nodes.is_empty() {
            defects.push(GraphDefect::EmptyGraph);
        }

        let mut seen = HashSet::new();
        for (position, node) in nodes.iter().enumerate() {
            if node.id.trim().is_empty() {
                defects.push(GraphDefect::EmptyNodeId { position });
            } else if !seen.insert(node.id.as_str()) {
                defects.push(GraphDefect::DuplicateNodeId {
                    id: node.id.clone(),
                });
            }
        }

        if start.trim().is_empty() {
            defects.push(GraphDefect::MissingStart);
        } else if !seen.contains(start.as_str()) {
            defects.push(GraphDefect::UnknownStart { id: start.clone() });
        }

        for node in &nodes {
            for (index, choice) in node.choices.iter().enumerate() {
                if !seen.contains(choice.target.as_str()) {
                    defects.push(GraphDefect::DanglingChoice {
                        node: node.id.clone(),
                        index,
                        label: choice.label.clone(),
                        target: choice.target.clone(),
                    });
                }
            }
        }

        if !defects.is_empty() {
            return Err(GraphError::InvalidGraph { defects });
        }

        let order: Vec<String> = nodes.iter().map(|n| n.id.clone()).collect();
        let nodes: HashMap<String, Node> = nodes.into_iter().map(|n| (n.id.clone(), n)).collect();
        let graph = Self {
            start,
            nodes,
            order,
        };

        let unreachable = graph.unreachable_nodes();
        if !unreachable.is_empty() {
            tracing::warn!(?unreachable, "Conversation graph has unreachable nodes");
        }

        Ok(graph)
    }

    /// Parse and validate a JSON definition
    pub fn from_json(json: &str) -> Result<Self, GraphLoadError> {
        let definition: GraphDefinition = serde_json::from_str(json)?;
        Ok(Self::load(definition)?)
    }

    /// Look up a node by id
    pub fn get(&self, id: &str) -> Result<&Node, GraphError> {
        self.nodes
            .get(id)
            .ok_or_else(|| GraphError::UnknownNode(id.to_string()))
    }

    pub fn start(&self) -> &str {
        &self.start
    }

    pub fn start_node(&self) -> &Node {
        // load() guarantees the start id resolves
        &self.nodes[&self.start]
    }

    #[allow(dead_code)] // Introspection for content tooling
    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn node_count(&self) -> usize {
        self.order.len()
    }

    /// Nodes that cannot be reached from the start node
    pub fn unreachable_nodes(&self) -> Vec<String> {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue = VecDeque::from([self.start.as_str()]);
        while let Some(id) = queue.pop_front() {
            if !visited.insert(id) {
                continue;
            }
            if let Some(node) = self.nodes.get(id) {
                queue.extend(node.choices.iter().map(|c| c.target.as_str()));
            }
        }
        self.order
            .iter()
            .filter(|id| !visited.contains(id.as_str()))
            .cloned()
            .collect()
    }
}

/// Failure to turn authored JSON into a graph
#[derive(Debug, Error)]
pub enum GraphLoadError {
    #[error("malformed graph document: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Invalid(#[from] GraphError),
}

// ============================================================================
// Tests
// ============================================================================
