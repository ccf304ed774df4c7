//! Network nodes and parent-configuration indexing.
//!
//! A parent configuration is one joint assignment of a node's parents,
//! numbered in mixed radix: the first parent is the least significant
//! digit. Indexing is a pure function of the node structure and a full
//! variable assignment, so concurrent scans never share lookup state.

use serde::{Deserialize, Serialize};

/// Whether a variable may change value within a trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Value fixed for a whole trajectory (e.g. the class).
    Static,
    /// Continuous-time Markov process conditioned on its parents.
    Dynamic,
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeKind::Static => write!(f, "static"),
            NodeKind::Dynamic => write!(f, "dynamic"),
        }
    }
}

/// A discrete variable of the network together with its parent set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    name: String,
    states: Vec<String>,
    kind: NodeKind,
    #[serde(default)]
    parents: Vec<usize>,
    /// Re-derived from the parents whenever a model is built.
    #[serde(default)]
    parent_cardinalities: Vec<usize>,
}

impl Node {
    /// Create a parentless node with named states.
    pub fn new(name: impl Into<String>, states: Vec<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            states,
            kind,
            parents: Vec::new(),
            parent_cardinalities: Vec::new(),
        }
    }

    /// Create a parentless node whose states are named `0..cardinality`.
    pub fn with_cardinality(name: impl Into<String>, cardinality: usize, kind: NodeKind) -> Self {
        let states = (0..cardinality).map(|s| s.to_string()).collect();
        Self::new(name, states, kind)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn states(&self) -> &[String] {
        &self.states
    }

    /// Number of states.
    pub fn cardinality(&self) -> usize {
        self.states.len()
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn is_static(&self) -> bool {
        self.kind == NodeKind::Static
    }

    /// Parent node indices, in configuration-digit order.
    pub fn parents(&self) -> &[usize] {
        &self.parents
    }

    /// State counts of the parents, in parent order.
    pub fn parent_cardinalities(&self) -> &[usize] {
        &self.parent_cardinalities
    }

    pub fn has_parent(&self, node: usize) -> bool {
        self.parents.contains(&node)
    }

    /// Position of `node` in this node's parent list.
    pub fn parent_position(&self, node: usize) -> Option<usize> {
        self.parents.iter().position(|&p| p == node)
    }

    /// Product of the parents' state-space sizes (1 without parents).
    pub fn parent_configuration_count(&self) -> usize {
        self.parent_cardinalities.iter().product()
    }

    /// Index of the parent configuration selected by a full assignment.
    ///
    /// `assignment` is indexed by node; only the parents' entries are read.
    pub fn parent_configuration_index(&self, assignment: &[usize]) -> usize {
        let mut index = 0;
        let mut stride = 1;
        for (&parent, &cardinality) in self.parents.iter().zip(self.parent_cardinalities.iter()) {
            index += assignment[parent] * stride;
            stride *= cardinality;
        }
        index
    }

    /// Encode parent states (in parent order) as a configuration index.
    pub fn encode_parent_states(&self, parent_states: &[usize]) -> usize {
        let mut index = 0;
        let mut stride = 1;
        for (&state, &cardinality) in parent_states.iter().zip(self.parent_cardinalities.iter()) {
            index += state * stride;
            stride *= cardinality;
        }
        index
    }

    /// Decode a configuration index into parent states (in parent order).
    pub fn parent_states(&self, configuration: usize) -> Vec<usize> {
        let mut rest = configuration;
        self.parent_cardinalities
            .iter()
            .map(|&cardinality| {
                let state = rest % cardinality;
                rest /= cardinality;
                state
            })
            .collect()
    }

    pub(crate) fn set_parents(&mut self, parents: Vec<usize>, cardinalities: Vec<usize>) {
        debug_assert_eq!(parents.len(), cardinalities.len());
        self.parents = parents;
        self.parent_cardinalities = cardinalities;
    }
}
