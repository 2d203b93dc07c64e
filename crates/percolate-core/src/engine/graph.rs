//! # Probabilistic Directed Graph
//!
//! This module implements the core graph data structure: a directed adjacency
//! store whose edges are independent Bernoulli random variables.
//!
//! ## Key components
//!
//! - **NodeId / EdgeId**: opaque, case-sensitive string identifiers backed by
//!   `Arc<str>` for cheap cloning (reference count increment, not allocation)
//! - **PropValue**: typed property values (int, float, string, bool)
//! - **ProbGraph**: the adjacency store with O(1) edge lookup both by id and
//!   by ordered endpoint pair
//! - **Condition**: forced-active / forced-inactive node and edge sets used
//!   for conditioned queries
//!
//! ## Design
//!
//! The adjacency maps are kept as `NodeId → NodeId → EdgeId`, indirecting
//! through the edge map instead of sharing edge pointers across maps. This
//! eliminates aliasing concerns on clone while preserving the invariants:
//!
//! - every id in the adjacency inner maps is a key of the node map;
//! - `out[from][to]`, `in[to][from]`, and the edge map agree on every edge;
//! - edge probabilities stay within `[0, 1]`;
//! - removing a node atomically removes every incident edge.
//!
//! At most one edge exists per ordered `(from, to)` pair. Self-loops are
//! permitted.

use std::fmt;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::engine::errors::EngineError;

/// A unique identifier for a node.
///
/// Case-sensitive. The query language only produces identifiers matching
/// `[A-Za-z_][A-Za-z0-9_]*`, but the store itself imposes no restriction, so
/// deserialized graphs may carry Unicode ids or ids with spaces.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(Arc<str>);

/// A unique identifier for an edge. Same rules as [`NodeId`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(Arc<str>);

macro_rules! string_id {
    ($name:ident) => {
        impl $name {
            pub fn new(id: impl Into<Arc<str>>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(Arc::from(id))
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(Arc::from(id))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.0)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                String::deserialize(deserializer).map(Self::from)
            }
        }
    };
}

string_id!(NodeId);
string_id!(EdgeId);

/// A typed property value: exactly four variants.
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
}

/// Property mapping attached to nodes and edges. Keys are unique; insertion
/// order is irrelevant.
pub type PropMap = FxHashMap<String, PropValue>;

/// A node with its property mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub props: PropMap,
}

/// A directed edge whose presence in a sampled world is an independent
/// Bernoulli trial with parameter `probability`.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub id: EdgeId,
    pub from: NodeId,
    pub to: NodeId,
    pub probability: f64,
    pub props: PropMap,
}

/// An ordered node sequence with its joint probability: the product of the
/// probabilities of the traversed edges, or 1.0 for a single-node path.
///
/// A zero-length node sequence with probability 0 is the "no path" sentinel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Path {
    #[serde(rename = "NodeIDs")]
    pub nodes: Vec<NodeId>,
    #[serde(rename = "Probability")]
    pub probability: f64,
}

impl Path {
    /// The "no path" sentinel.
    pub fn empty() -> Self {
        Self {
            nodes: Vec::new(),
            probability: 0.0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, node) in self.nodes.iter().enumerate() {
            if i > 0 {
                f.write_str(" -> ")?;
            }
            f.write_str(node.as_str())?;
        }
        Ok(())
    }
}

/// Conditioning clauses for a query: four disjoint sets.
///
/// Forced-inactive nodes and edges are removed from the conditioned clone;
/// forced-active edges have their probability set to 1.0 in the clone so the
/// inference kernels stay oblivious to conditioning; forced-active nodes are
/// recorded but have no structural effect.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Condition {
    pub forced_active_edges: Vec<Edge>,
    pub forced_inactive_edges: Vec<Edge>,
    pub forced_active_nodes: Vec<NodeId>,
    pub forced_inactive_nodes: Vec<NodeId>,
}

/// A probabilistic directed adjacency-list graph.
///
/// Maintains a node map, an edge map, and both adjacency directions with the
/// destination (resp. source) as the inner key, which implies at most one
/// edge per ordered `(from, to)` pair. All lookups are O(1) in the maps.
///
/// Cloning is deep: node and edge property maps are copied, so a clone can be
/// mutated freely without perturbing the original. This is what makes the
/// session model and conditioned queries safe.
#[derive(Debug, Clone, Default)]
pub struct ProbGraph {
    nodes: FxHashMap<NodeId, Node>,
    edges: FxHashMap<EdgeId, Edge>,
    out: FxHashMap<NodeId, FxHashMap<NodeId, EdgeId>>,
    inc: FxHashMap<NodeId, FxHashMap<NodeId, EdgeId>>,
}

impl ProbGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a new node with a defensive copy of `props`.
    ///
    /// Fails with `NodeAlreadyExists` if the id is taken.
    pub fn add_node(&mut self, id: NodeId, props: PropMap) -> Result<(), EngineError> {
        if self.contains_node(&id) {
            return Err(EngineError::NodeAlreadyExists(id));
        }
        self.out.insert(id.clone(), FxHashMap::default());
        self.inc.insert(id.clone(), FxHashMap::default());
        self.nodes.insert(id.clone(), Node { id, props });
        Ok(())
    }

    /// Removes a node and every incident edge, updating both adjacency
    /// directions and the edge map atomically.
    ///
    /// Fails with `NodeDoesNotExist` if the id is absent. For a self-loop the
    /// edge id is deleted from the edge map twice, which is idempotent under
    /// map-delete semantics.
    pub fn remove_node(&mut self, id: &NodeId) -> Result<(), EngineError> {
        if !self.contains_node(id) {
            return Err(EngineError::NodeDoesNotExist(id.clone()));
        }

        if let Some(outgoing) = self.out.remove(id) {
            for (to, edge_id) in outgoing {
                self.edges.remove(&edge_id);
                if let Some(inner) = self.inc.get_mut(&to) {
                    inner.remove(id);
                }
            }
        }
        if let Some(incoming) = self.inc.remove(id) {
            for (from, edge_id) in incoming {
                self.edges.remove(&edge_id);
                if let Some(inner) = self.out.get_mut(&from) {
                    inner.remove(id);
                }
            }
        }
        self.nodes.remove(id);
        Ok(())
    }

    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Iterates over all nodes. Enumeration order is unspecified.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Inserts a new edge with a defensive copy of `props`.
    ///
    /// Both endpoints must exist and `probability` must lie in `[0, 1]`.
    /// Self-loops are permitted.
    pub fn add_edge(
        &mut self,
        edge_id: EdgeId,
        from: NodeId,
        to: NodeId,
        probability: f64,
        props: PropMap,
    ) -> Result<(), EngineError> {
        if self.contains_edge_by_id(&edge_id) {
            return Err(EngineError::EdgeAlreadyExists(edge_id));
        }
        if !self.contains_node(&from) {
            return Err(EngineError::NodeDoesNotExist(from));
        }
        if !self.contains_node(&to) {
            return Err(EngineError::NodeDoesNotExist(to));
        }
        if !(0.0..=1.0).contains(&probability) {
            return Err(EngineError::InvalidEdgeProbability(probability));
        }

        if let Some(inner) = self.out.get_mut(&from) {
            inner.insert(to.clone(), edge_id.clone());
        }
        if let Some(inner) = self.inc.get_mut(&to) {
            inner.insert(from.clone(), edge_id.clone());
        }
        self.edges.insert(
            edge_id.clone(),
            Edge {
                id: edge_id,
                from,
                to,
                probability,
                props,
            },
        );
        Ok(())
    }

    /// Removes the edge between an ordered node pair.
    pub fn remove_edge(&mut self, from: &NodeId, to: &NodeId) -> Result<(), EngineError> {
        if !self.contains_node(from) {
            return Err(EngineError::NodeDoesNotExist(from.clone()));
        }
        if !self.contains_node(to) {
            return Err(EngineError::NodeDoesNotExist(to.clone()));
        }
        let edge_id = self
            .out
            .get(from)
            .and_then(|inner| inner.get(to))
            .cloned()
            .ok_or_else(|| EngineError::EdgeDoesNotExist {
                from: from.clone(),
                to: to.clone(),
            })?;

        if let Some(inner) = self.out.get_mut(from) {
            inner.remove(to);
        }
        if let Some(inner) = self.inc.get_mut(to) {
            inner.remove(from);
        }
        self.edges.remove(&edge_id);
        Ok(())
    }

    /// Removes an edge by id.
    pub fn remove_edge_by_id(&mut self, edge_id: &EdgeId) -> Result<(), EngineError> {
        let (from, to) = match self.edges.get(edge_id) {
            Some(edge) => (edge.from.clone(), edge.to.clone()),
            None => return Err(EngineError::EdgeDoesNotExistById(edge_id.clone())),
        };
        if let Some(inner) = self.out.get_mut(&from) {
            inner.remove(&to);
        }
        if let Some(inner) = self.inc.get_mut(&to) {
            inner.remove(&from);
        }
        self.edges.remove(edge_id);
        Ok(())
    }

    pub fn contains_edge(&self, from: &NodeId, to: &NodeId) -> bool {
        self.out
            .get(from)
            .is_some_and(|inner| inner.contains_key(to))
    }

    pub fn contains_edge_by_id(&self, edge_id: &EdgeId) -> bool {
        self.edges.contains_key(edge_id)
    }

    /// Looks up the edge between an ordered node pair.
    pub fn edge(&self, from: &NodeId, to: &NodeId) -> Result<&Edge, EngineError> {
        if !self.contains_node(from) {
            return Err(EngineError::NodeDoesNotExist(from.clone()));
        }
        if !self.contains_node(to) {
            return Err(EngineError::NodeDoesNotExist(to.clone()));
        }
        self.out
            .get(from)
            .and_then(|inner| inner.get(to))
            .and_then(|id| self.edges.get(id))
            .ok_or_else(|| EngineError::EdgeDoesNotExist {
                from: from.clone(),
                to: to.clone(),
            })
    }

    /// Looks up an edge by id.
    pub fn edge_by_id(&self, edge_id: &EdgeId) -> Result<&Edge, EngineError> {
        self.edges
            .get(edge_id)
            .ok_or_else(|| EngineError::EdgeDoesNotExistById(edge_id.clone()))
    }

    /// Iterates over all edges. Enumeration order is unspecified.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Returns the edges leaving `id`. Enumeration order is unspecified.
    pub fn outgoing_edges(&self, id: &NodeId) -> Result<Vec<&Edge>, EngineError> {
        let inner = self
            .out
            .get(id)
            .ok_or_else(|| EngineError::NodeDoesNotExist(id.clone()))?;
        Ok(inner
            .values()
            .filter_map(|edge_id| self.edges.get(edge_id))
            .collect())
    }

    /// Returns the edges arriving at `id`. Enumeration order is unspecified.
    pub fn incoming_edges(&self, id: &NodeId) -> Result<Vec<&Edge>, EngineError> {
        let inner = self
            .inc
            .get(id)
            .ok_or_else(|| EngineError::NodeDoesNotExist(id.clone()))?;
        Ok(inner
            .values()
            .filter_map(|edge_id| self.edges.get(edge_id))
            .collect())
    }

    /// Applies a condition to a deep clone of this graph; the original is
    /// never mutated.
    ///
    /// 1. Forced-inactive nodes must exist in the clone and are removed with
    ///    all incident edges.
    /// 2. Forced-inactive edges must have both endpoints present (otherwise
    ///    `InvalidCondition`); the edge itself is removed if still present
    ///    and silently skipped if a node removal already took it.
    /// 3. Forced-active edges still present in the clone get probability 1.0.
    /// 4. Forced-active nodes are recorded but have no structural effect.
    pub fn apply_condition(&self, condition: &Condition) -> Result<ProbGraph, EngineError> {
        let mut clone = self.clone();

        let mut seen: FxHashSet<&NodeId> = FxHashSet::default();
        for id in &condition.forced_inactive_nodes {
            if !seen.insert(id) {
                continue;
            }
            if !clone.contains_node(id) {
                return Err(EngineError::InvalidCondition(format!(
                    "node {id} from condition does not exist in graph"
                )));
            }
            clone.remove_node(id)?;
        }

        for edge in &condition.forced_inactive_edges {
            if !clone.contains_node(&edge.from) || !clone.contains_node(&edge.to) {
                return Err(EngineError::InvalidCondition(format!(
                    "edge {} from condition does not exist in graph",
                    edge.id
                )));
            }
            if clone.contains_edge(&edge.from, &edge.to) {
                clone.remove_edge(&edge.from, &edge.to)?;
            }
        }

        for edge in &condition.forced_active_edges {
            if let Some(e) = clone.edges.get_mut(&edge.id) {
                e.probability = 1.0;
            }
        }

        Ok(clone)
    }
}
