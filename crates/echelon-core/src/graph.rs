//! The supply-chain graph and its low-level-code ranking.
//!
//! Nodes are kept in insertion order. End items rank at LLC 0 and every
//! other node ranks one past its deepest successor.

use crate::id::{ItemKey, NodeId, Quantity, item_key};
use crate::node::Node;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur while assembling or ranking the supply chain.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    #[error("duplicate node: {0}")]
    DuplicateNode(NodeId),
    #[error("unknown node: {0}")]
    UnknownNode(NodeId),
    #[error("edge {from} -> {to} is not listed on both of its nodes")]
    EdgeMismatch { from: NodeId, to: NodeId },
    #[error("cycle detected in supply chain")]
    CycleDetected,
}

// ---------------------------------------------------------------------------
// Edge
// ---------------------------------------------------------------------------

/// A directed link between two nodes.
///
/// One unit of `destination` requires `number` units of `source`. For a
/// distribution link `number` is 1.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub source: NodeId,
    pub destination: NodeId,
    pub number: Quantity,
}

impl Edge {
    pub fn new(source: impl Into<NodeId>, destination: impl Into<NodeId>, number: Quantity) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            number,
        }
    }
}

// ---------------------------------------------------------------------------
// SupplyChain
// ---------------------------------------------------------------------------

/// The node map and edge list of a supply chain, with cached low-level codes.
///
/// Nodes keep their insertion order; every iteration over nodes, including
/// [`SupplyChain::nodes_by_llc`], follows it.
#[derive(Debug, Default)]
pub struct SupplyChain {
    nodes: Vec<Node>,
    index: HashMap<NodeId, usize>,
    edges: Vec<Edge>,
    /// Highest LLC of the last ranking, `None` while unranked.
    max_llc: Option<u32>,
}

impl SupplyChain {
    /// Create an empty, unranked supply chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a supply chain from nodes and rank it.
    pub fn from_nodes(nodes: impl IntoIterator<Item = Node>) -> Result<Self, ChainError> {
        let mut chain = Self::new();
        for node in nodes {
            chain.add_node(node)?;
        }
        chain.compute_llc()?;
        Ok(chain)
    }

    /// Add a node. Invalidates the LLC ranking of every node.
    pub fn add_node(&mut self, node: Node) -> Result<(), ChainError> {
        if self.index.contains_key(node.id()) {
            return Err(ChainError::DuplicateNode(node.id().clone()));
        }
        self.index.insert(node.id().clone(), self.nodes.len());
        self.nodes.push(node);
        self.invalidate_llc();
        Ok(())
    }

    fn invalidate_llc(&mut self) {
        self.max_llc = None;
        for node in &mut self.nodes {
            node.set_llc(None);
        }
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    pub fn node<K: ItemKey + ?Sized>(&self, id: &K) -> Option<&Node> {
        self.index.get(item_key(id)).map(|&i| &self.nodes[i])
    }

    pub fn node_mut<K: ItemKey + ?Sized>(&mut self, id: &K) -> Option<&mut Node> {
        match self.index.get(item_key(id)) {
            Some(&i) => Some(&mut self.nodes[i]),
            None => None,
        }
    }

    pub fn contains_node<K: ItemKey + ?Sized>(&self, id: &K) -> bool {
        self.index.contains_key(item_key(id))
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// Mutable nodes in insertion order.
    pub fn nodes_mut(&mut self) -> &mut [Node] {
        &mut self.nodes
    }

    /// Every edge of the chain, each once, in the order first seen.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    // -----------------------------------------------------------------------
    // Low-level codes
    // -----------------------------------------------------------------------

    /// Validate the edge list and assign a low-level code to every node.
    ///
    /// A node without successors has LLC 0; any other node has
    /// `1 + max(LLC of its successors)`, i.e. its longest distance to an
    /// end item. Codes are found by repeated relaxation; a chain that has
    /// not settled after one pass per node contains a cycle.
    pub fn compute_llc(&mut self) -> Result<(), ChainError> {
        self.invalidate_llc();
        self.collect_edges()?;

        let successor_indices: Vec<Vec<usize>> = self
            .nodes
            .iter()
            .map(|node| {
                node.successors()
                    .iter()
                    .filter_map(|e| self.index.get(&e.destination).copied())
                    .collect()
            })
            .collect();

        let mut llc = vec![0u32; self.nodes.len()];
        let mut settled = false;
        for _ in 0..=self.nodes.len() {
            let mut changed = false;
            for (i, successors) in successor_indices.iter().enumerate() {
                let rank = successors
                    .iter()
                    .map(|&s| llc[s] + 1)
                    .max()
                    .unwrap_or(0);
                if rank != llc[i] {
                    llc[i] = rank;
                    changed = true;
                }
            }
            if !changed {
                settled = true;
                break;
            }
        }
        if !settled {
            return Err(ChainError::CycleDetected);
        }

        for (node, &rank) in self.nodes.iter_mut().zip(&llc) {
            node.set_llc(Some(rank));
        }
        self.max_llc = Some(llc.iter().copied().max().unwrap_or(0));
        Ok(())
    }

    /// Rebuild the edge list and check both ends of every edge agree.
    fn collect_edges(&mut self) -> Result<(), ChainError> {
        let mut edges: Vec<Edge> = Vec::new();
        for node in &self.nodes {
            for edge in node.predecessors().iter().chain(node.successors()) {
                let (other, listed) = if edge.destination == *node.id() {
                    let other = self.node(&edge.source);
                    (other, other.is_some_and(|n| n.successors().contains(edge)))
                } else {
                    let other = self.node(&edge.destination);
                    (other, other.is_some_and(|n| n.predecessors().contains(edge)))
                };
                if other.is_none() {
                    let missing = if edge.destination == *node.id() {
                        &edge.source
                    } else {
                        &edge.destination
                    };
                    return Err(ChainError::UnknownNode(missing.clone()));
                }
                if !listed {
                    return Err(ChainError::EdgeMismatch {
                        from: edge.source.clone(),
                        to: edge.destination.clone(),
                    });
                }
                if !edges.contains(edge) {
                    edges.push(edge.clone());
                }
            }
        }
        self.edges = edges;
        Ok(())
    }

    /// Whether every node carries a low-level code.
    pub fn is_ranked(&self) -> bool {
        self.max_llc.is_some() && self.nodes.iter().all(|n| n.llc().is_some())
    }

    /// The first node lacking a low-level code, if any.
    pub fn first_unranked(&self) -> Option<&NodeId> {
        self.nodes.iter().find(|n| n.llc().is_none()).map(|n| n.id())
    }

    /// Highest low-level code, `None` while unranked.
    pub fn max_llc(&self) -> Option<u32> {
        self.max_llc
    }

    /// Nodes with the given low-level code, in insertion order.
    pub fn nodes_by_llc(&self, llc: u32) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(move |n| n.llc() == Some(llc))
    }
}
