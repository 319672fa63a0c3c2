// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The wiring graph: inputs and processes as vertices, links as
//! edges.

use petgraph::algo::has_path_connecting;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;
use thiserror::Error;

/// Structural errors from graph mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// Input and process IDs share one namespace; each may appear
    /// once.
    #[error("node {0:?} already exists")]
    DuplicateNode(String),
    #[error("node {0:?} does not exist")]
    UnknownNode(String),
    /// The edge would make the graph cyclic.
    #[error("edge {from:?} -> {to:?} would introduce a cycle")]
    WouldCycle { from: String, to: String },
}

/// A directed acyclic graph over string IDs.
///
/// Mutation is serialized by the orchestrator's lock; fan-out reads
/// only need `&self`.
#[derive(Debug, Default)]
pub struct Dag {
    graph: DiGraph<String, ()>,
    nodes: HashMap<String, NodeIndex>,
}

impl Dag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a vertex for `id`.
    pub fn add_node(&mut self, id: &str) -> Result<(), GraphError> {
        if self.nodes.contains_key(id) {
            return Err(GraphError::DuplicateNode(id.to_string()));
        }

        let index = self.graph.add_node(id.to_string());
        self.nodes.insert(id.to_string(), index);

        Ok(())
    }

    /// Insert a directed edge `from -> to`.
    ///
    /// Fails when either endpoint is missing, or when `to` already
    /// reaches `from` (which covers self-edges).
    pub fn add_edge(&mut self, from: &str, to: &str) -> Result<(), GraphError> {
        let a = self.index(from)?;
        let b = self.index(to)?;

        if a == b || has_path_connecting(&self.graph, b, a, None) {
            return Err(GraphError::WouldCycle {
                from: from.to_string(),
                to: to.to_string(),
            });
        }

        self.graph.add_edge(a, b, ());

        Ok(())
    }

    /// Direct successors of `id`, in unspecified order.
    pub fn successors(&self, id: &str) -> Result<Vec<String>, GraphError> {
        let index = self.index(id)?;

        Ok(self
            .graph
            .neighbors(index)
            .map(|n| self.graph[n].clone())
            .collect())
    }

    /// Whether a vertex for `id` exists.
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    fn index(&self, id: &str) -> Result<NodeIndex, GraphError> {
        self.nodes
            .get(id)
            .copied()
            .ok_or_else(|| GraphError::UnknownNode(id.to_string()))
    }
}

#[cfg(test)]
#[path = "graph_tests.rs"]
mod graph_tests;
