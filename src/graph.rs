// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::collections::hash_map::{Entry, HashMap};

use crate::osm::model::{Node, Way};
use crate::snap::{snap, SnapKey};
use crate::Coordinate;

/// Set of output [Nodes](Node), at most one per [SnapKey].
///
/// Node ids are assigned sequentially, starting at 1, in order of first insertion.
#[derive(Debug, Default, Clone)]
pub struct NodeTable {
    by_key: HashMap<SnapKey, i64>,
    nodes: Vec<Node>,
}

impl NodeTable {
    /// Returns the number of nodes in the table.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns all nodes, ordered by id.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Retrieves a [Node] with the provided id.
    pub fn get(&self, id: i64) -> Option<&Node> {
        usize::try_from(id - 1)
            .ok()
            .and_then(|idx| self.nodes.get(idx))
    }

    /// Retrieves the [Node] at the given snapping key.
    pub fn get_by_key(&self, key: SnapKey) -> Option<&Node> {
        self.by_key.get(&key).and_then(|&id| self.get(id))
    }

    /// Returns the id of the node at `position`'s snapping key,
    /// creating a new node at exactly `position` if there is none.
    ///
    /// `position` must be finite.
    pub fn get_or_insert(&mut self, position: Coordinate) -> i64 {
        match self.by_key.entry(snap(position)) {
            Entry::Occupied(e) => *e.get(),
            Entry::Vacant(e) => {
                let id = self.nodes.len() as i64 + 1;
                self.nodes.push(Node { id, position });
                e.insert(id);
                id
            }
        }
    }
}

/// The reduced road network: deduplicated nodes and the ways connecting them.
#[derive(Debug, Default, Clone)]
pub struct ReductionModel {
    pub(crate) nodes: NodeTable,
    pub(crate) ways: Vec<Way>,
}

impl ReductionModel {
    /// Returns all nodes, ordered by id.
    pub fn nodes(&self) -> &[Node] {
        self.nodes.nodes()
    }

    /// Returns all ways, ordered by id.
    pub fn ways(&self) -> &[Way] {
        &self.ways
    }

    /// Returns the node any coordinate within the snapping precision
    /// of `position` is merged into.
    pub fn node_at(&self, position: Coordinate) -> Option<&Node> {
        self.nodes.get_by_key(snap(position))
    }

    /// Returns the positions of a way's nodes.
    pub fn way_positions(&self, way: &Way) -> Vec<Coordinate> {
        way.nodes
            .iter()
            .filter_map(|&id| self.nodes.get(id))
            .map(|n| n.position)
            .collect()
    }
}
