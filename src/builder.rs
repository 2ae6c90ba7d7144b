// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::collections::HashSet;

use crate::candidates::SkipReason;
use crate::graph::{NodeTable, ReductionModel};
use crate::osm::model::Way;
use crate::snap::snap;
use crate::{Coordinate, Tags};

/// Helper object used for converting candidate lines into a [ReductionModel].
///
/// Lines must be added in input order: node and way ids depend on it.
#[derive(Debug)]
pub struct GraphBuilder {
    nodes: NodeTable,
    ways: Vec<Way>,
    way_id_counter: i64,
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphBuilder {
    /// Create a new, empty graph builder.
    pub fn new() -> Self {
        Self {
            nodes: NodeTable::default(),
            ways: Vec::default(),
            way_id_counter: 0,
        }
    }

    /// Adds a line as a new way, re-using existing nodes at the same snapping keys.
    ///
    /// Returns the id of the new way, or [SkipReason::Degenerate] (leaving the
    /// builder untouched) if the line snaps to less than 2 distinct nodes.
    /// All coordinates must be finite.
    pub fn add_line(&mut self, coordinates: &[Coordinate], tags: Tags) -> Result<i64, SkipReason> {
        let distinct: HashSet<_> = coordinates.iter().copied().map(snap).collect();
        if distinct.len() < 2 {
            return Err(SkipReason::Degenerate);
        }

        let mut nodes: Vec<i64> = Vec::with_capacity(coordinates.len());
        for &c in coordinates {
            let id = self.nodes.get_or_insert(c);
            // Collapse zero-length edges
            if nodes.last() != Some(&id) {
                nodes.push(id);
            }
        }
        debug_assert!(nodes.len() >= 2);

        self.way_id_counter += 1;
        let id = self.way_id_counter;
        self.ways.push(Way { id, nodes, tags });
        Ok(id)
    }

    /// Returns the number of nodes created so far.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn finish(self) -> ReductionModel {
        ReductionModel {
            nodes: self.nodes,
            ways: self.ways,
        }
    }
}
