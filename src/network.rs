// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::collections::HashSet;

use rstar::{RTree, RTreeObject, AABB};

use crate::snap::{snap, SnapKey};
use crate::{Coordinate, Tags};

/// A road way read from the source network, with its full geometry and tags.
#[derive(Debug, Clone, PartialEq)]
pub struct OriginalSegment {
    pub id: i64,
    pub coordinates: Vec<Coordinate>,
    pub tags: Tags,

    /// Snapped [coordinates](Self::coordinates), for overlap tests.
    keys: HashSet<SnapKey>,
}

impl OriginalSegment {
    /// Creates a segment. All coordinates must be finite.
    pub fn new(id: i64, coordinates: Vec<Coordinate>, tags: Tags) -> Self {
        let keys = coordinates.iter().copied().map(snap).collect();
        Self {
            id,
            coordinates,
            tags,
            keys,
        }
    }

    /// Returns true if any coordinate of this segment snaps to `key`.
    #[inline]
    pub fn contains(&self, key: &SnapKey) -> bool {
        self.keys.contains(key)
    }

    /// Set of distinct snapped coordinates of this segment.
    pub fn keys(&self) -> &HashSet<SnapKey> {
        &self.keys
    }
}

/// Bounding box of a set of snapped points, on the integer snapping grid.
pub(crate) fn envelope_of<'a, I: IntoIterator<Item = &'a SnapKey>>(
    keys: I,
) -> Option<AABB<[i64; 2]>> {
    let mut keys = keys.into_iter();
    let first = keys.next()?;
    let (mut min, mut max) = (first.as_point(), first.as_point());
    for k in keys {
        min = [min[0].min(k.lon), min[1].min(k.lat)];
        max = [max[0].max(k.lon), max[1].max(k.lat)];
    }
    Some(AABB::from_corners(min, max))
}

/// Entry of the [Network] spatial index, pointing into [Network::segments].
#[derive(Debug, Clone)]
struct IndexedSegment {
    index: usize,
    envelope: AABB<[i64; 2]>,
}

impl RTreeObject for IndexedSegment {
    type Envelope = AABB<[i64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope.clone()
    }
}

/// Immutable index of all [OriginalSegments](OriginalSegment) of a source network,
/// ordered by id and spatially indexed by their bounding boxes.
#[derive(Debug, Clone, Default)]
pub struct Network {
    segments: Vec<OriginalSegment>,
    tree: RTree<IndexedSegment>,
}

impl Network {
    pub fn new(mut segments: Vec<OriginalSegment>) -> Self {
        segments.sort_by_key(|s| s.id);

        let entries = segments
            .iter()
            .enumerate()
            .filter_map(|(index, s)| {
                envelope_of(s.keys.iter()).map(|envelope| IndexedSegment { index, envelope })
            })
            .collect();

        Self {
            segments,
            tree: RTree::bulk_load(entries),
        }
    }

    /// Returns the number of segments in the network.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns all segments, ordered by id.
    pub fn segments(&self) -> &[OriginalSegment] {
        &self.segments
    }

    /// Retrieves a segment by its id.
    pub fn get(&self, id: i64) -> Option<&OriginalSegment> {
        self.segments
            .binary_search_by_key(&id, |s| s.id)
            .ok()
            .map(|idx| &self.segments[idx])
    }

    /// Returns all segments whose bounding box intersects with `envelope`, in no particular order.
    pub(crate) fn segments_intersecting(
        &self,
        envelope: &AABB<[i64; 2]>,
    ) -> impl Iterator<Item = &OriginalSegment> + '_ {
        self.tree
            .locate_in_envelope_intersecting(envelope)
            .map(move |entry| &self.segments[entry.index])
    }
}
