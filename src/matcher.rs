// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::collections::HashSet;

use crate::network::{envelope_of, Network, OriginalSegment};
use crate::snap::{snap, SnapKey};
use crate::Coordinate;

/// Overlap between a candidate line and one [OriginalSegment].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Overlap<'n> {
    pub segment: &'n OriginalSegment,

    /// Number of distinct snapped candidate points which also appear in the segment.
    pub shared: usize,

    /// Number of distinct snapped candidate points.
    pub total: usize,
}

impl Overlap<'_> {
    /// Fraction of the candidate's points shared with the segment, in [0, 1].
    pub fn ratio(&self) -> f64 {
        self.shared as f64 / self.total as f64
    }

    /// Returns true if the ratio is strictly greater than 0.5.
    pub fn is_sufficient(&self) -> bool {
        2 * self.shared > self.total
    }
}

/// Outcome of matching a candidate line against a [Network].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MatchResult<'n> {
    /// The best overlapping segment, if any segment shares at least one point.
    /// This may be an insufficient overlap, see [MatchResult::matched].
    pub best: Option<Overlap<'n>>,
}

impl<'n> MatchResult<'n> {
    /// Returns the matched segment, if the best overlap is above the threshold.
    pub fn matched(&self) -> Option<&'n OriginalSegment> {
        self.best
            .filter(Overlap::is_sufficient)
            .map(|overlap| overlap.segment)
    }

    /// Overlap ratio of the best segment, or zero if nothing overlaps.
    pub fn ratio(&self) -> f64 {
        self.best.map(|o| o.ratio()).unwrap_or(0.0)
    }
}

/// Finds the original segment sharing the largest fraction of the candidate's
/// snapped points.
///
/// Ties are broken by the larger number of shared points, then by the lowest segment id.
/// The result does not depend on the direction of `coordinates`.
pub fn find_match<'n>(network: &'n Network, coordinates: &[Coordinate]) -> MatchResult<'n> {
    let keys: HashSet<SnapKey> = coordinates.iter().copied().map(snap).collect();
    let envelope = match envelope_of(&keys) {
        Some(e) => e,
        None => return MatchResult::default(),
    };

    let mut best: Option<Overlap<'n>> = None;
    for segment in network.segments_intersecting(&envelope) {
        let shared = keys.iter().filter(|k| segment.contains(k)).count();
        if shared == 0 {
            continue;
        }

        let candidate = Overlap {
            segment,
            shared,
            total: keys.len(),
        };
        if best.map_or(true, |b| is_better(&candidate, &b)) {
            best = Some(candidate);
        }
    }

    MatchResult { best }
}

/// Orders overlaps of the same candidate: higher ratio first,
/// then more shared points, then the lower segment id.
fn is_better(a: &Overlap<'_>, b: &Overlap<'_>) -> bool {
    // Cross-multiplied ratio comparison, exact for integers
    let (ra, rb) = (a.shared * b.total, b.shared * a.total);
    if ra != rb {
        return ra > rb;
    }
    if a.shared != b.shared {
        return a.shared > b.shared;
    }
    a.segment.id < b.segment.id
}
