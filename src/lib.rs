// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

//! Reduction of [OpenStreetMap](https://www.openstreetmap.org/) road networks
//! to a custom set of lines.
//!
//! Given a source road network (an OSM PBF file) and a set of candidate lines
//! (a GeoJSON file), roadcut produces a new OSM PBF file containing only the candidate
//! lines, as ways connected at shared points. Every candidate line which follows
//! an original road inherits all of its tags; all other lines get fallback tags.
//!
//! Points closer than 1e-7° (after rounding, see [snap]) are the same graph node.
//!
//! # Example
//!
//! ```no_run
//! let summary = roadcut::reduce(
//!     "path/to/monaco.osm.pbf",
//!     "path/to/routes.geojson",
//!     "path/to/reduced.osm.pbf",
//!     &roadcut::Options::default(),
//! ).expect("failed to reduce the network");
//!
//! println!("{}", summary);
//! ```

mod builder;
mod candidates;
mod error;
mod graph;
mod matcher;
mod network;
pub mod osm;
mod reduce;
mod resolver;
mod snap;
mod writer;

pub use builder::GraphBuilder;
pub use candidates::{
    candidates_from_file, candidates_from_slice, candidates_from_str, Candidate, CandidateId,
    Candidates, SkipReason,
};
pub use error::{Error, Malformed};
pub use graph::{NodeTable, ReductionModel};
pub use matcher::{find_match, MatchResult, Overlap};
pub use network::{Network, OriginalSegment};
pub use reduce::{reduce, reduce_network, Options, Summary};
pub use resolver::{default_fallback_tags, resolve, Resolution};
pub use snap::{snap, Coordinate, SnapKey, SNAP_PRECISION};
pub use writer::{write_model_to_file, write_model_to_io};

/// Key-value metadata of OSM elements, ordered by key.
pub type Tags = std::collections::BTreeMap<String, String>;
