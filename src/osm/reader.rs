// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::path::Path;

use super::model::{Feature, Way};
use super::pbf;
use crate::network::{Network, OriginalSegment};
use crate::{Coordinate, Error};

/// Tag key which marks a way as a road, see [Options::road_key](crate::Options::road_key).
pub const DEFAULT_ROAD_KEY: &str = "highway";

/// Helper object collecting [OSM features](Feature) into a [Network].
///
/// Node positions are kept until the end, so ways may reference nodes
/// stored later in the file.
struct NetworkBuilder<'a> {
    road_key: &'a str,
    nodes: HashMap<i64, Coordinate>,
    ways: Vec<Way>,
}

impl<'a> NetworkBuilder<'a> {
    fn new(road_key: &'a str) -> Self {
        Self {
            road_key,
            nodes: HashMap::default(),
            ways: Vec::default(),
        }
    }

    fn add_features<I: IntoIterator<Item = Result<Feature, pbf::Error>>>(
        &mut self,
        features: I,
    ) -> Result<(), pbf::Error> {
        for f in features {
            match f? {
                Feature::Node(n) => {
                    self.nodes.insert(n.id, n.position);
                }
                Feature::Way(w) => {
                    if w.tags.contains_key(self.road_key) {
                        self.ways.push(w);
                    }
                }
            }
        }
        Ok(())
    }

    fn build(self) -> Network {
        let mut too_short = 0usize;
        let segments: Vec<OriginalSegment> = self
            .ways
            .into_iter()
            .filter_map(|w| {
                // Remove references to unknown nodes
                let coordinates: Vec<Coordinate> = w
                    .nodes
                    .iter()
                    .filter_map(|id| self.nodes.get(id).copied())
                    .collect();

                if coordinates.len() < 2 {
                    too_short += 1;
                    None
                } else {
                    Some(OriginalSegment::new(w.id, coordinates, w.tags))
                }
            })
            .collect();

        if too_short > 0 {
            log::warn!("skipped {too_short} road ways with less than 2 known nodes");
        }
        log::info!(
            "indexed {} road ways from {} nodes",
            segments.len(),
            self.nodes.len()
        );

        Network::new(segments)
    }
}

/// Reads road ways (ways with a `road_key` tag) from an OSM PBF stream into a [Network].
///
/// The provided stream is wrapped in a buffered reader.
pub fn read_network_from_io<R: io::Read>(reader: R, road_key: &str) -> Result<Network, pbf::Error> {
    let mut b = NetworkBuilder::new(road_key);
    b.add_features(pbf::features_from_io(io::BufReader::new(reader)))?;
    Ok(b.build())
}

/// Reads road ways from an in-memory OSM PBF file into a [Network].
pub fn read_network_from_buffer(data: &[u8], road_key: &str) -> Result<Network, pbf::Error> {
    let mut b = NetworkBuilder::new(road_key);
    b.add_features(pbf::features_from_io(data))?;
    Ok(b.build())
}

/// Reads road ways from an OSM PBF file at the provided path into a [Network].
///
/// Fails with [Error::NotFound] if the file does not exist,
/// and with [Error::MalformedInput] if it is not a valid OSM PBF file.
pub fn read_network_from_file<P: AsRef<Path>>(path: P, road_key: &str) -> Result<Network, Error> {
    let path = path.as_ref();
    let f = File::open(path).map_err(|e| Error::opening(path.to_path_buf(), e))?;
    read_network_from_io(f, road_key).map_err(|e| Error::malformed(path.to_path_buf(), e))
}
