// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::fmt;
use std::path::Path;

use crate::builder::GraphBuilder;
use crate::candidates::{candidates_from_file, CandidateId, Candidates, SkipReason};
use crate::graph::ReductionModel;
use crate::matcher::find_match;
use crate::network::Network;
use crate::osm::{read_network_from_file, DEFAULT_ROAD_KEY};
use crate::resolver::{default_fallback_tags, resolve};
use crate::writer::write_model_to_file;
use crate::{Error, Tags};

/// Controls how a road network is reduced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Tags applied to candidate lines which don't sufficiently overlap any original road.
    /// Defaults to [default_fallback_tags].
    pub fallback_tags: Tags,

    /// Only source ways with this tag key are considered roads and used for matching.
    /// Defaults to `highway`.
    pub road_key: String,

    /// Value of the `writingprogram` field of the output file header.
    pub writing_program: String,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            fallback_tags: default_fallback_tags(),
            road_key: DEFAULT_ROAD_KEY.to_string(),
            writing_program: format!("roadcut {}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Outcome of a reduction run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    /// Number of candidate geometries seen, including the skipped ones.
    pub candidates: usize,

    /// Candidates which received the tags of a matched original way.
    pub matched: usize,

    /// Candidates which received the fallback tags.
    pub fallback: usize,

    /// Candidates left out of the output, in input order.
    pub skipped: Vec<(CandidateId, SkipReason)>,

    /// Number of nodes in the output.
    pub nodes: usize,

    /// Number of ways in the output.
    pub ways: usize,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} candidates: {} matched, {} with fallback tags, {} skipped; {} nodes and {} ways in output",
            self.candidates,
            self.matched,
            self.fallback,
            self.skipped.len(),
            self.nodes,
            self.ways,
        )
    }
}

/// Converts candidate lines into a [ReductionModel], recovering their tags from `network`.
///
/// Lines are processed in input order. Degenerate lines are skipped and reported
/// in the [Summary]; fails with [Error::NoCandidates] if no line makes it into the model.
pub fn reduce_network(
    network: &Network,
    candidates: Candidates,
    options: &Options,
) -> Result<(ReductionModel, Summary), Error> {
    let mut summary = Summary {
        candidates: candidates.lines.len() + candidates.skipped.len(),
        ..Default::default()
    };
    let mut skipped = candidates.skipped;
    let mut b = GraphBuilder::new();

    for candidate in &candidates.lines {
        let m = find_match(network, &candidate.coordinates);
        let resolution = resolve(&m, &options.fallback_tags);

        match b.add_line(&candidate.coordinates, resolution.tags().clone()) {
            Ok(way_id) => {
                if resolution.is_matched() {
                    summary.matched += 1;
                } else {
                    summary.fallback += 1;
                }
                log::debug!(
                    "{}: way {way_id}, best overlap {:.2} ({:?})",
                    candidate.id,
                    m.ratio(),
                    resolution
                );
            }
            Err(reason) => skipped.push((candidate.id, reason)),
        }
    }

    skipped.sort_by_key(|&(id, _)| id);
    for (id, reason) in &skipped {
        log::warn!("{id}: skipped: {reason}");
    }

    let model = b.finish();
    summary.skipped = skipped;
    summary.nodes = model.nodes().len();
    summary.ways = model.ways().len();

    if model.ways().is_empty() {
        return Err(Error::NoCandidates {
            skipped: summary.skipped.len(),
        });
    }

    Ok((model, summary))
}

/// Reduces the road network from an OSM PBF file at `source` to the lines
/// from a GeoJSON file at `candidates`, writing the result as OSM PBF to `output`.
///
/// Nothing is written to `output` unless the whole run succeeds.
pub fn reduce<S: AsRef<Path>, C: AsRef<Path>, O: AsRef<Path>>(
    source: S,
    candidates: C,
    output: O,
    options: &Options,
) -> Result<Summary, Error> {
    let candidates = candidates_from_file(candidates)?;
    let network = read_network_from_file(source, &options.road_key)?;
    let (model, summary) = reduce_network(&network, candidates, options)?;
    write_model_to_file(&model, output, &options.writing_program)?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidates::{candidates_from_str, Candidate};
    use crate::network::OriginalSegment;
    use crate::osm::read_network_from_buffer;
    use crate::snap::snap;
    use crate::writer::write_model_to_io;
    use crate::Coordinate;
    use std::collections::HashMap;

    macro_rules! tags {
        {} => { Tags::default() };
        {$( $k:literal : $v:literal ),+} => {
            Tags::from_iter([ $( ($k.to_string(), $v.to_string()) ),+ ])
        };
    }

    macro_rules! assert_almost_eq {
        ($a:expr, $b:expr) => {
            assert!(
                (($a - $b).abs() <= 1e-7),
                "assertion failed: {} ≈ {}",
                $a,
                $b
            )
        };
    }

    fn line(coordinates: &[(f64, f64)]) -> Vec<Coordinate> {
        coordinates
            .iter()
            .map(|&(lon, lat)| Coordinate::new(lon, lat))
            .collect()
    }

    fn candidates(lines: &[&[(f64, f64)]]) -> Candidates {
        Candidates {
            lines: lines
                .iter()
                .enumerate()
                .map(|(feature, l)| Candidate {
                    id: CandidateId { feature, part: 0 },
                    coordinates: line(l),
                })
                .collect(),
            skipped: vec![],
        }
    }

    fn network() -> Network {
        //  (0,2)──────(1,2)──────(2,2)      100: residential, 50 km/h
        //                │
        //                │                   101: service, unpaved
        //                │
        //  (0,0)──────(1,0)──────(2,0)      102: primary, asphalt
        Network::new(vec![
            OriginalSegment::new(
                100,
                line(&[(0.0, 2.0), (1.0, 2.0), (2.0, 2.0)]),
                tags! {"highway": "residential", "maxspeed": "50"},
            ),
            OriginalSegment::new(
                101,
                line(&[(1.0, 2.0), (1.0, 1.0), (1.0, 0.0)]),
                tags! {"highway": "service", "surface": "unpaved"},
            ),
            OriginalSegment::new(
                102,
                line(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)]),
                tags! {"highway": "primary", "surface": "asphalt"},
            ),
        ])
    }

    #[test]
    fn near_identical_line_gets_original_tags() {
        let n = Network::new(vec![OriginalSegment::new(
            1,
            line(&[(1.0, 1.0), (2.0, 1.0)]),
            tags! {"surface": "asphalt"},
        )]);

        let (model, summary) = reduce_network(
            &n,
            candidates(&[&[(1.00000004, 1.0), (2.0, 1.0)]]),
            &Options::default(),
        )
        .unwrap();

        assert_eq!(model.ways().len(), 1);
        assert_eq!(model.nodes().len(), 2);
        assert_eq!(model.ways()[0].nodes.len(), 2);
        assert_eq!(model.ways()[0].tags, tags! {"surface": "asphalt"});
        assert_eq!(summary.matched, 1);
        assert_eq!(summary.fallback, 0);
    }

    #[test]
    fn unrelated_line_gets_fallback_tags() {
        let options = Options::default();
        let (model, summary) = reduce_network(
            &network(),
            candidates(&[&[(40.0, 40.0), (40.5, 40.0)]]),
            &options,
        )
        .unwrap();

        assert_eq!(model.ways().len(), 1);
        assert_eq!(model.ways()[0].tags, options.fallback_tags);
        assert_eq!(summary.fallback, 1);
    }

    #[test]
    fn custom_fallback_tags() {
        let options = Options {
            fallback_tags: tags! {"highway": "track"},
            ..Default::default()
        };
        let (model, _) = reduce_network(
            &network(),
            candidates(&[&[(40.0, 40.0), (40.5, 40.0)]]),
            &options,
        )
        .unwrap();
        assert_eq!(model.ways()[0].tags, tags! {"highway": "track"});
    }

    #[test]
    fn multi_line_string_parts_are_resolved_separately() {
        let c = candidates_from_str(
            r#"{
                "type": "Feature",
                "properties": {},
                "geometry": {
                    "type": "MultiLineString",
                    "coordinates": [
                        [[1.0, 2.0], [1.0, 1.0], [1.0, 0.0]],
                        [[2.0, 0.0], [3.0, 0.0]]
                    ]
                }
            }"#,
        )
        .unwrap();

        let (model, summary) = reduce_network(&network(), c, &Options::default()).unwrap();

        assert_eq!(model.ways().len(), 2);
        assert_eq!(
            model.ways()[0].tags,
            tags! {"highway": "service", "surface": "unpaved"}
        );
        assert_eq!(model.ways()[1].tags, default_fallback_tags());
        assert_eq!(summary.matched, 1);
        assert_eq!(summary.fallback, 1);
        assert_eq!(summary.candidates, 2);
    }

    #[test]
    fn junctions_are_shared() {
        let (model, _) = reduce_network(
            &network(),
            candidates(&[
                &[(0.0, 2.0), (1.0, 2.0), (2.0, 2.0)],
                &[(1.00000001, 2.00000002), (1.0, 1.0), (1.0, 0.0)],
                &[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)],
            ]),
            &Options::default(),
        )
        .unwrap();

        // Every pair of lines sharing a point must reference the same node
        let mut nodes_by_key: HashMap<_, i64> = HashMap::new();
        for way in model.ways() {
            for (position, &id) in model.way_positions(way).iter().zip(&way.nodes) {
                let existing = *nodes_by_key.entry(snap(*position)).or_insert(id);
                assert_eq!(existing, id);
            }
        }

        assert_eq!(model.nodes().len(), 7);
        assert_eq!(model.ways()[1].nodes.first(), Some(&model.ways()[0].nodes[1]));
        assert_eq!(model.ways()[1].nodes.last(), Some(&model.ways()[2].nodes[1]));
    }

    #[test]
    fn skipped_candidates_are_reported() {
        let mut c = candidates(&[
            &[(0.0, 0.0), (1.0, 0.0)],
            &[(5.0, 5.0), (5.00000001, 5.0)],
            &[(2.0, 0.0), (1.0, 0.0)],
        ]);
        c.skipped.push((
            CandidateId {
                feature: 1,
                part: 1,
            },
            SkipReason::UnsupportedGeometry("Point"),
        ));

        let (model, summary) = reduce_network(&network(), c, &Options::default()).unwrap();

        assert_eq!(model.ways().len(), 2);
        assert_eq!(summary.candidates, 4);
        assert_eq!(summary.matched, 2);
        assert_eq!(
            summary.skipped,
            vec![
                (
                    CandidateId {
                        feature: 1,
                        part: 0
                    },
                    SkipReason::Degenerate
                ),
                (
                    CandidateId {
                        feature: 1,
                        part: 1
                    },
                    SkipReason::UnsupportedGeometry("Point")
                ),
            ]
        );
    }

    #[test]
    fn no_surviving_candidates() {
        let err = reduce_network(
            &network(),
            candidates(&[&[(5.0, 5.0), (5.00000001, 5.0)]]),
            &Options::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::NoCandidates { skipped: 1 }), "got {err:?}");

        let err = reduce_network(&network(), Candidates::default(), &Options::default())
            .unwrap_err();
        assert!(matches!(err, Error::NoCandidates { skipped: 0 }), "got {err:?}");
    }

    #[test]
    fn output_round_trip() {
        let (model, _) = reduce_network(
            &network(),
            candidates(&[
                &[(0.0, 2.0), (1.0, 2.0), (2.0, 2.0)],
                &[(1.0, 2.0), (1.00000004, 1.0), (1.0, 0.0)],
                &[(7.12345678, 0.5), (7.5, 0.5)],
            ]),
            &Options::default(),
        )
        .unwrap();

        let data = write_model_to_io(&model, Vec::new(), "test").unwrap();
        let reread = read_network_from_buffer(&data, "highway").unwrap();

        assert_eq!(reread.len(), model.ways().len());
        for way in model.ways() {
            let original = reread.get(way.id).unwrap();
            assert_eq!(original.tags, way.tags);

            let positions = model.way_positions(way);
            assert_eq!(original.coordinates.len(), positions.len());
            for (a, b) in original.coordinates.iter().zip(&positions) {
                assert_almost_eq!(a.lon, b.lon);
                assert_almost_eq!(a.lat, b.lat);
                assert_eq!(snap(*a), snap(*b));
            }
        }
    }

    #[test]
    fn reduce_files() {
        let dir = std::env::temp_dir().join(format!("roadcut-reduce-{}", std::process::id()));
        _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();

        let source = dir.join("source.osm.pbf");
        let candidates = dir.join("routes.geojson");
        let output = dir.join("reduced.osm.pbf");

        let mut w = crate::osm::pbf::Writer::new(Vec::new(), "test");
        let nodes = [
            crate::osm::model::Node {
                id: 7,
                position: Coordinate::new(1.0, 1.0),
            },
            crate::osm::model::Node {
                id: 8,
                position: Coordinate::new(2.0, 1.0),
            },
        ];
        w.write_header(nodes.iter().map(|n| n.position)).unwrap();
        w.write_nodes(&nodes).unwrap();
        w.write_ways(&[crate::osm::model::Way {
            id: 70,
            nodes: vec![7, 8],
            tags: tags! {"highway": "secondary", "surface": "asphalt"},
        }])
        .unwrap();
        std::fs::write(&source, w.finish().unwrap()).unwrap();

        std::fs::write(
            &candidates,
            r#"{
                "type": "FeatureCollection",
                "features": [
                    {
                        "type": "Feature",
                        "properties": {},
                        "geometry": {"type": "LineString", "coordinates": [[1.00000004, 1.0], [2.0, 1.0]]}
                    },
                    {
                        "type": "Feature",
                        "properties": {},
                        "geometry": {"type": "LineString", "coordinates": [[2.0, 1.0], [2.0, 3.0]]}
                    },
                    {
                        "type": "Feature",
                        "properties": {},
                        "geometry": {"type": "Point", "coordinates": [2.0, 3.0]}
                    }
                ]
            }"#,
        )
        .unwrap();

        let summary = reduce(&source, &candidates, &output, &Options::default()).unwrap();
        assert_eq!(summary.candidates, 3);
        assert_eq!(summary.matched, 1);
        assert_eq!(summary.fallback, 1);
        assert_eq!(summary.skipped.len(), 1);
        assert_eq!(summary.nodes, 3);
        assert_eq!(summary.ways, 2);

        let reduced = read_network_from_file(&output, DEFAULT_ROAD_KEY).unwrap();
        assert_eq!(reduced.len(), 2);
        assert_eq!(
            reduced.get(1).map(|s| &s.tags),
            Some(&tags! {"highway": "secondary", "surface": "asphalt"})
        );
        assert_eq!(reduced.get(2).map(|s| &s.tags), Some(&default_fallback_tags()));

        // Missing inputs are fatal, and leave the previous output alone
        let err = reduce(dir.join("missing.osm.pbf"), &candidates, &output, &Options::default())
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)), "got {err:?}");
        assert!(output.exists());

        _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn malformed_source_writes_nothing() {
        let dir = std::env::temp_dir().join(format!("roadcut-reduce-malformed-{}", std::process::id()));
        _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();

        let source = dir.join("source.osm.pbf");
        let candidates = dir.join("routes.geojson");
        let output = dir.join("reduced.osm.pbf");
        std::fs::write(&source, [0u8, 0, 0, 4, 0xff, 0xff]).unwrap();
        std::fs::write(
            &candidates,
            r#"{"type": "LineString", "coordinates": [[1.0, 1.0], [2.0, 1.0]]}"#,
        )
        .unwrap();

        let err = reduce(&source, &candidates, &output, &Options::default()).unwrap_err();
        assert!(
            matches!(&err, Error::MalformedInput { path, .. } if path == &source),
            "got {err:?}"
        );
        assert!(!output.exists());

        _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn summary_display() {
        let s = Summary {
            candidates: 5,
            matched: 2,
            fallback: 1,
            skipped: vec![
                (
                    CandidateId {
                        feature: 3,
                        part: 0,
                    },
                    SkipReason::Degenerate,
                ),
                (
                    CandidateId {
                        feature: 4,
                        part: 0,
                    },
                    SkipReason::InvalidCoordinates,
                ),
            ],
            nodes: 6,
            ways: 3,
        };
        assert_eq!(
            s.to_string(),
            "5 candidates: 2 matched, 1 with fallback tags, 2 skipped; 6 nodes and 3 ways in output"
        );
    }
}
