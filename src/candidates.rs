// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::fmt;
use std::fs;
use std::path::Path;

use geojson::{GeoJson, Geometry, Value};

use crate::{Coordinate, Error};

/// Identifies a [Candidate] by the position of its feature in the input file
/// and the position of the line within that feature.
///
/// A `LineString` feature yields part 0; every line of a `MultiLineString`
/// (or of a `GeometryCollection`) gets a consecutive part number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CandidateId {
    pub feature: usize,
    pub part: usize,
}

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "feature {} part {}", self.feature, self.part)
    }
}

/// A single input line to be kept in the output network.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub id: CandidateId,
    pub coordinates: Vec<Coordinate>,
}

/// Why a candidate geometry did not make it into the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The geometry is not a `LineString` or `MultiLineString`
    /// (or the feature has no geometry at all).
    UnsupportedGeometry(&'static str),

    /// A position is non-finite, lies outside of the WGS84 range,
    /// or has less than 2 components.
    InvalidCoordinates,

    /// All positions snap to less than 2 distinct nodes.
    Degenerate,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedGeometry(kind) => write!(f, "unsupported geometry type {kind}"),
            Self::InvalidCoordinates => write!(f, "invalid coordinates"),
            Self::Degenerate => write!(f, "degenerate line (less than 2 distinct nodes)"),
        }
    }
}

/// Result of loading candidate geometries: lines in input order,
/// and everything which had to be rejected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Candidates {
    pub lines: Vec<Candidate>,
    pub skipped: Vec<(CandidateId, SkipReason)>,
}

impl Candidates {
    /// Extracts all candidate lines from a parsed GeoJSON object.
    ///
    /// `FeatureCollection`s, single `Feature`s and bare `Geometry` objects are accepted.
    pub fn from_geojson(gj: GeoJson) -> Self {
        let mut c = Self::default();
        match gj {
            GeoJson::FeatureCollection(fc) => {
                for (idx, feature) in fc.features.into_iter().enumerate() {
                    c.add_feature(idx, feature.geometry);
                }
            }
            GeoJson::Feature(feature) => c.add_feature(0, feature.geometry),
            GeoJson::Geometry(geometry) => c.add_feature(0, Some(geometry)),
        }
        c
    }

    fn add_feature(&mut self, feature: usize, geometry: Option<Geometry>) {
        let mut part = 0;
        match geometry {
            Some(g) => {
                self.add_value(feature, &mut part, g.value);
                if part == 0 {
                    // Empty MultiLineString or GeometryCollection: nothing to draw
                    self.skipped
                        .push((CandidateId { feature, part }, SkipReason::Degenerate));
                }
            }
            None => self.skipped.push((
                CandidateId { feature, part },
                SkipReason::UnsupportedGeometry("null"),
            )),
        }
    }

    fn add_value(&mut self, feature: usize, part: &mut usize, value: Value) {
        match value {
            Value::LineString(positions) => self.add_line(feature, part, positions),

            Value::MultiLineString(lines) => {
                for positions in lines {
                    self.add_line(feature, part, positions);
                }
            }

            Value::GeometryCollection(geometries) => {
                for g in geometries {
                    self.add_value(feature, part, g.value);
                }
            }

            other => {
                let id = CandidateId {
                    feature,
                    part: *part,
                };
                *part += 1;
                self.skipped
                    .push((id, SkipReason::UnsupportedGeometry(type_name(&other))));
            }
        }
    }

    fn add_line(&mut self, feature: usize, part: &mut usize, positions: Vec<Vec<f64>>) {
        let id = CandidateId {
            feature,
            part: *part,
        };
        *part += 1;

        match to_coordinates(&positions) {
            Some(coordinates) => self.lines.push(Candidate { id, coordinates }),
            None => self.skipped.push((id, SkipReason::InvalidCoordinates)),
        }
    }
}

/// Converts GeoJSON positions into valid [Coordinates](Coordinate).
/// Returns None if any of the positions is unusable.
fn to_coordinates(positions: &[Vec<f64>]) -> Option<Vec<Coordinate>> {
    positions
        .iter()
        .map(|p| match p.as_slice() {
            [lon, lat, ..] => Some(Coordinate::new(*lon, *lat)).filter(Coordinate::is_valid),
            _ => None,
        })
        .collect()
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Point(_) => "Point",
        Value::MultiPoint(_) => "MultiPoint",
        Value::LineString(_) => "LineString",
        Value::MultiLineString(_) => "MultiLineString",
        Value::Polygon(_) => "Polygon",
        Value::MultiPolygon(_) => "MultiPolygon",
        Value::GeometryCollection(_) => "GeometryCollection",
    }
}

/// Parses candidate geometries from a GeoJSON string.
pub fn candidates_from_str(s: &str) -> Result<Candidates, geojson::Error> {
    let gj: GeoJson = s.parse()?;
    Ok(Candidates::from_geojson(gj))
}

/// Parses candidate geometries from raw GeoJSON bytes.
/// Invalid UTF-8 is reported like any other JSON syntax error.
pub fn candidates_from_slice(data: &[u8]) -> Result<Candidates, geojson::Error> {
    let gj = GeoJson::from_reader(data)?;
    Ok(Candidates::from_geojson(gj))
}

/// Parses candidate geometries from a GeoJSON file.
///
/// Fails with [Error::NotFound] if the file does not exist,
/// and with [Error::MalformedInput] if it is not valid GeoJSON.
pub fn candidates_from_file<P: AsRef<Path>>(path: P) -> Result<Candidates, Error> {
    let path = path.as_ref();
    let content = fs::read(path).map_err(|e| Error::opening(path.to_path_buf(), e))?;
    let candidates =
        candidates_from_slice(&content).map_err(|e| Error::malformed(path.to_path_buf(), e))?;

    log::info!(
        "loaded {} candidate lines from {} ({} rejected)",
        candidates.lines.len(),
        path.display(),
        candidates.skipped.len()
    );
    Ok(candidates)
}
