// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::io;
use std::path::PathBuf;

use crate::osm::pbf;

/// Fatal errors which abort a whole reduction run.
///
/// Problems with individual candidate geometries are not errors;
/// see [SkipReason](crate::SkipReason).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required input file does not exist.
    #[error("{0}: no such file")]
    NotFound(PathBuf),

    /// An input file exists, but could not be opened.
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// An input file could not be parsed.
    #[error("{path}: {source}")]
    MalformedInput {
        path: PathBuf,
        #[source]
        source: Malformed,
    },

    /// Every candidate geometry was rejected.
    #[error("no usable candidate geometries ({skipped} skipped)")]
    NoCandidates { skipped: usize },

    /// The output could not be serialized or written.
    /// No (partial) output file is left behind.
    #[error("{path}: failed to write output: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: pbf::Error,
    },
}

/// Reason why an input file could not be parsed.
#[derive(Debug, thiserror::Error)]
pub enum Malformed {
    #[error("malformed OSM PBF: {0}")]
    Pbf(#[from] pbf::Error),

    #[error("malformed GeoJSON: {0}")]
    GeoJson(#[from] geojson::Error),
}

impl Error {
    /// Maps a failure to open an input file into [Error::NotFound] or [Error::Io].
    pub(crate) fn opening(path: PathBuf, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            Error::NotFound(path)
        } else {
            Error::Io { path, source }
        }
    }

    pub(crate) fn malformed<E: Into<Malformed>>(path: PathBuf, source: E) -> Self {
        Error::MalformedInput {
            path,
            source: source.into(),
        }
    }
}
