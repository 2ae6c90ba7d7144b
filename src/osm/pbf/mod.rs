// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

//! Codec for the [OSM PBF format](https://wiki.openstreetmap.org/wiki/PBF_Format).

mod messages;
mod reader;
mod writer;

use std::io;
use std::sync::Arc;

use messages::{fileformat, osmformat};

pub use reader::features_from_io;
pub use writer::{Writer, MAX_ENTITIES_PER_BLOCK};

/// Max permitted size for a serialized [blob header](https://wiki.openstreetmap.org/wiki/PBF_Format#File_format) -
/// 64 KiB.
const MAX_BLOB_HEADER_SIZE: u32 = 64 * 1024;

/// Max permitted size for a serialized & decompressed [blob](https://wiki.openstreetmap.org/wiki/PBF_Format#File_format) -
/// 32 MiB.
const MAX_BLOB_SIZE: u32 = 32 * 1024 * 1024;

/// Features which the reader understands and the writer declares.
const SUPPORTED_FEATURES: [&str; 2] = ["OsmSchema-V0.6", "DenseNodes"];

/// Error which can occur when reading or writing a PBF file.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("protobuf: {0}")]
    Protobuf(#[from] Arc<protobuf::Error>),

    #[error("io: {0}")]
    Io(#[from] Arc<io::Error>),

    #[error("BlobHeader too large: {0} > {MAX_BLOB_HEADER_SIZE}")]
    BlobHeaderTooLarge(u32),

    #[error("Blob too large: {0} > {MAX_BLOB_SIZE}")]
    BlobTooLarge(u32),

    #[error("BlobHeader.type: got {got:?}, expected {expected:?}")]
    UnexpectedBlobHeaderType { got: String, expected: &'static str },

    #[error("BlobHeader.datasize is negative")]
    NegativeBlobHeaderSize,

    #[error("Blob has no data")]
    MissingBlobData,

    #[error("unsupported compression: {0} (supported: raw, zlib and bzip2)")]
    UnsupportedCompression(&'static str),

    #[error("file requires unsupported features: {0:?}")]
    UnsupportedFeatures(Vec<String>),

    #[error("file ended before the OSMHeader block")]
    MissingHeader,

    #[error("node {0} is outside of the representable coordinate range")]
    CoordinateOutOfRange(i64),

    #[error("delta-coded {0} overflows")]
    DeltaOverflow(&'static str),
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(Arc::new(e))
    }
}

impl From<protobuf::Error> for Error {
    fn from(e: protobuf::Error) -> Self {
        Error::Protobuf(Arc::new(e))
    }
}
