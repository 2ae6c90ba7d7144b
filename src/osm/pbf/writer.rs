// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::collections::HashMap;
use std::io;
use std::io::Write;

use protobuf::{Message, MessageField};

use super::{fileformat, osmformat, Error, MAX_BLOB_SIZE, SUPPORTED_FEATURES};
use crate::osm::model::{Node, Way};
use crate::snap::{snap, SnapKey, SNAP_GRID};
use crate::Coordinate;

/// Max number of nodes or ways stored in a single `OSMData` block,
/// the limit recommended by the [PBF format](https://wiki.openstreetmap.org/wiki/PBF_Format).
pub const MAX_ENTITIES_PER_BLOCK: usize = 8000;

/// Coordinate granularity, in nanodegrees. Equal to the snapping grid,
/// so a [SnapKey] is directly the stored coordinate value.
const GRANULARITY: i64 = NANODEGREES / SNAP_GRID;

const NANODEGREES: i64 = 1_000_000_000;

const _: () = assert!(GRANULARITY * SNAP_GRID == NANODEGREES && GRANULARITY <= i32::MAX as i64);

/// Streams nodes and ways into an OSM PBF file.
///
/// The header must be written first; nodes must be written before ways,
/// as most consumers expect this order.
pub struct Writer<W: io::Write> {
    inner: W,
    writing_program: String,
}

impl<W: io::Write> Writer<W> {
    pub fn new(inner: W, writing_program: &str) -> Self {
        Self {
            inner,
            writing_program: writing_program.to_string(),
        }
    }

    /// Writes the `OSMHeader` block, with a bounding box covering all `positions`.
    /// The bounding box is omitted if there are no positions.
    pub fn write_header<I: IntoIterator<Item = Coordinate>>(
        &mut self,
        positions: I,
    ) -> Result<(), Error> {
        let mut header = osmformat::HeaderBlock::new();
        if let Some(bbox) = bounding_box(positions) {
            header.bbox = MessageField::some(bbox);
        }
        header.required_features = SUPPORTED_FEATURES.iter().map(|f| f.to_string()).collect();
        header.writingprogram = Some(self.writing_program.clone());
        self.write_blob("OSMHeader", &header.write_to_bytes()?)
    }

    /// Writes all nodes as dense nodes, [MAX_ENTITIES_PER_BLOCK] per block.
    pub fn write_nodes(&mut self, nodes: &[Node]) -> Result<(), Error> {
        for chunk in nodes.chunks(MAX_ENTITIES_PER_BLOCK) {
            let block = dense_nodes_block(chunk)?;
            self.write_blob("OSMData", &block.write_to_bytes()?)?;
        }
        Ok(())
    }

    /// Writes all ways, [MAX_ENTITIES_PER_BLOCK] per block.
    pub fn write_ways(&mut self, ways: &[Way]) -> Result<(), Error> {
        for chunk in ways.chunks(MAX_ENTITIES_PER_BLOCK) {
            let block = ways_block(chunk);
            self.write_blob("OSMData", &block.write_to_bytes()?)?;
        }
        Ok(())
    }

    /// Flushes and returns the underlying writer.
    pub fn finish(mut self) -> Result<W, Error> {
        self.inner.flush()?;
        Ok(self.inner)
    }

    /// Writes the size + [fileformat::BlobHeader] + zlib-compressed [fileformat::Blob] sequence.
    pub(super) fn write_blob(&mut self, type_: &'static str, data: &[u8]) -> Result<(), Error> {
        if data.len() > MAX_BLOB_SIZE as usize {
            return Err(Error::BlobTooLarge(data.len() as u32));
        }

        let mut blob = fileformat::Blob::new();
        blob.raw_size = Some(data.len() as i32);
        blob.data = Some(fileformat::blob::Data::ZlibData(compress(data)?));
        let blob = blob.write_to_bytes()?;

        let mut blob_header = fileformat::BlobHeader::new();
        blob_header.type_ = Some(type_.to_string());
        blob_header.datasize = Some(blob.len() as i32);
        let blob_header = blob_header.write_to_bytes()?;

        self.inner
            .write_all(&(blob_header.len() as u32).to_be_bytes())?;
        self.inner.write_all(&blob_header)?;
        self.inner.write_all(&blob)?;
        Ok(())
    }
}

fn compress(data: &[u8]) -> Result<Vec<u8>, Error> {
    let mut e = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    e.write_all(data)?;
    Ok(e.finish()?)
}

/// Computes the [osmformat::HeaderBBox] (in nanodegrees) of the given positions.
fn bounding_box<I: IntoIterator<Item = Coordinate>>(positions: I) -> Option<osmformat::HeaderBBox> {
    let (min, max) = positions
        .into_iter()
        .filter(Coordinate::is_valid)
        .map(snap)
        .fold(None, |acc: Option<(SnapKey, SnapKey)>, k| match acc {
            None => Some((k, k)),
            Some((min, max)) => Some((
                SnapKey {
                    lon: min.lon.min(k.lon),
                    lat: min.lat.min(k.lat),
                },
                SnapKey {
                    lon: max.lon.max(k.lon),
                    lat: max.lat.max(k.lat),
                },
            )),
        })?;

    let mut bbox = osmformat::HeaderBBox::new();
    bbox.left = Some(min.lon * GRANULARITY);
    bbox.right = Some(max.lon * GRANULARITY);
    bbox.bottom = Some(min.lat * GRANULARITY);
    bbox.top = Some(max.lat * GRANULARITY);
    Some(bbox)
}

fn dense_nodes_block(nodes: &[Node]) -> Result<osmformat::PrimitiveBlock, Error> {
    let mut dense = osmformat::DenseNodes::new();
    let mut info = osmformat::DenseInfo::new();
    let mut previous = (0i64, SnapKey { lon: 0, lat: 0 });

    for node in nodes {
        if !node.position.is_valid() {
            return Err(Error::CoordinateOutOfRange(node.id));
        }
        let key = snap(node.position);

        dense.id.push(node.id - previous.0);
        dense.lon.push(key.lon - previous.1.lon);
        dense.lat.push(key.lat - previous.1.lat);
        previous = (node.id, key);

        info.version.push(1);
        info.timestamp.push(0);
        info.changeset.push(0);
        info.uid.push(0);
        info.user_sid.push(0);
    }

    dense.denseinfo = MessageField::some(info);

    let mut group = osmformat::PrimitiveGroup::new();
    group.dense = MessageField::some(dense);
    Ok(primitive_block(StringTableBuilder::default(), group))
}

fn ways_block(ways: &[Way]) -> osmformat::PrimitiveBlock {
    let mut strings = StringTableBuilder::default();
    let mut group = osmformat::PrimitiveGroup::new();

    group.ways = ways
        .iter()
        .map(|way| {
            let mut raw = osmformat::Way::new();
            raw.id = Some(way.id);
            for (k, v) in &way.tags {
                raw.keys.push(strings.get_or_insert(k));
                raw.vals.push(strings.get_or_insert(v));
            }

            let mut info = osmformat::Info::new();
            info.version = Some(1);
            raw.info = MessageField::some(info);

            let mut previous = 0i64;
            raw.refs = way
                .nodes
                .iter()
                .map(|&id| {
                    let delta = id - previous;
                    previous = id;
                    delta
                })
                .collect();
            raw
        })
        .collect();

    primitive_block(strings, group)
}

fn primitive_block(
    strings: StringTableBuilder,
    group: osmformat::PrimitiveGroup,
) -> osmformat::PrimitiveBlock {
    let mut block = osmformat::PrimitiveBlock::new();
    block.stringtable = MessageField::some(strings.build());
    block.primitivegroup.push(group);
    block.granularity = Some(GRANULARITY as i32);
    block
}

/// Deduplicates strings of a single block. Index 0 is reserved for the empty string.
struct StringTableBuilder {
    strings: Vec<String>,
    indices: HashMap<String, u32>,
}

impl Default for StringTableBuilder {
    fn default() -> Self {
        Self {
            strings: vec![String::new()],
            indices: HashMap::default(),
        }
    }
}

impl StringTableBuilder {
    fn get_or_insert(&mut self, s: &str) -> u32 {
        if let Some(&idx) = self.indices.get(s) {
            return idx;
        }
        let idx = self.strings.len() as u32;
        self.strings.push(s.to_string());
        self.indices.insert(s.to_string(), idx);
        idx
    }

    fn build(self) -> osmformat::StringTable {
        let mut table = osmformat::StringTable::new();
        table.s = self.strings.into_iter().map(String::into_bytes).collect();
        table
    }
}
