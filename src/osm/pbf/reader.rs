// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::io;
use std::io::Read;
use std::rc::Rc;
use std::sync::Arc;

use protobuf::Message;

use super::{
    fileformat, osmformat, Error, MAX_BLOB_HEADER_SIZE, MAX_BLOB_SIZE, SUPPORTED_FEATURES,
};
use crate::osm::model::{Feature, Node, Way};
use crate::{Coordinate, Tags};

/// All strings used by an [OSM PBF Block](https://wiki.openstreetmap.org/wiki/PBF_Format#Definition_of_OSMData_fileblock),
/// reference-counted as this table is referred to by multiple coexisting iterators and
/// closures without any concrete ownership.
type StringTable = Rc<Vec<String>>;

/// Returns an iterator over all nodes and ways from an OSM PBF stream.
///
/// The iterator stops after yielding the first error.
pub fn features_from_io<R: io::Read>(reader: R) -> impl Iterator<Item = Result<Feature, Error>> {
    let mut failed = false;
    File(reader).features().take_while(move |f| {
        let keep = !failed;
        failed = f.is_err();
        keep
    })
}

/// File abstracts away a whole OSM PBF file, a file encoding multiple [blocks](osmformat::PrimitiveBlock)
/// as [fileformat::BlobHeader] + [fileformat::Blob] pairs, into a friendly interface.
struct File<R: io::Read>(R);

impl<R: io::Read> File<R> {
    /// Returns an iterator over all [Blocks](Block) in this file.
    fn blocks(self) -> impl Iterator<Item = Result<Block, Error>> {
        FileBlocks {
            reader: self.0,
            header_checked: false,
            done: false,
        }
    }

    /// Returns a flattened iterator over all [Features](Feature) from all
    /// [Groups](Group) from all [Blocks](Block) in this file.
    fn features(self) -> impl Iterator<Item = Result<Feature, Error>> {
        self.blocks().flat_map(block_result_features)
    }
}

/// Iterator over [Blocks](Block) in a [File].
struct FileBlocks<R: io::Read> {
    reader: R,
    header_checked: bool,
    done: bool,
}

impl<R: io::Read> Iterator for FileBlocks<R> {
    type Item = Result<Block, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let result = self.next_block().transpose();
        self.done = !matches!(result, Some(Ok(_)));
        result
    }
}

impl<R: io::Read> FileBlocks<R> {
    fn next_block(&mut self) -> Result<Option<Block>, Error> {
        if !self.header_checked {
            if !self.read_and_check_header()? {
                return Err(Error::MissingHeader);
            }
            self.header_checked = true;
        }
        self.read_data()
    }

    /// Reads the next size + [fileformat::BlobHeader] + [fileformat::Blob] sequence,
    /// expecting an `OSMHeader` block containing an [osmformat::HeaderBlock].
    ///
    /// Returns `Ok(true)` if a header block was successfully read and validated,
    /// `Ok(false)` on EOF, or an [Error] if anything bad has happened.
    fn read_and_check_header(&mut self) -> Result<bool, Error> {
        let blob_header_size = match self.read_blob_header_size()? {
            Some(size) => size,
            None => return Ok(false),
        };

        let blob_header = self.read_blob_header(blob_header_size)?;
        if blob_header.type_() != "OSMHeader" {
            return Err(Error::UnexpectedBlobHeaderType {
                got: blob_header.type_.unwrap_or_default(),
                expected: "OSMHeader",
            });
        }

        let blob = self.read_blob(blob_header.datasize())?;
        let header = osmformat::HeaderBlock::parse_from_bytes(&blob)?;

        let unknown_features: Vec<String> = header
            .required_features
            .iter()
            .filter(|f| !SUPPORTED_FEATURES.contains(&f.as_str()))
            .cloned()
            .collect();
        if !unknown_features.is_empty() {
            return Err(Error::UnsupportedFeatures(unknown_features));
        }

        Ok(true)
    }

    /// Reads the next size + [fileformat::BlobHeader] + [fileformat::Blob] sequence,
    /// expecting an `OSMData` block containing an [osmformat::PrimitiveBlock].
    ///
    /// Returns `Ok(None)` on a clean EOF.
    fn read_data(&mut self) -> Result<Option<Block>, Error> {
        let blob_header_size = match self.read_blob_header_size()? {
            Some(size) => size,
            None => return Ok(None),
        };

        let blob_header = self.read_blob_header(blob_header_size)?;
        if blob_header.type_() != "OSMData" {
            return Err(Error::UnexpectedBlobHeaderType {
                got: blob_header.type_.unwrap_or_default(),
                expected: "OSMData",
            });
        }

        let blob = self.read_blob(blob_header.datasize())?;
        let block = osmformat::PrimitiveBlock::parse_from_bytes(&blob)?;
        Ok(Some(Block(block)))
    }

    /// Reads the next 4 bytes to read the size of the subsequent [fileformat::BlobHeader].
    ///
    /// Returns `Ok(Some(_))` on success, `Ok(None)` on EOF, or an [Error].
    /// EOF in the middle of the size is an error.
    fn read_blob_header_size(&mut self) -> Result<Option<u32>, Error> {
        let mut buf = [0u8; 4];
        loop {
            match self.reader.read(&mut buf[..1]) {
                Ok(0) => return Ok(None),
                Ok(_) => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::Io(Arc::new(e))),
            }
        }
        self.reader.read_exact(&mut buf[1..])?;
        Ok(Some(u32::from_be_bytes(buf)))
    }

    /// Reads the next [fileformat::BlobHeader] of a given size.
    fn read_blob_header(&mut self, size: u32) -> Result<fileformat::BlobHeader, Error> {
        if size > MAX_BLOB_HEADER_SIZE {
            return Err(Error::BlobHeaderTooLarge(size));
        }
        let mut buf = vec![0u8; size as usize];
        self.reader.read_exact(&mut buf)?;
        let header = fileformat::BlobHeader::parse_from_bytes(&buf)?;
        Ok(header)
    }

    /// Reads the next [fileformat::Blob] and returns the decompressed contents of it.
    fn read_blob(&mut self, size: i32) -> Result<Vec<u8>, Error> {
        if size < 0 {
            return Err(Error::NegativeBlobHeaderSize);
        }
        if size as u32 > MAX_BLOB_SIZE {
            return Err(Error::BlobTooLarge(size as u32));
        }

        let mut buf = vec![0u8; size as usize];
        self.reader.read_exact(&mut buf)?;

        let blob = fileformat::Blob::parse_from_bytes(&buf)?;

        let blob_size = blob.raw_size() as u32;
        if blob_size > MAX_BLOB_SIZE {
            return Err(Error::BlobTooLarge(blob_size));
        }

        match blob.data.ok_or(Error::MissingBlobData)? {
            fileformat::blob::Data::Raw(data) => Ok(data),

            fileformat::blob::Data::ZlibData(data) => {
                // raw_size is only a hint, read_limited enforces the real cap
                let d = flate2::read::ZlibDecoder::new(&data[..]);
                read_limited(d, blob_size)
            }

            fileformat::blob::Data::OBSOLETEBzip2Data(data) => {
                let d = bzip2::read::BzDecoder::new(&data[..]);
                read_limited(d, blob_size)
            }

            fileformat::blob::Data::LzmaData(_) => Err(Error::UnsupportedCompression("lzma")),
            fileformat::blob::Data::Lz4Data(_) => Err(Error::UnsupportedCompression("lz4")),
            fileformat::blob::Data::ZstdData(_) => Err(Error::UnsupportedCompression("zstd")),
        }
    }
}

/// Decompresses a blob, failing with [Error::BlobTooLarge] past [MAX_BLOB_SIZE] bytes.
fn read_limited<D: io::Read>(d: D, size_hint: u32) -> Result<Vec<u8>, Error> {
    let mut decompressed = Vec::with_capacity(size_hint as usize);
    d.take(MAX_BLOB_SIZE as u64 + 1)
        .read_to_end(&mut decompressed)?;
    if decompressed.len() > MAX_BLOB_SIZE as usize {
        return Err(Error::BlobTooLarge(decompressed.len() as u32));
    }
    Ok(decompressed)
}

/// Wrapper for a union of any [Feature] iterator with `std::iter::once<Error>`.
enum BlockResultFeatureIterator<I: Iterator<Item = Result<Feature, Error>>> {
    Iterating(I),
    Done(Option<Error>),
}

impl<I: Iterator<Item = Result<Feature, Error>>> Iterator for BlockResultFeatureIterator<I> {
    type Item = Result<Feature, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Self::Iterating(i) => match i.next() {
                Some(f) => Some(f),
                None => {
                    *self = Self::Done(None);
                    None
                }
            },

            Self::Done(e) => e.take().map(Err),
        }
    }
}

fn block_result_features(
    block_result: Result<Block, Error>,
) -> BlockResultFeatureIterator<impl Iterator<Item = Result<Feature, Error>>> {
    match block_result {
        Ok(block) => BlockResultFeatureIterator::Iterating(block.features()),
        Err(e) => BlockResultFeatureIterator::Done(Some(e)),
    }
}

/// Block abstracts away an [osmformat::PrimitiveBlock] into a friendly interface.
struct Block(osmformat::PrimitiveBlock);

impl Block {
    /// Returns an iterator over all [Groups](Group) in this block.
    fn groups(self) -> impl Iterator<Item = Group> {
        let coordinate_converter = self.build_coordinate_converter();
        let string_table = Rc::new(self.build_string_table());
        self.0.primitivegroup.into_iter().map(move |g| Group {
            primitive_group: g,
            coordinate_converter,
            string_table: string_table.clone(),
        })
    }

    /// Returns a flattened iterator over all [Features](Feature) from all [Groups](Group) in this block.
    fn features(self) -> impl Iterator<Item = Result<Feature, Error>> {
        self.groups().flat_map(|g| g.features())
    }

    /// Converts the [osmformat::StringTable] into a simpler `Vec<String>`.
    fn build_string_table(&self) -> Vec<String> {
        self.0
            .stringtable
            .s
            .iter()
            .map(|bytes| String::from_utf8_lossy(bytes).to_string())
            .collect()
    }

    fn build_coordinate_converter(&self) -> CoordinateConverter {
        CoordinateConverter {
            lat_offset: self.0.lat_offset(),
            lon_offset: self.0.lon_offset(),
            granularity: self.0.granularity() as i64,
        }
    }
}

/// Group abstracts away an [osmformat::PrimitiveGroup] into a friendly interface.
struct Group {
    primitive_group: osmformat::PrimitiveGroup,
    coordinate_converter: CoordinateConverter,
    string_table: StringTable,
}

impl Group {
    /// Returns a flattened iterator over all nodes and ways in this group.
    /// Relations and changesets are not needed to rebuild road geometries and are skipped.
    fn features(self) -> impl Iterator<Item = Result<Feature, Error>> {
        let nodes = Self::nodes(self.primitive_group.nodes, self.coordinate_converter)
            .map(|n| n.map(Feature::Node));

        let dense_nodes = Self::dense_nodes(
            self.primitive_group.dense.unwrap_or_default(),
            self.coordinate_converter,
        )
        .map(|n| n.map(Feature::Node));

        let ways =
            Self::ways(self.primitive_group.ways, self.string_table).map(|w| w.map(Feature::Way));

        nodes.chain(dense_nodes).chain(ways)
    }

    /// Returns an iterator over all standard (non-dense-encoded) [nodes](Node) from a moved
    /// vector of [raw nodes](osmformat::Node).
    fn nodes(
        raw_nodes: Vec<osmformat::Node>,
        coordinate_converter: CoordinateConverter,
    ) -> impl Iterator<Item = Result<Node, Error>> {
        raw_nodes.into_iter().map(move |node| {
            let id = node.id();
            let position = coordinate_converter
                .convert(node.lon(), node.lat())
                .ok_or(Error::CoordinateOutOfRange(id))?;
            Ok(Node { id, position })
        })
    }

    /// Returns an iterator over all dense-encoded [nodes](Node) from a moved [raw dense nodes](osmformat::DenseNodes).
    fn dense_nodes(
        raw_dense_nodes: osmformat::DenseNodes,
        coordinate_converter: CoordinateConverter,
    ) -> impl Iterator<Item = Result<Node, Error>> {
        let ids = undelta(raw_dense_nodes.id);
        let lats = undelta(raw_dense_nodes.lat);
        let lons = undelta(raw_dense_nodes.lon);

        ids.zip(lons.zip(lats)).map(move |(id, (lon, lat))| {
            let id = id.ok_or(Error::DeltaOverflow("DenseNodes.id"))?;
            let position = lon
                .zip(lat)
                .and_then(|(lon, lat)| coordinate_converter.convert(lon, lat))
                .ok_or(Error::CoordinateOutOfRange(id))?;
            Ok(Node { id, position })
        })
    }

    /// Returns an iterator over all [ways](Way) from a moved vector of [raw ways](osmformat::Way).
    fn ways(
        raw_ways: Vec<osmformat::Way>,
        string_table: StringTable,
    ) -> impl Iterator<Item = Result<Way, Error>> {
        raw_ways.into_iter().map(move |way| {
            let id = way.id();
            let nodes = undelta(way.refs)
                .collect::<Option<Vec<i64>>>()
                .ok_or(Error::DeltaOverflow("Way.refs"))?;
            Ok(Way {
                id,
                nodes,
                tags: collect_tags(&way.keys, &way.vals, &string_table),
            })
        })
    }
}

/// Converts latitudes and longitudes from OSM PBF representation to `f64` degrees.
#[derive(Clone, Copy)]
struct CoordinateConverter {
    lat_offset: i64,
    lon_offset: i64,
    granularity: i64,
}

impl CoordinateConverter {
    /// Returns None if the position doesn't fit in an `i64` of nanodegrees.
    fn convert(&self, lon: i64, lat: i64) -> Option<Coordinate> {
        let nano = |offset: i64, value: i64| {
            self.granularity
                .checked_mul(value)
                .and_then(|v| v.checked_add(offset))
        };
        Some(Coordinate {
            lon: nano(self.lon_offset, lon)? as f64 / 1e9,
            lat: nano(self.lat_offset, lat)? as f64 / 1e9,
        })
    }
}

/// Decodes a delta-coded column. Every value from the first overflow onwards is None.
fn undelta(deltas: Vec<i64>) -> impl Iterator<Item = Option<i64>> {
    deltas.into_iter().scan(Some(0i64), |acc, delta| {
        *acc = acc.and_then(|a| a.checked_add(delta));
        Some(*acc)
    })
}

fn collect_tags(keys: &[u32], values: &[u32], string_table: &[String]) -> Tags {
    keys.iter()
        .zip(values.iter())
        .map(|(&key_idx, &value_idx)| {
            (
                get_string(string_table, key_idx),
                get_string(string_table, value_idx),
            )
        })
        .collect()
}

#[inline]
fn get_string(table: &[String], idx: u32) -> String {
    table.get(idx as usize).cloned().unwrap_or_default()
}
