// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::ffi::OsString;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use crate::graph::ReductionModel;
use crate::osm::pbf;
use crate::Error;

/// Serializes a [ReductionModel] as an OSM PBF stream: header, then nodes, then ways.
pub fn write_model_to_io<W: io::Write>(
    model: &ReductionModel,
    writer: W,
    writing_program: &str,
) -> Result<W, pbf::Error> {
    let mut w = pbf::Writer::new(writer, writing_program);
    w.write_header(model.nodes().iter().map(|n| n.position))?;
    w.write_nodes(model.nodes())?;
    w.write_ways(model.ways())?;
    w.finish()
}

/// Writes a [ReductionModel] into an OSM PBF file at the provided path,
/// replacing any existing file.
///
/// The data is first written to a temporary file in the same directory,
/// which is then renamed over `path`. On failure the temporary file is removed
/// and [Error::Write] is returned; an existing file at `path` is left untouched.
pub fn write_model_to_file<P: AsRef<Path>>(
    model: &ReductionModel,
    path: P,
    writing_program: &str,
) -> Result<(), Error> {
    let path = path.as_ref();
    let tmp = temporary_path(path);

    let result = write_and_rename(model, &tmp, path, writing_program);
    if result.is_err() {
        // The temporary file might not exist (yet or anymore)
        _ = fs::remove_file(&tmp);
    }

    result.map_err(|source| Error::Write {
        path: path.to_path_buf(),
        source,
    })?;

    log::info!(
        "wrote {} nodes and {} ways to {}",
        model.nodes().len(),
        model.ways().len(),
        path.display()
    );
    Ok(())
}

fn write_and_rename(
    model: &ReductionModel,
    tmp: &Path,
    path: &Path,
    writing_program: &str,
) -> Result<(), pbf::Error> {
    let f = File::create(tmp)?;
    let b = write_model_to_io(model, io::BufWriter::new(f), writing_program)?;
    let f = b.into_inner().map_err(io::IntoInnerError::into_error)?;
    f.sync_all()?;
    drop(f);
    fs::rename(tmp, path)?;
    Ok(())
}

/// Returns `dir/.name.tmp` for `dir/name`.
fn temporary_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(path.file_name().unwrap_or_else(|| "output".as_ref()));
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::GraphBuilder;
    use crate::osm::read_network_from_buffer;
    use crate::{Coordinate, Tags};

    fn model() -> ReductionModel {
        let mut b = GraphBuilder::new();
        b.add_line(
            &[Coordinate::new(1.0, 1.0), Coordinate::new(2.0, 1.0)],
            Tags::from_iter([("highway".to_string(), "primary".to_string())]),
        )
        .unwrap();
        b.finish()
    }

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("roadcut-writer-{}-{name}", std::process::id()));
        _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn temporary_path_is_a_sibling() {
        assert_eq!(
            temporary_path(Path::new("/data/out.osm.pbf")),
            PathBuf::from("/data/.out.osm.pbf.tmp")
        );
        assert_eq!(
            temporary_path(Path::new("out.osm.pbf")),
            PathBuf::from(".out.osm.pbf.tmp")
        );
    }

    #[test]
    fn writes_readable_file() {
        let dir = test_dir("readable");
        let path = dir.join("out.osm.pbf");
        fs::write(&path, b"stale content").unwrap();

        write_model_to_file(&model(), &path, "test").unwrap();

        let data = fs::read(&path).unwrap();
        let network = read_network_from_buffer(&data, "highway").unwrap();
        assert_eq!(network.len(), 1);
        assert!(!temporary_path(&path).exists());
        _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn failed_write_leaves_nothing_behind() {
        let dir = test_dir("failure");
        let path = dir.join("missing-dir").join("out.osm.pbf");

        let err = write_model_to_file(&model(), &path, "test").unwrap_err();

        assert!(matches!(err, Error::Write { .. }), "got {err:?}");
        assert!(!path.exists());
        assert!(!temporary_path(&path).exists());
        _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn invalid_model_is_not_written() {
        let dir = test_dir("invalid");
        let path = dir.join("out.osm.pbf");

        let mut b = GraphBuilder::new();
        b.add_line(
            &[Coordinate::new(1.0, 1.0), Coordinate::new(1.0, 95.0)],
            Tags::default(),
        )
        .unwrap();

        let err = write_model_to_file(&b.finish(), &path, "test").unwrap_err();

        assert!(matches!(err, Error::Write { .. }), "got {err:?}");
        assert!(!path.exists());
        assert!(!temporary_path(&path).exists());
        _ = fs::remove_dir_all(&dir);
    }
}
