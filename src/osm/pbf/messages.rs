// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

//! Protobuf messages of the [OSM PBF format](https://wiki.openstreetmap.org/wiki/PBF_Format),
//! generated by `build.rs` from `proto/fileformat.proto` and `proto/osmformat.proto`.

include!(concat!(env!("OUT_DIR"), "/osm_pbf/mod.rs"));
