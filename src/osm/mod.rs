// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

//! [OpenStreetMap](https://www.openstreetmap.org/) data model and the
//! [PBF](https://wiki.openstreetmap.org/wiki/PBF_Format) codec.

pub mod model;
pub mod pbf;
mod reader;

pub use reader::{
    read_network_from_buffer, read_network_from_file, read_network_from_io, DEFAULT_ROAD_KEY,
};
