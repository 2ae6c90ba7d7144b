// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

fn main() {
    protobuf_codegen::Codegen::new()
        .pure()
        .include("src/osm/pbf/proto")
        .input("src/osm/pbf/proto/fileformat.proto")
        .input("src/osm/pbf/proto/osmformat.proto")
        .cargo_out_dir("osm_pbf")
        .run_from_script();
}
