// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::error::Error;
use std::path::PathBuf;

use clap::Parser;
use roadcut;

/// Reduce an OpenStreetMap road network to a set of GeoJSON lines,
/// recovering the lines' tags from the original roads.
#[derive(Parser)]
#[command(version)]
struct Cli {
    /// The path to the source OSM PBF file
    source: PathBuf,

    /// The path to the GeoJSON file with lines to keep
    candidates: PathBuf,

    /// The path to the output OSM PBF file
    output: PathBuf,

    /// Tag applied to lines without a matching road; may be repeated.
    /// Replaces the default highway=unclassified, oneway=no, source=custom_geojson.
    #[arg(long = "fallback-tag", value_name = "KEY=VALUE", value_parser = parse_tag)]
    fallback_tags: Vec<(String, String)>,

    /// Only source ways with this tag key are considered roads
    #[arg(long, value_name = "KEY", default_value = roadcut::osm::DEFAULT_ROAD_KEY)]
    road_key: String,

    /// Log more details; may be repeated
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    fn log_level(&self) -> log::LevelFilter {
        match (self.quiet, self.verbose) {
            (true, _) => log::LevelFilter::Error,
            (false, 0) => log::LevelFilter::Info,
            (false, 1) => log::LevelFilter::Debug,
            (false, _) => log::LevelFilter::Trace,
        }
    }

    fn options(&self) -> roadcut::Options {
        let mut options = roadcut::Options {
            road_key: self.road_key.clone(),
            ..Default::default()
        };
        if !self.fallback_tags.is_empty() {
            options.fallback_tags = self.fallback_tags.iter().cloned().collect();
        }
        options
    }
}

fn parse_tag(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((k, v)) if !k.is_empty() => Ok((k.to_string(), v.to_string())),
        _ => Err(format!("expected KEY=VALUE, got {s:?}")),
    }
}

pub fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    colog::default_builder().filter_level(cli.log_level()).init();

    if cli.output.exists() {
        log::warn!("{} already exists and will be overwritten", cli.output.display());
    }

    let summary = roadcut::reduce(&cli.source, &cli.candidates, &cli.output, &cli.options())?;
    println!("{summary}");
    Ok(())
}
