use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use engine_logging::LogDestination;
use harvester_engine::{GeoBias, SearchQuery, SourceKind};
use log::LevelFilter;

#[derive(Debug, Parser)]
#[command(name = "harvester")]
#[command(about = "Incrementally harvest business listings for a search query")]
#[command(version)]
pub struct Cli {
    /// RON settings file, applied before environment variables
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    /// Directory holding the CSV sink and the cursor slots
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Also append log output to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Log debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn log_destination(&self) -> LogDestination {
        match &self.log_file {
            Some(path) => LogDestination::Both(path.clone()),
            None => LogDestination::Terminal,
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        if self.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch up to the page budget and append new listings
    Run(RunArgs),

    /// Inspect or clear the stored continuation of a query
    #[command(subcommand)]
    Cursor(CursorCommand),
}

#[derive(Debug, Subcommand)]
pub enum CursorCommand {
    /// Print the stored continuation token
    Show(QueryArgs),
    /// Forget the continuation; the next run starts from the first page
    Reset(QueryArgs),
}

#[derive(Debug, Args)]
pub struct QueryArgs {
    /// Search text, e.g. "cafes in Pune"
    #[arg(short, long)]
    pub query: String,

    /// Region or language hint passed to the provider
    #[arg(long)]
    pub region: Option<String>,

    /// Bias results around LAT,LNG,RADIUS_METERS
    #[arg(long, value_parser = parse_geo_bias)]
    pub near: Option<GeoBias>,
}

impl QueryArgs {
    pub fn to_query(&self) -> SearchQuery {
        let mut query = SearchQuery::new(self.query.clone());
        if let Some(region) = &self.region {
            query = query.with_region(region.clone());
        }
        if let Some(bias) = self.near {
            query = query.with_geo_bias(bias);
        }
        query
    }
}

#[derive(Debug, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub query: QueryArgs,

    /// Maximum pages to fetch in this invocation
    #[arg(short, long)]
    pub pages: Option<u32>,

    /// Transport: html (rendering proxy) or json (places API)
    #[arg(long)]
    pub source: Option<SourceKind>,

    /// Country the rendering proxy should route through
    #[arg(long)]
    pub country: Option<String>,

    /// Ask the rendering proxy for the raw page without running scripts
    #[arg(long)]
    pub no_render_js: bool,
}

fn parse_geo_bias(value: &str) -> Result<GeoBias, String> {
    let parts: Vec<&str> = value.split(',').map(str::trim).collect();
    let [lat, lng, radius] = parts.as_slice() else {
        return Err(format!("expected LAT,LNG,RADIUS_METERS, got {value:?}"));
    };
    let latitude: f64 = lat.parse().map_err(|_| format!("bad latitude {lat:?}"))?;
    let longitude: f64 = lng.parse().map_err(|_| format!("bad longitude {lng:?}"))?;
    let radius_m: u32 = radius.parse().map_err(|_| format!("bad radius {radius:?}"))?;
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return Err(format!("coordinates out of range: {value:?}"));
    }
    Ok(GeoBias {
        latitude,
        longitude,
        radius_m,
    })
}
