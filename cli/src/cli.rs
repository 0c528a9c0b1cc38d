use std::path::PathBuf;

use anyhow::Result;
use popgrid::Settings;

/// Population raster clipping and region statistics CLI (argument schema only)
#[derive(clap::Parser, Debug)]
#[command(name = "popgrid", version, about, propagate_version = true)]
pub struct Cli {
    /// Increase output verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Settings file (JSON); flags and POPGRID_* variables override it
    #[arg(long, global = true, env = "POPGRID_CONFIG", value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Directory holding the per-year population GeoTIFFs
    #[arg(long, global = true, env = "POPGRID_RASTER_DIR", value_hint = clap::ValueHint::DirPath)]
    pub raster_dir: Option<PathBuf>,

    /// Read boundaries from {adcode}.json files in this directory instead of over HTTP
    #[arg(long, global = true, env = "POPGRID_BOUNDARY_DIR", value_hint = clap::ValueHint::DirPath)]
    pub boundary_dir: Option<PathBuf>,

    /// Worker threads for city batches (0 = one per core)
    #[arg(long, global = true, env = "POPGRID_WORKERS")]
    pub workers: Option<usize>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Settings from the config file (or defaults) with command-line overrides applied.
    pub fn settings(&self) -> Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => Settings::from_json_file(path)?,
            None => Settings::default(),
        };
        if let Some(dir) = &self.raster_dir { settings.raster_dir = dir.clone() }
        if let Some(dir) = &self.boundary_dir { settings.boundary_dir = Some(dir.clone()) }
        if let Some(workers) = self.workers { settings.workers = workers }
        Ok(settings)
    }
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Population statistics for one region
    Region(RegionArgs),

    /// Per-district population table for a city
    City(CityArgs),

    /// Clip a local raster to a local GeoJSON boundary
    Clip(ClipArgs),
}

#[derive(clap::Args, Debug)]
pub struct RegionArgs {
    /// Administrative code, e.g. 110105
    pub adcode: u32,

    /// Raster year
    #[arg(short, long)]
    pub year: u16,

    /// Write the point samples (lon, lat, population) to this CSV
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub samples: Option<PathBuf>,

    /// Write the summary as JSON to this file instead of stdout
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub json: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct CityArgs {
    /// Province name, e.g. 江苏省 (selects the adcode prefix length)
    pub province: String,

    /// City adcode, e.g. 320100
    pub city: u32,

    /// Raster year
    #[arg(short, long)]
    pub year: u16,

    /// Name/adcode lookup table (CSV with `name` or `中文名`, and `adcode` columns)
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub adcodes: PathBuf,

    /// District names; defaults to every subdivision of the city
    #[arg(short, long = "district")]
    pub districts: Vec<String>,

    /// Output summary CSV; prints JSON to stdout when omitted
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub output: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct ClipArgs {
    /// Boundary GeoJSON (FeatureCollection, Feature, or geometry)
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub boundary: PathBuf,

    /// Population GeoTIFF
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub raster: PathBuf,

    /// Write the masked, cropped raster to this GeoTIFF
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub output: Option<PathBuf>,

    /// Write the point samples to this CSV
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub samples: Option<PathBuf>,
}
