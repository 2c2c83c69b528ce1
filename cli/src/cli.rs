use std::path::PathBuf;

/// Walkability CLI (argument schema only)
#[derive(clap::Parser, Debug)]
#[command(name = "walkzone", version, about, propagate_version = true)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Decode a zip, shp, kml, xlsx, xls, csv or (geo)json file into GeoJSON
    Import(ImportArgs),

    /// Keep the features whose point or centroid lies inside a boundary polygon
    Clip(ClipArgs),

    /// Compute walking isochrones around a point
    Isochrones(IsochroneArgs),

    /// Score a point against a directory of point-of-interest layers
    Analyze(AnalyzeArgs),
}

#[derive(clap::Args, Debug)]
pub struct ImportArgs {
    /// Input file; the extension selects the format
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub input: PathBuf,

    /// Output GeoJSON file, defaults to stdout
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub output: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct ClipArgs {
    /// Features to clip
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub features: PathBuf,

    /// File whose first polygon is the boundary
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub boundary: PathBuf,

    /// Output GeoJSON file, defaults to stdout
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub output: Option<PathBuf>,
}

/// Sample point and isochrone source, shared by `isochrones` and `analyze`.
#[derive(clap::Args, Debug)]
pub struct OriginArgs {
    /// Longitude of the sample point
    #[arg(long, allow_hyphen_values = true)]
    pub lon: f64,

    /// Latitude of the sample point
    #[arg(long, allow_hyphen_values = true)]
    pub lat: f64,

    /// TOML settings file
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Street network (line features) for local isochrones
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub network: Option<PathBuf>,

    /// Skip providers and use walking buffers
    #[arg(long, conflicts_with = "network")]
    pub buffers: bool,
}

#[derive(clap::Args, Debug)]
pub struct IsochroneArgs {
    #[command(flatten)]
    pub origin: OriginArgs,

    /// Thresholds in minutes, overriding the config
    #[arg(short, long, value_delimiter = ',')]
    pub minutes: Vec<f64>,

    /// Output GeoJSON file, defaults to stdout
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub output: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct AnalyzeArgs {
    #[command(flatten)]
    pub origin: OriginArgs,

    /// Directory of layers; each file is named by its stem, e.g. transit_stops.csv
    #[arg(long, value_hint = clap::ValueHint::DirPath)]
    pub layers: PathBuf,

    /// Output JSON result, defaults to stdout
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub output: Option<PathBuf>,
}
