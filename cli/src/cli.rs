use std::path::PathBuf;

/// GeoJSON preparation CLI (argument schema only)
#[derive(clap::Parser, Debug)]
#[command(name = "geoprep", version, about, propagate_version = true)]
pub struct Cli {
    /// Increase output verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Extract and merge vector-tile features into a GeoJSON file
    Extract(ExtractArgs),

    /// Convert a land-use shapefile into forest/grassland/water polygons
    Landuse(LanduseArgs),

    /// Write a landcover region table as GeoJSON
    Regions(RegionsArgs),

    /// Write population tables as circle and extrusion GeoJSON layers
    Population(PopulationArgs),

    /// Move city centers onto their city-hall coordinates
    Cityhall(CityhallArgs),

    /// Clip a Natural Earth land shapefile to the Japan window
    NaturalEarth(NaturalEarthArgs),
}

#[derive(clap::Args, Debug)]
pub struct ExtractArgs {
    /// Bounding box in degrees
    #[arg(
        long,
        num_args = 4,
        value_names = ["MIN_LON", "MIN_LAT", "MAX_LON", "MAX_LAT"],
        default_values_t = [122.0, 24.0, 154.0, 46.0],
        allow_negative_numbers = true,
    )]
    pub bbox: Vec<f64>,

    /// Tile zoom level
    #[arg(short, long, default_value_t = 7)]
    pub zoom: u8,

    /// Output GeoJSON file
    #[arg(short, long, default_value = "geojson/urban-areas.json", value_hint = clap::ValueHint::FilePath)]
    pub output: PathBuf,

    /// Tile URL template with {z}, {x} and {y} placeholders
    #[arg(long, default_value = "https://tile.openstreetmap.jp/data/planet/{z}/{x}/{y}.pbf")]
    pub url: String,

    /// Vector tile layer to read
    #[arg(long, default_value = "landuse")]
    pub layer: String,

    /// Keep features whose `class` is one of these (repeatable)
    #[arg(long = "class", value_name = "NAME", default_values = ["residential", "commercial", "industrial"])]
    pub classes: Vec<String>,

    /// Keep every feature of the layer regardless of class
    #[arg(long, conflicts_with = "classes")]
    pub all_classes: bool,

    /// Write the features as decoded instead of merging them
    #[arg(long)]
    pub no_merge: bool,

    /// `type` property of the merged feature
    #[arg(long, default_value = "urban")]
    pub label: String,

    /// Pixel offset added to tile y before mapping to latitude
    #[arg(long, default_value_t = geoprep::tile::DEFAULT_VERTICAL_OFFSET, allow_negative_numbers = true)]
    pub vertical_offset: f64,

    /// Pixel extent of a tile edge
    #[arg(long, default_value_t = geoprep::tile::DEFAULT_EXTENT)]
    pub extent: f64,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 10.0)]
    pub timeout: f64,
}

#[derive(clap::Args, Debug)]
pub struct LanduseArgs {
    /// Input land-use shapefile (.shp)
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub input: PathBuf,

    /// Output GeoJSON file
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub output: PathBuf,

    /// Simplification tolerance in degrees
    #[arg(long, default_value_t = 0.001)]
    pub simplify: f64,

    /// Attribute column holding the land-use code
    #[arg(long)]
    pub code_column: Option<String>,

    /// PROJ.4 definition of the input CRS, if not WGS84 lon/lat
    #[arg(long, value_name = "PROJ4")]
    pub source_proj: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct RegionsArgs {
    /// Region table (JSON)
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub table: PathBuf,

    /// Output GeoJSON file
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub output: PathBuf,
}

#[derive(clap::Args, Debug)]
pub struct PopulationArgs {
    /// Population tables (JSON), one pair of layers per table
    #[arg(
        value_hint = clap::ValueHint::FilePath,
        default_values = ["data/population-prefectures.json", "data/population-cities.json"],
    )]
    pub tables: Vec<PathBuf>,

    /// Directory receiving population-{kind}-circle.json and population-{kind}-3d.json
    #[arg(short, long, default_value = "geojson", value_hint = clap::ValueHint::DirPath)]
    pub output_dir: PathBuf,
}

#[derive(clap::Args, Debug)]
pub struct CityhallArgs {
    /// City-hall CSV with prefecture_code, city_name, longitude and latitude columns
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub city_halls: PathBuf,

    /// City population table to update
    #[arg(long, default_value = "data/population-cities.json", value_hint = clap::ValueHint::FilePath)]
    pub table: PathBuf,

    /// Updated table; defaults to rewriting --table
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub output: Option<PathBuf>,

    /// List cities that move further than this many kilometres
    #[arg(long, default_value_t = 1.0)]
    pub report_km: f64,
}

#[derive(clap::Args, Debug)]
pub struct NaturalEarthArgs {
    /// Natural Earth land shapefile (.shp)
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub input: PathBuf,

    /// Output GeoJSON file
    #[arg(short, long, default_value = "geojson/natural-earth-landcover.json", value_hint = clap::ValueHint::FilePath)]
    pub output: PathBuf,

    /// Clip window in degrees
    #[arg(
        long,
        num_args = 4,
        value_names = ["MIN_LON", "MIN_LAT", "MAX_LON", "MAX_LAT"],
        default_values_t = geoprep::JAPAN_BBOX,
        allow_negative_numbers = true,
    )]
    pub bbox: Vec<f64>,

    /// Simplification tolerance in degrees
    #[arg(long, default_value_t = 0.01)]
    pub simplify: f64,
}
