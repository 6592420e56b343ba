use clap::{Parser, Subcommand};
use earshot_core::config::{CliConfigOverrides, RulerKind};
use earshot_core::models::{FeatureKind, GridShape, TileCoordinate};
use std::path::PathBuf;

/// Earshot - Location-aware audio description engine
#[derive(Parser, Debug)]
#[command(name = "earshot")]
#[command(about = "Decode vector tiles and find what is within earshot", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Output results in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Configuration file (TOML)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Tile zoom level
    #[arg(long, global = true)]
    pub zoom: Option<u8>,

    /// Tiles kept around the current tile
    #[arg(long, global = true)]
    pub grid_radius: Option<u32>,

    /// Neighbourhood shape (square or diamond)
    #[arg(long, global = true, value_parser = earshot_core::config::parse_grid_shape)]
    pub grid_shape: Option<GridShape>,

    /// Distance model (cheap or haversine)
    #[arg(long, global = true, value_parser = earshot_core::config::parse_ruler_kind)]
    pub ruler: Option<RulerKind>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn overrides(&self) -> CliConfigOverrides {
        CliConfigOverrides {
            zoom_level: self.zoom,
            grid_radius: self.grid_radius,
            grid_shape: self.grid_shape,
            ruler: self.ruler,
            history_capacity: None,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Decode one tile file and print it as GeoJSON
    Decode(DecodeArgs),

    /// List features near a location from a tile directory
    Near(NearArgs),

    /// Replay a walk and print the callouts it would produce
    Walk(WalkArgs),

    /// Show resolved configuration values and their sources
    Config,
}

#[derive(Parser, Debug)]
pub struct DecodeArgs {
    /// Path to the encoded tile
    pub path: PathBuf,

    /// Tile address as z/x/y
    #[arg(long, value_parser = parse_tile)]
    pub tile: TileCoordinate,

    /// Only keep features of this kind (repeatable)
    #[arg(long = "kind", value_parser = parse_kind)]
    pub kinds: Vec<FeatureKind>,
}

#[derive(Parser, Debug)]
pub struct NearArgs {
    /// Tile tree laid out as <dir>/<z>/<x>/<y>.mvt
    #[arg(long, value_name = "DIR")]
    pub tiles: PathBuf,

    /// Longitude in degrees
    #[arg(long, allow_hyphen_values = true)]
    pub lon: f64,

    /// Latitude in degrees
    #[arg(long, allow_hyphen_values = true)]
    pub lat: f64,

    /// Search radius in meters
    #[arg(long, default_value = "50")]
    pub radius: f64,

    /// Only return features of this kind (repeatable)
    #[arg(long = "kind", value_parser = parse_kind)]
    pub kinds: Vec<FeatureKind>,

    /// Return at most this many features, nearest first
    #[arg(long)]
    pub limit: Option<usize>,

    /// Give up waiting for tiles after this many seconds
    #[arg(long, default_value = "30")]
    pub timeout: u64,
}

#[derive(Parser, Debug)]
pub struct WalkArgs {
    /// Tile tree laid out as <dir>/<z>/<x>/<y>.mvt
    #[arg(long, value_name = "DIR")]
    pub tiles: PathBuf,

    /// Track file with one "lon,lat" pair per line
    pub track: PathBuf,

    /// Announce features within this many meters
    #[arg(long, default_value = "30")]
    pub radius: f64,

    /// Simulated seconds between track points
    #[arg(long, default_value = "1")]
    pub step_secs: u64,

    /// Callout history capacity
    #[arg(long)]
    pub history_capacity: Option<usize>,

    /// Give up waiting for tiles after this many seconds
    #[arg(long, default_value = "30")]
    pub timeout: u64,
}

fn parse_tile(s: &str) -> Result<TileCoordinate, String> {
    s.parse().map_err(|e: earshot_core::EarshotError| e.to_string())
}

fn parse_kind(s: &str) -> Result<FeatureKind, String> {
    s.parse().map_err(|e: earshot_core::EarshotError| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_near_with_negative_longitude() {
        let cli = Cli::parse_from([
            "earshot", "near", "--tiles", "tiles", "--lon", "-4.2518", "--lat", "55.8642", "--kind", "poi",
            "--kind", "transit_stop", "--ruler", "haversine",
        ]);

        assert_eq!(cli.ruler, Some(RulerKind::Haversine));
        match cli.command {
            Commands::Near(args) => {
                assert_eq!(args.lon, -4.2518);
                assert_eq!(args.kinds, vec![FeatureKind::Poi, FeatureKind::TransitStop]);
                assert_eq!(args.radius, 50.0);
            }
            other => panic!("Expected near, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_decode_tile_address() {
        let cli = Cli::parse_from(["earshot", "decode", "tile.mvt", "--tile", "16/32000/20427"]);
        match cli.command {
            Commands::Decode(args) => assert_eq!(args.tile, TileCoordinate::new(32000, 20427, 16)),
            other => panic!("Expected decode, got {:?}", other),
        }
        assert!(Cli::try_parse_from(["earshot", "decode", "tile.mvt", "--tile", "16/x/1"]).is_err());
    }

    #[test]
    fn test_overrides_from_global_flags() {
        let cli = Cli::parse_from(["earshot", "--zoom", "15", "--grid-shape", "diamond", "config"]);
        let overrides = cli.overrides();
        assert_eq!(overrides.zoom_level, Some(15));
        assert_eq!(overrides.grid_shape, Some(GridShape::Diamond));
        assert_eq!(overrides.grid_radius, None);
    }
}
