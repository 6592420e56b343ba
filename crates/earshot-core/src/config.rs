use crate::error::{EarshotError, Result};
use crate::models::tile::{GridShape, MAX_GRID_RADIUS, MAX_ZOOM};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Configuration source for tracking where values come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Default value
    Default,
    /// Loaded from config file
    File,
    /// Loaded from environment variable
    Environment,
    /// Provided via CLI argument
    Cli,
}

impl ConfigSource {
    /// Returns the precedence level (higher = higher priority)
    pub fn precedence(&self) -> u8 {
        match self {
            ConfigSource::Default => 0,
            ConfigSource::File => 1,
            ConfigSource::Environment => 2,
            ConfigSource::Cli => 3,
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }

    /// Update the value if the new source has higher precedence
    pub fn update(&mut self, value: T, source: ConfigSource) {
        if source.precedence() > self.source.precedence() {
            self.value = value;
            self.source = source;
        }
    }
}

/// Which earth model distance math runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RulerKind {
    /// Flat-earth approximation around a reference latitude, fast and
    /// accurate to a fraction of a percent over a few kilometers
    #[default]
    Cheap,
    /// Great-circle math on a spherical earth
    Haversine,
}

impl fmt::Display for RulerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RulerKind::Cheap => f.write_str("cheap"),
            RulerKind::Haversine => f.write_str("haversine"),
        }
    }
}

impl FromStr for RulerKind {
    type Err = EarshotError;

    fn from_str(s: &str) -> Result<Self> {
        parse_ruler_kind(s)
    }
}

/// Settings for the tile grid cache
#[derive(Debug, Clone, PartialEq)]
pub struct GridConfig {
    pub zoom_level: u8,
    /// Neighbourhood radius in tiles around the tile holding the user
    pub radius: u32,
    pub shape: GridShape,
    /// Delay before the first retry of a failed tile
    pub retry_base: Duration,
    /// Upper bound on the retry delay
    pub retry_ceiling: Duration,
    /// Failures after which a tile waits for a refresh or retarget
    pub max_fetch_attempts: u32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            zoom_level: 16,
            radius: 1,
            shape: GridShape::Square,
            retry_base: Duration::from_millis(1_000),
            retry_ceiling: Duration::from_millis(60_000),
            max_fetch_attempts: 5,
        }
    }
}

impl GridConfig {
    pub fn validate(&self) -> Result<()> {
        if self.zoom_level > MAX_ZOOM {
            return Err(EarshotError::ConfigInvalid {
                key: "zoom_level".to_string(),
                reason: format!("{} exceeds the maximum zoom {}", self.zoom_level, MAX_ZOOM),
            });
        }
        if self.radius > MAX_GRID_RADIUS {
            return Err(misconfigured(
                "grid_radius",
                format!("{} exceeds the maximum radius {}", self.radius, MAX_GRID_RADIUS),
            ));
        }
        if self.retry_base.is_zero() {
            return Err(misconfigured("retry_base_ms", "must be positive"));
        }
        if self.retry_ceiling < self.retry_base {
            return Err(misconfigured(
                "retry_ceiling_ms",
                format!(
                    "{}ms is below retry_base_ms {}ms",
                    self.retry_ceiling.as_millis(),
                    self.retry_base.as_millis()
                ),
            ));
        }
        if self.max_fetch_attempts == 0 {
            return Err(misconfigured("max_fetch_attempts", "must be at least 1"));
        }
        Ok(())
    }

    /// Delay before retrying a tile that has failed `attempts` times
    pub fn backoff(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1).min(31);
        self.retry_base.saturating_mul(1u32 << exponent).min(self.retry_ceiling)
    }
}

/// Settings for the callout history
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryConfig {
    pub capacity: usize,
    /// Entries older than this are trimmed
    pub expiry: Duration,
    /// Entries farther than this from the reference location are trimmed
    pub distance_threshold_m: f64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { capacity: 32, expiry: Duration::from_millis(60_000), distance_threshold_m: 50.0 }
    }
}

impl HistoryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(misconfigured("history_capacity", "must be at least 1"));
        }
        if self.expiry.is_zero() {
            return Err(misconfigured("history_expiry_ms", "must be positive"));
        }
        if !(self.distance_threshold_m.is_finite() && self.distance_threshold_m > 0.0) {
            return Err(misconfigured(
                "history_distance_m",
                format!("{} is not a positive distance", self.distance_threshold_m),
            ));
        }
        Ok(())
    }
}

fn misconfigured(key: &str, reason: impl Into<String>) -> EarshotError {
    EarshotError::CapacityMisconfiguration { key: key.to_string(), reason: reason.into() }
}

/// Layered configuration for Earshot
#[derive(Debug, Clone)]
pub struct LayeredConfig {
    pub zoom_level: ConfigValue<u8>,
    pub grid_radius: ConfigValue<u32>,
    pub grid_shape: ConfigValue<GridShape>,
    pub retry_base_ms: ConfigValue<u64>,
    pub retry_ceiling_ms: ConfigValue<u64>,
    pub max_fetch_attempts: ConfigValue<u32>,
    pub history_capacity: ConfigValue<usize>,
    pub history_expiry_ms: ConfigValue<u64>,
    pub history_distance_m: ConfigValue<f64>,
    pub ruler: ConfigValue<RulerKind>,
}

impl LayeredConfig {
    /// Create a new configuration with default values
    pub fn with_defaults() -> Self {
        let grid = GridConfig::default();
        let history = HistoryConfig::default();
        Self {
            zoom_level: ConfigValue::new(grid.zoom_level, ConfigSource::Default),
            grid_radius: ConfigValue::new(grid.radius, ConfigSource::Default),
            grid_shape: ConfigValue::new(grid.shape, ConfigSource::Default),
            retry_base_ms: ConfigValue::new(
                grid.retry_base.as_millis() as u64,
                ConfigSource::Default,
            ),
            retry_ceiling_ms: ConfigValue::new(
                grid.retry_ceiling.as_millis() as u64,
                ConfigSource::Default,
            ),
            max_fetch_attempts: ConfigValue::new(grid.max_fetch_attempts, ConfigSource::Default),
            history_capacity: ConfigValue::new(history.capacity, ConfigSource::Default),
            history_expiry_ms: ConfigValue::new(
                history.expiry.as_millis() as u64,
                ConfigSource::Default,
            ),
            history_distance_m: ConfigValue::new(
                history.distance_threshold_m,
                ConfigSource::Default,
            ),
            ruler: ConfigValue::new(RulerKind::default(), ConfigSource::Default),
        }
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| EarshotError::ConfigInvalid {
                key: "file".to_string(),
                reason: format!("Failed to read config file: {}", e),
            })?;

        let file_config: FileConfig =
            toml::from_str(&content).map_err(|e| EarshotError::ConfigInvalid {
                key: "file".to_string(),
                reason: format!("Failed to parse TOML: {}", e),
            })?;

        if let Some(zoom) = file_config.zoom_level {
            self.zoom_level.update(zoom, ConfigSource::File);
        }
        if let Some(radius) = file_config.grid_radius {
            self.grid_radius.update(radius, ConfigSource::File);
        }
        if let Some(shape) = file_config.grid_shape {
            self.grid_shape.update(shape, ConfigSource::File);
        }
        if let Some(ms) = file_config.retry_base_ms {
            self.retry_base_ms.update(ms, ConfigSource::File);
        }
        if let Some(ms) = file_config.retry_ceiling_ms {
            self.retry_ceiling_ms.update(ms, ConfigSource::File);
        }
        if let Some(attempts) = file_config.max_fetch_attempts {
            self.max_fetch_attempts.update(attempts, ConfigSource::File);
        }
        if let Some(capacity) = file_config.history_capacity {
            self.history_capacity.update(capacity, ConfigSource::File);
        }
        if let Some(ms) = file_config.history_expiry_ms {
            self.history_expiry_ms.update(ms, ConfigSource::File);
        }
        if let Some(meters) = file_config.history_distance_m {
            self.history_distance_m.update(meters, ConfigSource::File);
        }
        if let Some(ruler) = file_config.ruler {
            self.ruler.update(ruler, ConfigSource::File);
        }

        Ok(self)
    }

    /// Load configuration from `EARSHOT_*` environment variables.
    ///
    /// Unparseable values are skipped with a warning.
    pub fn load_from_env(mut self) -> Self {
        env_override("EARSHOT_ZOOM_LEVEL", &mut self.zoom_level, "integer zoom level", |s| {
            s.parse().ok()
        });
        env_override("EARSHOT_GRID_RADIUS", &mut self.grid_radius, "tile count", |s| {
            s.parse().ok()
        });
        env_override("EARSHOT_GRID_SHAPE", &mut self.grid_shape, "square or diamond", |s| {
            parse_grid_shape(s).ok()
        });
        env_override("EARSHOT_RETRY_BASE_MS", &mut self.retry_base_ms, "milliseconds", |s| {
            s.parse().ok()
        });
        env_override("EARSHOT_RETRY_CEILING_MS", &mut self.retry_ceiling_ms, "milliseconds", |s| {
            s.parse().ok()
        });
        env_override(
            "EARSHOT_MAX_FETCH_ATTEMPTS",
            &mut self.max_fetch_attempts,
            "attempt count",
            |s| s.parse().ok(),
        );
        env_override("EARSHOT_HISTORY_CAPACITY", &mut self.history_capacity, "entry count", |s| {
            s.parse().ok()
        });
        env_override("EARSHOT_HISTORY_EXPIRY_MS", &mut self.history_expiry_ms, "milliseconds", |s| {
            s.parse().ok()
        });
        env_override("EARSHOT_HISTORY_DISTANCE_M", &mut self.history_distance_m, "meters", |s| {
            s.parse().ok()
        });
        env_override("EARSHOT_RULER", &mut self.ruler, "cheap or haversine", |s| {
            parse_ruler_kind(s).ok()
        });

        self
    }

    /// Update configuration from CLI arguments
    pub fn update_from_cli(&mut self, overrides: CliConfigOverrides) {
        if let Some(zoom) = overrides.zoom_level {
            self.zoom_level.update(zoom, ConfigSource::Cli);
        }
        if let Some(radius) = overrides.grid_radius {
            self.grid_radius.update(radius, ConfigSource::Cli);
        }
        if let Some(shape) = overrides.grid_shape {
            self.grid_shape.update(shape, ConfigSource::Cli);
        }
        if let Some(ruler) = overrides.ruler {
            self.ruler.update(ruler, ConfigSource::Cli);
        }
        if let Some(capacity) = overrides.history_capacity {
            self.history_capacity.update(capacity, ConfigSource::Cli);
        }
    }

    /// Validated tile grid settings
    pub fn grid_config(&self) -> Result<GridConfig> {
        let config = GridConfig {
            zoom_level: self.zoom_level.value,
            radius: self.grid_radius.value,
            shape: self.grid_shape.value,
            retry_base: Duration::from_millis(self.retry_base_ms.value),
            retry_ceiling: Duration::from_millis(self.retry_ceiling_ms.value),
            max_fetch_attempts: self.max_fetch_attempts.value,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validated callout history settings
    pub fn history_config(&self) -> Result<HistoryConfig> {
        let config = HistoryConfig {
            capacity: self.history_capacity.value,
            expiry: Duration::from_millis(self.history_expiry_ms.value),
            distance_threshold_m: self.history_distance_m.value,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate and resolve every component's settings at once
    pub fn resolve(&self) -> Result<EngineSettings> {
        Ok(EngineSettings {
            grid: self.grid_config()?,
            history: self.history_config()?,
            ruler: self.ruler.value,
        })
    }

    /// Get all configuration values as a map for inspection
    pub fn to_inspection_map(&self) -> HashMap<String, (String, ConfigSource)> {
        let mut map = HashMap::new();

        map.insert(
            "zoom_level".to_string(),
            (self.zoom_level.value.to_string(), self.zoom_level.source),
        );
        map.insert(
            "grid_radius".to_string(),
            (self.grid_radius.value.to_string(), self.grid_radius.source),
        );
        map.insert(
            "grid_shape".to_string(),
            (format!("{:?}", self.grid_shape.value).to_lowercase(), self.grid_shape.source),
        );
        map.insert(
            "retry_base_ms".to_string(),
            (self.retry_base_ms.value.to_string(), self.retry_base_ms.source),
        );
        map.insert(
            "retry_ceiling_ms".to_string(),
            (self.retry_ceiling_ms.value.to_string(), self.retry_ceiling_ms.source),
        );
        map.insert(
            "max_fetch_attempts".to_string(),
            (self.max_fetch_attempts.value.to_string(), self.max_fetch_attempts.source),
        );
        map.insert(
            "history_capacity".to_string(),
            (self.history_capacity.value.to_string(), self.history_capacity.source),
        );
        map.insert(
            "history_expiry_ms".to_string(),
            (self.history_expiry_ms.value.to_string(), self.history_expiry_ms.source),
        );
        map.insert(
            "history_distance_m".to_string(),
            (self.history_distance_m.value.to_string(), self.history_distance_m.source),
        );
        map.insert("ruler".to_string(), (self.ruler.value.to_string(), self.ruler.source));

        map
    }
}

fn env_override<T>(
    var: &str,
    target: &mut ConfigValue<T>,
    expected: &str,
    parse: impl Fn(&str) -> Option<T>,
) {
    if let Ok(raw) = env::var(var) {
        match parse(raw.trim()) {
            Some(value) => target.update(value, ConfigSource::Environment),
            None => tracing::warn!("Invalid {} value '{}': expected {}", var, raw, expected),
        }
    }
}

/// Fully validated settings for every component
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub grid: GridConfig,
    pub history: HistoryConfig,
    pub ruler: RulerKind,
}

/// Configuration loaded from TOML file
#[derive(Debug, Deserialize, Serialize)]
struct FileConfig {
    zoom_level: Option<u8>,
    grid_radius: Option<u32>,
    grid_shape: Option<GridShape>,
    retry_base_ms: Option<u64>,
    retry_ceiling_ms: Option<u64>,
    max_fetch_attempts: Option<u32>,
    history_capacity: Option<usize>,
    history_expiry_ms: Option<u64>,
    history_distance_m: Option<f64>,
    ruler: Option<RulerKind>,
}

/// CLI configuration overrides
#[derive(Debug, Default)]
pub struct CliConfigOverrides {
    pub zoom_level: Option<u8>,
    pub grid_radius: Option<u32>,
    pub grid_shape: Option<GridShape>,
    pub ruler: Option<RulerKind>,
    pub history_capacity: Option<usize>,
}

/// Parse ruler kind from string
pub fn parse_ruler_kind(s: &str) -> Result<RulerKind> {
    match s.to_lowercase().as_str() {
        "cheap" | "planar" => Ok(RulerKind::Cheap),
        "haversine" | "geodesic" => Ok(RulerKind::Haversine),
        _ => Err(EarshotError::ConfigInvalid {
            key: "ruler".to_string(),
            reason: format!("Invalid ruler: {}. Use cheap or haversine", s),
        }),
    }
}

/// Parse grid shape from string
pub fn parse_grid_shape(s: &str) -> Result<GridShape> {
    match s.to_lowercase().as_str() {
        "square" => Ok(GridShape::Square),
        "diamond" => Ok(GridShape::Diamond),
        _ => Err(EarshotError::ConfigInvalid {
            key: "grid_shape".to_string(),
            reason: format!("Invalid grid shape: {}. Use square or diamond", s),
        }),
    }
}
