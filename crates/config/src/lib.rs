//! Shared configuration for the ink pipeline
//!
//! This crate is the single source of truth for the tunables the stroke
//! engine reads at construction: filter parameters, geometry thresholds,
//! quadtree limits, tile cache sizing, undo depth and lasso selection.
//!
//! Every section has serde defaults, so a JSON file only needs to name the
//! values it overrides.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Environment variable naming a JSON config file
pub const CONFIG_ENV_VAR: &str = "INK_CONFIG";

/// Default minimum cutoff frequency (Hz) for the adaptive filter
pub const DEFAULT_MIN_CUTOFF: f64 = 1.0;

/// Default speed coefficient for the adaptive filter
pub const DEFAULT_BETA: f64 = 0.007;

/// Default cutoff (Hz) used when smoothing the velocity estimate
pub const DEFAULT_D_CUTOFF: f64 = 1.0;

/// Default minimum distance between consecutive live points
pub const DEFAULT_MIN_POINT_DISTANCE: f64 = 1.0;

/// Default arc-length spacing targeted by the resampler
pub const DEFAULT_RESAMPLE_SPACING: f64 = 2.5;

/// Default half-extent of the indexed world square
pub const DEFAULT_WORLD_EXTENT: f64 = 1_000_000.0;

/// Default tile edge length in logical pixels
pub const DEFAULT_TILE_SIZE: u32 = 256;

/// Default number of rasterized tiles kept alive
pub const DEFAULT_MAX_CACHED_TILES: usize = 128;

/// Default undo depth
pub const DEFAULT_MAX_UNDO_LEVELS: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Parameters of the per-channel adaptive low-pass filter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub min_cutoff: f64,
    pub beta: f64,
    pub d_cutoff: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_cutoff: DEFAULT_MIN_CUTOFF,
            beta: DEFAULT_BETA,
            d_cutoff: DEFAULT_D_CUTOFF,
        }
    }
}

/// Thresholds used while building and finalizing stroke geometry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    /// Live points closer than this to the previous point are dropped
    pub min_point_distance: f64,
    /// Target arc-length spacing after resampling
    pub resample_spacing: f64,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            min_point_distance: DEFAULT_MIN_POINT_DISTANCE,
            resample_spacing: DEFAULT_RESAMPLE_SPACING,
        }
    }
}

/// Quadtree extent and split thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub world_min_x: f64,
    pub world_min_y: f64,
    pub world_max_x: f64,
    pub world_max_y: f64,
    pub max_depth: u32,
    pub max_objects_per_node: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            world_min_x: -DEFAULT_WORLD_EXTENT,
            world_min_y: -DEFAULT_WORLD_EXTENT,
            world_max_x: DEFAULT_WORLD_EXTENT,
            world_max_y: DEFAULT_WORLD_EXTENT,
            max_depth: 8,
            max_objects_per_node: 16,
        }
    }
}

/// Raster tile cache sizing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileConfig {
    pub tile_size: u32,
    pub max_cached_tiles: usize,
    /// Zoom changes at or below this are absorbed without invalidation
    pub zoom_epsilon: f64,
}

impl Default for TileConfig {
    fn default() -> Self {
        Self {
            tile_size: DEFAULT_TILE_SIZE,
            max_cached_tiles: DEFAULT_MAX_CACHED_TILES,
            zoom_epsilon: 0.01,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub max_undo_levels: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_undo_levels: DEFAULT_MAX_UNDO_LEVELS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Fraction of a stroke's points that must fall inside a lasso
    pub min_inside_fraction: f64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            min_inside_fraction: 0.5,
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InkConfig {
    pub filter: FilterConfig,
    pub geometry: GeometryConfig,
    pub index: IndexConfig,
    pub tiles: TileConfig,
    pub history: HistoryConfig,
    pub selection: SelectionConfig,
}

impl InkConfig {
    /// Parse a config from JSON and validate it
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&json)?;
        debug!("Loaded ink config from {}", path.display());
        Ok(config)
    }

    /// Load the file named by `INK_CONFIG`, or fall back to defaults
    pub fn from_env() -> Self {
        match std::env::var(CONFIG_ENV_VAR) {
            Ok(path) => Self::load(&path).unwrap_or_else(|e| {
                warn!("Ignoring {CONFIG_ENV_VAR}={path}: {e}");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Serialize to pretty JSON
    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let f = &self.filter;
        if !(positive(f.min_cutoff) && positive(f.d_cutoff) && non_negative(f.beta)) {
            return Err(ConfigError::Invalid(format!(
                "filter cutoffs must be positive and beta non-negative: {f:?}"
            )));
        }

        let g = &self.geometry;
        if !positive(g.resample_spacing) {
            return Err(ConfigError::Invalid(format!(
                "resample_spacing must be positive, got {}",
                g.resample_spacing
            )));
        }
        if !non_negative(g.min_point_distance) {
            return Err(ConfigError::Invalid(format!(
                "min_point_distance must be non-negative, got {}",
                g.min_point_distance
            )));
        }

        let i = &self.index;
        if !world_is_valid(i) {
            return Err(ConfigError::Invalid("world bounds are degenerate".to_string()));
        }
        if i.max_objects_per_node == 0 {
            return Err(ConfigError::Invalid(
                "max_objects_per_node must be at least 1".to_string(),
            ));
        }

        let t = &self.tiles;
        if t.tile_size == 0 || t.max_cached_tiles == 0 {
            return Err(ConfigError::Invalid(
                "tile_size and max_cached_tiles must be non-zero".to_string(),
            ));
        }
        if !(t.zoom_epsilon.is_finite() && t.zoom_epsilon >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "zoom_epsilon must be finite and non-negative, got {}",
                t.zoom_epsilon
            )));
        }

        if !(self.selection.min_inside_fraction > 0.0 && self.selection.min_inside_fraction <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "min_inside_fraction must be in (0, 1], got {}",
                self.selection.min_inside_fraction
            )));
        }

        Ok(())
    }

    /// Replace every value [`InkConfig::validate`] would reject with its
    /// default, keeping the valid ones.
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();

        let f = &mut self.filter;
        if !positive(f.min_cutoff) {
            f.min_cutoff = defaults.filter.min_cutoff;
        }
        if !positive(f.d_cutoff) {
            f.d_cutoff = defaults.filter.d_cutoff;
        }
        if !non_negative(f.beta) {
            f.beta = defaults.filter.beta;
        }

        let g = &mut self.geometry;
        if !positive(g.resample_spacing) {
            g.resample_spacing = defaults.geometry.resample_spacing;
        }
        if !non_negative(g.min_point_distance) {
            g.min_point_distance = defaults.geometry.min_point_distance;
        }

        let i = &mut self.index;
        if !world_is_valid(i) {
            i.world_min_x = defaults.index.world_min_x;
            i.world_min_y = defaults.index.world_min_y;
            i.world_max_x = defaults.index.world_max_x;
            i.world_max_y = defaults.index.world_max_y;
        }
        if i.max_objects_per_node == 0 {
            i.max_objects_per_node = defaults.index.max_objects_per_node;
        }

        let t = &mut self.tiles;
        if t.tile_size == 0 {
            t.tile_size = defaults.tiles.tile_size;
        }
        if t.max_cached_tiles == 0 {
            t.max_cached_tiles = defaults.tiles.max_cached_tiles;
        }
        if !(t.zoom_epsilon.is_finite() && t.zoom_epsilon >= 0.0) {
            t.zoom_epsilon = defaults.tiles.zoom_epsilon;
        }

        let fraction = self.selection.min_inside_fraction;
        if !(fraction > 0.0 && fraction <= 1.0) {
            self.selection.min_inside_fraction = defaults.selection.min_inside_fraction;
        }

        self
    }
}

fn positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

fn non_negative(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

fn world_is_valid(index: &IndexConfig) -> bool {
    [index.world_min_x, index.world_min_y, index.world_max_x, index.world_max_y]
        .iter()
        .all(|v| v.is_finite())
        && index.world_min_x < index.world_max_x
        && index.world_min_y < index.world_max_y
}
