//! Stroke engine
//!
//! Ties the ink pipeline together for one page:
//! - Pointer input is filtered into the live stroke (`start_stroke`,
//!   `continue_stroke`, `end_stroke`)
//! - On pen-up the stroke is resampled, smoothed and committed
//! - Committed strokes are indexed for viewport queries and selection
//! - Commits and erasures are recorded for undo/redo
//! - Tiles touched by an edit are evicted from the page's tile cache
//!
//! The engine is single-threaded: input for a stroke must arrive in order on
//! one thread. Work that may run elsewhere (saving, rasterizing) operates on
//! `Arc<Stroke>` snapshots.

mod history;
mod page;
mod query;
mod storage;
mod stroke;

use std::sync::Arc;

use ink_config::InkConfig;
use tracing::warn;

use crate::events::{EngineEvent, EventListeners};
use crate::filter::PointFilterSet;
use crate::raster::TileRaster;
use crate::resample::Resampler;
use crate::smooth::Smoother;
use crate::tiles::{TileCache, TileRenderer};
use crate::types::{Rgba, Stroke, StrokeId, StrokePoint, StrokeStyle, Tool};
use crate::undo::UndoEngine;

use page::PageState;

pub use query::point_in_polygon;
pub use storage::PageLocation;

/// Lifecycle state of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrokeState {
    Idle,
    Drawing,
}

/// The stroke being drawn
#[derive(Debug)]
pub(crate) struct ActiveStroke {
    pub(crate) stroke: Stroke,
    pub(crate) filter: PointFilterSet,
    /// Most recent unfiltered sample, pinned as the end point on pen-up
    pub(crate) last_raw: StrokePoint,
}

/// Ink engine for one page.
///
/// `R` is the tile image type produced by the renderer handed to
/// [`StrokeEngine::render_tile`].
pub struct StrokeEngine<R = TileRaster> {
    pub(crate) config: InkConfig,
    pub(crate) style: StrokeStyle,
    pub(crate) active: Option<ActiveStroke>,
    pub(crate) page: PageState<R>,
    pub(crate) history: UndoEngine,
    pub(crate) resampler: Resampler,
    pub(crate) smoother: Smoother,
    pub(crate) listeners: EventListeners,
    /// Sequence number for generated stroke ids
    pub(crate) next_seq: u32,
    /// Last timestamp handed out or observed, in ms
    pub(crate) last_clock_ms: i64,
}

impl<R> std::fmt::Debug for StrokeEngine<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrokeEngine")
            .field("state", &self.state())
            .field("style", &self.style)
            .field("stroke_count", &self.page.strokes.len())
            .field("cached_tiles", &self.page.tiles.len())
            .field("undo_count", &self.history.undo_count())
            .field("redo_count", &self.history.redo_count())
            .field("listeners", &self.listeners)
            .finish()
    }
}

impl StrokeEngine {
    /// Create an engine rendering tiles with [`crate::raster::CpuTileRenderer`]
    /// images
    pub fn new(config: InkConfig) -> Self {
        Self::with_config(config)
    }

    pub fn with_default_config() -> Self {
        Self::new(InkConfig::default())
    }
}

impl<R> StrokeEngine<R> {
    /// Create an engine for any tile image type
    pub fn with_config(config: InkConfig) -> Self {
        let config = match config.validate() {
            Ok(()) => config,
            Err(e) => {
                warn!("StrokeEngine: invalid configuration ({}), using defaults for bad values", e);
                config.sanitized()
            }
        };
        Self {
            style: StrokeStyle::default(),
            active: None,
            page: PageState::new(&config),
            history: UndoEngine::new(config.history.max_undo_levels),
            resampler: Resampler::new(config.geometry.resample_spacing),
            smoother: Smoother::new(),
            listeners: EventListeners::new(),
            next_seq: 0,
            last_clock_ms: 0,
            config,
        }
    }

    pub fn config(&self) -> &InkConfig {
        &self.config
    }

    pub fn state(&self) -> StrokeState {
        if self.active.is_some() {
            StrokeState::Drawing
        } else {
            StrokeState::Idle
        }
    }

    pub fn is_drawing(&self) -> bool {
        self.active.is_some()
    }

    /// The stroke being drawn, for live vector rendering
    pub fn active_stroke(&self) -> Option<&Stroke> {
        self.active.as_ref().map(|a| &a.stroke)
    }

    /// Style applied to strokes started from now on
    pub fn set_style(&mut self, style: StrokeStyle) {
        self.style = style;
    }

    pub fn style(&self) -> StrokeStyle {
        self.style
    }

    pub fn set_tool(&mut self, tool: Tool) {
        self.style.tool = tool;
    }

    pub fn set_color(&mut self, color: Rgba) {
        self.style.color = color;
    }

    pub fn set_width(&mut self, width: f32) {
        self.style.width = width.max(0.0);
    }

    /// Number of committed strokes
    pub fn stroke_count(&self) -> usize {
        self.page.strokes.len()
    }

    /// Committed strokes in drawing order
    pub fn strokes(&self) -> impl Iterator<Item = &Arc<Stroke>> {
        self.page.strokes.iter().map(|(_, s)| s)
    }

    pub fn get_stroke(&self, id: &StrokeId) -> Option<&Arc<Stroke>> {
        self.page.strokes.key_of(id).and_then(|key| self.page.strokes.get(key))
    }

    /// Register a listener for [`EngineEvent`]s
    pub fn add_event_listener<F>(&mut self, listener: F)
    where
        F: Fn(EngineEvent) + Send + Sync + 'static,
    {
        self.listeners.add(listener);
    }

    pub(crate) fn emit(&self, event: EngineEvent) {
        self.listeners.emit(event);
    }

    pub fn zoom(&self) -> f64 {
        self.page.tiles.zoom()
    }

    /// Change the raster zoom; a real change drops every cached tile
    pub fn set_zoom(&mut self, zoom: f64) {
        self.page.tiles.set_zoom(zoom);
    }

    pub fn tile_cache(&self) -> &TileCache<R> {
        &self.page.tiles
    }

    /// Drop every cached tile, e.g. after a background change
    pub fn invalidate_tiles(&mut self) {
        self.page.tiles.invalidate_all();
    }

    /// Fetch tile `(x, y)` at the current zoom, rasterizing it with
    /// `renderer` on a cache miss. `None` means the tile has no ink.
    pub fn render_tile(
        &mut self,
        x: i32,
        y: i32,
        renderer: &mut impl TileRenderer<R>,
    ) -> Option<Arc<R>> {
        self.page.render_tile(x, y, renderer)
    }
}
