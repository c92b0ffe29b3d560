//! Zoom-keyed LRU cache of rasterized canvas tiles
//!
//! Committed strokes are drawn per fixed-size tile and the images kept
//! around until an edit touches their region, the zoom changes, or the
//! cache runs out of room.

use std::sync::Arc;
use std::time::Instant;

use hashlink::LinkedHashMap;
use ink_config::TileConfig;
use tracing::debug;

use crate::bbox::{BoundingBox, Rect};
use crate::constants::ZOOM_QUANTUM;
use crate::types::Stroke;

/// Tile coordinates plus the zoom they were rendered at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileKey {
    pub x: i32,
    pub y: i32,
    /// Zoom quantized to 1/1000
    zoom_milli: i64,
}

impl TileKey {
    pub fn new(x: i32, y: i32, zoom: f64) -> Self {
        Self {
            x,
            y,
            zoom_milli: quantize_zoom(zoom),
        }
    }

    pub fn zoom(&self) -> f64 {
        self.zoom_milli as f64 / ZOOM_QUANTUM
    }
}

fn quantize_zoom(zoom: f64) -> i64 {
    (zoom * ZOOM_QUANTUM).round() as i64
}

/// Everything a renderer needs to draw one tile
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileBounds {
    pub key: TileKey,
    /// World-space rectangle covered by the tile
    pub world: Rect,
    pub zoom: f64,
    /// Edge length in pixels
    pub tile_size: u32,
}

impl TileBounds {
    /// World to tile-pixel scale
    pub fn pixels_per_unit(&self) -> f64 {
        self.zoom
    }
}

/// Rasterizes the strokes of one tile. Invoked only on cache misses.
pub trait TileRenderer<R> {
    fn render(&mut self, bounds: &TileBounds, strokes: &[Arc<Stroke>]) -> R;
}

impl<R, F> TileRenderer<R> for F
where
    F: FnMut(&TileBounds, &[Arc<Stroke>]) -> R,
{
    fn render(&mut self, bounds: &TileBounds, strokes: &[Arc<Stroke>]) -> R {
        self(bounds, strokes)
    }
}

#[derive(Debug)]
pub struct CachedTile<R> {
    pub image: Arc<R>,
    pub created_at: Instant,
}

/// LRU tile cache for one page.
///
/// The backing map is kept in recency order: a hit moves its entry to the
/// back, eviction pops from the front.
#[derive(Debug)]
pub struct TileCache<R> {
    tiles: LinkedHashMap<TileKey, CachedTile<R>>,
    tile_size: u32,
    max_cached_tiles: usize,
    zoom_epsilon: f64,
    zoom: f64,
    hits: u64,
    misses: u64,
}

impl<R> TileCache<R> {
    pub fn new(config: &TileConfig) -> Self {
        Self {
            tiles: LinkedHashMap::new(),
            tile_size: config.tile_size.max(1),
            max_cached_tiles: config.max_cached_tiles.max(1),
            zoom_epsilon: config.zoom_epsilon,
            zoom: 1.0,
            hits: 0,
            misses: 0,
        }
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn max_cached_tiles(&self) -> usize {
        self.max_cached_tiles
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// (hits, misses) since creation
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        self.tiles.contains_key(&TileKey::new(x, y, self.zoom))
    }

    /// Switch zoom level.
    ///
    /// A change larger than the configured epsilon drops every tile, since
    /// raster content is resolution dependent. Smaller changes are absorbed
    /// and the cache keeps serving the current zoom.
    pub fn set_zoom(&mut self, zoom: f64) {
        if zoom <= 0.0 || !zoom.is_finite() {
            debug!("TileCache::set_zoom: ignoring invalid zoom {}", zoom);
            return;
        }
        if (zoom - self.zoom).abs() > self.zoom_epsilon {
            debug!("TileCache: zoom {} -> {}, invalidating {} tiles", self.zoom, zoom, self.tiles.len());
            self.zoom = zoom;
            self.invalidate_all();
        }
    }

    /// World units covered by one tile edge at the current zoom
    pub fn tile_world_size(&self) -> f64 {
        self.tile_size as f64 / self.zoom
    }

    /// World rectangle of tile `(x, y)` at the current zoom
    pub fn tile_world_rect(&self, x: i32, y: i32) -> Rect {
        let size = self.tile_world_size();
        BoundingBox::new(
            x as f64 * size,
            y as f64 * size,
            (x as f64 + 1.0) * size,
            (y as f64 + 1.0) * size,
        )
    }

    pub fn tile_bounds(&self, x: i32, y: i32) -> TileBounds {
        TileBounds {
            key: TileKey::new(x, y, self.zoom),
            world: self.tile_world_rect(x, y),
            zoom: self.zoom,
            tile_size: self.tile_size,
        }
    }

    /// Inclusive tile coordinate range covering `rect` at the current zoom
    pub fn tile_range(&self, rect: &Rect) -> (i32, i32, i32, i32) {
        let size = self.tile_world_size();
        let to_tile = |v: f64| (v / size).floor() as i32;
        (
            to_tile(rect.min_x),
            to_tile(rect.min_y),
            to_tile(rect.max_x),
            to_tile(rect.max_y),
        )
    }

    /// Fetch tile `(x, y)`, rendering it on a miss.
    ///
    /// `strokes` is the candidate set; only those whose ink reaches the tile
    /// are handed to the renderer. Returns `None` for an empty tile, which is
    /// not cached so that later strokes show up without an invalidation.
    pub fn get_tile(
        &mut self,
        x: i32,
        y: i32,
        strokes: &[Arc<Stroke>],
        renderer: &mut impl TileRenderer<R>,
    ) -> Option<Arc<R>> {
        let key = TileKey::new(x, y, self.zoom);
        if let Some(tile) = self.tiles.to_back(&key) {
            self.hits += 1;
            return Some(Arc::clone(&tile.image));
        }
        self.misses += 1;

        let bounds = self.tile_bounds(x, y);
        let visible: Vec<Arc<Stroke>> = strokes
            .iter()
            .filter(|s| s.ink_bounds().overlaps(&bounds.world))
            .cloned()
            .collect();
        if visible.is_empty() {
            return None;
        }

        let image = Arc::new(renderer.render(&bounds, &visible));

        while self.tiles.len() >= self.max_cached_tiles {
            if let Some((evicted, _)) = self.tiles.pop_front() {
                debug!("TileCache: evicted tile ({}, {})", evicted.x, evicted.y);
            }
        }
        self.tiles.insert(
            key,
            CachedTile {
                image: Arc::clone(&image),
                created_at: Instant::now(),
            },
        );
        debug!(
            "TileCache: rendered tile ({}, {}) with {} strokes",
            x,
            y,
            visible.len()
        );
        Some(image)
    }

    /// Evict the tiles covering `region` at the current zoom
    pub fn invalidate_region(&mut self, region: &Rect) -> usize {
        let (x0, y0, x1, y1) = self.tile_range(region);
        let zoom_milli = quantize_zoom(self.zoom);
        let stale: Vec<TileKey> = self
            .tiles
            .keys()
            .filter(|k| {
                k.zoom_milli == zoom_milli && (x0..=x1).contains(&k.x) && (y0..=y1).contains(&k.y)
            })
            .copied()
            .collect();
        for key in &stale {
            self.tiles.remove(key);
        }
        if !stale.is_empty() {
            debug!(
                "TileCache: invalidated {} tiles in ({}, {})..=({}, {})",
                stale.len(),
                x0,
                y0,
                x1,
                y1
            );
        }
        stale.len()
    }

    /// Drop every cached tile
    pub fn invalidate_all(&mut self) {
        self.tiles.clear();
    }
}
