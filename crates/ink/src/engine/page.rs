//! Committed strokes of one page, their spatial index and tile cache

use std::sync::Arc;

use ink_config::InkConfig;
use tracing::warn;

use crate::bbox::Rect;
use crate::spatial::SpatialIndex;
use crate::store::{StrokeArena, StrokeKey};
use crate::tiles::{TileCache, TileRenderer};
use crate::types::Stroke;
use crate::undo::{ActionTarget, UndoEngine};

/// Per-page mutable state.
///
/// Every membership change goes through this type so the arena, the index
/// and the cached tiles always agree.
#[derive(Debug)]
pub(crate) struct PageState<R> {
    pub(crate) strokes: StrokeArena,
    pub(crate) index: SpatialIndex,
    pub(crate) tiles: TileCache<R>,
    /// Largest half-width of any stroke added since the last reset. Tile
    /// queries are padded by this so wide strokes just outside a tile are
    /// still drawn into it.
    max_half_width: f64,
}

impl<R> PageState<R> {
    pub(crate) fn new(config: &InkConfig) -> Self {
        Self {
            strokes: StrokeArena::new(),
            index: SpatialIndex::from_index_config(&config.index),
            tiles: TileCache::new(&config.tiles),
            max_half_width: 0.0,
        }
    }

    /// Add a finalized stroke under a fresh key
    pub(crate) fn commit(&mut self, stroke: Arc<Stroke>) -> StrokeKey {
        let key = self.strokes.insert(Arc::clone(&stroke));
        self.attach(key, &stroke);
        key
    }

    fn attach(&mut self, key: StrokeKey, stroke: &Stroke) {
        self.index.insert(key, stroke.bbox);
        self.max_half_width = self.max_half_width.max(stroke.width as f64 * 0.5);
        self.tiles.invalidate_region(&stroke.ink_bounds());
    }

    /// Give back trailing vacant keys that `history` can no longer restore
    pub(crate) fn reclaim_vacant(&mut self, history: &UndoEngine) -> usize {
        self.strokes.reclaim_vacant_tail(|key| history.references(key))
    }

    /// Renumber the live strokes densely. Only valid once no undo action
    /// refers to a key. Cached tiles stay valid.
    pub(crate) fn compact(&mut self) {
        if self.strokes.capacity() == self.strokes.len() {
            return;
        }
        let strokes = self.strokes.snapshot();
        self.strokes.clear();
        self.index.clear();
        for stroke in strokes {
            let key = self.strokes.insert(Arc::clone(&stroke));
            self.index.insert(key, stroke.bbox);
        }
    }

    pub(crate) fn remove(&mut self, key: StrokeKey) -> Option<Arc<Stroke>> {
        let stroke = self.strokes.remove(key)?;
        self.index.remove(key, &stroke.bbox);
        self.tiles.invalidate_region(&stroke.ink_bounds());
        Some(stroke)
    }

    /// Swap in a whole new committed set, in the given order
    pub(crate) fn replace_all(&mut self, strokes: impl IntoIterator<Item = Arc<Stroke>>) {
        self.strokes.clear();
        self.index.clear();
        self.tiles.invalidate_all();
        self.max_half_width = 0.0;
        for stroke in strokes {
            self.commit(stroke);
        }
    }

    /// Committed strokes whose bbox overlaps `rect`, in commit order
    pub(crate) fn candidates(&self, rect: &Rect) -> Vec<Arc<Stroke>> {
        self.index
            .query(rect)
            .into_iter()
            .filter_map(|key| self.strokes.get(key).cloned())
            .collect()
    }

    pub(crate) fn render_tile(
        &mut self,
        x: i32,
        y: i32,
        renderer: &mut impl TileRenderer<R>,
    ) -> Option<Arc<R>> {
        let candidates = if self.tiles.contains(x, y) {
            Vec::new()
        } else {
            let rect = self.tiles.tile_world_rect(x, y).padded(self.max_half_width);
            self.candidates(&rect)
        };
        self.tiles.get_tile(x, y, &candidates, renderer)
    }
}

impl<R> ActionTarget for PageState<R> {
    fn restore_stroke(&mut self, key: StrokeKey, stroke: Arc<Stroke>) {
        if self.strokes.restore(key, Arc::clone(&stroke)) {
            self.attach(key, &stroke);
        } else {
            warn!("Cannot restore stroke {}: slot {:?} is occupied", stroke.id, key);
        }
    }

    fn withdraw_stroke(&mut self, key: StrokeKey) -> Option<Arc<Stroke>> {
        self.remove(key)
    }
}
