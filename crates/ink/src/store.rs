//! Stable-key storage for a page's committed strokes.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::types::{Stroke, StrokeId};

/// Handle to a committed stroke.
///
/// Keys grow monotonically, so key order is commit order (and therefore
/// drawing order). A vacant key is only handed out again once nothing can
/// restore a stroke under it (see [`StrokeArena::reclaim_vacant_tail`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StrokeKey(usize);

impl StrokeKey {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Arena owning the committed strokes of one page.
///
/// The spatial index and the undo log refer to strokes by [`StrokeKey`];
/// only the arena decides whether a stroke is currently on the page.
#[derive(Debug, Default)]
pub struct StrokeArena {
    slots: Vec<Option<Arc<Stroke>>>,
    by_id: HashMap<StrokeId, StrokeKey>,
    live: usize,
}

impl StrokeArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new stroke under a fresh key.
    ///
    /// If a live stroke already has the same id, the id keeps pointing at
    /// the existing stroke and a warning is logged.
    pub fn insert(&mut self, stroke: Arc<Stroke>) -> StrokeKey {
        let key = StrokeKey(self.slots.len());
        self.link_id(&stroke.id, key);
        self.slots.push(Some(stroke));
        self.live += 1;
        key
    }

    /// Put a previously removed stroke back under its original key.
    ///
    /// Returns false if the key was never issued or is occupied.
    pub fn restore(&mut self, key: StrokeKey, stroke: Arc<Stroke>) -> bool {
        if !matches!(self.slots.get(key.0), Some(None)) {
            return false;
        }
        self.link_id(&stroke.id, key);
        self.slots[key.0] = Some(stroke);
        self.live += 1;
        true
    }

    fn link_id(&mut self, id: &StrokeId, key: StrokeKey) {
        match self.by_id.get(id) {
            Some(&existing) if existing != key && self.contains(existing) => {
                warn!("Duplicate stroke id {}: keeping {:?}, not linking {:?}", id, existing, key);
            }
            _ => {
                self.by_id.insert(id.clone(), key);
            }
        }
    }

    /// Pop vacant slots off the end of the arena so their keys are reused.
    ///
    /// `in_use` reports keys that may still be restored (undo history); the
    /// trim stops at the first such key or at a live stroke.
    pub fn reclaim_vacant_tail(&mut self, in_use: impl Fn(StrokeKey) -> bool) -> usize {
        let mut reclaimed = 0;
        while let Some(None) = self.slots.last() {
            let key = StrokeKey(self.slots.len() - 1);
            if in_use(key) {
                break;
            }
            self.slots.pop();
            reclaimed += 1;
        }
        if reclaimed > 0 {
            debug!("StrokeArena: reclaimed {} vacant slots", reclaimed);
        }
        reclaimed
    }

    /// Number of slots, live or vacant
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn remove(&mut self, key: StrokeKey) -> Option<Arc<Stroke>> {
        let stroke = self.slots.get_mut(key.0)?.take()?;
        if self.by_id.get(&stroke.id) == Some(&key) {
            self.by_id.remove(&stroke.id);
        }
        self.live -= 1;
        Some(stroke)
    }

    pub fn get(&self, key: StrokeKey) -> Option<&Arc<Stroke>> {
        self.slots.get(key.0)?.as_ref()
    }

    pub fn key_of(&self, id: &StrokeId) -> Option<StrokeKey> {
        self.by_id.get(id).copied()
    }

    pub fn contains(&self, key: StrokeKey) -> bool {
        self.get(key).is_some()
    }

    /// Live strokes in commit order
    pub fn iter(&self) -> impl Iterator<Item = (StrokeKey, &Arc<Stroke>)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|s| (StrokeKey(i), s)))
    }

    /// Cheap copy of the live set, safe to hand to another thread
    pub fn snapshot(&self) -> Vec<Arc<Stroke>> {
        self.iter().map(|(_, s)| Arc::clone(s)).collect()
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.by_id.clear();
        self.live = 0;
    }
}
