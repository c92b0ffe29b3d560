//! Bounded undo/redo history of stroke additions and removals.

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::store::StrokeKey;
use crate::types::Stroke;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Add,
    Remove,
}

/// One recorded edit.
///
/// Holds the whole stroke. The `Arc` is shared with the arena, so recording
/// an action never copies point data.
#[derive(Debug, Clone)]
pub struct StrokeAction {
    pub kind: ActionKind,
    pub key: StrokeKey,
    pub stroke: Arc<Stroke>,
}

/// Whatever owns the committed strokes and their index.
///
/// Both calls must update the stroke collection and the spatial index
/// together.
pub trait ActionTarget {
    /// Put `stroke` back on the page under its original `key`.
    fn restore_stroke(&mut self, key: StrokeKey, stroke: Arc<Stroke>);
    /// Take the stroke under `key` off the page.
    fn withdraw_stroke(&mut self, key: StrokeKey) -> Option<Arc<Stroke>>;
}

/// Linear undo/redo stacks with a depth limit
#[derive(Debug)]
pub struct UndoEngine {
    undo_stack: VecDeque<StrokeAction>,
    redo_stack: Vec<StrokeAction>,
    max_levels: usize,
}

impl UndoEngine {
    pub fn new(max_levels: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            max_levels: max_levels.max(1),
        }
    }

    /// Record a committed stroke; invalidates the redo branch
    pub fn record_add(&mut self, key: StrokeKey, stroke: Arc<Stroke>) {
        self.record(StrokeAction {
            kind: ActionKind::Add,
            key,
            stroke,
        });
    }

    /// Record an erased stroke; invalidates the redo branch
    pub fn record_remove(&mut self, key: StrokeKey, stroke: Arc<Stroke>) {
        self.record(StrokeAction {
            kind: ActionKind::Remove,
            key,
            stroke,
        });
    }

    fn record(&mut self, action: StrokeAction) {
        self.redo_stack.clear();
        self.push_undo(action);
    }

    fn push_undo(&mut self, action: StrokeAction) {
        self.undo_stack.push_back(action);
        while self.undo_stack.len() > self.max_levels {
            if let Some(dropped) = self.undo_stack.pop_front() {
                debug!("Undo history full, dropping oldest action on {}", dropped.stroke.id);
            }
        }
    }

    /// Revert the most recent action against `target`
    pub fn undo<T: ActionTarget>(&mut self, target: &mut T) -> Option<StrokeAction> {
        let action = self.undo_stack.pop_back()?;
        Self::apply_inverse(&action, target);
        self.redo_stack.push(action.clone());
        Some(action)
    }

    /// Re-apply the most recently undone action against `target`
    pub fn redo<T: ActionTarget>(&mut self, target: &mut T) -> Option<StrokeAction> {
        let action = self.redo_stack.pop()?;
        Self::apply(&action, target);
        self.push_undo(action.clone());
        Some(action)
    }

    fn apply<T: ActionTarget>(action: &StrokeAction, target: &mut T) {
        match action.kind {
            ActionKind::Add => target.restore_stroke(action.key, Arc::clone(&action.stroke)),
            ActionKind::Remove => {
                if target.withdraw_stroke(action.key).is_none() {
                    warn!("Redo remove: stroke {} was not on the page", action.stroke.id);
                }
            }
        }
    }

    fn apply_inverse<T: ActionTarget>(action: &StrokeAction, target: &mut T) {
        match action.kind {
            ActionKind::Add => {
                if target.withdraw_stroke(action.key).is_none() {
                    warn!("Undo add: stroke {} was not on the page", action.stroke.id);
                }
            }
            ActionKind::Remove => target.restore_stroke(action.key, Arc::clone(&action.stroke)),
        }
    }

    /// Action the next `undo` would revert
    pub fn peek_undo(&self) -> Option<&StrokeAction> {
        self.undo_stack.back()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }

    /// Drop the redo branch without recording anything
    pub fn clear_redo(&mut self) {
        self.redo_stack.clear();
    }

    /// Whether any undo or redo action still refers to `key`
    pub fn references(&self, key: StrokeKey) -> bool {
        self.undo_stack
            .iter()
            .chain(self.redo_stack.iter())
            .any(|action| action.key == key)
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StrokeArena;
    use crate::types::{StrokeId, StrokePoint, StrokeStyle};
    use glam::DVec2;

    impl ActionTarget for StrokeArena {
        fn restore_stroke(&mut self, key: StrokeKey, stroke: Arc<Stroke>) {
            self.restore(key, stroke);
        }

        fn withdraw_stroke(&mut self, key: StrokeKey) -> Option<Arc<Stroke>> {
            self.remove(key)
        }
    }

    fn stroke(id: &str) -> Arc<Stroke> {
        let first = StrokePoint::new(DVec2::ZERO, 0.5, 0.0, 0);
        Arc::new(Stroke::begin(StrokeId::new(id), StrokeStyle::default(), first))
    }

    fn ids(arena: &StrokeArena) -> Vec<String> {
        arena.iter().map(|(_, s)| s.id.to_string()).collect()
    }

    fn commit(arena: &mut StrokeArena, history: &mut UndoEngine, id: &str) -> StrokeKey {
        let s = stroke(id);
        let key = arena.insert(Arc::clone(&s));
        history.record_add(key, s);
        key
    }

    #[test]
    fn test_undo_redo_add() {
        let mut arena = StrokeArena::new();
        let mut history = UndoEngine::new(10);
        commit(&mut arena, &mut history, "a");
        commit(&mut arena, &mut history, "b");

        let undone = history.undo(&mut arena).unwrap();
        assert_eq!(undone.kind, ActionKind::Add);
        assert_eq!(undone.stroke.id.as_str(), "b");
        assert_eq!(ids(&arena), ["a"]);

        let redone = history.redo(&mut arena).unwrap();
        assert_eq!(redone.stroke.id.as_str(), "b");
        assert_eq!(ids(&arena), ["a", "b"]);
    }

    #[test]
    fn test_empty_stacks_return_none() {
        let mut arena = StrokeArena::new();
        let mut history = UndoEngine::new(10);
        assert!(history.undo(&mut arena).is_none());
        assert!(history.redo(&mut arena).is_none());
    }

    #[test]
    fn test_new_edit_clears_redo() {
        let mut arena = StrokeArena::new();
        let mut history = UndoEngine::new(10);
        commit(&mut arena, &mut history, "a");
        history.undo(&mut arena);
        assert!(history.can_redo());

        commit(&mut arena, &mut history, "b");
        assert!(!history.can_redo());
        assert!(history.redo(&mut arena).is_none());
    }

    #[test]
    fn test_remove_action_inverts() {
        let mut arena = StrokeArena::new();
        let mut history = UndoEngine::new(10);
        let key = commit(&mut arena, &mut history, "a");
        commit(&mut arena, &mut history, "b");

        let erased = arena.remove(key).unwrap();
        history.record_remove(key, erased);
        assert_eq!(ids(&arena), ["b"]);

        history.undo(&mut arena);
        assert_eq!(ids(&arena), ["a", "b"]);
        history.redo(&mut arena);
        assert_eq!(ids(&arena), ["b"]);
    }

    #[test]
    fn test_depth_limit_drops_oldest() {
        let mut arena = StrokeArena::new();
        let mut history = UndoEngine::new(3);
        for id in ["a", "b", "c", "d", "e"] {
            commit(&mut arena, &mut history, id);
        }
        assert_eq!(history.undo_count(), 3);

        while history.undo(&mut arena).is_some() {}
        assert_eq!(ids(&arena), ["a", "b"]);
        assert_eq!(history.redo_count(), 3);
    }

    #[test]
    fn test_references_tracks_both_stacks() {
        let mut arena = StrokeArena::new();
        let mut history = UndoEngine::new(10);
        let a = commit(&mut arena, &mut history, "a");
        let b = commit(&mut arena, &mut history, "b");
        history.undo(&mut arena);
        assert!(history.references(a));
        assert!(history.references(b));

        history.clear_redo();
        assert!(history.references(a));
        assert!(!history.references(b));
        assert!(!history.can_redo());
    }
}
