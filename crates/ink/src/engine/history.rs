//! Undo, redo and erasing committed strokes

use std::sync::Arc;

use tracing::debug;

use crate::events::EngineEvent;
use crate::types::{Stroke, StrokeId};
use crate::undo::ActionKind;

use super::StrokeEngine;

impl<R> StrokeEngine<R> {
    /// Revert the most recent edit.
    ///
    /// Returns the stroke it touched: for a commit, the stroke that was taken
    /// off the page; for an erase, the stroke that came back.
    pub fn undo(&mut self) -> Option<Arc<Stroke>> {
        let action = self.history.undo(&mut self.page)?;
        debug!("undo: {:?} {}", action.kind, action.stroke.id);
        self.emit(EngineEvent::Undone {
            stroke: Arc::clone(&action.stroke),
        });
        Some(action.stroke)
    }

    /// Re-apply the most recently undone edit
    pub fn redo(&mut self) -> Option<Arc<Stroke>> {
        let action = self.history.redo(&mut self.page)?;
        debug!("redo: {:?} {}", action.kind, action.stroke.id);
        self.emit(EngineEvent::Redone {
            stroke: Arc::clone(&action.stroke),
        });
        Some(action.stroke)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Kind of edit the next `undo` would revert
    pub fn next_undo_kind(&self) -> Option<ActionKind> {
        self.history.peek_undo().map(|a| a.kind)
    }

    /// Forget undo/redo. Slots of erased strokes are released.
    pub fn clear_history(&mut self) {
        self.history.clear();
        self.page.compact();
    }

    /// Remove committed strokes by id, recording each removal for undo.
    ///
    /// Unknown ids are skipped. Returns the strokes that were removed.
    pub fn erase_strokes(&mut self, ids: &[StrokeId]) -> Vec<Arc<Stroke>> {
        let mut erased = Vec::new();
        for id in ids {
            let Some(key) = self.page.strokes.key_of(id) else {
                debug!("erase_strokes: {} is not on the page", id);
                continue;
            };
            if let Some(stroke) = self.page.remove(key) {
                self.history.record_remove(key, Arc::clone(&stroke));
                erased.push(stroke);
            }
        }

        if !erased.is_empty() {
            debug!("erase_strokes: removed {} strokes", erased.len());
            self.emit(EngineEvent::StrokesErased {
                ids: erased.iter().map(|s| s.id.clone()).collect(),
            });
        }
        erased
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bbox::BoundingBox;
    use crate::types::PointerSample;
    use glam::DVec2;
    use ink_config::{HistoryConfig, InkConfig};

    fn draw<R>(engine: &mut StrokeEngine<R>, from: (f64, f64), to: (f64, f64), t: i64) -> Arc<Stroke> {
        let sample = |(x, y): (f64, f64), t| PointerSample::new(DVec2::new(x, y), 0.5, 0.0, t);
        engine.start_stroke_sample(sample(from, t)).unwrap();
        engine.continue_stroke_sample(sample(to, t + 40));
        engine.end_stroke().unwrap()
    }

    fn ids(strokes: &[Arc<Stroke>]) -> Vec<String> {
        let mut ids: Vec<String> = strokes.iter().map(|s| s.id.to_string()).collect();
        ids.sort();
        ids
    }

    fn everywhere() -> BoundingBox {
        BoundingBox::new(-1e6, -1e6, 1e6, 1e6)
    }

    #[test]
    fn test_undo_returns_latest_stroke() {
        let mut engine = StrokeEngine::with_default_config();
        draw(&mut engine, (0.0, 0.0), (50.0, 0.0), 0);
        let second = draw(&mut engine, (0.0, 100.0), (50.0, 100.0), 1_000);

        let undone = engine.undo().unwrap();
        assert!(Arc::ptr_eq(&undone, &second));
        assert_eq!(engine.stroke_count(), 1);

        let visible = engine.get_strokes_in_viewport(&second.bbox);
        assert!(visible.iter().all(|s| s.id != second.id));
    }

    #[test]
    fn test_undo_then_redo_restores_page() {
        let mut engine = StrokeEngine::with_default_config();
        for i in 0..4 {
            let y = i as f64 * 20.0;
            draw(&mut engine, (0.0, y), (60.0, y + 5.0), i * 1_000);
        }
        let before = ids(&engine.get_strokes_in_viewport(&everywhere()));

        engine.undo().unwrap();
        engine.undo().unwrap();
        assert_eq!(engine.stroke_count(), 2);
        engine.redo().unwrap();
        engine.redo().unwrap();

        assert_eq!(ids(&engine.get_strokes_in_viewport(&everywhere())), before);
        assert_eq!(ids(&engine.snapshot()), before);
        assert!(engine.redo().is_none());
    }

    #[test]
    fn test_new_commit_clears_redo() {
        let mut engine = StrokeEngine::with_default_config();
        draw(&mut engine, (0.0, 0.0), (50.0, 0.0), 0);
        engine.undo();
        assert!(engine.can_redo());

        draw(&mut engine, (0.0, 10.0), (50.0, 10.0), 1_000);
        assert!(!engine.can_redo());
        assert!(engine.redo().is_none());
    }

    #[test]
    fn test_empty_history_returns_none() {
        let mut engine = StrokeEngine::with_default_config();
        assert!(engine.undo().is_none());
        assert!(engine.redo().is_none());
    }

    #[test]
    fn test_erase_and_undo_erase() {
        let mut engine = StrokeEngine::with_default_config();
        let a = draw(&mut engine, (0.0, 0.0), (50.0, 0.0), 0);
        let b = draw(&mut engine, (0.0, 30.0), (50.0, 30.0), 1_000);

        let erased = engine.erase_strokes(&[a.id.clone(), StrokeId::new("missing")]);
        assert_eq!(erased.len(), 1);
        assert_eq!(engine.stroke_count(), 1);
        assert_eq!(engine.next_undo_kind(), Some(ActionKind::Remove));
        assert!(engine.get_strokes_in_viewport(&a.bbox).iter().all(|s| s.id != a.id));

        let restored = engine.undo().unwrap();
        assert_eq!(restored.id, a.id);
        // Erased strokes come back in their original drawing order
        let order: Vec<_> = engine.strokes().map(|s| s.id.clone()).collect();
        assert_eq!(order, [a.id.clone(), b.id.clone()]);

        engine.redo();
        assert_eq!(engine.stroke_count(), 1);
        assert!(engine.get_stroke(&a.id).is_none());
    }

    #[test]
    fn test_history_depth_is_bounded() {
        let config = InkConfig {
            history: HistoryConfig { max_undo_levels: 2 },
            ..InkConfig::default()
        };
        let mut engine = StrokeEngine::new(config);
        for i in 0..4 {
            let y = i as f64 * 20.0;
            draw(&mut engine, (0.0, y), (60.0, y), i * 1_000);
        }

        assert!(engine.undo().is_some());
        assert!(engine.undo().is_some());
        assert!(engine.undo().is_none());
        assert_eq!(engine.stroke_count(), 2);
    }

    #[test]
    fn test_undo_then_draw_reuses_slot() {
        let mut engine = StrokeEngine::with_default_config();
        let a = draw(&mut engine, (0.0, 0.0), (50.0, 0.0), 0);
        for i in 1..=20 {
            let y = i as f64 * 10.0;
            draw(&mut engine, (0.0, y), (50.0, y), i * 1_000);
            engine.undo().unwrap();
        }
        let c = draw(&mut engine, (0.0, 300.0), (50.0, 300.0), 50_000);

        assert_eq!(engine.page.strokes.capacity(), 2);
        assert_eq!(ids(&engine.snapshot()), ids(&[a.clone(), c.clone()]));
        assert_eq!(engine.get_strokes_in_viewport(&everywhere()).len(), 2);

        // Undo still walks back through the surviving history
        assert_eq!(engine.undo().unwrap().id, c.id);
        assert_eq!(engine.undo().unwrap().id, a.id);
        assert_eq!(engine.stroke_count(), 0);
    }

    #[test]
    fn test_clear_history_releases_erased_slots() {
        let mut engine = StrokeEngine::with_default_config();
        let strokes: Vec<_> = (0..6)
            .map(|i| {
                let y = i as f64 * 10.0;
                draw(&mut engine, (0.0, y), (50.0, y), i * 1_000)
            })
            .collect();
        let erase: Vec<_> = strokes.iter().step_by(2).map(|s| s.id.clone()).collect();
        engine.erase_strokes(&erase);
        assert_eq!(engine.page.strokes.capacity(), 6);

        engine.clear_history();
        assert_eq!(engine.page.strokes.capacity(), 3);
        assert_eq!(engine.get_strokes_in_viewport(&everywhere()).len(), 3);
        for stroke in strokes.iter().skip(1).step_by(2) {
            assert!(engine.get_stroke(&stroke.id).is_some());
        }
        let order: Vec<_> = engine.strokes().map(|s| s.id.clone()).collect();
        assert_eq!(order, [strokes[1].id.clone(), strokes[3].id.clone(), strokes[5].id.clone()]);
    }
}
