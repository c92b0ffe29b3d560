//! Page persistence

use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use crate::codec::{CodecError, StrokeCodec};
use crate::error::EngineError;
use crate::events::EngineEvent;
use crate::types::{Stroke, StrokeId};

use super::StrokeEngine;

/// File extension of stroke files
pub const PAGE_FILE_EXTENSION: &str = "wink";

/// Where a page's strokes live on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLocation {
    pub page_id: String,
    pub base_path: PathBuf,
}

impl PageLocation {
    pub fn new(page_id: impl Into<String>, base_path: impl Into<PathBuf>) -> Self {
        Self {
            page_id: page_id.into(),
            base_path: base_path.into(),
        }
    }

    /// `<base_path>/<page_id>.wink`
    pub fn file_path(&self) -> PathBuf {
        self.base_path
            .join(format!("{}.{}", self.page_id, PAGE_FILE_EXTENSION))
    }
}

impl<R> StrokeEngine<R> {
    /// Committed strokes in drawing order, cheap to hand to another thread
    pub fn snapshot(&self) -> Vec<Arc<Stroke>> {
        self.page.strokes.snapshot()
    }

    /// Write the committed strokes to the page's file.
    ///
    /// The in-progress stroke is not saved. On failure the previous file and
    /// the engine state are left as they were.
    pub fn save_page(&self, location: &PageLocation) -> Result<(), EngineError> {
        let strokes = self.snapshot();
        StrokeCodec::save(&location.file_path(), &strokes)?;
        Ok(())
    }

    /// Replace the committed strokes with the page's file contents.
    ///
    /// The file is decoded completely before anything changes, so a bad file
    /// leaves the engine untouched. A missing file is an empty page. Returns
    /// the number of strokes loaded.
    pub fn load_page(&mut self, location: &PageLocation) -> Result<usize, EngineError> {
        let path = location.file_path();
        let strokes = match StrokeCodec::load(&path) {
            Ok(strokes) => strokes,
            Err(CodecError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                debug!("load_page: {} does not exist, starting empty", path.display());
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };

        let count = self.replace_strokes(strokes);
        info!("Loaded page {} with {} strokes", location.page_id, count);
        self.emit(EngineEvent::PageLoaded {
            page_id: location.page_id.clone(),
            stroke_count: count,
        });
        Ok(count)
    }

    /// Swap in a new committed set.
    ///
    /// Rebuilds the spatial index, clears undo/redo, drops every cached tile
    /// and discards any stroke in progress.
    pub fn replace_strokes(&mut self, strokes: Vec<Stroke>) -> usize {
        if let Some(active) = self.active.take() {
            debug!("replace_strokes: discarding in-progress stroke {}", active.stroke.id);
        }
        self.history.clear();
        if let Some(seq) = strokes.iter().filter_map(|s| generated_seq(&s.id)).max() {
            self.next_seq = self.next_seq.max(seq.wrapping_add(1));
        }
        self.page.replace_all(strokes.into_iter().map(Arc::new));
        self.page.strokes.len()
    }
}

/// Sequence half of an id made by [`StrokeId::generate`]
fn generated_seq(id: &StrokeId) -> Option<u32> {
    let id = id.as_str();
    if id.len() != 16 || !id.is_ascii() {
        return None;
    }
    u32::from_str_radix(&id[8..], 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bbox::BoundingBox;
    use crate::raster::CpuTileRenderer;
    use crate::types::{PointerSample, Tool};
    use glam::DVec2;
    use std::fs;

    fn draw(engine: &mut StrokeEngine, from: (f64, f64), to: (f64, f64), t: i64) -> Arc<Stroke> {
        let sample = |(x, y): (f64, f64), t| PointerSample::new(DVec2::new(x, y), 0.5, 0.0, t);
        engine.start_stroke_sample(sample(from, t)).unwrap();
        engine.continue_stroke_sample(sample(to, t + 40));
        engine.end_stroke().unwrap()
    }

    fn everywhere() -> BoundingBox {
        BoundingBox::new(-1e6, -1e6, 1e6, 1e6)
    }

    #[test]
    fn test_page_location_path() {
        let location = PageLocation::new("page-7", "/tmp/notebook");
        assert_eq!(location.file_path(), PathBuf::from("/tmp/notebook/page-7.wink"));
    }

    #[test]
    fn test_save_then_load_restores_page() {
        let dir = tempfile::tempdir().unwrap();
        let location = PageLocation::new("p1", dir.path());

        let mut engine = StrokeEngine::with_default_config();
        engine.set_tool(Tool::Pencil);
        let a = draw(&mut engine, (0.0, 0.0), (50.0, 10.0), 1_000);
        let b = draw(&mut engine, (100.0, 100.0), (150.0, 90.0), 2_000);
        engine.save_page(&location).unwrap();

        let mut loaded = StrokeEngine::with_default_config();
        assert_eq!(loaded.load_page(&location).unwrap(), 2);
        let strokes = loaded.snapshot();
        assert_eq!(strokes[0].id, a.id);
        assert_eq!(strokes[1].id, b.id);
        assert_eq!(strokes[0].tool, Tool::Pencil);
        assert_eq!(strokes[0].len(), a.len());
        assert_eq!(loaded.get_strokes_in_viewport(&everywhere()).len(), 2);
        assert!(!loaded.can_undo());
    }

    #[test]
    fn test_missing_file_is_empty_page() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = StrokeEngine::with_default_config();
        draw(&mut engine, (0.0, 0.0), (50.0, 0.0), 0);

        let count = engine.load_page(&PageLocation::new("nope", dir.path())).unwrap();
        assert_eq!(count, 0);
        assert_eq!(engine.stroke_count(), 0);
    }

    #[test]
    fn test_bad_magic_leaves_engine_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let location = PageLocation::new("corrupt", dir.path());
        fs::write(location.file_path(), b"JUNKJUNKJUNKJUNKJUNK").unwrap();

        let mut engine = StrokeEngine::with_default_config();
        let stroke = draw(&mut engine, (0.0, 0.0), (50.0, 0.0), 0);
        let mut renderer = CpuTileRenderer::new();
        engine.render_tile(0, 0, &mut renderer).unwrap();

        let err = engine.load_page(&location).unwrap_err();
        assert!(err.is_format_error());
        assert_eq!(engine.stroke_count(), 1);
        assert!(engine.get_stroke(&stroke.id).is_some());
        assert_eq!(engine.get_strokes_in_viewport(&everywhere()).len(), 1);
        assert!(engine.can_undo());
        assert!(engine.tile_cache().contains(0, 0));
    }

    #[test]
    fn test_load_clears_history_and_tiles() {
        let dir = tempfile::tempdir().unwrap();
        let location = PageLocation::new("p", dir.path());
        let mut engine = StrokeEngine::with_default_config();
        draw(&mut engine, (0.0, 0.0), (50.0, 0.0), 0);
        engine.save_page(&location).unwrap();

        let mut renderer = CpuTileRenderer::new();
        engine.render_tile(0, 0, &mut renderer);
        engine.start_stroke(DVec2::new(5.0, 5.0), 0.5, 0.0).unwrap();

        engine.load_page(&location).unwrap();
        assert!(engine.tile_cache().is_empty());
        assert!(!engine.can_undo());
        assert!(!engine.is_drawing());
        assert_eq!(engine.stroke_count(), 1);
    }

    #[test]
    fn test_generated_seq() {
        assert_eq!(generated_seq(&StrokeId::generate(1_000, 42)), Some(42));
        assert_eq!(generated_seq(&StrokeId::new("hand-made")), None);
        assert_eq!(generated_seq(&StrokeId::new("zzzzzzzzzzzzzzzz")), None);
    }

    #[test]
    fn test_stroke_drawn_after_load_gets_new_id() {
        let dir = tempfile::tempdir().unwrap();
        let location = PageLocation::new("p", dir.path());
        let mut first_session = StrokeEngine::with_default_config();
        let first = draw(&mut first_session, (0.0, 0.0), (50.0, 0.0), 1_000);
        first_session.save_page(&location).unwrap();

        let mut engine = StrokeEngine::with_default_config();
        engine.load_page(&location).unwrap();
        let second = draw(&mut engine, (0.0, 40.0), (50.0, 40.0), 1_000);
        assert_ne!(first.id, second.id);
        assert_eq!(engine.stroke_count(), 2);

        engine.erase_strokes(&[second.id.clone()]);
        assert_eq!(engine.stroke_count(), 1);
        assert!(engine.get_stroke(&first.id).is_some());
        assert!(engine.get_stroke(&second.id).is_none());
    }

    #[test]
    fn test_generated_id_skips_ids_on_page() {
        let mut engine = StrokeEngine::with_default_config();
        let taken = StrokeId::generate(1_000, 0);
        let mut twin = draw(&mut engine, (0.0, 0.0), (50.0, 0.0), 500).as_ref().clone();
        twin.id = taken.clone();

        // Bypass the sequence bump so the clash is caught at generation
        engine.page.replace_all([Arc::new(twin)]);
        engine.next_seq = 0;
        let drawn = draw(&mut engine, (0.0, 40.0), (50.0, 40.0), 1_000);
        assert_ne!(drawn.id, taken);
        assert_eq!(engine.stroke_count(), 2);
        assert!(engine.get_stroke(&taken).is_some());
    }
}
