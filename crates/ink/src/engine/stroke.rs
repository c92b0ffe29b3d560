//! Pen-down to pen-up handling

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use glam::DVec2;
use tracing::{debug, warn};

use crate::constants::MIN_COMMIT_POINTS;
use crate::error::EngineError;
use crate::events::EngineEvent;
use crate::filter::PointFilterSet;
use crate::types::{PointerSample, Stroke, StrokeId, StrokePoint};

use super::{ActiveStroke, StrokeEngine};

fn wall_clock_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Make the stroke end exactly where the pen lifted.
///
/// A last point already within `min_distance` of the lift is replaced, except
/// when it is the only point (the pen-down position is kept).
fn pin_lift_point(stroke: &mut Stroke, lift: StrokePoint, min_distance: f64) {
    let near = stroke
        .last_point()
        .is_some_and(|last| last.pos.distance(lift.pos) < min_distance);
    if !near {
        stroke.push_point(lift);
    } else if stroke.len() > 1 {
        if let Some(last) = stroke.points.last_mut() {
            *last = lift;
        }
    }
}

impl<R> StrokeEngine<R> {
    /// Engine clock in ms, strictly increasing across calls
    fn next_timestamp(&mut self) -> i64 {
        let now = wall_clock_ms().max(self.last_clock_ms + 1);
        self.last_clock_ms = now;
        now
    }

    fn observe_timestamp(&mut self, timestamp_ms: i64) {
        self.last_clock_ms = self.last_clock_ms.max(timestamp_ms);
    }

    /// Pen down at `pos`, timestamped by the engine clock
    pub fn start_stroke(&mut self, pos: DVec2, pressure: f32, tilt: f32) -> Result<(), EngineError> {
        if self.active.is_some() {
            return self.reject_restart();
        }
        let timestamp_ms = self.next_timestamp();
        self.start_stroke_sample(PointerSample::new(pos, pressure, tilt, timestamp_ms))
    }

    /// Pen down with a sample from the canvas.
    ///
    /// Fails with [`EngineError::StrokeInProgress`] while a stroke is being
    /// drawn; the in-progress stroke is left untouched.
    pub fn start_stroke_sample(&mut self, sample: PointerSample) -> Result<(), EngineError> {
        if self.active.is_some() {
            return self.reject_restart();
        }
        self.observe_timestamp(sample.timestamp_ms);

        let raw = StrokePoint::from_sample(&sample);
        let mut filter = PointFilterSet::new(&self.config.filter);
        let first = filter.apply(&raw);

        let id = self.fresh_stroke_id(raw.timestamp_ms);
        debug!(
            "start_stroke: {} at ({:.1}, {:.1}) from {:?}",
            id, first.pos.x, first.pos.y, sample.device
        );

        self.emit(EngineEvent::StrokeStarted {
            id: id.clone(),
            timestamp_ms: raw.timestamp_ms,
        });
        self.active = Some(ActiveStroke {
            stroke: Stroke::begin(id, self.style, first),
            filter,
            last_raw: raw,
        });
        Ok(())
    }

    /// Next generated id that no committed stroke is using
    fn fresh_stroke_id(&mut self, timestamp_ms: i64) -> StrokeId {
        loop {
            let id = StrokeId::generate(timestamp_ms, self.next_seq);
            self.next_seq = self.next_seq.wrapping_add(1);
            if self.page.strokes.key_of(&id).is_none() {
                return id;
            }
            debug!("start_stroke: id {} already on the page, skipping", id);
        }
    }

    fn reject_restart(&self) -> Result<(), EngineError> {
        if let Some(active) = &self.active {
            warn!(
                "start_stroke: stroke {} still in progress, rejecting new stroke",
                active.stroke.id
            );
        }
        Err(EngineError::StrokeInProgress)
    }

    /// Pen moved, timestamped by the engine clock. No-op while idle.
    pub fn continue_stroke(&mut self, pos: DVec2, pressure: f32, tilt: f32) {
        if self.active.is_none() {
            debug!("continue_stroke: no active stroke, ignoring");
            return;
        }
        let timestamp_ms = self.next_timestamp();
        self.continue_stroke_sample(PointerSample::new(pos, pressure, tilt, timestamp_ms));
    }

    /// Pen moved. Points closer than `min_point_distance` to the last stored
    /// point are dropped. No-op while idle.
    pub fn continue_stroke_sample(&mut self, sample: PointerSample) {
        let min_distance = self.config.geometry.min_point_distance;
        let Some(active) = self.active.as_mut() else {
            debug!("continue_stroke: no active stroke, ignoring");
            return;
        };

        let raw = StrokePoint::from_sample(&sample);
        active.last_raw = raw;
        let filtered = active.filter.apply(&raw);
        let too_close = active
            .stroke
            .last_point()
            .is_some_and(|last| last.pos.distance(filtered.pos) < min_distance);
        if !too_close {
            active.stroke.push_point(filtered);
        }
        self.observe_timestamp(sample.timestamp_ms);
    }

    /// Pen up.
    ///
    /// Returns the committed stroke, or `None` when idle or when the stroke
    /// is too short to keep (a tap).
    pub fn end_stroke(&mut self) -> Option<Arc<Stroke>> {
        let Some(ActiveStroke {
            mut stroke,
            last_raw,
            ..
        }) = self.active.take()
        else {
            debug!("end_stroke: no active stroke, ignoring");
            return None;
        };

        pin_lift_point(&mut stroke, last_raw, self.config.geometry.min_point_distance);
        if stroke.len() < MIN_COMMIT_POINTS {
            debug!("end_stroke: discarding {} with {} point(s)", stroke.id, stroke.len());
            self.emit(EngineEvent::StrokeDiscarded { id: stroke.id });
            return None;
        }

        let raw_count = stroke.len();
        let resampled = self.resampler.resample(&stroke.points);
        stroke.points = self.smoother.smooth(&resampled);
        stroke.recompute_bbox();

        // The commit invalidates redo; free those slots before taking a key
        self.history.clear_redo();
        self.page.reclaim_vacant(&self.history);

        let stroke = Arc::new(stroke);
        let key = self.page.commit(Arc::clone(&stroke));
        self.history.record_add(key, Arc::clone(&stroke));
        debug!(
            "end_stroke: committed {} ({} -> {} points)",
            stroke.id,
            raw_count,
            stroke.len()
        );

        self.emit(EngineEvent::StrokeCommitted {
            stroke: Arc::clone(&stroke),
        });
        Some(stroke)
    }

    /// Abort the stroke being drawn without committing it.
    ///
    /// Returns false if no stroke was in progress.
    pub fn cancel_stroke(&mut self) -> bool {
        let Some(active) = self.active.take() else {
            return false;
        };
        debug!("cancel_stroke: discarding {}", active.stroke.id);
        self.emit(EngineEvent::StrokeCancelled {
            id: active.stroke.id,
        });
        true
    }
}
