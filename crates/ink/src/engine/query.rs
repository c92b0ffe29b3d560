//! Viewport queries and lasso selection

use std::sync::Arc;

use glam::DVec2;
use tracing::debug;

use crate::bbox::{BoundingBox, Rect};
use crate::types::Stroke;

use super::StrokeEngine;

/// Even-odd point-in-polygon test. The polygon is implicitly closed.
pub fn point_in_polygon(point: DVec2, polygon: &[DVec2]) -> bool {
    if polygon.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let (a, b) = (polygon[i], polygon[j]);
        if (a.y > point.y) != (b.y > point.y) {
            let x_cross = a.x + (point.y - a.y) * (b.x - a.x) / (b.y - a.y);
            if point.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

fn inside_fraction(stroke: &Stroke, polygon: &[DVec2]) -> f64 {
    if stroke.points.is_empty() {
        return 0.0;
    }
    let inside = stroke
        .points
        .iter()
        .filter(|p| point_in_polygon(p.pos, polygon))
        .count();
    inside as f64 / stroke.points.len() as f64
}

impl<R> StrokeEngine<R> {
    /// Committed strokes whose bbox overlaps `rect`, in drawing order
    pub fn get_strokes_in_viewport(&self, rect: &Rect) -> Vec<Arc<Stroke>> {
        self.page.candidates(rect)
    }

    /// Strokes lassoed by the closed polygon `path`.
    ///
    /// A stroke is selected when at least `min_inside_fraction` of its
    /// points (and at least one) fall inside the path.
    pub fn select_strokes_in_path(&self, path: &[DVec2]) -> Vec<Arc<Stroke>> {
        let Some(lasso_bounds) = BoundingBox::from_points(path.iter().copied()) else {
            return Vec::new();
        };
        if path.len() < 3 {
            return Vec::new();
        }

        let threshold = self.config.selection.min_inside_fraction;
        let candidates = self.page.candidates(&lasso_bounds);
        let candidate_count = candidates.len();
        let selected: Vec<Arc<Stroke>> = candidates
            .into_iter()
            .filter(|stroke| {
                let fraction = inside_fraction(stroke, path);
                fraction > 0.0 && fraction >= threshold
            })
            .collect();
        debug!(
            "select_strokes_in_path: {} of {} candidates selected",
            selected.len(),
            candidate_count
        );
        selected
    }
}
