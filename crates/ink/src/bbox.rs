//! Axis-aligned bounding boxes in world coordinates

use glam::DVec2;
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle.
///
/// Invariant: `min_x <= max_x` and `min_y <= max_y`. A single-point stroke
/// has a degenerate box with zero extent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

/// Viewports and tile rectangles share the bbox representation.
pub type Rect = BoundingBox;

impl BoundingBox {
    /// Build a box from two corners in any order
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self {
            min_x: x0.min(x1),
            min_y: y0.min(y1),
            max_x: x0.max(x1),
            max_y: y0.max(y1),
        }
    }

    pub fn from_point(point: DVec2) -> Self {
        Self {
            min_x: point.x,
            min_y: point.y,
            max_x: point.x,
            max_y: point.y,
        }
    }

    /// Exact bounds of a point set, `None` when empty
    pub fn from_points(points: impl IntoIterator<Item = DVec2>) -> Option<Self> {
        let mut points = points.into_iter();
        let mut bbox = Self::from_point(points.next()?);
        for point in points {
            bbox.expand_to(point);
        }
        Some(bbox)
    }

    pub fn expand_to(&mut self, point: DVec2) {
        self.min_x = self.min_x.min(point.x);
        self.min_y = self.min_y.min(point.y);
        self.max_x = self.max_x.max(point.x);
        self.max_y = self.max_y.max(point.y);
    }

    pub fn union(&self, other: &Self) -> Self {
        Self {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    /// Grow every side by `amount`
    pub fn padded(&self, amount: f64) -> Self {
        Self {
            min_x: self.min_x - amount,
            min_y: self.min_y - amount,
            max_x: self.max_x + amount,
            max_y: self.max_y + amount,
        }
    }

    /// Inclusive overlap test; touching edges count
    pub fn overlaps(&self, other: &Self) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }

    pub fn contains_point(&self, point: DVec2) -> bool {
        point.x >= self.min_x && point.x <= self.max_x && point.y >= self.min_y && point.y <= self.max_y
    }

    pub fn contains(&self, other: &Self) -> bool {
        other.min_x >= self.min_x
            && other.max_x <= self.max_x
            && other.min_y >= self.min_y
            && other.max_y <= self.max_y
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn center(&self) -> DVec2 {
        DVec2::new(
            (self.min_x + self.max_x) * 0.5,
            (self.min_y + self.max_y) * 0.5,
        )
    }

    pub fn is_point(&self) -> bool {
        self.min_x == self.max_x && self.min_y == self.max_y
    }

    /// One of the four equal quadrants: 0 = top-left, 1 = top-right,
    /// 2 = bottom-left, 3 = bottom-right (y grows downward)
    pub fn quadrant(&self, index: usize) -> Self {
        let center = self.center();
        let (min_x, max_x) = if index & 1 != 0 {
            (center.x, self.max_x)
        } else {
            (self.min_x, center.x)
        };
        let (min_y, max_y) = if index & 2 != 0 {
            (center.y, self.max_y)
        } else {
            (self.min_y, center.y)
        };
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_points_exact() {
        let bbox = BoundingBox::from_points([
            DVec2::new(3.0, -1.0),
            DVec2::new(-2.0, 4.0),
            DVec2::new(0.5, 0.5),
        ])
        .unwrap();
        assert_eq!(bbox, BoundingBox::new(-2.0, -1.0, 3.0, 4.0));
        assert!(BoundingBox::from_points(std::iter::empty()).is_none());
    }

    #[test]
    fn test_overlap_is_inclusive() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let touching = BoundingBox::new(10.0, 10.0, 20.0, 20.0);
        let apart = BoundingBox::new(10.5, 0.0, 20.0, 10.0);
        assert!(a.overlaps(&touching));
        assert!(!a.overlaps(&apart));
    }

    #[test]
    fn test_degenerate_point_box_overlaps() {
        let point = BoundingBox::from_point(DVec2::new(5.0, 5.0));
        assert!(point.is_point());
        assert!(point.overlaps(&BoundingBox::new(0.0, 0.0, 10.0, 10.0)));
    }

    #[test]
    fn test_quadrants_tile_parent() {
        let parent = BoundingBox::new(0.0, 0.0, 8.0, 8.0);
        let quads: Vec<_> = (0..4).map(|i| parent.quadrant(i)).collect();
        assert_eq!(quads[0], BoundingBox::new(0.0, 0.0, 4.0, 4.0));
        assert_eq!(quads[3], BoundingBox::new(4.0, 4.0, 8.0, 8.0));
        let union = quads.iter().fold(quads[0], |acc, q| acc.union(q));
        assert_eq!(union, parent);
    }
}
