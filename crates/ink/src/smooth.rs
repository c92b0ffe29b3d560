//! Catmull-Rom subdivision of resampled strokes

use glam::DVec2;

use crate::types::{StrokePoint, midpoint_ms};

/// Evaluate the uniform Catmull-Rom segment between `p1` and `p2` at `t`.
pub fn catmull_rom(p0: DVec2, p1: DVec2, p2: DVec2, p3: DVec2, t: f64) -> DVec2 {
    let t2 = t * t;
    let t3 = t2 * t;
    0.5 * (2.0 * p1
        + (p2 - p0) * t
        + (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * t2
        + (3.0 * p1 - p0 - 3.0 * p2 + p3) * t3)
}

/// Fixed single-pass smoothing.
///
/// For every interior window `(p[i-1], p[i], p[i+1], p[i+2])` the original
/// `p[i]` is kept and one curve midpoint is inserted after it. The first two
/// and last two points come through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Smoother;

impl Smoother {
    pub fn new() -> Self {
        Self
    }

    /// Smooth `points`; fewer than 4 points are returned unchanged
    pub fn smooth(&self, points: &[StrokePoint]) -> Vec<StrokePoint> {
        let n = points.len();
        if n < 4 {
            return points.to_vec();
        }

        let mut out = Vec::with_capacity(n * 2);
        out.push(points[0]);
        for i in 1..=n - 3 {
            let (p0, p1, p2, p3) = (&points[i - 1], &points[i], &points[i + 1], &points[i + 2]);
            out.push(*p1);
            out.push(StrokePoint {
                pos: catmull_rom(p0.pos, p1.pos, p2.pos, p3.pos, 0.5),
                pressure: (p1.pressure + p2.pressure) * 0.5,
                tilt: (p1.tilt + p2.tilt) * 0.5,
                timestamp_ms: midpoint_ms(p1.timestamp_ms, p2.timestamp_ms),
            });
        }
        out.push(points[n - 2]);
        out.push(points[n - 1]);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zigzag(n: usize) -> Vec<StrokePoint> {
        (0..n)
            .map(|i| {
                let y = if i % 2 == 0 { 0.0 } else { 3.0 };
                StrokePoint::new(DVec2::new(i as f64 * 2.5, y), 0.2 + i as f32 * 0.05, 0.1, i as i64 * 10)
            })
            .collect()
    }

    #[test]
    fn test_short_input_unchanged() {
        let input = zigzag(3);
        assert_eq!(Smoother::new().smooth(&input), input);
    }

    #[test]
    fn test_endpoints_preserved() {
        let input = zigzag(9);
        let out = Smoother::new().smooth(&input);
        assert_eq!(out[0], input[0]);
        assert_eq!(out[1], input[1]);
        assert_eq!(out[out.len() - 2], input[input.len() - 2]);
        assert_eq!(out[out.len() - 1], input[input.len() - 1]);
    }

    #[test]
    fn test_point_count() {
        let n = 10;
        let out = Smoother::new().smooth(&zigzag(n));
        // n originals plus one midpoint per interior window
        assert_eq!(out.len(), n + (n - 3));
    }

    #[test]
    fn test_midpoint_on_straight_line() {
        let input: Vec<_> = (0..4)
            .map(|i| StrokePoint::new(DVec2::new(i as f64, 0.0), 0.5, 0.0, i as i64))
            .collect();
        let out = Smoother::new().smooth(&input);
        assert_eq!(out.len(), 5);
        assert!((out[2].pos.x - 1.5).abs() < 1e-12);
        assert_eq!(out[2].pos.y, 0.0);
    }

    #[test]
    fn test_midpoint_attributes_are_means() {
        let input = zigzag(4);
        let out = Smoother::new().smooth(&input);
        let mid = out[2];
        assert!((mid.pressure - (input[1].pressure + input[2].pressure) * 0.5).abs() < 1e-6);
        assert_eq!(mid.timestamp_ms, 15);
    }

    #[test]
    fn test_catmull_rom_interpolates_ends() {
        let (p0, p1, p2, p3) = (
            DVec2::new(0.0, 0.0),
            DVec2::new(1.0, 2.0),
            DVec2::new(3.0, 1.0),
            DVec2::new(4.0, 4.0),
        );
        assert!(catmull_rom(p0, p1, p2, p3, 0.0).distance(p1) < 1e-12);
        assert!(catmull_rom(p0, p1, p2, p3, 1.0).distance(p2) < 1e-12);
    }
}
