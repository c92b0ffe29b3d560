//! Arc-length resampling of finished strokes

use crate::types::StrokePoint;

/// Emitted points closer than this to the pen-up point are folded into it.
const ENDPOINT_EPSILON: f64 = 1e-9;

/// Rewrites a point sequence to near-uniform arc-length spacing.
///
/// The walk carries leftover distance from one segment into the next, the
/// same way the brush spacing accumulator does, so output spacing converges
/// on `spacing` without being exact. The first and last input points are
/// always kept verbatim.
#[derive(Debug, Clone, Copy)]
pub struct Resampler {
    spacing: f64,
}

impl Resampler {
    pub fn new(spacing: f64) -> Self {
        Self { spacing }
    }

    pub fn spacing(&self) -> f64 {
        self.spacing
    }

    /// Resample `points`; sequences shorter than 3 are returned unchanged
    pub fn resample(&self, points: &[StrokePoint]) -> Vec<StrokePoint> {
        let (Some(first), Some(last)) = (points.first(), points.last()) else {
            return Vec::new();
        };
        if points.len() < 3 || self.spacing <= 0.0 {
            return points.to_vec();
        }

        let mut out = Vec::with_capacity(points.len());
        out.push(*first);

        let mut accumulated = 0.0;
        for pair in points.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            let segment = a.pos.distance(b.pos);
            if segment <= 0.0 {
                continue;
            }

            let mut consumed = 0.0;
            while accumulated + (segment - consumed) >= self.spacing {
                consumed += self.spacing - accumulated;
                out.push(a.lerp(b, (consumed / segment).min(1.0)));
                accumulated = 0.0;
            }
            accumulated += segment - consumed;
        }

        if out.len() > 1
            && out
                .last()
                .is_some_and(|tail| tail.pos.distance(last.pos) < ENDPOINT_EPSILON)
        {
            out.pop();
        }
        out.push(*last);
        out
    }
}
