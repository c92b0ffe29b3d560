//! Adaptive low-pass ("1-Euro") filtering of raw pointer samples
//!
//! Each scalar channel (x, y, pressure) gets its own [`PointFilter`]. The
//! cutoff frequency rises with the estimated speed of the signal, so slow
//! movement is smoothed hard while fast strokes keep up with the pen.

use std::f64::consts::PI;

use glam::DVec2;
use ink_config::FilterConfig;

use crate::types::StrokePoint;

#[derive(Debug, Clone, Copy)]
struct FilterState {
    x_prev: f64,
    dx_prev: f64,
    t_prev: f64,
}

/// One-channel adaptive low-pass filter
#[derive(Debug, Clone)]
pub struct PointFilter {
    min_cutoff: f64,
    beta: f64,
    d_cutoff: f64,
    state: Option<FilterState>,
}

/// Smoothing factor for a first-order low-pass at `cutoff` Hz over `dt` seconds
fn smoothing_alpha(dt: f64, cutoff: f64) -> f64 {
    let tau = 1.0 / (2.0 * PI * cutoff);
    1.0 / (1.0 + tau / dt)
}

fn low_pass(value: f64, prev: f64, alpha: f64) -> f64 {
    alpha * value + (1.0 - alpha) * prev
}

impl PointFilter {
    pub fn new(min_cutoff: f64, beta: f64, d_cutoff: f64) -> Self {
        Self {
            min_cutoff,
            beta,
            d_cutoff,
            state: None,
        }
    }

    pub fn from_config(config: &FilterConfig) -> Self {
        Self::new(config.min_cutoff, config.beta, config.d_cutoff)
    }

    /// Forget all history; the next sample passes through unchanged
    pub fn reset(&mut self) {
        self.state = None;
    }

    /// Filter `value` observed at `t` seconds.
    ///
    /// Samples that do not advance time return the previous output.
    pub fn filter(&mut self, value: f64, t: f64) -> f64 {
        let Some(prev) = self.state else {
            self.state = Some(FilterState {
                x_prev: value,
                dx_prev: 0.0,
                t_prev: t,
            });
            return value;
        };

        let dt = t - prev.t_prev;
        if dt <= 0.0 {
            return prev.x_prev;
        }

        let dx = (value - prev.x_prev) / dt;
        let edx = low_pass(dx, prev.dx_prev, smoothing_alpha(dt, self.d_cutoff));
        let cutoff = self.min_cutoff + self.beta * edx.abs();
        let filtered = low_pass(value, prev.x_prev, smoothing_alpha(dt, cutoff));

        self.state = Some(FilterState {
            x_prev: filtered,
            dx_prev: edx,
            t_prev: t,
        });
        filtered
    }
}

/// The x, y and pressure filters for one stroke
#[derive(Debug, Clone)]
pub struct PointFilterSet {
    x: PointFilter,
    y: PointFilter,
    pressure: PointFilter,
}

impl PointFilterSet {
    pub fn new(config: &FilterConfig) -> Self {
        Self {
            x: PointFilter::from_config(config),
            y: PointFilter::from_config(config),
            pressure: PointFilter::from_config(config),
        }
    }

    /// Reset all channels; called at the start of every stroke
    pub fn reset(&mut self) {
        self.x.reset();
        self.y.reset();
        self.pressure.reset();
    }

    /// Filter position and pressure; tilt and time pass through
    pub fn apply(&mut self, point: &StrokePoint) -> StrokePoint {
        let t = point.timestamp_ms as f64 / 1000.0;
        let x = self.x.filter(point.pos.x, t);
        let y = self.y.filter(point.pos.y, t);
        let pressure = self.pressure.filter(point.pressure as f64, t) as f32;
        StrokePoint::new(DVec2::new(x, y), pressure, point.tilt, point.timestamp_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_sample_passes_through() {
        let mut filter = PointFilter::new(1.0, 0.007, 1.0);
        assert_eq!(filter.filter(42.5, 0.0), 42.5);
    }

    #[test]
    fn test_non_increasing_time_returns_previous() {
        let mut filter = PointFilter::new(1.0, 0.007, 1.0);
        filter.filter(0.0, 1.0);
        let moved = filter.filter(10.0, 1.016);
        assert_eq!(filter.filter(500.0, 1.016), moved);
        assert_eq!(filter.filter(500.0, 0.5), moved);
    }

    #[test]
    fn test_output_lags_toward_input() {
        let mut filter = PointFilter::new(1.0, 0.0, 1.0);
        filter.filter(0.0, 0.0);
        let out = filter.filter(10.0, 0.016);
        assert!(out > 0.0 && out < 10.0);

        // Matches the closed form with beta = 0
        let expected = smoothing_alpha(0.016, 1.0) * 10.0;
        assert!((out - expected).abs() < 1e-12);
    }

    #[test]
    fn test_speed_raises_cutoff() {
        let mut slow = PointFilter::new(1.0, 0.0, 1.0);
        let mut fast = PointFilter::new(1.0, 1.0, 1.0);
        slow.filter(0.0, 0.0);
        fast.filter(0.0, 0.0);
        let slow_out = slow.filter(100.0, 0.016);
        let fast_out = fast.filter(100.0, 0.016);
        assert!(fast_out > slow_out);
    }

    #[test]
    fn test_constant_signal_is_fixed_point() {
        let mut filter = PointFilter::new(1.0, 0.007, 1.0);
        for i in 0..20 {
            assert!((filter.filter(7.0, i as f64 * 0.01) - 7.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_reset_forgets_state() {
        let mut filter = PointFilter::new(1.0, 0.007, 1.0);
        filter.filter(0.0, 0.0);
        filter.filter(50.0, 0.02);
        filter.reset();
        assert_eq!(filter.filter(-3.0, 0.0), -3.0);
    }

    #[test]
    fn test_filter_set_keeps_tilt_and_time() {
        let mut set = PointFilterSet::new(&FilterConfig::default());
        let first = StrokePoint::new(DVec2::new(1.0, 2.0), 0.5, 0.3, 1000);
        assert_eq!(set.apply(&first), first);

        let second = StrokePoint::new(DVec2::new(5.0, 6.0), 0.9, 0.7, 1016);
        let out = set.apply(&second);
        assert_eq!(out.tilt, 0.7);
        assert_eq!(out.timestamp_ms, 1016);
        assert!(out.pos.x > 1.0 && out.pos.x < 5.0);
    }
}
