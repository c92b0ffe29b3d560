//! CPU rasterization of committed strokes into tile images
//!
//! This is the reference [`TileRenderer`]: it stamps round dabs along each
//! stroke into an RGBA float buffer. GPU renderers plug into the tile cache
//! through the same trait.

use std::sync::Arc;

use glam::DVec2;
use tracing::trace;

use crate::constants::HIGHLIGHTER_OPACITY;
use crate::tiles::{TileBounds, TileRenderer};
use crate::types::{Stroke, Tool};

/// A tile-sized RGBA image, stored as [f32; 4] per pixel (Rgba32Float
/// compatible, straight alpha)
#[derive(Debug, Clone, PartialEq)]
pub struct TileRaster {
    pub width: u32,
    pub height: u32,
    pixels: Vec<[f32; 4]>,
}

impl TileRaster {
    /// Create a transparent raster
    pub fn new(width: u32, height: u32) -> Self {
        let pixel_count = (width as usize) * (height as usize);
        Self {
            width,
            height,
            pixels: vec![[0.0, 0.0, 0.0, 0.0]; pixel_count],
        }
    }

    pub fn clear(&mut self, color: [f32; 4]) {
        self.pixels.fill(color);
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some((y as usize) * (self.width as usize) + (x as usize))
    }

    #[inline]
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[f32; 4]> {
        self.index(x, y).map(|i| self.pixels[i])
    }

    #[inline]
    pub fn set_pixel(&mut self, x: u32, y: u32, color: [f32; 4]) {
        if let Some(i) = self.index(x, y) {
            self.pixels[i] = color;
        }
    }

    /// Source-over compositing: out = src * a + dst * (1 - a)
    #[inline]
    pub fn blend_pixel(&mut self, x: u32, y: u32, color: [f32; 4], opacity: f32) {
        let Some(i) = self.index(x, y) else {
            return;
        };
        let dst = self.pixels[i];
        let src_alpha = color[3] * opacity;
        let inv = 1.0 - src_alpha;
        self.pixels[i] = [
            color[0] * src_alpha + dst[0] * inv,
            color[1] * src_alpha + dst[1] * inv,
            color[2] * src_alpha + dst[2] * inv,
            src_alpha + dst[3] * inv,
        ];
    }

    /// Destination-out: fade the pixel by `amount` (0..1)
    #[inline]
    pub fn erase_pixel(&mut self, x: u32, y: u32, amount: f32) {
        let Some(i) = self.index(x, y) else {
            return;
        };
        let remaining = (1.0 - amount).max(0.0);
        let dst = self.pixels[i];
        self.pixels[i] = [
            dst[0] * remaining,
            dst[1] * remaining,
            dst[2] * remaining,
            dst[3] * remaining,
        ];
    }

    /// Raw bytes for texture upload
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    /// Quantize to RGBA8
    pub fn to_rgba8(&self) -> Vec<u8> {
        self.pixels
            .iter()
            .flat_map(|p| p.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8))
            .collect()
    }

    pub fn pixels(&self) -> &[[f32; 4]] {
        &self.pixels
    }

    /// True if no pixel has any alpha
    pub fn is_blank(&self) -> bool {
        self.pixels.iter().all(|p| p[3] == 0.0)
    }
}

/// Edge falloff; `distance` is 0 at the dab center and 1 at its rim
#[inline]
pub fn hardness_falloff(distance: f32, hardness: f32) -> f32 {
    if distance > 1.0 {
        return 0.0;
    }
    if hardness >= 1.0 {
        return 1.0;
    }
    let soft = 1.0 - distance.clamp(0.0, 1.0);
    soft * (1.0 - hardness) + hardness
}

/// Radius in world units of a stroke at the given pressure
pub fn stroke_radius(stroke: &Stroke, pressure: f32) -> f64 {
    let scale = if stroke.tool.is_pressure_sensitive() {
        0.5 + 0.5 * pressure.clamp(0.0, 1.0)
    } else {
        1.0
    };
    (stroke.width * scale) as f64 * 0.5
}

/// Reference CPU renderer for the tile cache
#[derive(Debug, Clone)]
pub struct CpuTileRenderer {
    /// Fill color applied before any stroke; `None` keeps tiles transparent
    pub background: Option<[f32; 4]>,
    /// Dab edge hardness (0 = soft, 1 = hard)
    pub hardness: f32,
}

impl Default for CpuTileRenderer {
    fn default() -> Self {
        Self {
            background: None,
            hardness: 0.8,
        }
    }
}

impl CpuTileRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rasterize one stroke into `raster`.
    ///
    /// Coverage is accumulated per stroke with `max`, then composited once,
    /// so overlapping dabs do not darken translucent ink.
    pub fn draw_stroke(&self, raster: &mut TileRaster, bounds: &TileBounds, stroke: &Stroke) {
        let (w, h) = (raster.width, raster.height);
        let mut coverage = vec![0.0f32; (w as usize) * (h as usize)];
        let scale = bounds.pixels_per_unit();
        let origin = DVec2::new(bounds.world.min_x, bounds.world.min_y);
        let to_pixel = |p: DVec2| (p - origin) * scale;

        let mut prev: Option<(DVec2, f64)> = None;
        for point in &stroke.points {
            let center = to_pixel(point.pos);
            let radius = (stroke_radius(stroke, point.pressure) * scale).max(0.5);

            match prev {
                None => self.stamp(&mut coverage, w, h, center, radius),
                Some((last_center, last_radius)) => {
                    let distance = last_center.distance(center);
                    let spacing = (radius.min(last_radius) * 0.25).max(0.5);
                    let steps = (distance / spacing).ceil().max(1.0) as usize;
                    for k in 1..=steps {
                        let t = k as f64 / steps as f64;
                        let c = last_center.lerp(center, t);
                        let r = last_radius + (radius - last_radius) * t;
                        self.stamp(&mut coverage, w, h, c, r);
                    }
                }
            }
            prev = Some((center, radius));
        }

        let color = stroke.color.to_f32();
        let tool_opacity = if stroke.tool == Tool::Highlighter {
            HIGHLIGHTER_OPACITY
        } else {
            1.0
        };

        for y in 0..h {
            for x in 0..w {
                let c = coverage[(y as usize) * (w as usize) + (x as usize)];
                if c <= 0.0 {
                    continue;
                }
                if stroke.tool == Tool::Eraser {
                    raster.erase_pixel(x, y, c);
                } else {
                    raster.blend_pixel(x, y, color, c * tool_opacity);
                }
            }
        }
    }

    fn stamp(&self, coverage: &mut [f32], w: u32, h: u32, center: DVec2, radius: f64) {
        let x_min = (center.x - radius).floor().max(0.0) as u32;
        let y_min = (center.y - radius).floor().max(0.0) as u32;
        let x_max = ((center.x + radius).ceil().max(0.0) as u32).min(w);
        let y_max = ((center.y + radius).ceil().max(0.0) as u32).min(h);
        if x_min >= x_max || y_min >= y_max {
            return;
        }

        for py in y_min..y_max {
            for px in x_min..x_max {
                let dx = px as f64 + 0.5 - center.x;
                let dy = py as f64 + 0.5 - center.y;
                let distance = ((dx * dx + dy * dy).sqrt() / radius) as f32;
                let falloff = hardness_falloff(distance, self.hardness);
                if falloff > 0.0 {
                    let cell = &mut coverage[(py as usize) * (w as usize) + (px as usize)];
                    *cell = cell.max(falloff);
                }
            }
        }
    }
}

impl TileRenderer<TileRaster> for CpuTileRenderer {
    fn render(&mut self, bounds: &TileBounds, strokes: &[Arc<Stroke>]) -> TileRaster {
        let mut raster = TileRaster::new(bounds.tile_size, bounds.tile_size);
        if let Some(background) = self.background {
            raster.clear(background);
        }
        for stroke in strokes {
            self.draw_stroke(&mut raster, bounds, stroke);
        }
        trace!(
            "CpuTileRenderer: tile ({}, {}) drew {} strokes",
            bounds.key.x,
            bounds.key.y,
            strokes.len()
        );
        raster
    }
}
