use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::bbox::BoundingBox;
use crate::constants::DEFAULT_STROKE_WIDTH;

/// Drawing tool a stroke was made with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[repr(u8)]
pub enum Tool {
    #[default]
    Pen = 0,
    Pencil = 1,
    Marker = 2,
    Highlighter = 3,
    Eraser = 4,
}

impl Tool {
    /// Ordinal used by the stroke file format
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn from_ordinal(ordinal: u8) -> Option<Self> {
        match ordinal {
            0 => Some(Self::Pen),
            1 => Some(Self::Pencil),
            2 => Some(Self::Marker),
            3 => Some(Self::Highlighter),
            4 => Some(Self::Eraser),
            _ => None,
        }
    }

    /// Whether stroke width follows pen pressure
    pub fn is_pressure_sensitive(self) -> bool {
        matches!(self, Self::Pen | Self::Pencil)
    }
}

/// 8-bit straight-alpha color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const BLACK: Self = Self::new(0, 0, 0, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn to_bytes(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Self::new(bytes[0], bytes[1], bytes[2], bytes[3])
    }

    /// Normalized [r, g, b, a] for compositing
    pub fn to_f32(self) -> [f32; 4] {
        [
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
            self.a as f32 / 255.0,
        ]
    }
}

impl Default for Rgba {
    fn default() -> Self {
        Self::BLACK
    }
}

/// Input device a sample came from
///
/// Palm rejection and stylus/touch discrimination happen upstream; the
/// engine only carries the kind through for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DeviceKind {
    #[default]
    Stylus,
    Touch,
    Mouse,
}

/// Raw pointer sample delivered by the canvas
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerSample {
    pub pos: DVec2,
    pub pressure: f32,
    pub tilt: f32,
    pub timestamp_ms: i64,
    pub device: DeviceKind,
}

impl PointerSample {
    pub fn new(pos: DVec2, pressure: f32, tilt: f32, timestamp_ms: i64) -> Self {
        Self {
            pos,
            pressure,
            tilt,
            timestamp_ms,
            device: DeviceKind::Stylus,
        }
    }
}

/// One point of a stroke
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrokePoint {
    pub pos: DVec2,
    /// Normalized pressure in [0, 1]
    pub pressure: f32,
    /// Tilt in radians
    pub tilt: f32,
    pub timestamp_ms: i64,
}

impl StrokePoint {
    pub fn new(pos: DVec2, pressure: f32, tilt: f32, timestamp_ms: i64) -> Self {
        Self {
            pos,
            pressure: pressure.clamp(0.0, 1.0),
            tilt,
            timestamp_ms,
        }
    }

    pub fn from_sample(sample: &PointerSample) -> Self {
        Self::new(sample.pos, sample.pressure, sample.tilt, sample.timestamp_ms)
    }

    /// Linear blend of every channel; timestamps use the integer midpoint
    pub fn lerp(&self, other: &Self, t: f64) -> Self {
        let tf = t as f32;
        Self {
            pos: self.pos.lerp(other.pos, t),
            pressure: self.pressure + (other.pressure - self.pressure) * tf,
            tilt: self.tilt + (other.tilt - self.tilt) * tf,
            timestamp_ms: midpoint_ms(self.timestamp_ms, other.timestamp_ms),
        }
    }
}

/// Integer average of two timestamps
pub(crate) fn midpoint_ms(a: i64, b: i64) -> i64 {
    a + (b - a) / 2
}

/// Stroke identifier, at most 16 bytes when persisted
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StrokeId(String);

impl StrokeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Build a 16-character hex id from a creation time and a sequence number
    pub fn generate(created_at_ms: i64, seq: u32) -> Self {
        Self(format!("{:08x}{:08x}", created_at_ms as u32, seq))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StrokeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tool, color and width applied to new strokes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrokeStyle {
    pub tool: Tool,
    pub color: Rgba,
    pub width: f32,
}

impl Default for StrokeStyle {
    fn default() -> Self {
        Self {
            tool: Tool::Pen,
            color: Rgba::BLACK,
            width: DEFAULT_STROKE_WIDTH,
        }
    }
}

/// A pen-down to pen-up ink path
///
/// Mutable only while it is the engine's active stroke. Once committed it is
/// shared behind an `Arc` and never changes again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub id: StrokeId,
    pub tool: Tool,
    pub color: Rgba,
    pub width: f32,
    /// Never empty
    pub points: Vec<StrokePoint>,
    pub bbox: BoundingBox,
    pub created_at: i64,
}

impl Stroke {
    /// Start a stroke from its first point
    pub fn begin(id: StrokeId, style: StrokeStyle, first: StrokePoint) -> Self {
        Self {
            id,
            tool: style.tool,
            color: style.color,
            width: style.width,
            points: vec![first],
            bbox: BoundingBox::from_point(first.pos),
            created_at: first.timestamp_ms,
        }
    }

    pub fn style(&self) -> StrokeStyle {
        StrokeStyle {
            tool: self.tool,
            color: self.color,
            width: self.width,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_point(&self) -> Option<&StrokePoint> {
        self.points.first()
    }

    pub fn last_point(&self) -> Option<&StrokePoint> {
        self.points.last()
    }

    /// Append a live point and grow the bbox
    pub fn push_point(&mut self, point: StrokePoint) {
        self.bbox.expand_to(point.pos);
        self.points.push(point);
    }

    /// Recompute the bbox exactly from the current points
    pub fn recompute_bbox(&mut self) {
        if let Some(bbox) = BoundingBox::from_points(self.points.iter().map(|p| p.pos)) {
            self.bbox = bbox;
        }
    }

    /// Bbox grown by half the stroke width, the area ink can cover
    pub fn ink_bounds(&self) -> BoundingBox {
        self.bbox.padded(self.width as f64 * 0.5)
    }
}
