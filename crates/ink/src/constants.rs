/// Magic bytes at the start of every stroke file.
pub const WINK_MAGIC: [u8; 4] = *b"WINK";

/// Highest stroke file version this reader understands.
pub const WINK_VERSION: u16 = 1;

/// Fixed header length of a stroke file.
pub const HEADER_LEN: usize = 16;

/// Length of one `(offset, size)` index entry.
pub const INDEX_ENTRY_LEN: usize = 8;

/// Stroke ids are stored zero-padded in this many bytes.
pub const STROKE_ID_LEN: usize = 16;

/// Bytes of a stroke record before its point array.
pub const RECORD_FIXED_LEN: usize = 53;

/// Bytes per stored point.
pub const POINT_RECORD_LEN: usize = 20;

/// Zoom values are compared after quantizing to 1/1000.
pub const ZOOM_QUANTUM: f64 = 1000.0;

/// Minimum number of points a stroke needs to be committed.
pub const MIN_COMMIT_POINTS: usize = 2;

/// Opacity applied to highlighter strokes by the CPU rasterizer.
pub const HIGHLIGHTER_OPACITY: f32 = 0.35;

/// Default stroke width for newly created styles.
pub const DEFAULT_STROKE_WIDTH: f32 = 2.0;
