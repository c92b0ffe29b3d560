//! "WINK" stroke files
//!
//! Little-endian layout:
//!
//! ```text
//! header   16 bytes  magic "WINK", version u16, stroke count u32, flags u16, reserved 4
//! index    count x 8 (offset u32, size u32); offsets are relative to the end of the index
//! records  per stroke: id[16] tool u8 rgba[4] width f32 created_at i64 bbox 4 x f32
//!          point count u32, then count x 20 (x, y, pressure, tilt f32; timestamp i32)
//! ```
//!
//! Point timestamps are stored relative to the stroke's `created_at`.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use bytemuck::{Pod, Zeroable};
use glam::DVec2;
use tracing::{debug, info, warn};

use crate::bbox::BoundingBox;
use crate::constants::{
    HEADER_LEN, INDEX_ENTRY_LEN, POINT_RECORD_LEN, RECORD_FIXED_LEN, STROKE_ID_LEN, WINK_MAGIC,
    WINK_VERSION,
};
use crate::types::{Rgba, Stroke, StrokeId, StrokePoint, Tool};

/// Error type for stroke file encoding and decoding.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Not a stroke file: bad magic {found:?}")]
    BadMagic { found: [u8; 4] },
    #[error("Unsupported stroke file version {found} (reader supports up to {supported})")]
    UnsupportedVersion { found: u16, supported: u16 },
    #[error("Truncated stroke file: needed {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },
    #[error("No stroke record {index}: file holds {count}")]
    NoSuchRecord { index: usize, count: usize },
    #[error("Stroke record {index} out of bounds (offset {offset}, size {size})")]
    RecordOutOfBounds { index: usize, offset: u32, size: u32 },
    #[error("Stroke record {index} has size {size}, expected {expected}")]
    RecordSizeMismatch { index: usize, size: u32, expected: usize },
    #[error("Stroke record {index} has no points")]
    EmptyStroke { index: usize },
    #[error("Unknown tool ordinal {0}")]
    UnknownTool(u8),
    #[error("Too large to encode: {0}")]
    TooLarge(&'static str),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CodecError {
    /// Wrong magic or a newer version: the file is not something this
    /// reader can interpret at all
    pub fn is_format_error(&self) -> bool {
        matches!(self, Self::BadMagic { .. } | Self::UnsupportedVersion { .. })
    }
}

/// One index table entry, as laid out on disk
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct IndexEntry {
    offset: u32,
    size: u32,
}

impl IndexEntry {
    fn new(offset: u32, size: u32) -> Self {
        Self {
            offset: offset.to_le(),
            size: size.to_le(),
        }
    }

    pub fn offset(&self) -> u32 {
        u32::from_le(self.offset)
    }

    pub fn size(&self) -> u32 {
        u32::from_le(self.size)
    }
}

/// One stored point. Floats are kept as little-endian bit patterns.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
struct PointRecord {
    x: u32,
    y: u32,
    pressure: u32,
    tilt: u32,
    timestamp: u32,
}

impl PointRecord {
    fn encode(point: &StrokePoint, created_at: i64) -> Result<Self, CodecError> {
        let relative = i32::try_from(point.timestamp_ms - created_at)
            .map_err(|_| CodecError::TooLarge("point timestamp offset"))?;
        Ok(Self {
            x: (point.pos.x as f32).to_bits().to_le(),
            y: (point.pos.y as f32).to_bits().to_le(),
            pressure: point.pressure.to_bits().to_le(),
            tilt: point.tilt.to_bits().to_le(),
            timestamp: (relative as u32).to_le(),
        })
    }

    fn decode(&self, created_at: i64) -> StrokePoint {
        let f = |bits: u32| f32::from_bits(u32::from_le(bits));
        StrokePoint::new(
            DVec2::new(f(self.x) as f64, f(self.y) as f64),
            f(self.pressure),
            f(self.tilt),
            created_at + u32::from_le(self.timestamp) as i32 as i64,
        )
    }
}

const _: () = assert!(std::mem::size_of::<IndexEntry>() == INDEX_ENTRY_LEN);
const _: () = assert!(std::mem::size_of::<PointRecord>() == POINT_RECORD_LEN);

/// Encoded length of a stroke record with `point_count` points
pub fn record_len(point_count: usize) -> usize {
    RECORD_FIXED_LEN + POINT_RECORD_LEN * point_count
}

/// Zero-padded id bytes, cut at the last char boundary that fits
fn encode_id(id: &StrokeId) -> [u8; STROKE_ID_LEN] {
    let s = id.as_str();
    let mut end = s.len().min(STROKE_ID_LEN);
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    let mut out = [0u8; STROKE_ID_LEN];
    out[..end].copy_from_slice(&s.as_bytes()[..end]);
    out
}

fn decode_id(bytes: &[u8]) -> StrokeId {
    let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    StrokeId::new(String::from_utf8_lossy(&bytes[..end]).into_owned())
}

fn encode_record(stroke: &Stroke, out: &mut Vec<u8>) -> Result<(), CodecError> {
    let point_count =
        u32::try_from(stroke.points.len()).map_err(|_| CodecError::TooLarge("point count"))?;

    out.extend_from_slice(&encode_id(&stroke.id));
    out.push(stroke.tool.ordinal());
    out.extend_from_slice(&stroke.color.to_bytes());
    out.extend_from_slice(&stroke.width.to_le_bytes());
    out.extend_from_slice(&stroke.created_at.to_le_bytes());
    for v in [
        stroke.bbox.min_x,
        stroke.bbox.min_y,
        stroke.bbox.max_x,
        stroke.bbox.max_y,
    ] {
        out.extend_from_slice(&(v as f32).to_le_bytes());
    }
    out.extend_from_slice(&point_count.to_le_bytes());
    for point in &stroke.points {
        let record = PointRecord::encode(point, stroke.created_at)?;
        out.extend_from_slice(bytemuck::bytes_of(&record));
    }
    Ok(())
}

/// Sequential little-endian reader over a byte slice
struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        let end = self.pos + n;
        if end > self.bytes.len() {
            return Err(CodecError::Truncated {
                needed: end,
                available: self.bytes.len(),
            });
        }
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, CodecError> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    fn u32(&mut self) -> Result<u32, CodecError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn i64(&mut self) -> Result<i64, CodecError> {
        Ok(i64::from_le_bytes(self.array()?))
    }

    fn f32(&mut self) -> Result<f32, CodecError> {
        Ok(f32::from_le_bytes(self.array()?))
    }
}

/// Parsed header and index of a stroke file.
///
/// Records are decoded on demand, so a caller can pull out a single stroke
/// without touching the rest of the file.
#[derive(Debug)]
pub struct StrokeFileReader<'a> {
    version: u16,
    flags: u16,
    entries: Vec<IndexEntry>,
    records: &'a [u8],
}

impl<'a> StrokeFileReader<'a> {
    /// Validate the header and read the index table
    pub fn parse(bytes: &'a [u8]) -> Result<Self, CodecError> {
        let mut reader = ByteReader::new(bytes);
        let magic: [u8; 4] = reader.array()?;
        if magic != WINK_MAGIC {
            return Err(CodecError::BadMagic { found: magic });
        }
        let version = reader.u16()?;
        if version > WINK_VERSION {
            return Err(CodecError::UnsupportedVersion {
                found: version,
                supported: WINK_VERSION,
            });
        }
        let count = reader.u32()? as usize;
        let flags = reader.u16()?;
        reader.take(4)?;
        debug_assert_eq!(reader.pos, HEADER_LEN);

        let index_len = count
            .checked_mul(INDEX_ENTRY_LEN)
            .ok_or(CodecError::TooLarge("stroke count"))?;
        let index = reader.take(index_len)?;
        let entries: Vec<IndexEntry> = index
            .chunks_exact(INDEX_ENTRY_LEN)
            .map(bytemuck::pod_read_unaligned)
            .collect();

        let records = &bytes[reader.pos..];
        for (i, entry) in entries.iter().enumerate() {
            let end = entry.offset() as usize + entry.size() as usize;
            if end > records.len() {
                return Err(CodecError::RecordOutOfBounds {
                    index: i,
                    offset: entry.offset(),
                    size: entry.size(),
                });
            }
        }

        Ok(Self {
            version,
            flags,
            entries,
            records,
        })
    }

    pub fn version(&self) -> u16 {
        self.version
    }

    pub fn flags(&self) -> u16 {
        self.flags
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, index: usize) -> Option<IndexEntry> {
        self.entries.get(index).copied()
    }

    /// Decode the record at `index`.
    ///
    /// Fails with [`CodecError::NoSuchRecord`] if `index >= len()`.
    pub fn stroke_at(&self, index: usize) -> Result<Stroke, CodecError> {
        let entry = self.entries.get(index).ok_or(CodecError::NoSuchRecord {
            index,
            count: self.entries.len(),
        })?;
        let start = entry.offset() as usize;
        let record = self
            .records
            .get(start..start + entry.size() as usize)
            .ok_or(CodecError::RecordOutOfBounds {
                index,
                offset: entry.offset(),
                size: entry.size(),
            })?;
        decode_record(index, record)
    }

    /// Decode every record in file order
    pub fn strokes(&self) -> impl Iterator<Item = Result<Stroke, CodecError>> + '_ {
        (0..self.len()).map(|i| self.stroke_at(i))
    }
}

fn decode_record(index: usize, record: &[u8]) -> Result<Stroke, CodecError> {
    let mut reader = ByteReader::new(record);
    let id = decode_id(reader.take(STROKE_ID_LEN)?);
    let tool_ordinal = reader.u8()?;
    let tool = Tool::from_ordinal(tool_ordinal).ok_or(CodecError::UnknownTool(tool_ordinal))?;
    let color = Rgba::from_bytes(reader.array()?);
    let width = reader.f32()?;
    let created_at = reader.i64()?;
    let (min_x, min_y, max_x, max_y) = (reader.f32()?, reader.f32()?, reader.f32()?, reader.f32()?);
    let point_count = reader.u32()? as usize;

    let expected = record_len(point_count);
    if record.len() != expected {
        return Err(CodecError::RecordSizeMismatch {
            index,
            size: record.len() as u32,
            expected,
        });
    }
    if point_count == 0 {
        return Err(CodecError::EmptyStroke { index });
    }

    let points: Vec<StrokePoint> = reader
        .take(point_count * POINT_RECORD_LEN)?
        .chunks_exact(POINT_RECORD_LEN)
        .map(|chunk| bytemuck::pod_read_unaligned::<PointRecord>(chunk).decode(created_at))
        .collect();

    let mut stroke = Stroke {
        id,
        tool,
        color,
        width,
        points,
        bbox: BoundingBox::new(min_x as f64, min_y as f64, max_x as f64, max_y as f64),
        created_at,
    };
    let stored = stroke.bbox;
    stroke.recompute_bbox();
    if stored != stroke.bbox {
        debug!("Stroke {}: stored bbox differs from its points, using recomputed bbox", stroke.id);
    }
    Ok(stroke)
}

/// Encoder and decoder for whole pages of strokes
pub struct StrokeCodec;

impl StrokeCodec {
    /// Encode `strokes` in order.
    ///
    /// Two passes: the index table is reserved first and its offsets are
    /// backfilled once every record has been written.
    pub fn encode<S: AsRef<Stroke>>(strokes: &[S]) -> Result<Vec<u8>, CodecError> {
        let count = u32::try_from(strokes.len()).map_err(|_| CodecError::TooLarge("stroke count"))?;
        let index_len = strokes.len() * INDEX_ENTRY_LEN;
        let body_len: usize = strokes.iter().map(|s| record_len(s.as_ref().points.len())).sum();

        let mut out = Vec::with_capacity(HEADER_LEN + index_len + body_len);
        out.extend_from_slice(&WINK_MAGIC);
        out.extend_from_slice(&WINK_VERSION.to_le_bytes());
        out.extend_from_slice(&count.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&[0u8; 4]);

        let records_start = HEADER_LEN + index_len;
        out.resize(records_start, 0);

        let mut entries = Vec::with_capacity(strokes.len());
        for stroke in strokes {
            let offset = u32::try_from(out.len() - records_start)
                .map_err(|_| CodecError::TooLarge("file size"))?;
            encode_record(stroke.as_ref(), &mut out)?;
            let size = (out.len() - records_start) as u32 - offset;
            entries.push(IndexEntry::new(offset, size));
        }
        out[HEADER_LEN..records_start].copy_from_slice(bytemuck::cast_slice(&entries));

        Ok(out)
    }

    /// Decode every stroke in a file image
    pub fn decode(bytes: &[u8]) -> Result<Vec<Stroke>, CodecError> {
        let reader = StrokeFileReader::parse(bytes)?;
        reader.strokes().collect()
    }

    /// Write `strokes` to `path` through a sibling temp file, so a failed
    /// write never clobbers the previous file
    pub fn save<S: AsRef<Stroke>>(path: &Path, strokes: &[S]) -> Result<(), CodecError> {
        let bytes = Self::encode(strokes)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let temp = temp_path(path);
        let written = fs::File::create(&temp).and_then(|mut file| {
            file.write_all(&bytes)?;
            file.sync_all()
        });
        if let Err(e) = written.and_then(|_| fs::rename(&temp, path)) {
            let _ = fs::remove_file(&temp);
            return Err(e.into());
        }

        info!("Saved {} strokes ({} bytes) to {}", strokes.len(), bytes.len(), path.display());
        Ok(())
    }

    /// Read and decode a stroke file
    pub fn load(path: &Path) -> Result<Vec<Stroke>, CodecError> {
        let bytes = fs::read(path)?;
        let strokes = Self::decode(&bytes).inspect_err(|e| {
            warn!("Failed to decode {}: {}", path.display(), e);
        })?;
        info!("Loaded {} strokes from {}", strokes.len(), path.display());
        Ok(strokes)
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
