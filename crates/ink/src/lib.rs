//! Ink pipeline for stylus note-taking
//!
//! This crate turns raw pointer samples into committed vector strokes and
//! keeps them queryable, undoable, renderable and persistent:
//! - [`filter`] - 1-Euro jitter filter for live input
//! - [`resample`] / [`smooth`] - pen-up geometry passes
//! - [`spatial`] - quadtree over stroke bounding boxes
//! - [`undo`] - bounded undo/redo of stroke edits
//! - [`tiles`] / [`raster`] - zoom-keyed LRU tile cache and a CPU rasterizer
//! - [`codec`] - the "WINK" binary stroke file format
//! - [`engine`] - [`StrokeEngine`], which ties it all together per page

pub mod bbox;
pub mod codec;
pub mod constants;
pub mod engine;
pub mod error;
pub mod events;
pub mod filter;
pub mod raster;
pub mod resample;
pub mod smooth;
pub mod spatial;
pub mod store;
pub mod tiles;
pub mod types;
pub mod undo;

pub use bbox::{BoundingBox, Rect};
pub use codec::{CodecError, StrokeCodec, StrokeFileReader};
pub use engine::{PageLocation, StrokeEngine, StrokeState};
pub use error::EngineError;
pub use events::EngineEvent;
pub use ink_config::InkConfig;
pub use raster::{CpuTileRenderer, TileRaster};
pub use tiles::{TileBounds, TileCache, TileRenderer};
pub use types::*;
