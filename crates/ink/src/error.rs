//! Engine error type

use crate::codec::CodecError;

/// Errors returned by [`crate::engine::StrokeEngine`].
///
/// Misuse that is harmless (continuing or ending a stroke while idle) and
/// degenerate input (taps) are not errors; those calls are no-ops or return
/// `None`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("A stroke is already in progress - end or cancel it first")]
    StrokeInProgress,
    #[error("Stroke file error: {0}")]
    Codec(#[from] CodecError),
}

impl EngineError {
    /// True for stroke files this reader cannot interpret (bad magic or newer version)
    pub fn is_format_error(&self) -> bool {
        matches!(self, Self::Codec(e) if e.is_format_error())
    }
}
