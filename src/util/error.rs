//! Error types for xpcscorr.

use crate::correlator::Backend;
use crate::frames::PixelType;
use thiserror::Error;

/// Result alias for correlator operations.
pub type CorrResult<T> = std::result::Result<T, CorrError>;

/// Coarse classification of a [`CorrError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Inputs or parameters are inconsistent; detected before numeric work.
    Configuration,
    /// The requested backend was not compiled into this build.
    BackendUnavailable,
    /// Buffer allocation or transform plan construction failed.
    Resource,
    /// Loading frames or masks from disk failed.
    Io,
}

/// Errors that can occur when building or running a correlator.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CorrError {
    /// Frame dimensions or frame count are zero.
    #[error("invalid dimensions: {frames} frames of {height}x{width}")]
    InvalidDimensions {
        frames: usize,
        height: usize,
        width: usize,
    },
    /// The backing buffer is too small for the requested shape.
    #[error("buffer too small: needed {needed}, got {got}")]
    BufferTooSmall { needed: usize, got: usize },
    /// An owned buffer's length differs from the length its shape requires.
    #[error("buffer length mismatch: expected {expected}, got {got}")]
    BufferLength { expected: usize, got: usize },
    /// Frame shape does not match the shape the correlator was built for.
    #[error("shape mismatch: expected {expected_height}x{expected_width}, got {height}x{width}")]
    ShapeMismatch {
        expected_height: usize,
        expected_width: usize,
        height: usize,
        width: usize,
    },
    /// Frame count does not match the count the correlator was built for.
    #[error("frame count mismatch: expected {expected}, got {got}")]
    FrameCountMismatch { expected: usize, got: usize },
    /// At least two frames are needed to form a lag.
    #[error("too few frames: {frames} (need at least 2)")]
    TooFewFrames { frames: usize },
    /// A bin label in `1..=bins` selects no pixel.
    #[error("bin {bin} selects no pixels")]
    EmptyBin { bin: u32 },
    /// The mask contains no non-zero label.
    #[error("bin mask contains no bins")]
    NoBins,
    /// A mask label is negative or does not fit a bin index.
    #[error("invalid bin label {label} at pixel {index}")]
    InvalidLabel { index: usize, label: i64 },
    /// The frame element type differs from the configured dtype.
    #[error("dtype mismatch: configured {expected}, got {got}")]
    DtypeMismatch { expected: PixelType, got: PixelType },
    /// An option value is out of range.
    #[error("invalid option: {0}")]
    InvalidOption(&'static str),
    /// The requested backend is not available in this build.
    #[error("backend unavailable: {backend} (rebuild with the matching cargo feature)")]
    BackendUnavailable { backend: Backend },
    /// Device buffer allocation or transform plan construction failed.
    #[error(
        "resource failure ({context}) for {frames} frames of {height}x{width}, {bins} bins"
    )]
    Resource {
        context: &'static str,
        height: usize,
        width: usize,
        frames: usize,
        bins: usize,
    },
    /// Image decoding failed.
    #[error("image io: {reason}")]
    ImageIo { reason: String },
}

impl CorrError {
    /// Returns the error classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CorrError::BackendUnavailable { .. } => ErrorKind::BackendUnavailable,
            CorrError::Resource { .. } => ErrorKind::Resource,
            CorrError::ImageIo { .. } => ErrorKind::Io,
            _ => ErrorKind::Configuration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CorrError, ErrorKind};
    use crate::correlator::Backend;

    #[test]
    fn kinds_follow_variant_groups() {
        assert_eq!(CorrError::EmptyBin { bin: 3 }.kind(), ErrorKind::Configuration);
        assert_eq!(
            CorrError::BackendUnavailable {
                backend: Backend::Fft
            }
            .kind(),
            ErrorKind::BackendUnavailable
        );
        let err = CorrError::Resource {
            context: "device buffer",
            height: 4,
            width: 4,
            frames: 10,
            bins: 2,
        };
        assert_eq!(err.kind(), ErrorKind::Resource);
        assert!(err.to_string().contains("10 frames of 4x4, 2 bins"));
    }
}
