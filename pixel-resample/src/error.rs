// SPDX-License-Identifier: MIT
//! Error types for buffer allocation and resampling.
//!
//! Nothing in this crate logs or swallows an error: every failure is returned
//! to the caller, who decides whether to drop the frame, retry later, or abort.

use fast_image_resize as fir;
use thiserror::Error;

use crate::format::PixelFormat;
use crate::geometry::CropRect;

/// Failure to obtain pixel memory.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocationError {
    /// The allocator could not reserve the requested bytes, or the size
    /// overflowed the address space.
    #[error("out of memory allocating {bytes} bytes")]
    OutOfMemory { bytes: usize },

    /// Width or height was zero.
    #[error("invalid buffer dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
}

/// Geometry problems when wrapping memory that was not produced by an allocator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BufferError {
    #[error("invalid buffer dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("bytes per row {bytes_per_row} is smaller than the {min} bytes one row needs")]
    RowTooShort { bytes_per_row: usize, min: usize },

    #[error("pixel data holds {len} bytes but the geometry requires {required}")]
    DataTooShort { len: usize, required: usize },
}

/// Failures inside the scaling pass itself.
#[derive(Debug, Error)]
pub enum ScaleError {
    #[error("fast image resize error: {0}")]
    Fir(#[from] fir::ResizeError),

    #[error("image buffer error: {0}")]
    ImageBuf(#[from] fir::ImageBufferError),

    /// The allocator handed back a buffer that does not match the request.
    #[error(
        "destination geometry mismatch: requested {expected_width}x{expected_height}, \
         got {width}x{height} with {bytes_per_row} bytes per row"
    )]
    DestinationMismatch {
        expected_width: u32,
        expected_height: u32,
        width: u32,
        height: u32,
        bytes_per_row: usize,
    },

    #[error("destination is {actual}, source is {expected}")]
    FormatMismatch {
        expected: PixelFormat,
        actual: PixelFormat,
    },
}

/// Everything [`crate::Resampler::resample`] can report.
#[derive(Debug, Error)]
pub enum ResampleError {
    /// The crop rectangle is empty or reaches outside the source.
    #[error("crop region {crop} does not fit a {source_width}x{source_height} source")]
    InvalidCropRegion {
        crop: CropRect,
        source_width: u32,
        source_height: u32,
    },

    /// The requested output size has a zero side.
    #[error("invalid scale target {width}x{height}")]
    InvalidTarget { width: u32, height: u32 },

    /// No memory for the destination buffer.
    #[error("destination allocation failed: {0}")]
    AllocationFailed(#[from] AllocationError),

    /// The scaling pass failed; the destination has already been released.
    #[error("resampling failed: {0}")]
    ResamplingFailed(#[from] ScaleError),
}

impl ResampleError {
    /// Whether the same call may succeed on a later frame.
    ///
    /// Only resource exhaustion is transient. Invalid geometry is a caller bug
    /// and a failed scaling pass fails the same way for the same input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ResampleError::AllocationFailed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        let oom = ResampleError::AllocationFailed(AllocationError::OutOfMemory { bytes: 16 });
        assert!(oom.is_retryable());

        let crop = ResampleError::InvalidCropRegion {
            crop: CropRect::new(500, 0, 200, 10),
            source_width: 640,
            source_height: 480,
        };
        assert!(!crop.is_retryable());
        assert_eq!(
            crop.to_string(),
            "crop region 200x10+500+0 does not fit a 640x480 source"
        );
    }
}
