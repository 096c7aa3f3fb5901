// SPDX-License-Identifier: MIT
//! # pixel-resample: Crop-then-Scale for Fixed-Size Model Input
//!
//! Image classifiers take a fixed input resolution (299×299 for Inception v3,
//! 224×224 for MobileNet). Camera frames arrive in whatever size the sensor
//! delivers. This crate turns the latter into the former: it cuts a rectangle
//! out of a packed pixel buffer, stretches it to the model's resolution, and
//! returns the result in a freshly allocated buffer the caller owns, or
//! writes it into one the caller supplies ([`Resampler::resample_into`]).
//!
//! ## Key Components
//!
//! - [`buffer`]: [`PixelBuffer`], row-major pixel memory with lock guards and
//!   exactly-once release
//! - [`allocator`]: the [`BufferAllocator`] trait plus system, tracking and
//!   fault-injecting allocators
//! - [`pool`]: bounded recycling allocator for steady per-frame workloads
//! - [`resample`]: the [`Resampler`] itself, SIMD scaling via fast_image_resize
//! - [`geometry`]: crop rectangles, scale targets and classifier presets
//!
//! ## Guarantees
//!
//! - **Format preserving**: output carries the source's pixel format
//! - **No silent clamping**: a crop outside the source is an error
//! - **All or nothing**: a failed call leaves no allocation behind
//! - **Deterministic**: identical input bytes give identical output bytes
//! - **Stride-aware**: padded source and destination rows are handled
//! - **Synchronous**: every call runs on the calling thread
//!
//! ## Usage Example
//!
//! ```rust
//! use pixel_resample::{CropRect, PixelBuffer, PixelFormat, Resampler, ScaleTarget};
//!
//! let frame = PixelBuffer::from_packed(640, 480, PixelFormat::Bgra8888, vec![0u8; 640 * 480 * 4])?;
//!
//! let mut resampler = Resampler::new();
//! let input = resampler.resample(
//!     &frame,
//!     CropRect::center_square(640, 480),
//!     ScaleTarget::new(299, 299),
//! )?;
//!
//! assert_eq!((input.width(), input.height()), (299, 299));
//! assert_eq!(input.format(), PixelFormat::Bgra8888);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod allocator;
pub mod buffer;
pub mod error;
pub mod format;
pub mod geometry;
pub mod pool;
pub mod resample;

pub use allocator::{
    AllocationLedger, BufferAllocator, FaultInjectingAllocator, SystemAllocator,
    TrackingAllocator,
};
pub use buffer::{BufferReadLock, BufferWriteLock, PixelBuffer, ReleaseHook};
pub use error::{AllocationError, BufferError, ResampleError, ScaleError};
pub use format::PixelFormat;
pub use geometry::{CropRect, InputPreset, ScaleTarget};
pub use pool::BufferPool;
pub use resample::{resample, resample_full, Interpolation, Resampler};
