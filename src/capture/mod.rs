//! # Frame Sources
//!
//! A frame source plays the part of the camera: each call to
//! [`FrameSource::next_frame`] hands over one frame, owned by the caller, until
//! the stream ends.
//!
//! - [`synthetic`]: generated test patterns, frames recycled through a pool
//! - [`raw`]: memory-mapped files of concatenated raw frames
//! - [`image_file`]: a decoded still image, repeated as a stream

pub mod image_file;
pub mod raw;
pub mod synthetic;

pub use image_file::ImageFileSource;
pub use raw::RawFileSource;
pub use synthetic::{SyntheticPattern, SyntheticSource};

use pixel_resample::PixelBuffer;

use crate::error::PipelineResult;

/// Supplier of camera frames.
pub trait FrameSource: Send {
    /// Name used in logs and error messages.
    fn name(&self) -> &str;

    /// Next frame, or `None` when the stream is exhausted.
    fn next_frame(&mut self) -> PipelineResult<Option<PixelBuffer>>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn next_frame(&mut self) -> PipelineResult<Option<PixelBuffer>> {
        (**self).next_frame()
    }
}
