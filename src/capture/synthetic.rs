//! Synthetic frame source for tests, demos and benchmarks.
//!
//! Frames come out of a [`BufferPool`], so a consumer that drops each frame
//! after use keeps the source allocation-free after the first few frames,
//! the same way a camera recycles its capture buffers.

use pixel_resample::{BufferAllocator, BufferPool, PixelBuffer, PixelFormat};
use tracing::debug;

use super::FrameSource;
use crate::error::PipelineResult;

/// What the generated frames look like.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum SyntheticPattern {
    /// Solid red, green, blue, repeating frame by frame.
    #[default]
    ColorCycle,
    /// Diagonal gradient that scrolls one pixel per frame.
    Gradient,
}

/// Generates frames of a fixed geometry.
pub struct SyntheticSource {
    name: String,
    width: u32,
    height: u32,
    format: PixelFormat,
    pattern: SyntheticPattern,
    pool: BufferPool,
    frames: Option<u64>,
    produced: u64,
}

impl SyntheticSource {
    /// `width × height` BGRA frames, unbounded stream.
    pub fn new(width: u32, height: u32, pattern: SyntheticPattern) -> PipelineResult<Self> {
        Self::with_layout(width, height, PixelFormat::Bgra8888, pattern, 0)
    }

    /// Frames of `format` with rows padded to `row_alignment` bytes.
    pub fn with_layout(
        width: u32,
        height: u32,
        format: PixelFormat,
        pattern: SyntheticPattern,
        row_alignment: usize,
    ) -> PipelineResult<Self> {
        let pool = BufferPool::with_row_alignment(width, height, format, 3, row_alignment)?;
        Ok(Self {
            name: format!("synthetic-{width}x{height}"),
            width,
            height,
            format,
            pattern,
            pool,
            frames: None,
            produced: 0,
        })
    }

    /// Ends the stream after `frames` frames.
    pub fn limit(mut self, frames: u64) -> Self {
        self.frames = Some(frames);
        self
    }

    /// Colour of frame `index` in [`SyntheticPattern::ColorCycle`], as R, G, B.
    pub fn cycle_color(index: u64) -> [u8; 3] {
        match index % 3 {
            0 => [255, 0, 0],
            1 => [0, 255, 0],
            _ => [0, 0, 255],
        }
    }

    fn paint(&self, frame: &mut PixelBuffer, index: u64) {
        let bpp = self.format.bytes_per_pixel();
        let pitch = frame.bytes_per_row();
        let row_bytes = self.width as usize * bpp;
        let mut lock = frame.lock_mut();
        for (y, row) in lock.chunks_mut(pitch).enumerate() {
            for (x, px) in row[..row_bytes].chunks_exact_mut(bpp).enumerate() {
                let rgb = match self.pattern {
                    SyntheticPattern::ColorCycle => Self::cycle_color(index),
                    SyntheticPattern::Gradient => {
                        let v = ((x + y + index as usize) % 256) as u8;
                        [v, 255 - v, (y % 256) as u8]
                    }
                };
                write_pixel(px, self.format, rgb);
            }
        }
    }
}

/// Stores an opaque RGB colour in `format` channel order.
pub(crate) fn write_pixel(px: &mut [u8], format: PixelFormat, [r, g, b]: [u8; 3]) {
    match format {
        PixelFormat::Bgra8888 => px.copy_from_slice(&[b, g, r, 255]),
        PixelFormat::Rgba8888 => px.copy_from_slice(&[r, g, b, 255]),
        PixelFormat::Argb8888 => px.copy_from_slice(&[255, r, g, b]),
        PixelFormat::Gray8 => {
            px[0] = ((r as u32 * 77 + g as u32 * 150 + b as u32 * 29) >> 8) as u8;
        }
    }
}

impl FrameSource for SyntheticSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_frame(&mut self) -> PipelineResult<Option<PixelBuffer>> {
        if self.frames.is_some_and(|limit| self.produced >= limit) {
            return Ok(None);
        }
        let mut frame = self.pool.allocate(self.width, self.height, self.format)?;
        self.paint(&mut frame, self.produced);
        debug!(source = %self.name, index = self.produced, "generated frame");
        self.produced += 1;
        Ok(Some(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_cycle_frames() {
        let mut source = SyntheticSource::new(4, 2, SyntheticPattern::ColorCycle)
            .unwrap()
            .limit(4);
        let first = source.next_frame().unwrap().unwrap();
        assert_eq!(&first.lock()[..4], &[0, 0, 255, 255]); // red, BGRA order
        drop(first);
        let second = source.next_frame().unwrap().unwrap();
        assert_eq!(&second.lock()[..4], &[0, 255, 0, 255]);
        drop(second);
        assert!(source.next_frame().unwrap().is_some());
        assert!(source.next_frame().unwrap().is_some());
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_padded_rows_leave_padding_untouched() {
        let mut source = SyntheticSource::with_layout(
            3,
            2,
            PixelFormat::Bgra8888,
            SyntheticPattern::Gradient,
            16,
        )
        .unwrap();
        let frame = source.next_frame().unwrap().unwrap();
        assert_eq!(frame.bytes_per_row(), 16);
        let lock = frame.lock();
        assert_eq!(&lock[12..16], &[0, 0, 0, 0]);
        assert_eq!(lock[3], 255);
    }

    #[test]
    fn test_gray_pixels() {
        let mut px = [0u8; 1];
        write_pixel(&mut px, PixelFormat::Gray8, [255, 255, 255]);
        assert_eq!(px[0], 255);
        let mut px = [0u8; 4];
        write_pixel(&mut px, PixelFormat::Argb8888, [1, 2, 3]);
        assert_eq!(px, [255, 1, 2, 3]);
    }
}
