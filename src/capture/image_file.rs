//! A still image standing in for a camera.

use std::path::Path;

use pixel_resample::{PixelBuffer, PixelFormat};
use tracing::{debug, info};

use super::FrameSource;
use super::synthetic::write_pixel;
use crate::error::{PipelineError, PipelineResult};

/// Decodes an image once and emits it as a frame, `repeat` times.
pub struct ImageFileSource {
    name: String,
    width: u32,
    height: u32,
    format: PixelFormat,
    pixels: Vec<u8>,
    repeat: u64,
    produced: u64,
}

impl ImageFileSource {
    /// Decodes `path` into packed `format` pixels.
    pub fn open(path: impl AsRef<Path>, format: PixelFormat) -> PipelineResult<Self> {
        let path = path.as_ref();
        let name = format!("image:{}", path.display());
        let decoded = image::open(path)?;
        let (width, height) = (decoded.width(), decoded.height());

        let pixels = match format {
            PixelFormat::Gray8 => decoded.to_luma8().into_raw(),
            PixelFormat::Rgba8888 => decoded.to_rgba8().into_raw(),
            PixelFormat::Bgra8888 | PixelFormat::Argb8888 => {
                let rgba = decoded.to_rgba8();
                let mut out = vec![0u8; rgba.as_raw().len()];
                for (dst, src) in out.chunks_exact_mut(4).zip(rgba.as_raw().chunks_exact(4)) {
                    write_pixel(dst, format, [src[0], src[1], src[2]]);
                    match format {
                        PixelFormat::Argb8888 => dst[0] = src[3],
                        _ => dst[3] = src[3],
                    }
                }
                out
            }
        };

        info!(source = %name, width, height, %format, "decoded image");
        Ok(Self {
            name,
            width,
            height,
            format,
            pixels,
            repeat: 1,
            produced: 0,
        })
    }

    /// Emits the image `times` times.
    pub fn repeat(mut self, times: u64) -> Self {
        self.repeat = times;
        self
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl FrameSource for ImageFileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_frame(&mut self) -> PipelineResult<Option<PixelBuffer>> {
        if self.produced >= self.repeat {
            return Ok(None);
        }
        let mut data = Vec::new();
        data.try_reserve_exact(self.pixels.len())
            .map_err(|e| PipelineError::capture(&self.name, e.to_string()))?;
        data.extend_from_slice(&self.pixels);
        let frame = PixelBuffer::from_packed(self.width, self.height, self.format, data)?;
        debug!(source = %self.name, index = self.produced, "emitted frame");
        self.produced += 1;
        Ok(Some(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn saved_image(dir: &tempfile::TempDir) -> std::path::PathBuf {
        let path = dir.path().join("frame.png");
        let mut img = RgbaImage::from_pixel(4, 3, Rgba([10, 20, 30, 255]));
        img.put_pixel(3, 2, Rgba([200, 100, 50, 128]));
        img.save(&path).unwrap();
        path
    }

    #[test]
    fn test_decodes_to_bgra() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = ImageFileSource::open(saved_image(&dir), PixelFormat::Bgra8888).unwrap();
        assert_eq!(source.dimensions(), (4, 3));

        let frame = source.next_frame().unwrap().unwrap();
        assert_eq!(frame.format(), PixelFormat::Bgra8888);
        let pixels = frame.to_packed_vec();
        assert_eq!(&pixels[..4], &[30, 20, 10, 255]);
        assert_eq!(&pixels[pixels.len() - 4..], &[50, 100, 200, 128]);
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_repeat_and_other_formats() {
        let dir = tempfile::tempdir().unwrap();
        let path = saved_image(&dir);

        let mut source = ImageFileSource::open(&path, PixelFormat::Argb8888)
            .unwrap()
            .repeat(3);
        for _ in 0..3 {
            let frame = source.next_frame().unwrap().unwrap();
            assert_eq!(&frame.to_packed_vec()[..4], &[255, 10, 20, 30]);
        }
        assert!(source.next_frame().unwrap().is_none());

        let mut gray = ImageFileSource::open(&path, PixelFormat::Gray8).unwrap();
        assert_eq!(gray.next_frame().unwrap().unwrap().len_bytes(), 12);
    }

    #[test]
    fn test_missing_file() {
        let err = ImageFileSource::open("/nonexistent/frame.png", PixelFormat::Bgra8888)
            .err()
            .unwrap();
        assert_eq!(err.category(), "image");
    }
}
