//! Frames read from a file of concatenated raw frame dumps.
//!
//! Camera drivers and capture tools commonly dump frames back to back with
//! no header. The caller supplies the geometry; the file is memory mapped and
//! sliced frame by frame.

use std::fs::File;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use pixel_resample::{PixelBuffer, PixelFormat};
use tracing::{debug, info};

use super::FrameSource;
use crate::error::{PipelineError, PipelineResult};

/// Memory-mapped raw frame file.
pub struct RawFileSource {
    name: String,
    path: PathBuf,
    map: Mmap,
    width: u32,
    height: u32,
    bytes_per_row: usize,
    format: PixelFormat,
    frame_bytes: usize,
    offset: usize,
    index: u64,
}

impl RawFileSource {
    /// Opens `path` holding `width × height` frames of `format`.
    ///
    /// `bytes_per_row` of `None` means tightly packed rows.
    pub fn open(
        path: impl AsRef<Path>,
        width: u32,
        height: u32,
        bytes_per_row: Option<usize>,
        format: PixelFormat,
    ) -> PipelineResult<Self> {
        let path = path.as_ref().to_path_buf();
        let name = format!("raw:{}", path.display());

        let tight = format
            .tight_row_bytes(width)
            .filter(|_| width > 0 && height > 0)
            .ok_or_else(|| PipelineError::capture(&name, format!("invalid frame size {width}x{height}")))?;
        let bytes_per_row = bytes_per_row.unwrap_or(tight);
        if bytes_per_row < tight {
            return Err(PipelineError::capture(
                &name,
                format!("stride {bytes_per_row} is shorter than a {width} pixel row ({tight} bytes)"),
            ));
        }
        let frame_bytes = bytes_per_row
            .checked_mul(height as usize)
            .ok_or_else(|| PipelineError::capture(&name, "frame size overflows"))?;

        let file = File::open(&path)
            .map_err(|e| PipelineError::io(format!("opening {}", path.display()), e))?;
        // SAFETY: the map is read-only and private to this source. Truncating
        // the file while it is mapped is outside the supported use.
        let map = unsafe { Mmap::map(&file) }
            .map_err(|e| PipelineError::io(format!("mapping {}", path.display()), e))?;

        if map.is_empty() {
            return Err(PipelineError::capture(&name, "file is empty"));
        }
        info!(
            source = %name,
            bytes = map.len(),
            frames = map.len() / frame_bytes,
            "opened raw frame file"
        );

        Ok(Self {
            name,
            path,
            map,
            width,
            height,
            bytes_per_row,
            format,
            frame_bytes,
            offset: 0,
            index: 0,
        })
    }

    /// Path of the mapped file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whole frames in the file.
    pub fn frame_count(&self) -> usize {
        self.map.len() / self.frame_bytes
    }
}

impl FrameSource for RawFileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_frame(&mut self) -> PipelineResult<Option<PixelBuffer>> {
        let remaining = self.map.len() - self.offset;
        if remaining == 0 {
            return Ok(None);
        }
        if remaining < self.frame_bytes {
            return Err(PipelineError::capture(
                &self.name,
                format!(
                    "truncated frame at offset {}: {remaining} of {} bytes",
                    self.offset, self.frame_bytes
                ),
            ));
        }

        let bytes = self.map[self.offset..self.offset + self.frame_bytes].to_vec();
        let frame = PixelBuffer::from_vec(
            self.width,
            self.height,
            self.bytes_per_row,
            self.format,
            bytes,
        )?;
        debug!(source = %self.name, index = self.index, offset = self.offset, "read frame");
        self.offset += self.frame_bytes;
        self.index += 1;
        Ok(Some(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_frames(bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_reads_consecutive_frames() {
        let file = write_frames(&[1, 2, 3, 4, 5, 6, 7, 8]);
        let mut source = RawFileSource::open(file.path(), 2, 2, None, PixelFormat::Gray8).unwrap();
        assert_eq!(source.frame_count(), 2);
        assert_eq!(source.next_frame().unwrap().unwrap().to_packed_vec(), [1, 2, 3, 4]);
        assert_eq!(source.next_frame().unwrap().unwrap().to_packed_vec(), [5, 6, 7, 8]);
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_strided_frames() {
        // 2x2 gray with one padding byte per row.
        let file = write_frames(&[1, 2, 0, 3, 4, 0]);
        let mut source =
            RawFileSource::open(file.path(), 2, 2, Some(3), PixelFormat::Gray8).unwrap();
        let frame = source.next_frame().unwrap().unwrap();
        assert_eq!(frame.bytes_per_row(), 3);
        assert_eq!(frame.to_packed_vec(), [1, 2, 3, 4]);
    }

    #[test]
    fn test_truncated_frame_is_an_error() {
        let file = write_frames(&[1, 2, 3, 4, 5]);
        let mut source = RawFileSource::open(file.path(), 2, 2, None, PixelFormat::Gray8).unwrap();
        assert!(source.next_frame().unwrap().is_some());
        let err = source.next_frame().unwrap_err();
        assert_eq!(err.category(), "capture");
        assert!(!err.is_frame_local());
    }

    #[test]
    fn test_rejects_bad_geometry_and_empty_files() {
        let file = write_frames(&[]);
        assert!(RawFileSource::open(file.path(), 2, 2, None, PixelFormat::Gray8).is_err());

        let file = write_frames(&[0; 16]);
        assert!(RawFileSource::open(file.path(), 2, 2, Some(4), PixelFormat::Bgra8888).is_err());
        assert!(RawFileSource::open(file.path(), 0, 2, None, PixelFormat::Gray8).is_err());
    }
}
