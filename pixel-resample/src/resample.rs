// SPDX-License-Identifier: MIT
// Crop-then-scale resampler built on fast_image_resize (SIMD-accelerated).
// Any supported format in → same format out, into a fresh or caller-owned buffer.

use std::sync::Arc;

use fast_image_resize as fir;
use fir::images::{Image, ImageRef};
use fir::{FilterType, ResizeAlg, ResizeOptions, Resizer};
use tracing::trace;

use crate::allocator::{BufferAllocator, SystemAllocator};
use crate::buffer::PixelBuffer;
use crate::error::{ResampleError, ScaleError};
use crate::format::PixelFormat;
use crate::geometry::{CropRect, ScaleTarget};

/// Resampling kernel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Interpolation {
    /// Triangle filter. On downscale its support widens with the scale factor,
    /// so every source pixel under a destination pixel contributes.
    #[default]
    Bilinear,
    /// Box filter: plain area averaging.
    Area,
}

impl Interpolation {
    fn resize_alg(self) -> ResizeAlg {
        match self {
            Interpolation::Bilinear => ResizeAlg::Convolution(FilterType::Bilinear),
            Interpolation::Area => ResizeAlg::Convolution(FilterType::Box),
        }
    }
}

/// Scratch for compacting strided rows into tightly packed ones.
#[derive(Debug, Default)]
pub(crate) struct Staging {
    buf: Vec<u8>,
}

impl Staging {
    fn ensure_len(&mut self, len: usize) -> &mut [u8] {
        if self.buf.len() < len {
            self.buf.resize(len, 0);
        }
        &mut self.buf[..len]
    }
}

/// Crops and scales pixel buffers into newly allocated buffers.
///
/// A `Resampler` keeps the resizer's internal scratch and two staging buffers
/// between calls, so reuse it across frames. It holds no state shared with
/// other resamplers: give each worker thread its own.
pub struct Resampler {
    resizer: Resizer,
    allocator: Arc<dyn BufferAllocator>,
    interpolation: Interpolation,
    src_staging: Staging,
    dst_staging: Staging,
}

impl Default for Resampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Resampler {
    /// Resampler backed by the system allocator, bilinear kernel.
    pub fn new() -> Self {
        Self::with_allocator(Arc::new(SystemAllocator::new()))
    }

    /// Resampler that takes destination buffers from `allocator`.
    pub fn with_allocator(allocator: Arc<dyn BufferAllocator>) -> Self {
        Self {
            resizer: Resizer::new(),
            allocator,
            interpolation: Interpolation::default(),
            src_staging: Staging::default(),
            dst_staging: Staging::default(),
        }
    }

    pub fn interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    pub fn current_interpolation(&self) -> Interpolation {
        self.interpolation
    }

    /// Scales the whole of `source` to `target`.
    pub fn resample_full(
        &mut self,
        source: &PixelBuffer,
        target: ScaleTarget,
    ) -> Result<PixelBuffer, ResampleError> {
        let crop = CropRect::full(source.width(), source.height());
        self.resample(source, crop, target)
    }

    /// Crops `crop` out of `source` and stretches it onto a new
    /// `target.width × target.height` buffer of the source's format.
    ///
    /// `source` is only read, under a lock that is released before this
    /// returns. On success the caller owns the returned buffer. On failure no
    /// buffer survives: a destination that was already allocated is released
    /// before the error is returned.
    pub fn resample(
        &mut self,
        source: &PixelBuffer,
        crop: CropRect,
        target: ScaleTarget,
    ) -> Result<PixelBuffer, ResampleError> {
        check_crop(source, crop)?;
        if !target.is_valid() {
            return Err(ResampleError::InvalidTarget {
                width: target.width,
                height: target.height,
            });
        }

        let src_lock = source.lock();
        let mut dst = self
            .allocator
            .allocate(target.width, target.height, source.format())?;
        self.write_region(source, &src_lock, crop, target, &mut dst)?;
        drop(src_lock);
        Ok(dst)
    }

    /// Crops `crop` out of `source` and stretches it onto `dst`, which the
    /// caller keeps owning. `dst`'s own size is the target.
    ///
    /// Nothing is allocated. A `dst` whose format differs from the source, or
    /// whose rows are too short for its width, is `ResamplingFailed` and is
    /// left untouched.
    pub fn resample_into(
        &mut self,
        source: &PixelBuffer,
        crop: CropRect,
        dst: &mut PixelBuffer,
    ) -> Result<(), ResampleError> {
        check_crop(source, crop)?;
        let target = ScaleTarget::new(dst.width(), dst.height());
        let src_lock = source.lock();
        self.write_region(source, &src_lock, crop, target, dst)?;
        drop(src_lock);
        Ok(())
    }

    /// Fills `dst` from the locked bytes of `source`.
    fn write_region(
        &mut self,
        source: &PixelBuffer,
        src: &[u8],
        crop: CropRect,
        target: ScaleTarget,
        dst: &mut PixelBuffer,
    ) -> Result<(), ScaleError> {
        let format = source.format();
        if dst.format() != format {
            return Err(ScaleError::FormatMismatch {
                expected: format,
                actual: dst.format(),
            });
        }
        check_destination(dst, target)?;

        let bpp = format.bytes_per_pixel();
        let src_pitch = source.bytes_per_row();
        let dst_pitch = dst.bytes_per_row();
        let region = &src[crop.byte_offset(src_pitch, bpp)..];

        let (sx, sy) = target.scale_factors(&crop);
        trace!(
            source_width = source.width(),
            source_height = source.height(),
            %crop,
            %target,
            sx,
            sy,
            %format,
            interpolation = ?self.interpolation,
            "resampling"
        );

        let mut dst_lock = dst.lock_mut();
        if crop.width == target.width && crop.height == target.height {
            let row_bytes = crop.width as usize * bpp;
            copy_rows(region, src_pitch, &mut dst_lock, dst_pitch, row_bytes, crop.height as usize);
            Ok(())
        } else {
            self.scale_region(region, src_pitch, crop, target, format, &mut dst_lock, dst_pitch)
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn scale_region(
        &mut self,
        region: &[u8],
        src_pitch: usize,
        crop: CropRect,
        target: ScaleTarget,
        format: PixelFormat,
        dst: &mut [u8],
        dst_pitch: usize,
    ) -> Result<(), ScaleError> {
        let pixel_type = format.resizer_pixel_type();
        let bpp = format.bytes_per_pixel();

        // --- Build source view (tightly packed crop) ---
        let src_row_bytes = crop.width as usize * bpp;
        let src_len = src_row_bytes * crop.height as usize;
        let packed_src = self.src_staging.ensure_len(src_len);
        copy_rows(region, src_pitch, packed_src, src_row_bytes, src_row_bytes, crop.height as usize);
        let src_view = ImageRef::new(crop.width, crop.height, packed_src, pixel_type)?;

        // --- Resize ---
        // Channels are resampled independently: no alpha premultiplication.
        let opts = ResizeOptions::new()
            .resize_alg(self.interpolation.resize_alg())
            .use_alpha(false);

        let dst_row_bytes = target.width as usize * bpp;
        let dst_len = dst_row_bytes * target.height as usize;
        if dst_pitch == dst_row_bytes {
            let mut dst_image =
                Image::from_slice_u8(target.width, target.height, &mut dst[..dst_len], pixel_type)?;
            self.resizer.resize(&src_view, &mut dst_image, &opts)?;
        } else {
            let packed_dst = self.dst_staging.ensure_len(dst_len);
            {
                let mut dst_image =
                    Image::from_slice_u8(target.width, target.height, &mut *packed_dst, pixel_type)?;
                self.resizer.resize(&src_view, &mut dst_image, &opts)?;
            }
            copy_rows(
                packed_dst,
                dst_row_bytes,
                dst,
                dst_pitch,
                dst_row_bytes,
                target.height as usize,
            );
        }
        Ok(())
    }
}

/// One-shot crop and scale with the system allocator and bilinear kernel.
pub fn resample(
    source: &PixelBuffer,
    crop: CropRect,
    target: ScaleTarget,
) -> Result<PixelBuffer, ResampleError> {
    Resampler::new().resample(source, crop, target)
}

/// One-shot scale of the whole source with the system allocator.
pub fn resample_full(source: &PixelBuffer, target: ScaleTarget) -> Result<PixelBuffer, ResampleError> {
    Resampler::new().resample_full(source, target)
}

fn check_crop(source: &PixelBuffer, crop: CropRect) -> Result<(), ResampleError> {
    if !crop.fits_within(source.width(), source.height()) {
        return Err(ResampleError::InvalidCropRegion {
            crop,
            source_width: source.width(),
            source_height: source.height(),
        });
    }
    Ok(())
}

fn check_destination(dst: &PixelBuffer, target: ScaleTarget) -> Result<(), ScaleError> {
    let tight = dst.format().tight_row_bytes(target.width);
    if dst.width() != target.width
        || dst.height() != target.height
        || tight.map_or(true, |t| dst.bytes_per_row() < t)
    {
        return Err(ScaleError::DestinationMismatch {
            expected_width: target.width,
            expected_height: target.height,
            width: dst.width(),
            height: dst.height(),
            bytes_per_row: dst.bytes_per_row(),
        });
    }
    Ok(())
}

#[inline]
fn copy_rows(
    src: &[u8],
    src_pitch: usize,
    dst: &mut [u8],
    dst_pitch: usize,
    row_bytes: usize,
    rows: usize,
) {
    for r in 0..rows {
        let s = &src[r * src_pitch..r * src_pitch + row_bytes];
        let d = &mut dst[r * dst_pitch..r * dst_pitch + row_bytes];
        d.copy_from_slice(s);
    }
}
