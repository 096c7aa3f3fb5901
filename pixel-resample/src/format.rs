// SPDX-License-Identifier: MIT
//! Pixel format tags.
//!
//! A format describes how many bytes one pixel occupies and how its channels
//! are ordered. The resampler never converts between formats: a derived
//! buffer always carries the tag of the buffer it came from.

use std::fmt;

use fast_image_resize::PixelType;

/// Supported packed pixel layouts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, clap::ValueEnum)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PixelFormat {
    /// 32-bit packed B, G, R, A. What camera pipelines usually hand out.
    #[default]
    #[value(name = "bgra")]
    #[cfg_attr(feature = "serde", serde(rename = "bgra"))]
    Bgra8888,
    /// 32-bit packed R, G, B, A.
    #[value(name = "rgba")]
    #[cfg_attr(feature = "serde", serde(rename = "rgba"))]
    Rgba8888,
    /// 32-bit packed A, R, G, B.
    #[value(name = "argb")]
    #[cfg_attr(feature = "serde", serde(rename = "argb"))]
    Argb8888,
    /// 8-bit single channel luminance.
    #[value(name = "gray")]
    #[cfg_attr(feature = "serde", serde(rename = "gray"))]
    Gray8,
}

impl PixelFormat {
    /// Bytes occupied by one pixel.
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Bgra8888 | PixelFormat::Rgba8888 | PixelFormat::Argb8888 => 4,
            PixelFormat::Gray8 => 1,
        }
    }

    /// Number of interleaved channels.
    pub const fn channels(self) -> usize {
        self.bytes_per_pixel()
    }

    /// Minimum bytes per row for a tightly packed row of `width` pixels.
    pub fn tight_row_bytes(self, width: u32) -> Option<usize> {
        (width as usize).checked_mul(self.bytes_per_pixel())
    }

    /// Layout the resizer uses for this format.
    ///
    /// All 4-channel formats map to the same `U8x4` kernel: channels are
    /// resampled independently, so channel order is irrelevant to the math.
    pub(crate) fn resizer_pixel_type(self) -> PixelType {
        match self {
            PixelFormat::Bgra8888 | PixelFormat::Rgba8888 | PixelFormat::Argb8888 => {
                PixelType::U8x4
            }
            PixelFormat::Gray8 => PixelType::U8,
        }
    }

    /// Short human-readable name.
    pub const fn name(self) -> &'static str {
        match self {
            PixelFormat::Bgra8888 => "BGRA8888",
            PixelFormat::Rgba8888 => "RGBA8888",
            PixelFormat::Argb8888 => "ARGB8888",
            PixelFormat::Gray8 => "GRAY8",
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
