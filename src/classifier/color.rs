//! Deterministic stand-in model: names the colour of the average pixel.

use pixel_resample::{PixelBuffer, PixelFormat, ScaleTarget};
use tracing::trace;

use super::{Classifier, Prediction};
use crate::error::{PipelineError, PipelineResult};

const PALETTE: &[(&str, [u8; 3])] = &[
    ("black", [0, 0, 0]),
    ("white", [255, 255, 255]),
    ("gray", [128, 128, 128]),
    ("red", [255, 0, 0]),
    ("green", [0, 255, 0]),
    ("blue", [0, 0, 255]),
    ("yellow", [255, 255, 0]),
    ("cyan", [0, 255, 255]),
    ("magenta", [255, 0, 255]),
    ("orange", [255, 165, 0]),
];

/// Classifies a frame by the palette colour nearest to its mean pixel.
///
/// The first `warmup` frames answer [`Prediction::NotReady`], like a model
/// that is still loading its weights.
#[derive(Debug, Clone)]
pub struct DominantColorClassifier {
    input: ScaleTarget,
    warmup: u32,
    seen: u32,
}

impl DominantColorClassifier {
    pub fn new(input: ScaleTarget) -> Self {
        Self {
            input,
            warmup: 0,
            seen: 0,
        }
    }

    /// Report not-ready for the first `frames` frames.
    pub fn with_warmup(mut self, frames: u32) -> Self {
        self.warmup = frames;
        self
    }

    /// Mean colour of the frame as R, G, B.
    pub fn mean_rgb(frame: &PixelBuffer) -> [u8; 3] {
        let format = frame.format();
        let bpp = format.bytes_per_pixel();
        let row_bytes = frame.width() as usize * bpp;
        let lock = frame.lock();

        let mut sums = [0u64; 3];
        for row in lock.chunks(frame.bytes_per_row()).take(frame.height() as usize) {
            for px in row[..row_bytes].chunks_exact(bpp) {
                let [r, g, b] = read_rgb(px, format);
                sums[0] += r as u64;
                sums[1] += g as u64;
                sums[2] += b as u64;
            }
        }
        let count = (frame.width() as u64 * frame.height() as u64).max(1);
        sums.map(|s| (s / count) as u8)
    }

    /// Palette name nearest to `rgb`.
    pub fn nearest_name(rgb: [u8; 3]) -> &'static str {
        let distance = |c: &[u8; 3]| -> u32 {
            c.iter()
                .zip(rgb.iter())
                .map(|(a, b)| (*a as i32 - *b as i32).pow(2) as u32)
                .sum()
        };
        PALETTE
            .iter()
            .min_by_key(|(_, c)| distance(c))
            .map_or("unknown", |(name, _)| *name)
    }
}

fn read_rgb(px: &[u8], format: PixelFormat) -> [u8; 3] {
    match format {
        PixelFormat::Bgra8888 => [px[2], px[1], px[0]],
        PixelFormat::Rgba8888 => [px[0], px[1], px[2]],
        PixelFormat::Argb8888 => [px[1], px[2], px[3]],
        PixelFormat::Gray8 => [px[0]; 3],
    }
}

impl Classifier for DominantColorClassifier {
    fn input_size(&self) -> ScaleTarget {
        self.input
    }

    fn classify(&mut self, frame: &PixelBuffer) -> PipelineResult<Prediction> {
        if (frame.width(), frame.height()) != (self.input.width, self.input.height) {
            return Err(PipelineError::classifier(format!(
                "expected a {} frame, got {}x{}",
                self.input,
                frame.width(),
                frame.height()
            )));
        }
        if self.seen < self.warmup {
            self.seen += 1;
            return Ok(Prediction::NotReady);
        }
        let rgb = Self::mean_rgb(frame);
        trace!(?rgb, "mean colour");
        Ok(Prediction::label(Self::nearest_name(rgb)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, format: PixelFormat, px: &[u8]) -> PixelBuffer {
        let data = px.repeat((width * height) as usize);
        PixelBuffer::from_packed(width, height, format, data).unwrap()
    }

    #[test]
    fn test_names_solid_frames() {
        let mut classifier = DominantColorClassifier::new(ScaleTarget::new(4, 4));
        let red = solid(4, 4, PixelFormat::Bgra8888, &[0, 0, 255, 255]);
        assert_eq!(classifier.classify(&red).unwrap(), Prediction::label("red"));

        let blue = solid(4, 4, PixelFormat::Rgba8888, &[0, 0, 250, 255]);
        assert_eq!(classifier.classify(&blue).unwrap(), Prediction::label("blue"));

        let white = solid(4, 4, PixelFormat::Gray8, &[240]);
        assert_eq!(classifier.classify(&white).unwrap(), Prediction::label("white"));
    }

    #[test]
    fn test_warmup_reports_not_ready() {
        let mut classifier = DominantColorClassifier::new(ScaleTarget::new(2, 2)).with_warmup(2);
        let green = solid(2, 2, PixelFormat::Argb8888, &[255, 0, 255, 0]);
        assert_eq!(classifier.classify(&green).unwrap(), Prediction::NotReady);
        assert_eq!(classifier.classify(&green).unwrap(), Prediction::NotReady);
        assert_eq!(classifier.classify(&green).unwrap(), Prediction::label("green"));
    }

    #[test]
    fn test_wrong_input_size_is_a_classifier_error() {
        let mut classifier = DominantColorClassifier::new(ScaleTarget::new(299, 299));
        let frame = solid(4, 4, PixelFormat::Gray8, &[0]);
        let err = classifier.classify(&frame).unwrap_err();
        assert_eq!(err.category(), "classifier");
    }

    #[test]
    fn test_mean_ignores_row_padding() {
        // 1x2 gray, padding bytes set to 255.
        let frame =
            PixelBuffer::from_vec(1, 2, 4, PixelFormat::Gray8, vec![10, 255, 255, 255, 30, 255, 255, 255])
                .unwrap();
        assert_eq!(DominantColorClassifier::mean_rgb(&frame), [20, 20, 20]);
    }
}
