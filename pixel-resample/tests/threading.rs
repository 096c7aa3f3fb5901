//! Resampling runs on the calling thread only.
//!
//! Kept in its own test binary: rayon's global pool can be built once per
//! process, so nothing else here may touch it first.

use pixel_resample::{CropRect, Interpolation, PixelBuffer, PixelFormat, Resampler, ScaleTarget};

#[test]
fn resampling_leaves_the_global_thread_pool_unbuilt() {
    let src = PixelBuffer::from_packed(640, 480, PixelFormat::Bgra8888, vec![90; 640 * 480 * 4]).unwrap();
    for interpolation in [Interpolation::Bilinear, Interpolation::Area] {
        let mut resampler = Resampler::new().interpolation(interpolation);
        let out = resampler
            .resample(&src, CropRect::new(0, 0, 480, 480), ScaleTarget::new(299, 299))
            .unwrap();
        assert_eq!((out.width(), out.height()), (299, 299));
    }

    let built = rayon::ThreadPoolBuilder::new().num_threads(1).build_global();
    assert!(built.is_ok(), "a resample call already started the global pool: {built:?}");
}
