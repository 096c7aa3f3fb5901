/// Benchmark for the per-frame crop/scale step
///
/// Resamples 640x480 BGRA frames to the 299x299 Inception input for each
/// interpolation kernel, once with fresh system allocations per frame and
/// once with a recycling buffer pool.
///
/// Time complexity: O(frames * (crop_pixels + target_pixels)).
use std::sync::Arc;
use std::time::{Duration, Instant};

use camera_classifier::capture::{FrameSource, SyntheticPattern, SyntheticSource};
use camera_classifier::pixel_resample::{
    BufferAllocator, BufferPool, CropRect, Interpolation, PixelFormat, Resampler, ScaleTarget,
    SystemAllocator,
};

const WIDTH: u32 = 640;
const HEIGHT: u32 = 480;
const FRAMES: u32 = 300;

fn main() -> anyhow::Result<()> {
    println!("Crop/Scale Benchmark");
    println!("═══════════════════════════════════");
    println!(
        "Benchmarking: {}x{} → 299x299, {} frames per run",
        WIDTH, HEIGHT, FRAMES
    );
    println!();

    let target = ScaleTarget::new(299, 299);
    let mut source = SyntheticSource::new(WIDTH, HEIGHT, SyntheticPattern::Gradient)?;
    let frame = source
        .next_frame()?
        .ok_or_else(|| anyhow::anyhow!("synthetic source produced no frame"))?;

    println!(
        "{:<10} {:<8} {:<10} {:>12} {:>12}",
        "kernel", "alloc", "crop", "ms/frame", "frames/s"
    );
    println!("{}", "─".repeat(56));

    for interpolation in [Interpolation::Bilinear, Interpolation::Area] {
        for (alloc_name, allocator) in allocators(target)? {
            for (crop_name, crop) in [
                ("full", CropRect::full(WIDTH, HEIGHT)),
                ("center", CropRect::center_square(WIDTH, HEIGHT)),
            ] {
                let mut resampler = Resampler::with_allocator(allocator.clone()).interpolation(interpolation);
                let elapsed = time_frames(|| {
                    let out = resampler.resample(&frame, crop, target)?;
                    out.release();
                    Ok(())
                })?;
                let per_frame = elapsed.as_secs_f64() * 1000.0 / FRAMES as f64;
                println!(
                    "{:<10} {:<8} {:<10} {:>12.3} {:>12.1}",
                    format!("{interpolation:?}").to_lowercase(),
                    alloc_name,
                    crop_name,
                    per_frame,
                    1000.0 / per_frame
                );
            }
        }
    }

    println!();
    println!("Pooled runs reuse {} destination buffers.", POOL_BUFFERS);
    Ok(())
}

const POOL_BUFFERS: usize = 2;

fn allocators(target: ScaleTarget) -> anyhow::Result<Vec<(&'static str, Arc<dyn BufferAllocator>)>> {
    let pool = BufferPool::new(target.width, target.height, PixelFormat::Bgra8888, POOL_BUFFERS)?;
    pool.prefill()?;
    let system: Arc<dyn BufferAllocator> = Arc::new(SystemAllocator::new());
    let pooled: Arc<dyn BufferAllocator> = Arc::new(pool);
    Ok(vec![("system", system), ("pool", pooled)])
}

/// Runs `step` once to warm up, then `FRAMES` times under the clock.
fn time_frames<F>(mut step: F) -> anyhow::Result<Duration>
where
    F: FnMut() -> anyhow::Result<()>,
{
    step()?;
    let start = Instant::now();
    for _ in 0..FRAMES {
        step()?;
    }
    Ok(start.elapsed())
}
