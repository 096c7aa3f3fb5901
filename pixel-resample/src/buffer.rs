// SPDX-License-Identifier: MIT
//! # Pixel Buffers
//!
//! A [`PixelBuffer`] is a block of row-major pixel memory plus the geometry
//! needed to interpret it. It is the unit that flows from the frame source,
//! through the resampler, into the classifier.
//!
//! ## Ownership
//!
//! Every buffer has exactly one owner. Releasing a buffer consumes it, so a
//! released buffer cannot be touched again and cannot be released twice.
//! Memory handed out by a pool or a tracking allocator carries a
//! [`ReleaseHook`]; the hook is boxed and consumed on release, which means it
//! runs exactly once, on explicit [`PixelBuffer::release`] or on drop.
//!
//! ## Locking
//!
//! Raw memory is only reachable through a lock guard:
//!
//! ```text
//! &PixelBuffer      ── lock()     ──▶ BufferReadLock   (shared, many at once)
//! &mut PixelBuffer  ── lock_mut() ──▶ BufferWriteLock  (exclusive)
//! ```
//!
//! Guards unlock when dropped, so an early `?` return can never leave a
//! buffer locked. [`PixelBuffer::is_locked`] lets a producer check that no
//! reader is still holding a frame it wants to refill.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::BufferError;
use crate::format::PixelFormat;

/// Receives a buffer's memory when the buffer is released.
///
/// Called at most once per buffer: the hook is taken by value.
pub trait ReleaseHook: Send + Sync {
    fn release(self: Box<Self>, memory: Vec<u8>);
}

/// Row-major pixel memory with its geometry and format.
pub struct PixelBuffer {
    width: u32,
    height: u32,
    bytes_per_row: usize,
    format: PixelFormat,
    data: Vec<u8>,
    locks: AtomicUsize,
    release_hook: Option<Box<dyn ReleaseHook>>,
}

impl PixelBuffer {
    /// Wraps existing pixel memory, e.g. a frame handed over by a capture
    /// backend.
    ///
    /// `data` must hold at least `bytes_per_row * height` bytes and
    /// `bytes_per_row` must fit one full row of `width` pixels.
    pub fn from_vec(
        width: u32,
        height: u32,
        bytes_per_row: usize,
        format: PixelFormat,
        data: Vec<u8>,
    ) -> Result<Self, BufferError> {
        if width == 0 || height == 0 {
            return Err(BufferError::InvalidDimensions { width, height });
        }
        let min = format
            .tight_row_bytes(width)
            .ok_or(BufferError::InvalidDimensions { width, height })?;
        if bytes_per_row < min {
            return Err(BufferError::RowTooShort { bytes_per_row, min });
        }
        let required = bytes_per_row
            .checked_mul(height as usize)
            .ok_or(BufferError::InvalidDimensions { width, height })?;
        if data.len() < required {
            return Err(BufferError::DataTooShort {
                len: data.len(),
                required,
            });
        }
        Ok(Self::from_parts(width, height, bytes_per_row, format, data))
    }

    /// Wraps tightly packed pixel memory (`bytes_per_row == width * bpp`).
    pub fn from_packed(
        width: u32,
        height: u32,
        format: PixelFormat,
        data: Vec<u8>,
    ) -> Result<Self, BufferError> {
        let bytes_per_row = format
            .tight_row_bytes(width)
            .ok_or(BufferError::InvalidDimensions { width, height })?;
        Self::from_vec(width, height, bytes_per_row, format, data)
    }

    /// Geometry has already been validated by the allocator.
    pub(crate) fn from_parts(
        width: u32,
        height: u32,
        bytes_per_row: usize,
        format: PixelFormat,
        data: Vec<u8>,
    ) -> Self {
        Self {
            width,
            height,
            bytes_per_row,
            format,
            data,
            locks: AtomicUsize::new(0),
            release_hook: None,
        }
    }

    /// Attaches a hook that will receive the memory on release, returning the
    /// hook it replaces so wrappers can chain to it.
    pub fn replace_release_hook(
        &mut self,
        hook: Box<dyn ReleaseHook>,
    ) -> Option<Box<dyn ReleaseHook>> {
        self.release_hook.replace(hook)
    }

    /// Detaches the release hook; used by allocator wrappers that chain hooks.
    pub fn take_release_hook(&mut self) -> Option<Box<dyn ReleaseHook>> {
        self.release_hook.take()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Actual row pitch in bytes, including any alignment padding.
    pub fn bytes_per_row(&self) -> usize {
        self.bytes_per_row
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Bytes the geometry spans (`bytes_per_row * height`).
    pub fn len_bytes(&self) -> usize {
        self.bytes_per_row * self.height as usize
    }

    /// True if rows carry no padding.
    pub fn is_packed(&self) -> bool {
        Some(self.bytes_per_row) == self.format.tight_row_bytes(self.width)
    }

    /// True while any lock guard is alive.
    pub fn is_locked(&self) -> bool {
        self.locks.load(Ordering::Acquire) != 0
    }

    /// Shared read access to the pixel memory.
    pub fn lock(&self) -> BufferReadLock<'_> {
        self.locks.fetch_add(1, Ordering::AcqRel);
        BufferReadLock { buffer: self }
    }

    /// Exclusive read/write access to the pixel memory.
    pub fn lock_mut(&mut self) -> BufferWriteLock<'_> {
        self.locks.fetch_add(1, Ordering::AcqRel);
        BufferWriteLock { buffer: self }
    }

    /// One row of pixels without padding, through an existing lock.
    pub fn row<'a>(&self, lock: &'a BufferReadLock<'_>, y: u32) -> Option<&'a [u8]> {
        if y >= self.height {
            return None;
        }
        let start = y as usize * self.bytes_per_row;
        let row_bytes = self.format.tight_row_bytes(self.width)?;
        lock.get(start..start + row_bytes)
    }

    /// Copies the pixels into a tightly packed vector, dropping row padding.
    pub fn to_packed_vec(&self) -> Vec<u8> {
        let lock = self.lock();
        let row_bytes = self.width as usize * self.format.bytes_per_pixel();
        let mut out = Vec::with_capacity(row_bytes * self.height as usize);
        for row in lock.chunks(self.bytes_per_row).take(self.height as usize) {
            out.extend_from_slice(&row[..row_bytes]);
        }
        out
    }

    /// Releases the buffer and its memory. Equivalent to dropping it.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for PixelBuffer {
    fn drop(&mut self) {
        if let Some(hook) = self.release_hook.take() {
            hook.release(std::mem::take(&mut self.data));
        }
    }
}

impl fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes_per_row", &self.bytes_per_row)
            .field("format", &self.format)
            .field("locked", &self.is_locked())
            .finish()
    }
}

/// Shared lock on a buffer's memory. Unlocks on drop.
pub struct BufferReadLock<'a> {
    buffer: &'a PixelBuffer,
}

impl Deref for BufferReadLock<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.buffer.data[..self.buffer.len_bytes()]
    }
}

impl Drop for BufferReadLock<'_> {
    fn drop(&mut self) {
        self.buffer.locks.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Exclusive lock on a buffer's memory. Unlocks on drop.
pub struct BufferWriteLock<'a> {
    buffer: &'a mut PixelBuffer,
}

impl Deref for BufferWriteLock<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        let len = self.buffer.len_bytes();
        &self.buffer.data[..len]
    }
}

impl DerefMut for BufferWriteLock<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        let len = self.buffer.len_bytes();
        &mut self.buffer.data[..len]
    }
}

impl Drop for BufferWriteLock<'_> {
    fn drop(&mut self) {
        self.buffer.locks.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    struct CountingHook(Arc<AtomicUsize>);

    impl ReleaseHook for CountingHook {
        fn release(self: Box<Self>, memory: Vec<u8>) {
            assert_eq!(memory.len(), 8 * 2 * 4);
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_from_vec_validates_geometry() {
        assert_eq!(
            PixelBuffer::from_vec(0, 2, 0, PixelFormat::Bgra8888, vec![]).unwrap_err(),
            BufferError::InvalidDimensions {
                width: 0,
                height: 2
            }
        );
        assert_eq!(
            PixelBuffer::from_vec(4, 2, 12, PixelFormat::Bgra8888, vec![0; 32]).unwrap_err(),
            BufferError::RowTooShort {
                bytes_per_row: 12,
                min: 16
            }
        );
        assert_eq!(
            PixelBuffer::from_vec(4, 2, 20, PixelFormat::Bgra8888, vec![0; 39]).unwrap_err(),
            BufferError::DataTooShort {
                len: 39,
                required: 40
            }
        );
        let buf = PixelBuffer::from_vec(4, 2, 20, PixelFormat::Bgra8888, vec![0; 40]).unwrap();
        assert!(!buf.is_packed());
        assert_eq!(buf.len_bytes(), 40);
    }

    #[test]
    fn test_lock_guards_unlock_on_drop() {
        let mut buf = PixelBuffer::from_packed(2, 2, PixelFormat::Gray8, vec![1, 2, 3, 4]).unwrap();
        assert!(!buf.is_locked());
        {
            let a = buf.lock();
            let b = buf.lock();
            assert!(buf.is_locked());
            assert_eq!(&a[..], &b[..]);
        }
        assert!(!buf.is_locked());
        {
            let mut w = buf.lock_mut();
            w[0] = 9;
        }
        assert!(!buf.is_locked());
        assert_eq!(buf.to_packed_vec(), vec![9, 2, 3, 4]);
    }

    #[test]
    fn test_to_packed_vec_strips_padding() {
        let data = vec![1, 2, 0, 0, 3, 4, 0, 0];
        let buf = PixelBuffer::from_vec(2, 2, 4, PixelFormat::Gray8, data).unwrap();
        assert_eq!(buf.to_packed_vec(), vec![1, 2, 3, 4]);
        let lock = buf.lock();
        assert_eq!(buf.row(&lock, 1), Some(&[3u8, 4][..]));
        assert_eq!(buf.row(&lock, 2), None);
    }

    #[test]
    fn test_release_hook_runs_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut buf = PixelBuffer::from_packed(8, 2, PixelFormat::Bgra8888, vec![0; 64]).unwrap();
        assert!(buf.replace_release_hook(Box::new(CountingHook(count.clone()))).is_none());
        buf.release();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_runs_release_hook() {
        let count = Arc::new(AtomicUsize::new(0));
        {
            let mut buf =
                PixelBuffer::from_packed(8, 2, PixelFormat::Bgra8888, vec![0; 64]).unwrap();
            buf.replace_release_hook(Box::new(CountingHook(count.clone())));
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
