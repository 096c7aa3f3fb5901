// SPDX-License-Identifier: MIT
//! # Buffer Allocators
//!
//! Allocators create [`PixelBuffer`]s with fresh, exclusively owned memory.
//! Allocation failure is reported, never retried internally.
//!
//! - [`SystemAllocator`]: plain heap memory, optional row alignment
//! - [`TrackingAllocator`]: records every allocation and release in an
//!   [`AllocationLedger`], for leak checks
//! - [`FaultInjectingAllocator`]: fails a configurable number of requests
//!
//! The pooled allocator lives in [`crate::pool`].

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::buffer::{PixelBuffer, ReleaseHook};
use crate::error::AllocationError;
use crate::format::PixelFormat;

/// Source of pixel memory.
pub trait BufferAllocator: Send + Sync {
    /// Allocates a `width × height` buffer of `format`.
    ///
    /// The returned buffer reports the row pitch that was actually used.
    fn allocate(
        &self,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Result<PixelBuffer, AllocationError>;
}

impl<A: BufferAllocator + ?Sized> BufferAllocator for Arc<A> {
    fn allocate(
        &self,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Result<PixelBuffer, AllocationError> {
        (**self).allocate(width, height, format)
    }
}

/// Computes `(bytes_per_row, total_bytes)` for a request.
///
/// `row_alignment` of 0 or 1 means tightly packed rows.
pub(crate) fn layout_for(
    width: u32,
    height: u32,
    format: PixelFormat,
    row_alignment: usize,
) -> Result<(usize, usize), AllocationError> {
    if width == 0 || height == 0 {
        return Err(AllocationError::InvalidDimensions { width, height });
    }
    let overflow = AllocationError::OutOfMemory { bytes: usize::MAX };
    let tight = format.tight_row_bytes(width).ok_or(overflow.clone())?;
    let bytes_per_row = if row_alignment > 1 {
        tight
            .checked_next_multiple_of(row_alignment)
            .ok_or(overflow.clone())?
    } else {
        tight
    };
    let total = bytes_per_row
        .checked_mul(height as usize)
        .ok_or(overflow)?;
    Ok((bytes_per_row, total))
}

/// Reserves `bytes` zeroed bytes without aborting on failure.
pub(crate) fn try_alloc_zeroed(bytes: usize) -> Result<Vec<u8>, AllocationError> {
    let mut data = Vec::new();
    data.try_reserve_exact(bytes)
        .map_err(|_| AllocationError::OutOfMemory { bytes })?;
    data.resize(bytes, 0);
    Ok(data)
}

/// Heap allocator.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemAllocator {
    row_alignment: usize,
}

impl SystemAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pads every row up to a multiple of `alignment` bytes, the way
    /// platform image buffers commonly align rows to 16 or 64 bytes.
    pub fn with_row_alignment(alignment: usize) -> Self {
        Self {
            row_alignment: alignment,
        }
    }

    pub fn row_alignment(&self) -> usize {
        self.row_alignment
    }
}

impl BufferAllocator for SystemAllocator {
    fn allocate(
        &self,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Result<PixelBuffer, AllocationError> {
        let (bytes_per_row, total) = layout_for(width, height, format, self.row_alignment)?;
        let data = try_alloc_zeroed(total)?;
        Ok(PixelBuffer::from_parts(
            width,
            height,
            bytes_per_row,
            format,
            data,
        ))
    }
}

/// Book of outstanding allocations.
///
/// Each tracked buffer holds an id that is settled exactly once when the
/// buffer is released. Settling an unknown or already settled id panics: it
/// means the ownership rules were broken somewhere.
#[derive(Debug, Default)]
pub struct AllocationLedger {
    next_id: AtomicU64,
    outstanding: Mutex<HashSet<u64>>,
    allocated: AtomicUsize,
    released: AtomicUsize,
}

impl AllocationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn open(&self) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.outstanding
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id);
        self.allocated.fetch_add(1, Ordering::AcqRel);
        id
    }

    fn settle(&self, id: u64) {
        let was_outstanding = self
            .outstanding
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        assert!(
            was_outstanding,
            "pixel buffer allocation #{id} released more than once"
        );
        self.released.fetch_add(1, Ordering::AcqRel);
    }

    /// Buffers allocated but not yet released.
    pub fn live(&self) -> usize {
        self.outstanding
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Total allocations recorded.
    pub fn allocated(&self) -> usize {
        self.allocated.load(Ordering::Acquire)
    }

    /// Total releases recorded.
    pub fn released(&self) -> usize {
        self.released.load(Ordering::Acquire)
    }
}

struct LedgerEntry {
    ledger: Arc<AllocationLedger>,
    id: u64,
    inner: Option<Box<dyn ReleaseHook>>,
}

impl ReleaseHook for LedgerEntry {
    fn release(self: Box<Self>, memory: Vec<u8>) {
        self.ledger.settle(self.id);
        if let Some(inner) = self.inner {
            inner.release(memory);
        }
    }
}

/// Wraps an allocator and records allocations and releases in a ledger.
#[derive(Debug)]
pub struct TrackingAllocator<A> {
    inner: A,
    ledger: Arc<AllocationLedger>,
}

impl<A: BufferAllocator> TrackingAllocator<A> {
    pub fn new(inner: A) -> Self {
        Self {
            inner,
            ledger: Arc::new(AllocationLedger::new()),
        }
    }

    pub fn ledger(&self) -> Arc<AllocationLedger> {
        Arc::clone(&self.ledger)
    }
}

impl<A: BufferAllocator> BufferAllocator for TrackingAllocator<A> {
    fn allocate(
        &self,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Result<PixelBuffer, AllocationError> {
        let mut buffer = self.inner.allocate(width, height, format)?;
        let inner = buffer.take_release_hook();
        let id = self.ledger.open();
        buffer.replace_release_hook(Box::new(LedgerEntry {
            ledger: Arc::clone(&self.ledger),
            id,
            inner,
        }));
        Ok(buffer)
    }
}

/// Wraps an allocator and makes the next `n` requests fail with
/// [`AllocationError::OutOfMemory`].
#[derive(Debug)]
pub struct FaultInjectingAllocator<A> {
    inner: A,
    pending_failures: AtomicUsize,
    injected: AtomicUsize,
}

impl<A: BufferAllocator> FaultInjectingAllocator<A> {
    pub fn new(inner: A) -> Self {
        Self {
            inner,
            pending_failures: AtomicUsize::new(0),
            injected: AtomicUsize::new(0),
        }
    }

    /// Arms `n` more failures.
    pub fn fail_next(&self, n: usize) {
        self.pending_failures.fetch_add(n, Ordering::AcqRel);
    }

    /// Failures injected so far.
    pub fn injected(&self) -> usize {
        self.injected.load(Ordering::Acquire)
    }

    pub fn inner(&self) -> &A {
        &self.inner
    }
}

impl<A: BufferAllocator> BufferAllocator for FaultInjectingAllocator<A> {
    fn allocate(
        &self,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Result<PixelBuffer, AllocationError> {
        let armed = self
            .pending_failures
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok();
        if armed {
            self.injected.fetch_add(1, Ordering::AcqRel);
            let bytes = layout_for(width, height, format, 0).map_or(0, |(_, total)| total);
            return Err(AllocationError::OutOfMemory { bytes });
        }
        self.inner.allocate(width, height, format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_allocator_packed() {
        let buf = SystemAllocator::new()
            .allocate(299, 299, PixelFormat::Bgra8888)
            .unwrap();
        assert_eq!(buf.bytes_per_row(), 299 * 4);
        assert_eq!(buf.len_bytes(), 299 * 4 * 299);
        assert!(buf.is_packed());
        assert!(buf.lock().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_system_allocator_reports_aligned_pitch() {
        let buf = SystemAllocator::with_row_alignment(64)
            .allocate(299, 10, PixelFormat::Bgra8888)
            .unwrap();
        assert_eq!(buf.bytes_per_row(), 1216);
        assert!(!buf.is_packed());
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        let err = SystemAllocator::new()
            .allocate(0, 10, PixelFormat::Bgra8888)
            .unwrap_err();
        assert_eq!(
            err,
            AllocationError::InvalidDimensions {
                width: 0,
                height: 10
            }
        );
    }

    #[test]
    fn test_oversized_request_is_out_of_memory() {
        let err = SystemAllocator::new()
            .allocate(u32::MAX, u32::MAX, PixelFormat::Bgra8888)
            .unwrap_err();
        assert!(matches!(err, AllocationError::OutOfMemory { .. }));
    }

    #[test]
    fn test_tracking_allocator_counts_releases() {
        let alloc = TrackingAllocator::new(SystemAllocator::new());
        let ledger = alloc.ledger();
        let a = alloc.allocate(4, 4, PixelFormat::Bgra8888).unwrap();
        let b = alloc.allocate(4, 4, PixelFormat::Gray8).unwrap();
        assert_eq!(ledger.live(), 2);
        a.release();
        assert_eq!(ledger.live(), 1);
        drop(b);
        assert_eq!(ledger.live(), 0);
        assert_eq!(ledger.allocated(), 2);
        assert_eq!(ledger.released(), 2);
    }

    #[test]
    #[should_panic(expected = "released more than once")]
    fn test_double_settle_fails_fast() {
        let ledger = AllocationLedger::new();
        let id = ledger.open();
        ledger.settle(id);
        ledger.settle(id);
    }

    #[test]
    fn test_fault_injection() {
        let alloc = FaultInjectingAllocator::new(SystemAllocator::new());
        alloc.fail_next(1);
        let err = alloc.allocate(2, 2, PixelFormat::Bgra8888).unwrap_err();
        assert_eq!(err, AllocationError::OutOfMemory { bytes: 16 });
        assert!(alloc.allocate(2, 2, PixelFormat::Bgra8888).is_ok());
        assert_eq!(alloc.injected(), 1);
    }
}
