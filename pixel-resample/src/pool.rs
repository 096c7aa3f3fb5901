// SPDX-License-Identifier: MIT
//! # Buffer Pool
//!
//! A per-frame pipeline allocates one destination buffer per frame, always of
//! the same geometry. The pool keeps released memory around and hands it out
//! again, so steady-state processing does not touch the system allocator.
//!
//! ```text
//! ┌─────────────┐ allocate ┌─────────────────┐  release  ┌─────────────┐
//! │  Resampler  │─────────▶│   Buffer Pool   │◀──────────│  Classifier │
//! └─────────────┘          │  ┌───────────┐  │   (drop)  └─────────────┘
//!                          │  │ memory 1  │  │
//!                          │  │ memory N  │  │
//!                          │  └───────────┘  │
//!                          └─────────────────┘
//! ```
//!
//! Released memory is zeroed before it goes back on the shelf, so a buffer
//! handed out by the pool never carries pixels from a previous frame. The pool
//! is bounded: memory released while the shelf is full is freed.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use crate::allocator::{layout_for, try_alloc_zeroed, BufferAllocator};
use crate::buffer::{PixelBuffer, ReleaseHook};
use crate::error::AllocationError;
use crate::format::PixelFormat;

#[derive(Debug)]
struct Shelf {
    buffers: Mutex<VecDeque<Vec<u8>>>,
    max_buffers: usize,
}

impl Shelf {
    fn put_back(&self, mut memory: Vec<u8>) {
        memory.fill(0);
        let mut buffers = self.buffers.lock().unwrap_or_else(PoisonError::into_inner);
        if buffers.len() < self.max_buffers {
            buffers.push_back(memory);
        }
    }

    fn take(&self) -> Option<Vec<u8>> {
        self.buffers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }
}

struct ReturnToShelf(Arc<Shelf>);

impl ReleaseHook for ReturnToShelf {
    fn release(self: Box<Self>, memory: Vec<u8>) {
        self.0.put_back(memory);
    }
}

/// Bounded pool of pixel memory for one buffer geometry.
///
/// Requests for the pooled geometry reuse shelved memory when available.
/// Requests for any other geometry are served with fresh, unpooled memory.
#[derive(Debug, Clone)]
pub struct BufferPool {
    shelf: Arc<Shelf>,
    width: u32,
    height: u32,
    format: PixelFormat,
    bytes_per_row: usize,
    buffer_size: usize,
    row_alignment: usize,
}

impl BufferPool {
    /// Creates an empty pool for `width × height` buffers of `format` that
    /// keeps at most `max_buffers` released buffers.
    pub fn new(
        width: u32,
        height: u32,
        format: PixelFormat,
        max_buffers: usize,
    ) -> Result<Self, AllocationError> {
        Self::with_row_alignment(width, height, format, max_buffers, 0)
    }

    /// Like [`BufferPool::new`], with rows padded to `row_alignment` bytes.
    pub fn with_row_alignment(
        width: u32,
        height: u32,
        format: PixelFormat,
        max_buffers: usize,
        row_alignment: usize,
    ) -> Result<Self, AllocationError> {
        let (bytes_per_row, buffer_size) = layout_for(width, height, format, row_alignment)?;
        Ok(Self {
            shelf: Arc::new(Shelf {
                buffers: Mutex::new(VecDeque::with_capacity(max_buffers)),
                max_buffers,
            }),
            width,
            height,
            format,
            bytes_per_row,
            buffer_size,
            row_alignment,
        })
    }

    /// Allocates `max_buffers` buffers up front so the first frames do not
    /// pay for allocation.
    pub fn prefill(&self) -> Result<(), AllocationError> {
        for _ in self.stats().0..self.shelf.max_buffers {
            let memory = try_alloc_zeroed(self.buffer_size)?;
            self.shelf.put_back(memory);
        }
        Ok(())
    }

    /// Returns `(available_buffers, max_buffers)`.
    pub fn stats(&self) -> (usize, usize) {
        let buffers = self
            .shelf
            .buffers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        (buffers.len(), self.shelf.max_buffers)
    }

    /// Frees all shelved memory.
    pub fn clear(&self) {
        self.shelf
            .buffers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn matches(&self, width: u32, height: u32, format: PixelFormat) -> bool {
        width == self.width && height == self.height && format == self.format
    }
}

impl BufferAllocator for BufferPool {
    fn allocate(
        &self,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Result<PixelBuffer, AllocationError> {
        if !self.matches(width, height, format) {
            let (bytes_per_row, total) = layout_for(width, height, format, self.row_alignment)?;
            let data = try_alloc_zeroed(total)?;
            return Ok(PixelBuffer::from_parts(
                width,
                height,
                bytes_per_row,
                format,
                data,
            ));
        }

        let data = match self.shelf.take() {
            Some(memory) => memory,
            None => try_alloc_zeroed(self.buffer_size)?,
        };
        let mut buffer = PixelBuffer::from_parts(width, height, self.bytes_per_row, format, data);
        buffer.replace_release_hook(Box::new(ReturnToShelf(Arc::clone(&self.shelf))));
        Ok(buffer)
    }
}
