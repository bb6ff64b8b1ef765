//! Page implementation
//!
//! An append-only buffer of fixed-width cells.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::error::{LStoreError, Result};

use super::{CELLS_PER_PAGE, CELL_SIZE, PAGE_SIZE};

/// Fixed-capacity page of 8-byte cells
///
/// ## Concurrency:
/// - `write` must be serialized by the caller (the page range writer lock)
/// - `read` and `replace` are single-word atomic operations
pub struct Page {
    /// Cell storage, allocated once at full capacity
    cells: Box<[AtomicU64]>,

    /// Bytes written so far
    size: AtomicUsize,
}

impl Page {
    /// Create a new empty page
    pub fn new() -> Self {
        Self {
            cells: (0..CELLS_PER_PAGE).map(|_| AtomicU64::new(0)).collect(),
            size: AtomicUsize::new(0),
        }
    }

    /// Check whether an entry of `entry_size` bytes still fits
    pub fn has_capacity(&self, entry_size: usize) -> bool {
        self.size() + entry_size <= PAGE_SIZE
    }

    /// Append a cell, returning the byte offset it was written at
    pub fn write(&self, value: u64) -> Result<usize> {
        let offset = self.size.load(Ordering::Acquire);
        if offset + CELL_SIZE > PAGE_SIZE {
            return Err(LStoreError::CapacityExceeded(format!(
                "page full at {} bytes",
                offset
            )));
        }

        self.cells[offset / CELL_SIZE].store(value, Ordering::Release);
        self.size.store(offset + CELL_SIZE, Ordering::Release);
        Ok(offset)
    }

    /// Read the cell at `offset`; `None` if it was never written
    pub fn read(&self, offset: usize) -> Option<u64> {
        if offset % CELL_SIZE != 0 || offset >= self.size() {
            return None;
        }
        Some(self.cells[offset / CELL_SIZE].load(Ordering::Acquire))
    }

    /// Overwrite an already-written cell in place
    pub fn replace(&self, offset: usize, value: u64) -> Result<()> {
        if offset % CELL_SIZE != 0 || offset >= self.size() {
            return Err(LStoreError::InvalidOffset(offset));
        }
        self.cells[offset / CELL_SIZE].store(value, Ordering::Release);
        Ok(())
    }

    /// Bytes written so far
    pub fn size(&self) -> usize {
        self.size.load(Ordering::Acquire)
    }

    /// Number of cells written so far
    pub fn num_records(&self) -> usize {
        self.size() / CELL_SIZE
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}
