//! Page ranges
//!
//! A page range is a bounded base area plus an unbounded tail area, each made
//! of page-groups holding one page per column. It is the unit of compaction.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{LStoreError, Result};

use super::{Page, CELL_SIZE, MAX_BASE_PAGES};

// =============================================================================
// Addressing
// =============================================================================

/// Page-group slot inside a page range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// Base page-group, `< MAX_BASE_PAGES`
    Base(usize),

    /// Tail page-group, numbered from 0 within the tail list
    Tail(usize),
}

impl Slot {
    /// Flat slot number: tail groups are offset by `MAX_BASE_PAGES`
    pub fn page_slot_index(self) -> usize {
        match self {
            Slot::Base(group) => group,
            Slot::Tail(group) => MAX_BASE_PAGES + group,
        }
    }

    /// Inverse of [`Slot::page_slot_index`]
    pub fn from_page_slot_index(index: usize) -> Self {
        if index < MAX_BASE_PAGES {
            Slot::Base(index)
        } else {
            Slot::Tail(index - MAX_BASE_PAGES)
        }
    }

    pub fn is_tail(self) -> bool {
        matches!(self, Slot::Tail(_))
    }
}

/// Physical location of one cell: `(page_range, page_slot, byte_offset)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address {
    pub range: usize,
    pub slot: Slot,
    pub offset: usize,
}

// =============================================================================
// PageGroup
// =============================================================================

/// One page per column, written row by row
pub struct PageGroup {
    pages: Box<[Page]>,
}

impl PageGroup {
    /// Create a group with one empty page per column
    pub fn new(total_columns: usize) -> Self {
        Self {
            pages: (0..total_columns).map(|_| Page::new()).collect(),
        }
    }

    /// A row fits only if every column page has room for one more cell
    pub fn has_capacity(&self) -> bool {
        self.pages.iter().all(|page| page.has_capacity(CELL_SIZE))
    }

    /// Append a full row, returning the byte offset written in each column
    ///
    /// Capacity is checked for every column before any cell is written, so a
    /// failed call leaves the group untouched.
    pub fn write_row(&self, row: &[u64]) -> Result<Vec<usize>> {
        if row.len() != self.pages.len() {
            return Err(LStoreError::ColumnCountMismatch {
                expected: self.pages.len(),
                actual: row.len(),
            });
        }
        if !self.has_capacity() {
            return Err(LStoreError::CapacityExceeded(
                "page-group has no room for another row".to_string(),
            ));
        }

        row.iter()
            .zip(self.pages.iter())
            .map(|(&cell, page)| page.write(cell))
            .collect()
    }

    /// Read one column cell
    pub fn read(&self, column: usize, offset: usize) -> Option<u64> {
        self.pages.get(column)?.read(offset)
    }

    /// Overwrite one column cell in place (metadata cells only)
    pub fn replace(&self, column: usize, offset: usize, value: u64) -> Result<()> {
        match self.pages.get(column) {
            Some(page) => page.replace(offset, value),
            None => Err(LStoreError::InvalidColumn {
                column,
                num_columns: self.pages.len(),
            }),
        }
    }

    /// Rows written so far
    pub fn num_records(&self) -> usize {
        self.pages.first().map(Page::num_records).unwrap_or(0)
    }

    pub fn num_columns(&self) -> usize {
        self.pages.len()
    }
}

// =============================================================================
// PageRange
// =============================================================================

/// Bounded base area plus growable tail area
///
/// ## Concurrency:
/// - Writes (`write_base`, `write_tail`) are serialized by the owning table's
///   per-range writer lock
/// - `tail`: RwLock held only while the group list itself is read or grown
/// - Cell reads go straight to the atomic pages
pub struct PageRange {
    total_columns: usize,

    /// Base page-groups, preallocated and filled in order
    base: Box<[PageGroup]>,

    /// Index of the base group currently being filled
    current_base: AtomicUsize,

    /// Tail page-groups, newest last
    tail: RwLock<Vec<Arc<PageGroup>>>,
}

impl PageRange {
    /// Create an empty page range
    pub fn new(total_columns: usize) -> Self {
        Self {
            total_columns,
            base: (0..MAX_BASE_PAGES)
                .map(|_| PageGroup::new(total_columns))
                .collect(),
            current_base: AtomicUsize::new(0),
            tail: RwLock::new(Vec::new()),
        }
    }

    /// Base group index currently being filled
    pub fn current_base_group(&self) -> usize {
        self.current_base.load(Ordering::Acquire)
    }

    /// True once every base group is full
    pub fn is_base_full(&self) -> bool {
        let current = self.current_base_group();
        current + 1 >= MAX_BASE_PAGES && !self.base[current].has_capacity()
    }

    /// Append a base row
    ///
    /// Moves on to the next base group when the current one lacks room in any
    /// column. Returns `Ok(None)` when the whole base area is exhausted; the
    /// owner then allocates a fresh page range.
    pub fn write_base(&self, row: &[u64]) -> Result<Option<(usize, Vec<usize>)>> {
        let mut group = self.current_base_group();
        loop {
            if self.base[group].has_capacity() {
                let offsets = self.base[group].write_row(row)?;
                return Ok(Some((group, offsets)));
            }
            if group + 1 >= MAX_BASE_PAGES {
                return Ok(None);
            }
            group += 1;
            self.current_base.store(group, Ordering::Release);
        }
    }

    /// Append a tail row, opening a new tail group when the last one is full
    pub fn write_tail(&self, row: &[u64]) -> Result<(usize, Vec<usize>)> {
        let last = {
            let tail = self.tail.read();
            tail.last()
                .filter(|group| group.has_capacity())
                .map(|group| (tail.len() - 1, Arc::clone(group)))
        };

        let (index, group) = match last {
            Some(found) => found,
            None => {
                let index = self.allocate_new_tail_group();
                let group = Arc::clone(&self.tail.read()[index]);
                (index, group)
            }
        };

        let offsets = group.write_row(row)?;
        Ok((index, offsets))
    }

    /// Append a fresh page-per-column group to the tail list
    pub fn allocate_new_tail_group(&self) -> usize {
        let mut tail = self.tail.write();
        tail.push(Arc::new(PageGroup::new(self.total_columns)));
        tracing::debug!("Allocated tail group {}", tail.len() - 1);
        tail.len() - 1
    }

    /// Read one cell from a base or tail group
    pub fn read(&self, slot: Slot, column: usize, offset: usize) -> Option<u64> {
        match slot {
            Slot::Base(group) => self.base.get(group)?.read(column, offset),
            Slot::Tail(group) => self.tail.read().get(group)?.read(column, offset),
        }
    }

    /// Overwrite one cell in place
    pub fn replace(&self, slot: Slot, column: usize, offset: usize, value: u64) -> Result<()> {
        match slot {
            Slot::Base(group) => match self.base.get(group) {
                Some(group) => group.replace(column, offset, value),
                None => Err(LStoreError::InvalidOffset(offset)),
            },
            Slot::Tail(group) => match self.tail.read().get(group) {
                Some(group) => group.replace(column, offset, value),
                None => Err(LStoreError::InvalidOffset(offset)),
            },
        }
    }

    /// Borrow a base group (compaction walks them in order)
    pub fn base_group(&self, group: usize) -> Option<&PageGroup> {
        self.base.get(group)
    }

    /// Number of tail groups allocated so far
    pub fn tail_group_count(&self) -> usize {
        self.tail.read().len()
    }

    /// Number of base rows written so far
    pub fn base_record_count(&self) -> usize {
        self.base[..=self.current_base_group()]
            .iter()
            .map(PageGroup::num_records)
            .sum()
    }

    pub fn total_columns(&self) -> usize {
        self.total_columns
    }
}
