//! Page Module
//!
//! Fixed-capacity, append-only column pages and the page ranges built from them.
//!
//! ## Layout
//! ```text
//! PageRange
//! ├── base groups  [0 .. MAX_BASE_PAGES)   preallocated, filled in order
//! │     └── PageGroup: one Page per column (4 metadata + N user columns)
//! └── tail groups  [0 .. ∞)                appended on demand
//!       └── PageGroup: one Page per column
//!
//! Page (4096 bytes)
//! ┌─────────┬─────────┬─────────┬─────┬─────────┐
//! │ cell 0  │ cell 1  │ cell 2  │ ... │ cell 511│   8 bytes per cell
//! └─────────┴─────────┴─────────┴─────┴─────────┘
//! ```
//!
//! Cells are single atomic words: appends happen under the owning range's
//! writer lock, and readers load cells without taking any lock.

mod page;
mod range;

pub use page::Page;
pub use range::{Address, PageGroup, PageRange, Slot};

// =============================================================================
// Shared Constants
// =============================================================================

/// Page capacity in bytes
pub const PAGE_SIZE: usize = 4096;

/// Width of every cell (user values, RIDs, timestamps, schema bitmaps)
pub const CELL_SIZE: usize = 8;

/// Number of cells a page holds
pub const CELLS_PER_PAGE: usize = PAGE_SIZE / CELL_SIZE;

/// Number of base page-groups in one page range
pub const MAX_BASE_PAGES: usize = 16;
