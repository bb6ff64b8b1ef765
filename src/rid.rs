//! Row identifiers and indirection pointers
//!
//! A [`Rid`] names one physical version of a record (base or tail). It is an
//! opaque handle: it is only ever resolved through the table directory, never
//! used as an offset into a page.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Row identifier, unique per physical record version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Rid(u64);

impl Rid {
    /// Smallest RID a table ever mints; 0 is reserved for "no pointer"
    pub const FIRST: Rid = Rid(1);

    /// Raw value as stored in the RID cell of a page
    pub fn get(self) -> u64 {
        self.0
    }

    /// Rebuild a RID from a page cell (0 is not a RID)
    pub(crate) fn from_cell(cell: u64) -> Option<Rid> {
        if cell == 0 {
            None
        } else {
            Some(Rid(cell))
        }
    }
}

impl From<u64> for Rid {
    fn from(raw: u64) -> Self {
        Rid(raw)
    }
}

impl fmt::Display for Rid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rid:{}", self.0)
    }
}

/// Contents of a base record's INDIRECTION cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indirection {
    /// The record has never been updated (or was just compacted)
    None,

    /// Newest tail record of the version chain
    Tail(Rid),
}

impl Indirection {
    pub(crate) fn to_cell(self) -> u64 {
        match self {
            Indirection::None => 0,
            Indirection::Tail(rid) => rid.get(),
        }
    }

    pub(crate) fn from_cell(cell: u64) -> Self {
        match Rid::from_cell(cell) {
            Some(rid) => Indirection::Tail(rid),
            None => Indirection::None,
        }
    }
}

/// Per-table RID counter
#[derive(Debug)]
pub(crate) struct RidAllocator {
    next: AtomicU64,
}

impl RidAllocator {
    pub(crate) fn new() -> Self {
        Self {
            next: AtomicU64::new(Rid::FIRST.get()),
        }
    }

    /// Mint the next RID (lock-free)
    pub(crate) fn mint(&self) -> Rid {
        Rid(self.next.fetch_add(1, Ordering::SeqCst))
    }

    /// Number of RIDs handed out so far
    pub(crate) fn minted(&self) -> u64 {
        self.next.load(Ordering::SeqCst) - Rid::FIRST.get()
    }
}
