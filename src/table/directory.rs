//! Record directory
//!
//! Maps every RID ever written to its physical location. A location carries
//! one byte offset per column, so `(column, RID)` resolves to
//! `(page_range, page_slot, offset)`. Deletion clears the `live` flag instead
//! of overloading the RID's sign.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::page::{Address, Slot};
use crate::rid::Rid;

/// Where one physical record version lives
#[derive(Debug, Clone)]
pub struct RecordLocation {
    pub range: usize,
    pub slot: Slot,

    /// Byte offset per column (metadata columns first)
    pub offsets: Arc<[usize]>,

    /// False once the record has been deleted
    pub live: bool,
}

impl RecordLocation {
    pub fn new(range: usize, slot: Slot, offsets: Vec<usize>) -> Self {
        Self {
            range,
            slot,
            offsets: offsets.into(),
            live: true,
        }
    }

    /// Address of one column's cell
    pub fn address(&self, column: usize) -> Option<Address> {
        Some(Address {
            range: self.range,
            slot: self.slot,
            offset: *self.offsets.get(column)?,
        })
    }

    pub fn offset(&self, column: usize) -> Option<usize> {
        self.offsets.get(column).copied()
    }
}

/// RID → location map shared by readers and writers
///
/// ## Concurrency:
/// - `entries`: RwLock held only for the duration of a single lookup or
///   publish, never across a chain traversal
pub struct Directory {
    entries: RwLock<HashMap<Rid, RecordLocation>>,
}

impl Directory {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Publish a location
    pub fn insert(&self, rid: Rid, location: RecordLocation) {
        self.entries.write().insert(rid, location);
    }

    /// Publish several locations under one lock acquisition
    pub fn insert_all(&self, locations: Vec<(Rid, RecordLocation)>) {
        let mut entries = self.entries.write();
        for (rid, location) in locations {
            entries.insert(rid, location);
        }
    }

    pub fn get(&self, rid: Rid) -> Option<RecordLocation> {
        self.entries.read().get(&rid).cloned()
    }

    /// Resolve `(column, rid)` to a physical address
    pub fn address(&self, column: usize, rid: Rid) -> Option<Address> {
        self.entries.read().get(&rid)?.address(column)
    }

    /// Live base record check (tail RIDs are never "live bases")
    pub fn is_live_base(&self, rid: Rid) -> bool {
        self.entries
            .read()
            .get(&rid)
            .map(|location| location.live && !location.slot.is_tail())
            .unwrap_or(false)
    }

    /// Clear the live flag on every listed RID
    pub fn mark_deleted(&self, rids: &[Rid]) {
        let mut entries = self.entries.write();
        for rid in rids {
            if let Some(location) = entries.get_mut(rid) {
                location.live = false;
            }
        }
    }

    /// Remove entries outright (compaction only)
    pub fn remove_all(&self, rids: &[Rid]) {
        let mut entries = self.entries.write();
        for rid in rids {
            entries.remove(rid);
        }
    }

    /// Tail RIDs stored in the given page range
    pub fn tail_rids_in_range(&self, range: usize) -> Vec<Rid> {
        self.entries
            .read()
            .iter()
            .filter(|(_, location)| location.range == range && location.slot.is_tail())
            .map(|(rid, _)| *rid)
            .collect()
    }

    /// Base RIDs in RID order, optionally restricted to live ones
    pub fn base_rids(&self, live_only: bool) -> Vec<Rid> {
        let mut rids: Vec<Rid> = self
            .entries
            .read()
            .iter()
            .filter(|(_, location)| !location.slot.is_tail() && (location.live || !live_only))
            .map(|(rid, _)| *rid)
            .collect();
        rids.sort_unstable();
        rids
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Default for Directory {
    fn default() -> Self {
        Self::new()
    }
}
