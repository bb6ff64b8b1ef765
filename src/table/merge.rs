//! Compaction
//!
//! Folds a page range's tail chains back into a fresh base generation.
//!
//! ## Steps (under the range writer lock)
//! 1. Build a new `PageRange` off to the side, rewriting every base row at
//!    the same group and offset it had before:
//!    - live record → latest value of every column, INDIRECTION none,
//!      SCHEMA_ENCODING zero
//!    - deleted record → zeroed row, dropped from the directory
//! 2. Swap the new range in; readers already holding the old snapshot finish
//!    against it
//! 3. Remove the range's tail entries and dropped records from the directory
//! 4. Prune index keys of dropped records
//!
//! Base addresses never change, so directory entries of surviving records
//! stay valid across the swap.

use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Weak};
use std::thread;

use crossbeam::channel::{self, Sender};
use parking_lot::{Condvar, Mutex};

use crate::config::MergeMode;
use crate::error::{LStoreError, Result};
use crate::page::{PageRange, CELL_SIZE};
use crate::rid::{Indirection, Rid};

use super::{RangeSlot, Table, LATEST_VERSION, RID_COLUMN, TIMESTAMP_COLUMN};

/// Outcome of one page-range compaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeReport {
    pub range: usize,
    pub records_merged: usize,
    pub records_dropped: usize,
    pub tail_groups_discarded: usize,
    pub index_keys_pruned: usize,
}

impl Table {
    /// Compact one page range now
    pub fn merge_range(&self, range_index: usize) -> Result<MergeReport> {
        let slot = self.range_slot(range_index)?;
        let _range_guard = slot.write_lock.lock();
        let old = slot.snapshot();
        let fresh = PageRange::new(self.total_columns());

        let user_columns: Vec<usize> = (0..self.num_columns).collect();
        let mut merged = 0usize;
        let mut dropped = Vec::new();

        for group_index in 0..=old.current_base_group() {
            let Some(group) = old.base_group(group_index) else {
                break;
            };

            for row in 0..group.num_records() {
                let offset = row * CELL_SIZE;
                let rid_cell = group
                    .read(RID_COLUMN, offset)
                    .ok_or(LStoreError::InvalidOffset(offset))?;
                let timestamp = group
                    .read(TIMESTAMP_COLUMN, offset)
                    .ok_or(LStoreError::InvalidOffset(offset))?;
                let base_rid = Rid::from(rid_cell);

                let mut cells = vec![Indirection::None.to_cell(), rid_cell, timestamp, 0];
                match self.directory.get(base_rid) {
                    Some(location) if location.live => {
                        let values = self
                            .walk_chain(&old, base_rid, &location, &user_columns, LATEST_VERSION)
                            .ok_or(LStoreError::BrokenChain(base_rid))?;
                        cells.extend(values.iter().map(|&value| value as u64));
                        merged += 1;
                    }
                    Some(_) => {
                        cells.extend(std::iter::repeat(0).take(self.num_columns));
                        dropped.push(base_rid);
                    }
                    // Dropped by an earlier merge; the slot stays a zeroed placeholder
                    None => cells.extend(std::iter::repeat(0).take(self.num_columns)),
                }

                match fresh.write_base(&cells)? {
                    Some((landed, offsets))
                        if landed == group_index && offsets[RID_COLUMN] == offset => {}
                    _ => {
                        return Err(LStoreError::CapacityExceeded(format!(
                            "compacted {} did not land at its base slot",
                            base_rid
                        )));
                    }
                }
            }
        }

        let tail_rids = self.directory.tail_rids_in_range(range_index);
        let tail_groups_discarded = old.tail_group_count();

        *slot.current.write() = Arc::new(fresh);
        self.directory.remove_all(&tail_rids);
        self.directory.remove_all(&dropped);

        let index_keys_pruned = if dropped.is_empty() {
            0
        } else {
            let dropped_set: HashSet<Rid> = dropped.iter().copied().collect();
            self.index.prune(|rid| !dropped_set.contains(&rid))
        };
        slot.merges.fetch_add(1, Ordering::AcqRel);

        let report = MergeReport {
            range: range_index,
            records_merged: merged,
            records_dropped: dropped.len(),
            tail_groups_discarded,
            index_keys_pruned,
        };
        tracing::info!(
            "Merged page range {} of '{}': {} records, {} dropped, {} tail groups discarded",
            range_index,
            self.name,
            report.records_merged,
            report.records_dropped,
            report.tail_groups_discarded
        );
        Ok(report)
    }

    /// Compact every page range
    pub fn merge_all(&self) -> Result<Vec<MergeReport>> {
        let count = self.ranges.read().len();
        (0..count).map(|index| self.merge_range(index)).collect()
    }

    /// Kick off compaction once a range crosses the tail-group threshold
    pub(crate) fn maybe_schedule_merge(&self, range_index: usize, slot: &RangeSlot, tail_groups: usize) {
        if tail_groups <= self.config.merge_threshold_pages {
            return;
        }

        match self.config.merge_mode {
            MergeMode::Disabled => {}
            MergeMode::Inline => self.run_merge(range_index),
            MergeMode::Background => {
                if slot.merge_pending.swap(true, Ordering::AcqRel) {
                    return;
                }
                let queued = self
                    .merger
                    .as_ref()
                    .map(|merger| merger.schedule(range_index))
                    .unwrap_or(false);
                if queued {
                    tracing::debug!("Queued merge of page range {} of '{}'", range_index, self.name);
                } else {
                    slot.merge_pending.store(false, Ordering::Release);
                    self.run_merge(range_index);
                }
            }
        }
    }

    /// Merge entry point of the background worker
    fn background_merge(&self, range_index: usize) {
        self.run_merge(range_index);
        if let Ok(slot) = self.range_slot(range_index) {
            slot.merge_pending.store(false, Ordering::Release);
        }
    }

    fn run_merge(&self, range_index: usize) {
        if let Err(e) = self.merge_range(range_index) {
            tracing::warn!("Merge of page range {} of '{}' failed: {}", range_index, self.name, e);
        }
    }
}

// =============================================================================
// Background Worker
// =============================================================================

/// Per-table compaction thread fed through a crossbeam channel
///
/// The worker holds only a `Weak` handle, so it never keeps its table alive;
/// dropping the table drops the sender and ends the worker loop.
pub(crate) struct MergeWorker {
    sender: Sender<usize>,

    /// Queued-but-unfinished merges, for `wait_idle`
    pending: Arc<(Mutex<usize>, Condvar)>,
}

impl MergeWorker {
    pub(crate) fn spawn(table: Weak<Table>, name: &str) -> Option<Self> {
        let (sender, receiver) = channel::unbounded::<usize>();
        let pending = Arc::new((Mutex::new(0usize), Condvar::new()));
        let worker_pending = Arc::clone(&pending);

        let spawned = thread::Builder::new()
            .name(format!("lstore-merge-{}", name))
            .spawn(move || {
                for range_index in receiver.iter() {
                    if let Some(table) = table.upgrade() {
                        table.background_merge(range_index);
                    }

                    let (count, idle) = &*worker_pending;
                    let mut count = count.lock();
                    *count = count.saturating_sub(1);
                    idle.notify_all();
                }
                tracing::debug!("Merge worker exiting");
            });

        match spawned {
            Ok(_) => Some(Self { sender, pending }),
            Err(e) => {
                tracing::warn!("Could not start merge worker for '{}': {}; merging inline", name, e);
                None
            }
        }
    }

    /// Queue a range; false if the worker is gone
    pub(crate) fn schedule(&self, range_index: usize) -> bool {
        let (count, _) = &*self.pending;
        *count.lock() += 1;

        if self.sender.send(range_index).is_err() {
            let mut count = count.lock();
            *count = count.saturating_sub(1);
            return false;
        }
        true
    }

    pub(crate) fn wait_idle(&self) {
        let (count, idle) = &*self.pending;
        let mut count = count.lock();
        while *count > 0 {
            idle.wait(&mut count);
        }
    }
}
