//! Table Module
//!
//! The storage engine proper: page ranges, the record directory, per-column
//! indexes, and the versioning algorithm on top of them.
//!
//! ## Record Layout
//! ```text
//! ┌─────────────┬─────┬───────────┬─────────────────┬────────┬─────┬────────┐
//! │ INDIRECTION │ RID │ TIMESTAMP │ SCHEMA_ENCODING │ col 0  │ ... │ col N-1│
//! └─────────────┴─────┴───────────┴─────────────────┴────────┴─────┴────────┘
//! ```
//!
//! ## Version Chain
//! ```text
//! base.INDIRECTION ──► tail(newest) ──► tail ──► ... ──► tail(oldest) ──► base RID
//! ```
//! A base SCHEMA_ENCODING bit is set once its column has ever been updated.
//! A tail SCHEMA_ENCODING bit marks the columns that tail holds a value for.

mod directory;
mod merge;

use std::ops::Bound;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::{Mutex, RwLock};

use crate::config::{Config, MergeMode};
use crate::error::{LStoreError, Result};
use crate::index::Index;
use crate::page::{Address, PageRange, Slot};
use crate::rid::{Indirection, Rid, RidAllocator};

pub use directory::{Directory, RecordLocation};
pub use merge::MergeReport;

use merge::MergeWorker;

// =============================================================================
// Metadata Columns
// =============================================================================

pub const INDIRECTION_COLUMN: usize = 0;
pub const RID_COLUMN: usize = 1;
pub const TIMESTAMP_COLUMN: usize = 2;
pub const SCHEMA_ENCODING_COLUMN: usize = 3;

/// Number of metadata columns preceding the user columns
pub const METADATA_COLUMNS: usize = 4;

/// The schema bitmap is a single 64-bit cell
pub const MAX_USER_COLUMNS: usize = 64;

/// Relative version of the most recent value
pub const LATEST_VERSION: usize = 0;

/// Attempts a reader makes before giving up on a chain a merge keeps moving
const MAX_READ_ATTEMPTS: usize = 8;

// =============================================================================
// Public Types
// =============================================================================

/// One logical record as returned by reads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Base RID of the record
    pub rid: Rid,

    /// Primary-key value
    pub key: i64,

    /// User columns; projected-out columns are `None`
    pub columns: Vec<Option<i64>>,
}

/// Point-in-time table counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableStats {
    pub page_ranges: usize,
    pub tail_groups: usize,
    pub live_records: usize,
    pub rids_minted: u64,
    pub merges: u64,
}

// =============================================================================
// Range Slots
// =============================================================================

/// A page range plus the state that serializes writers on it
///
/// Compaction swaps `current` wholesale; readers clone the `Arc` once and
/// finish their traversal against that snapshot.
pub(crate) struct RangeSlot {
    current: RwLock<Arc<PageRange>>,

    /// Serializes page allocation, base metadata updates and compaction
    write_lock: Mutex<()>,

    /// Set while a background merge of this range is queued
    merge_pending: AtomicBool,

    merges: AtomicU64,
}

impl RangeSlot {
    fn new(total_columns: usize) -> Self {
        Self {
            current: RwLock::new(Arc::new(PageRange::new(total_columns))),
            write_lock: Mutex::new(()),
            merge_pending: AtomicBool::new(false),
            merges: AtomicU64::new(0),
        }
    }

    fn snapshot(&self) -> Arc<PageRange> {
        Arc::clone(&self.current.read())
    }
}

// =============================================================================
// Table
// =============================================================================

/// A single table of integer columns
///
/// ## Concurrency Model
///
/// - **Writers** lock the stripe of their primary key, then the writer lock of
///   the page range they touch. Writers on different ranges run in parallel.
/// - **Readers** take no writer lock: they snapshot the page range once and
///   follow INDIRECTION pointers through immutable tail records. Only the
///   base INDIRECTION and SCHEMA_ENCODING cells change in place, each with a
///   single atomic store.
/// - **Compaction** holds the range writer lock, builds a new range off to the
///   side, then swaps it in before pruning the directory.
pub struct Table {
    name: String,
    num_columns: usize,
    key: usize,
    config: Config,

    /// Page ranges in allocation order; only the last one takes inserts
    ranges: RwLock<Vec<Arc<RangeSlot>>>,

    directory: Directory,
    index: Index,
    rids: RidAllocator,

    /// Striped per-key writer locks
    key_locks: Box<[Mutex<()>]>,

    /// Serializes index rebuilds
    index_builds: Mutex<()>,

    merger: Option<MergeWorker>,
}

impl Table {
    /// Create a table of `num_columns` user columns keyed on column `key`
    pub fn new(
        name: impl Into<String>,
        num_columns: usize,
        key: usize,
        config: Config,
    ) -> Result<Arc<Self>> {
        let name = name.into();
        config.validate()?;

        if num_columns == 0 || num_columns > MAX_USER_COLUMNS {
            return Err(LStoreError::InvalidSchema(format!(
                "table '{}' needs between 1 and {} columns, got {}",
                name, MAX_USER_COLUMNS, num_columns
            )));
        }
        if key >= num_columns {
            return Err(LStoreError::InvalidSchema(format!(
                "key column {} out of range for {} columns",
                key, num_columns
            )));
        }

        tracing::info!(
            "Creating table '{}' ({} columns, key column {})",
            name,
            num_columns,
            key
        );

        Ok(Arc::new_cyclic(|weak| {
            let merger = match config.merge_mode {
                MergeMode::Background => MergeWorker::spawn(weak.clone(), &name),
                MergeMode::Inline | MergeMode::Disabled => None,
            };
            let total_columns = num_columns + METADATA_COLUMNS;

            Self {
                ranges: RwLock::new(vec![Arc::new(RangeSlot::new(total_columns))]),
                directory: Directory::new(),
                index: Index::new(num_columns, config.index_degree),
                rids: RidAllocator::new(),
                key_locks: (0..config.lock_stripes).map(|_| Mutex::new(())).collect(),
                index_builds: Mutex::new(()),
                merger,
                name,
                num_columns,
                key,
                config,
            }
        }))
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Insert a new record
    ///
    /// Every page cell is written before any index or directory entry is
    /// published, so a failed insert leaves nothing visible.
    pub fn insert(&self, columns: &[i64]) -> Result<Rid> {
        self.check_width(columns.len())?;
        let key = columns[self.key];
        let _key_guard = self.key_lock(key).lock();

        if self.live_base_rid(key)?.is_some() {
            return Err(LStoreError::DuplicateKey(key));
        }

        let rid = self.rids.mint();
        let mut row = Vec::with_capacity(self.total_columns());
        row.extend([Indirection::None.to_cell(), rid.get(), now_millis(), 0]);
        row.extend(columns.iter().map(|&value| value as u64));

        loop {
            let (range_index, slot) = self.last_range();
            let range_guard = slot.write_lock.lock();
            let range = slot.snapshot();

            if let Some((group, offsets)) = range.write_base(&row)? {
                for (column, &value) in columns.iter().enumerate() {
                    self.index.insert(column, value, rid)?;
                }
                self.directory.insert(
                    rid,
                    RecordLocation::new(range_index, Slot::Base(group), offsets),
                );
                tracing::trace!("Inserted key {} as {} in range {}", key, rid, range_index);
                return Ok(rid);
            }

            drop(range_guard);
            self.allocate_range(range_index)?;
        }
    }

    /// Update a record; `None` leaves a column unchanged
    ///
    /// The first update ever to touch a column first appends a tail holding
    /// the column's original value, so that value stays reachable as the
    /// oldest version. The primary key cannot change.
    pub fn update(&self, key: i64, columns: &[Option<i64>]) -> Result<()> {
        self.check_width(columns.len())?;
        let _key_guard = self.key_lock(key).lock();
        self.update_locked(key, columns.to_vec())
    }

    /// Add one to a column of a record, returning the new value
    ///
    /// The read and the update happen under one key lock, so concurrent
    /// increments of the same record never lose a step.
    pub fn increment(&self, key: i64, column: usize) -> Result<i64> {
        self.check_column(column)?;
        let _key_guard = self.key_lock(key).lock();

        let base_rid = self
            .live_base_rid(key)?
            .ok_or(LStoreError::RecordNotFound(key))?;
        let current = self
            .resolve(base_rid, &[column], LATEST_VERSION)?
            .ok_or(LStoreError::RecordNotFound(key))?[0];
        let next = current.checked_add(1).ok_or(LStoreError::Overflow)?;

        let mut columns = vec![None; self.num_columns];
        columns[column] = Some(next);
        self.update_locked(key, columns)?;
        Ok(next)
    }

    /// Body of [`Table::update`]; the caller holds the key's lock stripe
    fn update_locked(&self, key: i64, mut columns: Vec<Option<i64>>) -> Result<()> {
        match columns[self.key] {
            Some(attempted) if attempted != key => {
                return Err(LStoreError::PrimaryKeyUpdate { key, attempted });
            }
            _ => columns[self.key] = None,
        }

        let mask = columns
            .iter()
            .enumerate()
            .filter(|(_, value)| value.is_some())
            .fold(0u64, |mask, (column, _)| mask | bit(column));

        let base_rid = self
            .live_base_rid(key)?
            .ok_or(LStoreError::RecordNotFound(key))?;
        if mask == 0 {
            return Ok(());
        }

        let base = self
            .directory
            .get(base_rid)
            .ok_or(LStoreError::RecordNotFound(key))?;
        let slot = self.range_slot(base.range)?;
        let range_guard = slot.write_lock.lock();
        let range = slot.snapshot();

        let base_schema = read_cell(&range, &base, SCHEMA_ENCODING_COLUMN)?;
        let mut head = match Indirection::from_cell(read_cell(&range, &base, INDIRECTION_COLUMN)?) {
            Indirection::None => base_rid,
            Indirection::Tail(rid) => rid,
        };
        let timestamp = now_millis();
        let mut written = Vec::new();

        // Preserve the original value of every column touched for the first time
        for column in 0..self.num_columns {
            if mask & bit(column) == 0 || base_schema & bit(column) != 0 {
                continue;
            }
            let original = read_cell(&range, &base, METADATA_COLUMNS + column)?;
            let mut values = vec![0u64; self.num_columns];
            values[column] = original;

            let tail_rid = self.rids.mint();
            let row = tail_row(head, tail_rid, timestamp, bit(column), &values);
            let (group, offsets) = range.write_tail(&row)?;
            written.push((tail_rid, RecordLocation::new(base.range, Slot::Tail(group), offsets)));
            head = tail_rid;
        }

        let values: Vec<u64> = columns
            .iter()
            .map(|value| value.unwrap_or(0) as u64)
            .collect();
        let tail_rid = self.rids.mint();
        let row = tail_row(head, tail_rid, timestamp, mask, &values);
        let (group, offsets) = range.write_tail(&row)?;
        written.push((tail_rid, RecordLocation::new(base.range, Slot::Tail(group), offsets)));

        // Tails must resolve before the base points at them
        self.directory.insert_all(written);
        replace_cell(&range, &base, SCHEMA_ENCODING_COLUMN, base_schema | mask)?;
        replace_cell(
            &range,
            &base,
            INDIRECTION_COLUMN,
            Indirection::Tail(tail_rid).to_cell(),
        )?;

        for (column, value) in columns.iter().enumerate() {
            if let Some(value) = value {
                self.index.insert(column, *value, base_rid)?;
            }
        }

        let tail_groups = range.tail_group_count();
        drop(range_guard);

        tracing::trace!("Updated key {} (new head {})", key, tail_rid);
        self.maybe_schedule_merge(base.range, &slot, tail_groups);
        Ok(())
    }

    /// Logically delete a record and every version in its chain
    ///
    /// Directory and index entries stay in place with their live flag
    /// cleared; the key becomes free for a new insert.
    pub fn delete(&self, key: i64) -> Result<()> {
        let _key_guard = self.key_lock(key).lock();
        let base_rid = self
            .live_base_rid(key)?
            .ok_or(LStoreError::RecordNotFound(key))?;
        let base = self
            .directory
            .get(base_rid)
            .ok_or(LStoreError::RecordNotFound(key))?;

        let slot = self.range_slot(base.range)?;
        let _range_guard = slot.write_lock.lock();
        let range = slot.snapshot();

        let mut chain = self.chain_rids(&range, base_rid, &base)?;
        chain.push(base_rid);
        self.directory.mark_deleted(&chain);

        tracing::trace!("Deleted key {} ({} versions)", key, chain.len());
        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Value of `column` for `key`, `relative_version` updates back
    ///
    /// Version 0 is the newest value written to that column, regardless of
    /// which columns later updates touched.
    pub fn read_column(&self, column: usize, key: i64, relative_version: usize) -> Result<i64> {
        self.check_column(column)?;
        let base_rid = self
            .live_base_rid(key)?
            .ok_or(LStoreError::RecordNotFound(key))?;
        let values = self
            .resolve(base_rid, &[column], relative_version)?
            .ok_or(LStoreError::RecordNotFound(key))?;
        Ok(values[0])
    }

    /// Whole record for `key` at `relative_version`, with projection applied
    pub fn read_record(&self, key: i64, projection: &[bool], relative_version: usize) -> Result<Record> {
        self.check_width(projection.len())?;
        let base_rid = self
            .live_base_rid(key)?
            .ok_or(LStoreError::RecordNotFound(key))?;
        self.record_at(base_rid, projection, relative_version)?
            .ok_or(LStoreError::RecordNotFound(key))
    }

    /// Every live record whose `column` equals `value` at `relative_version`
    ///
    /// Falls back to a full scan when the column's index has been dropped.
    pub fn select(
        &self,
        value: i64,
        column: usize,
        projection: &[bool],
        relative_version: usize,
    ) -> Result<Vec<Record>> {
        self.check_column(column)?;
        self.check_width(projection.len())?;

        let candidates = match self.index.locate(column, value) {
            Ok(rids) => rids,
            Err(LStoreError::IndexDropped(_)) => self.directory.base_rids(true),
            Err(e) => return Err(e),
        };

        let all_columns: Vec<usize> = (0..self.num_columns).collect();
        let mut records = Vec::new();
        for rid in candidates {
            if !self.directory.is_live_base(rid) {
                continue;
            }
            let Some(values) = self.resolve(rid, &all_columns, relative_version)? else {
                continue;
            };
            if values[column] != value {
                continue;
            }
            records.push(self.project(rid, &values, projection));
        }
        Ok(records)
    }

    /// Sum of `column` over live keys in `[start_key, end_key]`
    ///
    /// Fails with `RecordNotFound` when no live key falls in the range.
    pub fn sum_range(
        &self,
        start_key: i64,
        end_key: i64,
        column: usize,
        relative_version: usize,
    ) -> Result<i64> {
        self.check_column(column)?;
        if start_key > end_key {
            return Err(LStoreError::RecordNotFound(start_key));
        }

        let mut total: i64 = 0;
        let mut found = 0usize;
        let rids = self.index.locate_bounds(
            self.key,
            Bound::Included(start_key),
            Bound::Included(end_key),
        )?;
        for rid in rids {
            if !self.directory.is_live_base(rid) {
                continue;
            }
            if let Some(values) = self.resolve(rid, &[column], relative_version)? {
                total = total.checked_add(values[0]).ok_or(LStoreError::Overflow)?;
                found += 1;
            }
        }

        if found == 0 {
            return Err(LStoreError::RecordNotFound(start_key));
        }
        Ok(total)
    }

    // =========================================================================
    // Index Management
    // =========================================================================

    /// Base RIDs (live or not) that ever held `value` in `column`
    pub fn locate(&self, column: usize, value: i64) -> Result<Vec<Rid>> {
        self.index.locate(column, value)
    }

    /// Base RIDs (live or not) that ever held a value in `[begin, end)`
    pub fn locate_range(&self, column: usize, begin: i64, end: i64) -> Result<Vec<Rid>> {
        self.index.locate_range(column, begin, end)
    }

    /// Drop a column's index; the primary-key index cannot be dropped
    pub fn drop_index(&self, column: usize) -> Result<()> {
        self.check_column(column)?;
        if column == self.key {
            return Err(LStoreError::InvalidSchema(
                "the primary-key index cannot be dropped".to_string(),
            ));
        }
        self.index.drop_index(column)?;
        tracing::debug!("Dropped index on column {} of '{}'", column, self.name);
        Ok(())
    }

    /// (Re)build a column's index from every record version still stored
    ///
    /// The new tree is built off to the side while the current one (if any)
    /// keeps serving lookups, so uniqueness checks on the key column stay
    /// intact throughout. Writes racing the build land in both trees.
    pub fn create_index(&self, column: usize) -> Result<()> {
        self.check_column(column)?;
        let _build_guard = self.index_builds.lock();
        self.index.begin_rebuild(column)?;

        // Writers that indexed before the rebuild existed publish their
        // directory entries under the range lock; wait them out
        let ranges: Vec<Arc<RangeSlot>> = self.ranges.read().clone();
        for slot in &ranges {
            drop(slot.write_lock.lock());
        }

        let mut entries = 0usize;
        for rid in self.directory.base_rids(false) {
            let Some(location) = self.directory.get(rid) else {
                continue;
            };
            let slot = self.range_slot(location.range)?;
            let _range_guard = slot.write_lock.lock();
            // Compaction may have dropped the record meanwhile
            let Some(base) = self.directory.get(rid) else {
                continue;
            };
            let range = slot.snapshot();

            for value in self.column_history(&range, rid, &base, column)? {
                if self.index.backfill(column, value, rid)? {
                    entries += 1;
                }
            }
        }

        if self.index.finish_rebuild(column)? {
            tracing::debug!(
                "Built index on column {} of '{}' ({} backfilled entries)",
                column,
                self.name,
                entries
            );
        } else {
            tracing::debug!(
                "Index build on column {} of '{}' cancelled by a drop",
                column,
                self.name
            );
        }
        Ok(())
    }

    pub fn is_indexed(&self, column: usize) -> bool {
        self.index.is_indexed(column)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of user columns
    pub fn num_columns(&self) -> usize {
        self.num_columns
    }

    /// User columns plus metadata columns
    pub fn total_columns(&self) -> usize {
        self.num_columns + METADATA_COLUMNS
    }

    /// Index of the primary-key column
    pub fn key_index(&self) -> usize {
        self.key
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Directory entry of a RID
    pub fn location(&self, rid: Rid) -> Option<RecordLocation> {
        self.directory.get(rid)
    }

    /// Resolve `(column, rid)` to `(page_range, page_slot, offset)`
    ///
    /// `column` counts the metadata columns, so user column `c` is
    /// `METADATA_COLUMNS + c`.
    pub fn address(&self, column: usize, rid: Rid) -> Option<Address> {
        self.directory.address(column, rid)
    }

    /// Snapshot of the table's counters
    pub fn stats(&self) -> TableStats {
        let ranges = self.ranges.read();
        TableStats {
            page_ranges: ranges.len(),
            tail_groups: ranges
                .iter()
                .map(|slot| slot.snapshot().tail_group_count())
                .sum(),
            live_records: self.directory.base_rids(true).len(),
            rids_minted: self.rids.minted(),
            merges: ranges
                .iter()
                .map(|slot| slot.merges.load(Ordering::Acquire))
                .sum(),
        }
    }

    /// Block until every queued background merge has finished
    pub fn wait_for_merges(&self) {
        if let Some(merger) = &self.merger {
            merger.wait_idle();
        }
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// The single live base RID holding `key`, if any
    fn live_base_rid(&self, key: i64) -> Result<Option<Rid>> {
        let live: Vec<Rid> = self
            .index
            .locate(self.key, key)?
            .into_iter()
            .filter(|rid| self.directory.is_live_base(*rid))
            .collect();

        match live.as_slice() {
            [] => Ok(None),
            [rid] => Ok(Some(*rid)),
            _ => {
                tracing::warn!(
                    "Key {} of '{}' resolves to {} live records",
                    key,
                    self.name,
                    live.len()
                );
                Err(LStoreError::IndexCorruption {
                    column: self.key,
                    value: key,
                    matches: live.len(),
                })
            }
        }
    }

    /// Resolve columns of a base record, retrying if a merge moves the chain
    ///
    /// Returns `Ok(None)` when the record is no longer live.
    fn resolve(
        &self,
        base_rid: Rid,
        columns: &[usize],
        relative_version: usize,
    ) -> Result<Option<Vec<i64>>> {
        for _ in 0..MAX_READ_ATTEMPTS {
            let Some(base) = self.directory.get(base_rid) else {
                return Ok(None);
            };
            if !base.live {
                return Ok(None);
            }

            let range = self.range_slot(base.range)?.snapshot();
            if let Some(values) = self.walk_chain(&range, base_rid, &base, columns, relative_version) {
                return Ok(Some(values));
            }
            tracing::trace!("Snapshot of {} went stale, retrying", base_rid);
        }
        Err(LStoreError::BrokenChain(base_rid))
    }

    /// Walk a version chain inside one page-range snapshot
    ///
    /// Each tail whose schema bit marks a requested column counts as one
    /// version of that column. Columns with fewer versions than requested
    /// fall through to the base record's value. `None` means the snapshot no
    /// longer matches the directory.
    fn walk_chain(
        &self,
        range: &PageRange,
        base_rid: Rid,
        base: &RecordLocation,
        columns: &[usize],
        relative_version: usize,
    ) -> Option<Vec<i64>> {
        let mut resolved: Vec<Option<u64>> = vec![None; columns.len()];
        let mut versions_seen = vec![0usize; columns.len()];

        let head = range.read(base.slot, INDIRECTION_COLUMN, base.offset(INDIRECTION_COLUMN)?)?;
        let mut cursor = match Indirection::from_cell(head) {
            Indirection::None => base_rid,
            Indirection::Tail(rid) => rid,
        };

        while cursor != base_rid && resolved.iter().any(Option::is_none) {
            let tail = self.directory.get(cursor)?;
            if tail.range != base.range || !tail.slot.is_tail() {
                return None;
            }

            let schema = range.read(tail.slot, SCHEMA_ENCODING_COLUMN, tail.offset(SCHEMA_ENCODING_COLUMN)?)?;
            for (i, &column) in columns.iter().enumerate() {
                if resolved[i].is_some() || schema & bit(column) == 0 {
                    continue;
                }
                if versions_seen[i] == relative_version {
                    let cell = METADATA_COLUMNS + column;
                    resolved[i] = Some(range.read(tail.slot, cell, tail.offset(cell)?)?);
                } else {
                    versions_seen[i] += 1;
                }
            }

            let next = range.read(tail.slot, INDIRECTION_COLUMN, tail.offset(INDIRECTION_COLUMN)?)?;
            cursor = Rid::from_cell(next)?;
        }

        columns
            .iter()
            .zip(resolved)
            .map(|(&column, value)| {
                let cell = match value {
                    Some(cell) => cell,
                    None => {
                        let cell = METADATA_COLUMNS + column;
                        range.read(base.slot, cell, base.offset(cell)?)?
                    }
                };
                Some(cell as i64)
            })
            .collect()
    }

    /// Tail RIDs of a chain, newest first (caller holds the range writer lock)
    fn chain_rids(&self, range: &PageRange, base_rid: Rid, base: &RecordLocation) -> Result<Vec<Rid>> {
        let mut rids = Vec::new();
        let mut cursor = match Indirection::from_cell(read_cell(range, base, INDIRECTION_COLUMN)?) {
            Indirection::None => base_rid,
            Indirection::Tail(rid) => rid,
        };

        while cursor != base_rid {
            let tail = self
                .directory
                .get(cursor)
                .ok_or(LStoreError::BrokenChain(base_rid))?;
            rids.push(cursor);
            cursor = Rid::from_cell(read_cell(range, &tail, INDIRECTION_COLUMN)?)
                .ok_or(LStoreError::BrokenChain(base_rid))?;
        }
        Ok(rids)
    }

    /// Every value a column has held, newest first, ending with the base value
    /// (caller holds the range writer lock)
    fn column_history(
        &self,
        range: &PageRange,
        base_rid: Rid,
        base: &RecordLocation,
        column: usize,
    ) -> Result<Vec<i64>> {
        let cell = METADATA_COLUMNS + column;
        let mut values = Vec::new();
        for rid in self.chain_rids(range, base_rid, base)? {
            let tail = self
                .directory
                .get(rid)
                .ok_or(LStoreError::BrokenChain(base_rid))?;
            if read_cell(range, &tail, SCHEMA_ENCODING_COLUMN)? & bit(column) != 0 {
                values.push(read_cell(range, &tail, cell)? as i64);
            }
        }
        values.push(read_cell(range, base, cell)? as i64);
        Ok(values)
    }

    fn record_at(&self, base_rid: Rid, projection: &[bool], relative_version: usize) -> Result<Option<Record>> {
        let all_columns: Vec<usize> = (0..self.num_columns).collect();
        Ok(self
            .resolve(base_rid, &all_columns, relative_version)?
            .map(|values| self.project(base_rid, &values, projection)))
    }

    fn project(&self, rid: Rid, values: &[i64], projection: &[bool]) -> Record {
        Record {
            rid,
            key: values[self.key],
            columns: values
                .iter()
                .zip(projection)
                .map(|(&value, &wanted)| wanted.then_some(value))
                .collect(),
        }
    }

    fn last_range(&self) -> (usize, Arc<RangeSlot>) {
        let ranges = self.ranges.read();
        let index = ranges.len() - 1;
        (index, Arc::clone(&ranges[index]))
    }

    fn range_slot(&self, index: usize) -> Result<Arc<RangeSlot>> {
        self.ranges
            .read()
            .get(index)
            .cloned()
            .ok_or(LStoreError::RangeNotFound(index))
    }

    /// Append a page range once range `full` has run out of base space
    fn allocate_range(&self, full: usize) -> Result<()> {
        let mut ranges = self.ranges.write();
        if ranges.len() != full + 1 {
            // Another writer already allocated one
            return Ok(());
        }
        if let Some(max) = self.config.max_page_ranges {
            if ranges.len() >= max {
                return Err(LStoreError::CapacityExceeded(format!(
                    "table '{}' reached its limit of {} page ranges",
                    self.name, max
                )));
            }
        }

        ranges.push(Arc::new(RangeSlot::new(self.total_columns())));
        tracing::debug!("Allocated page range {} for '{}'", ranges.len() - 1, self.name);
        Ok(())
    }

    fn key_lock(&self, key: i64) -> &Mutex<()> {
        let stripe = (key as u64) % self.key_locks.len() as u64;
        &self.key_locks[stripe as usize]
    }

    fn check_width(&self, actual: usize) -> Result<()> {
        if actual != self.num_columns {
            return Err(LStoreError::ColumnCountMismatch {
                expected: self.num_columns,
                actual,
            });
        }
        Ok(())
    }

    fn check_column(&self, column: usize) -> Result<()> {
        if column >= self.num_columns {
            return Err(LStoreError::InvalidColumn {
                column,
                num_columns: self.num_columns,
            });
        }
        Ok(())
    }
}

// =============================================================================
// Cell Helpers
// =============================================================================

fn bit(column: usize) -> u64 {
    1u64 << column
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

fn tail_row(indirection: Rid, rid: Rid, timestamp: u64, schema: u64, values: &[u64]) -> Vec<u64> {
    let mut row = Vec::with_capacity(METADATA_COLUMNS + values.len());
    row.extend([indirection.get(), rid.get(), timestamp, schema]);
    row.extend_from_slice(values);
    row
}

fn read_cell(range: &PageRange, location: &RecordLocation, column: usize) -> Result<u64> {
    let offset = location.offset(column).ok_or(LStoreError::InvalidColumn {
        column,
        num_columns: location.offsets.len(),
    })?;
    range
        .read(location.slot, column, offset)
        .ok_or(LStoreError::InvalidOffset(offset))
}

fn replace_cell(range: &PageRange, location: &RecordLocation, column: usize, value: u64) -> Result<()> {
    let offset = location.offset(column).ok_or(LStoreError::InvalidColumn {
        column,
        num_columns: location.offsets.len(),
    })?;
    range.replace(location.slot, column, offset, value)
}
