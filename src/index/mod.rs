//! Index Module
//!
//! One multi-value B-tree per column, mapping a column value to every base
//! RID that currently or historically held it.
//!
//! ## Responsibilities
//! - Point lookups (`locate`) and half-open range lookups (`locate_range`)
//! - Drop per-column trees and rebuild them off to the side
//! - Prune keys of records that compaction dropped
//!
//! Entries are never removed when a value is superseded by an update; callers
//! re-check candidates against the resolved record when they need current
//! values only.
//!
//! ## Rebuilds
//! ```text
//! begin_rebuild ──► inserts land in tree + rebuild ──► finish_rebuild
//!                   backfill lands in rebuild only      rebuild becomes tree
//! ```
//! Lookups keep using the existing tree until the rebuild is promoted.

mod btree;

use std::ops::Bound;

use parking_lot::RwLock;

use crate::error::{LStoreError, Result};
use crate::rid::Rid;

pub use btree::{BTree, IndexKey};

/// Trees of one column
struct ColumnIndex {
    /// Serves lookups; `None` once dropped
    tree: Option<BTree>,

    /// Being backfilled; receives every insert until promoted
    rebuild: Option<BTree>,
}

/// Per-column indexes for one table
///
/// ## Concurrency:
/// - Each column sits behind its own RwLock, so lookups on one column
///   never wait on inserts into another
/// - An insert reaches both the serving tree and any rebuild under one
///   write lock, so promotion never loses a key
pub struct Index {
    degree: usize,
    indices: Vec<RwLock<ColumnIndex>>,
}

impl Index {
    /// Create an index with every column indexed
    pub fn new(num_columns: usize, degree: usize) -> Self {
        Self {
            degree,
            indices: (0..num_columns)
                .map(|_| {
                    RwLock::new(ColumnIndex {
                        tree: Some(BTree::new(degree)),
                        rebuild: None,
                    })
                })
                .collect(),
        }
    }

    /// RIDs of all records with `value` in `column`
    pub fn locate(&self, column: usize, value: i64) -> Result<Vec<Rid>> {
        let index = self.column(column)?.read();
        match index.tree.as_ref() {
            Some(tree) => Ok(tree.locate(value)),
            None => Err(LStoreError::IndexDropped(column)),
        }
    }

    /// RIDs of all records with a value in `[begin, end)` in `column`
    pub fn locate_range(&self, column: usize, begin: i64, end: i64) -> Result<Vec<Rid>> {
        let index = self.column(column)?.read();
        match index.tree.as_ref() {
            Some(tree) => Ok(tree.locate_range(begin, end)),
            None => Err(LStoreError::IndexDropped(column)),
        }
    }

    /// RIDs of all records with a value within arbitrary bounds
    pub fn locate_bounds(&self, column: usize, lo: Bound<i64>, hi: Bound<i64>) -> Result<Vec<Rid>> {
        let index = self.column(column)?.read();
        match index.tree.as_ref() {
            Some(tree) => Ok(tree.range(lo, hi)),
            None => Err(LStoreError::IndexDropped(column)),
        }
    }

    /// Add `(value, rid)` to a column's trees
    ///
    /// Returns true if any tree gained the key. A dropped column with no
    /// rebuild in progress is skipped.
    pub fn insert(&self, column: usize, value: i64, rid: Rid) -> Result<bool> {
        let mut index = self.column(column)?.write();
        let mut added = false;
        if let Some(tree) = index.tree.as_mut() {
            added |= tree.insert(value, rid);
        }
        if let Some(rebuild) = index.rebuild.as_mut() {
            added |= rebuild.insert(value, rid);
        }
        Ok(added)
    }

    /// Start building a fresh tree for a column, replacing any rebuild
    /// already in progress
    pub fn begin_rebuild(&self, column: usize) -> Result<()> {
        self.column(column)?.write().rebuild = Some(BTree::new(self.degree));
        Ok(())
    }

    /// Add a historical `(value, rid)` to the rebuild only
    pub fn backfill(&self, column: usize, value: i64, rid: Rid) -> Result<bool> {
        let mut index = self.column(column)?.write();
        Ok(match index.rebuild.as_mut() {
            Some(rebuild) => rebuild.insert(value, rid),
            None => false,
        })
    }

    /// Promote the rebuild to the serving tree
    ///
    /// Returns false if the rebuild was cancelled by `drop_index`.
    pub fn finish_rebuild(&self, column: usize) -> Result<bool> {
        let mut index = self.column(column)?.write();
        match index.rebuild.take() {
            Some(rebuild) => {
                index.tree = Some(rebuild);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Remove a column's tree (and any rebuild); lookups fail until it is
    /// rebuilt
    pub fn drop_index(&self, column: usize) -> Result<()> {
        let mut index = self.column(column)?.write();
        index.tree = None;
        index.rebuild = None;
        Ok(())
    }

    pub fn is_indexed(&self, column: usize) -> bool {
        self.indices
            .get(column)
            .map(|index| index.read().tree.is_some())
            .unwrap_or(false)
    }

    /// Drop every key whose RID fails `keep`, across all columns
    pub fn prune<F>(&self, keep: F) -> usize
    where
        F: Fn(Rid) -> bool,
    {
        self.indices
            .iter()
            .map(|index| {
                let mut index = index.write();
                let removed = index
                    .tree
                    .as_mut()
                    .map(|tree| tree.retain(|_, rid| keep(rid)))
                    .unwrap_or(0);
                if let Some(rebuild) = index.rebuild.as_mut() {
                    rebuild.retain(|_, rid| keep(rid));
                }
                removed
            })
            .sum()
    }

    /// Number of keys in a column's serving tree (0 when dropped)
    pub fn len(&self, column: usize) -> usize {
        self.indices
            .get(column)
            .and_then(|index| index.read().tree.as_ref().map(BTree::len))
            .unwrap_or(0)
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn num_columns(&self) -> usize {
        self.indices.len()
    }

    fn column(&self, column: usize) -> Result<&RwLock<ColumnIndex>> {
        self.indices.get(column).ok_or(LStoreError::InvalidColumn {
            column,
            num_columns: self.indices.len(),
        })
    }
}
