//! Query Module
//!
//! Thin facade over a [`Table`] with the classic query verbs. Mutating verbs
//! report failure as `false`; every error is logged at debug level so the
//! cause is not lost.

use std::sync::Arc;

use crate::error::Result;
use crate::table::{Record, Table, LATEST_VERSION};

/// Query verbs bound to one table
pub struct Query {
    table: Arc<Table>,
}

impl Query {
    pub fn new(table: Arc<Table>) -> Self {
        Self { table }
    }

    /// Insert a record; false on duplicate key or bad width
    pub fn insert(&self, columns: &[i64]) -> bool {
        succeeded("insert", self.table.insert(columns).map(|_| ()))
    }

    /// Update a record; false if the key does not exist
    pub fn update(&self, primary_key: i64, columns: &[Option<i64>]) -> bool {
        succeeded("update", self.table.update(primary_key, columns))
    }

    /// Delete a record; false if the key does not exist
    pub fn delete(&self, primary_key: i64) -> bool {
        succeeded("delete", self.table.delete(primary_key))
    }

    /// Latest version of every record whose `search_column` equals `search_key`
    pub fn select(&self, search_key: i64, search_column: usize, projection: &[bool]) -> Result<Vec<Record>> {
        self.select_version(search_key, search_column, projection, LATEST_VERSION)
    }

    /// Like [`Query::select`], `relative_version` updates back
    pub fn select_version(
        &self,
        search_key: i64,
        search_column: usize,
        projection: &[bool],
        relative_version: usize,
    ) -> Result<Vec<Record>> {
        self.table
            .select(search_key, search_column, projection, relative_version)
    }

    /// Sum of `column` over keys in `[start, end]`; `None` if no key is live
    pub fn sum(&self, start: i64, end: i64, column: usize) -> Option<i64> {
        self.sum_version(start, end, column, LATEST_VERSION)
    }

    pub fn sum_version(&self, start: i64, end: i64, column: usize, relative_version: usize) -> Option<i64> {
        match self.table.sum_range(start, end, column, relative_version) {
            Ok(total) => Some(total),
            Err(e) => {
                tracing::debug!("sum over [{}, {}] failed: {}", start, end, e);
                None
            }
        }
    }

    /// Add one to a column of a record; false if the key does not exist,
    /// the column is the primary key, or the value would overflow
    pub fn increment(&self, key: i64, column: usize) -> bool {
        succeeded("increment", self.table.increment(key, column).map(|_| ()))
    }

    pub fn table(&self) -> &Arc<Table> {
        &self.table
    }
}

fn succeeded(verb: &str, result: Result<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!("{} failed: {}", verb, e);
            false
        }
    }
}
