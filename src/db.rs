//! Database Module
//!
//! Catalog of named tables.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::Config;
use crate::error::{LStoreError, Result};
use crate::table::Table;

/// A set of uniquely named tables sharing one configuration
pub struct Database {
    config: Config,
    tables: RwLock<HashMap<String, Arc<Table>>>,
}

impl Database {
    /// Create an empty database with the given config
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            tables: RwLock::new(HashMap::new()),
        })
    }

    /// Create a new table
    ///
    /// Fails with `TableExists` if the name is taken.
    pub fn create_table(&self, name: &str, num_columns: usize, key_index: usize) -> Result<Arc<Table>> {
        let mut tables = self.tables.write();
        if tables.contains_key(name) {
            return Err(LStoreError::TableExists(name.to_string()));
        }

        let table = Table::new(name, num_columns, key_index, self.config.clone())?;
        tables.insert(name.to_string(), Arc::clone(&table));
        Ok(table)
    }

    /// Remove a table from the catalog
    ///
    /// Handles already held by callers stay usable until dropped.
    pub fn drop_table(&self, name: &str) -> Result<()> {
        match self.tables.write().remove(name) {
            Some(_) => {
                tracing::info!("Dropped table '{}'", name);
                Ok(())
            }
            None => Err(LStoreError::TableNotFound(name.to_string())),
        }
    }

    /// Look up a table by name
    pub fn get_table(&self, name: &str) -> Option<Arc<Table>> {
        self.tables.read().get(name).cloned()
    }

    /// Names of all tables, sorted
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Drain queued background merges on every table
    ///
    /// Pages live only in memory, so nothing is written out.
    pub fn close(&self) {
        let tables: Vec<Arc<Table>> = self.tables.read().values().cloned().collect();
        for table in tables {
            table.wait_for_merges();
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
