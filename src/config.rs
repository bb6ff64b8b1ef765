//! Configuration for LStore
//!
//! Centralized configuration with sensible defaults.

use crate::error::{LStoreError, Result};

/// Main configuration shared by every table of a database
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Compaction Configuration
    // -------------------------------------------------------------------------
    /// A page range is compacted once its tail-group count exceeds this
    pub merge_threshold_pages: usize,

    /// Where compaction runs once the threshold is crossed
    pub merge_mode: MergeMode,

    // -------------------------------------------------------------------------
    // Index Configuration
    // -------------------------------------------------------------------------
    /// Minimum degree of every column B-tree (nodes hold up to 2t - 1 keys)
    pub index_degree: usize,

    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Hard cap on page ranges per table (`None` = unbounded)
    pub max_page_ranges: Option<usize>,

    // -------------------------------------------------------------------------
    // Concurrency Configuration
    // -------------------------------------------------------------------------
    /// Number of striped writer locks; writers on keys in different stripes
    /// proceed in parallel
    pub lock_stripes: usize,
}

/// Compaction scheduling strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    /// Never compact automatically (explicit `merge_range` calls still work)
    Disabled,

    /// Compact on the writer thread that crossed the threshold
    Inline,

    /// Hand the range to the table's background merge worker
    Background,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            merge_threshold_pages: 50,
            merge_mode: MergeMode::Background,
            index_degree: 100,
            max_page_ranges: None,
            lock_stripes: 64,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.index_degree < 2 {
            return Err(LStoreError::Config(format!(
                "index_degree must be at least 2, got {}",
                self.index_degree
            )));
        }
        if self.lock_stripes == 0 {
            return Err(LStoreError::Config(
                "lock_stripes must be non-zero".to_string(),
            ));
        }
        if self.max_page_ranges == Some(0) {
            return Err(LStoreError::Config(
                "max_page_ranges must allow at least one range".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the tail-group count that triggers compaction
    pub fn merge_threshold_pages(mut self, pages: usize) -> Self {
        self.config.merge_threshold_pages = pages;
        self
    }

    /// Set the compaction scheduling strategy
    pub fn merge_mode(mut self, mode: MergeMode) -> Self {
        self.config.merge_mode = mode;
        self
    }

    /// Set the B-tree minimum degree
    pub fn index_degree(mut self, degree: usize) -> Self {
        self.config.index_degree = degree;
        self
    }

    /// Cap the number of page ranges a table may allocate
    pub fn max_page_ranges(mut self, ranges: usize) -> Self {
        self.config.max_page_ranges = Some(ranges);
        self
    }

    /// Set the number of writer lock stripes
    pub fn lock_stripes(mut self, stripes: usize) -> Self {
        self.config.lock_stripes = stripes;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
