//! Error types for LStore
//!
//! Provides a unified error type for all table, index and catalog operations.

use thiserror::Error;

use crate::rid::Rid;

/// Result type alias using LStoreError
pub type Result<T> = std::result::Result<T, LStoreError>;

/// Unified error type for LStore operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LStoreError {
    // -------------------------------------------------------------------------
    // Record Errors
    // -------------------------------------------------------------------------
    #[error("Duplicate primary key: {0}")]
    DuplicateKey(i64),

    #[error("Record not found for key {0}")]
    RecordNotFound(i64),

    #[error("Primary key {key} cannot be changed to {attempted}")]
    PrimaryKeyUpdate { key: i64, attempted: i64 },

    #[error("Column {column} out of range for table with {num_columns} columns")]
    InvalidColumn { column: usize, num_columns: usize },

    #[error("Expected {expected} columns, got {actual}")]
    ColumnCountMismatch { expected: usize, actual: usize },

    #[error("Aggregate overflowed a 64-bit integer")]
    Overflow,

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(String),

    #[error("No cell written at offset {0}")]
    InvalidOffset(usize),

    #[error("Page range {0} does not exist")]
    RangeNotFound(usize),

    #[error("Version chain of {0} could not be resolved")]
    BrokenChain(Rid),

    // -------------------------------------------------------------------------
    // Index Errors
    // -------------------------------------------------------------------------
    #[error("Index corruption on column {column}: value {value} has {matches} live records")]
    IndexCorruption {
        column: usize,
        value: i64,
        matches: usize,
    },

    #[error("No index on column {0}")]
    IndexDropped(usize),

    // -------------------------------------------------------------------------
    // Catalog Errors
    // -------------------------------------------------------------------------
    #[error("Table already exists: {0}")]
    TableExists(String),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}
