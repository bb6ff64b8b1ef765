//! # LStore
//!
//! A column-oriented, log-structured record store with:
//! - Append-only base and tail pages (data is never overwritten)
//! - Versioned reads through per-record indirection chains
//! - Multi-value B-tree indexes on every column
//! - Background compaction of tail chains into fresh base pages
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Database (table catalog)                     │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                   Query facade                               │
//! │     insert / select / update / delete / sum / increment      │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                      Table                                   │
//! │   key locks → directory (RID → page address) → versioning    │
//! └──────┬──────────────────────┬────────────────────┬──────────┘
//!        │                      │                    │
//!        ▼                      ▼                    ▼
//!  ┌───────────┐         ┌─────────────┐      ┌─────────────┐
//!  │ PageRange │         │    Index    │      │ Merge worker│
//!  │ base+tail │         │ (B-tree per │      │ (crossbeam  │
//!  │  groups   │         │   column)   │      │  channel)   │
//!  └───────────┘         └─────────────┘      └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod rid;
pub mod page;
pub mod index;
pub mod table;
pub mod db;
pub mod query;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::{Config, MergeMode};
pub use db::Database;
pub use error::{LStoreError, Result};
pub use query::Query;
pub use rid::{Indirection, Rid};
pub use table::{Record, Table, TableStats, LATEST_VERSION};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of LStore
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
