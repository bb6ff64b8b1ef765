//! Database Catalog Tests
//!
//! Tests verify:
//! - Table creation with unique names
//! - Lookup, listing and dropping
//! - Configuration is validated and shared by every table

use lstore::{Config, Database, LStoreError, MergeMode};

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_db() -> Database {
    Database::open(Config::builder().merge_mode(MergeMode::Disabled).build()).unwrap()
}

// =============================================================================
// Catalog Tests
// =============================================================================

#[test]
fn test_create_and_get_table() {
    let db = setup_db();
    let table = db.create_table("grades", 5, 0).unwrap();
    table.insert(&[1, 2, 3, 4, 5]).unwrap();

    let fetched = db.get_table("grades").unwrap();
    assert_eq!(fetched.name(), "grades");
    assert_eq!(fetched.num_columns(), 5);
    assert_eq!(fetched.read_column(4, 1, 0).unwrap(), 5);
}

#[test]
fn test_create_duplicate_table_fails() {
    let db = setup_db();
    db.create_table("grades", 2, 0).unwrap();

    assert!(matches!(
        db.create_table("grades", 3, 0),
        Err(LStoreError::TableExists(name)) if name == "grades"
    ));
    assert_eq!(db.get_table("grades").unwrap().num_columns(), 2);
}

#[test]
fn test_create_table_rejects_bad_schema() {
    let db = setup_db();
    assert!(matches!(
        db.create_table("bad", 2, 5),
        Err(LStoreError::InvalidSchema(_))
    ));
    assert!(db.get_table("bad").is_none());
}

#[test]
fn test_table_names_sorted() {
    let db = setup_db();
    for name in ["zeta", "alpha", "mid"] {
        db.create_table(name, 1, 0).unwrap();
    }
    assert_eq!(db.table_names(), vec!["alpha", "mid", "zeta"]);
}

#[test]
fn test_drop_table() {
    let db = setup_db();
    let table = db.create_table("temp", 2, 0).unwrap();
    table.insert(&[1, 1]).unwrap();

    db.drop_table("temp").unwrap();

    assert!(db.get_table("temp").is_none());
    assert_eq!(
        db.drop_table("temp"),
        Err(LStoreError::TableNotFound("temp".to_string()))
    );
    // Existing handles keep working
    assert_eq!(table.read_column(1, 1, 0).unwrap(), 1);

    // The name is free again
    db.create_table("temp", 3, 0).unwrap();
}

#[test]
fn test_tables_are_independent() {
    let db = setup_db();
    let a = db.create_table("a", 2, 0).unwrap();
    let b = db.create_table("b", 2, 0).unwrap();

    a.insert(&[1, 10]).unwrap();
    b.insert(&[1, 20]).unwrap();

    assert_eq!(a.read_column(1, 1, 0).unwrap(), 10);
    assert_eq!(b.read_column(1, 1, 0).unwrap(), 20);
}

// =============================================================================
// Configuration Tests
// =============================================================================

#[test]
fn test_open_rejects_invalid_config() {
    assert!(matches!(
        Database::open(Config::builder().lock_stripes(0).build()),
        Err(LStoreError::Config(_))
    ));
    assert!(matches!(
        Database::open(Config::builder().max_page_ranges(0).build()),
        Err(LStoreError::Config(_))
    ));
}

#[test]
fn test_tables_inherit_config() {
    let config = Config::builder()
        .merge_mode(MergeMode::Inline)
        .merge_threshold_pages(7)
        .index_degree(8)
        .build();
    let db = Database::open(config).unwrap();
    let table = db.create_table("t", 2, 0).unwrap();

    assert_eq!(table.config().merge_mode, MergeMode::Inline);
    assert_eq!(table.config().merge_threshold_pages, 7);
    assert_eq!(table.config().index_degree, 8);
    assert_eq!(db.config().index_degree, 8);
}

#[test]
fn test_default_config() {
    let config = Config::default();
    assert_eq!(config.merge_threshold_pages, 50);
    assert_eq!(config.merge_mode, MergeMode::Background);
    assert_eq!(config.max_page_ranges, None);
    assert!(config.validate().is_ok());
}

#[test]
fn test_close_drains_background_merges() {
    let db = Database::open(
        Config::builder()
            .merge_mode(MergeMode::Background)
            .merge_threshold_pages(0)
            .build(),
    )
    .unwrap();
    let table = db.create_table("busy", 2, 0).unwrap();
    table.insert(&[1, 1]).unwrap();
    table.update(1, &[None, Some(2)]).unwrap();

    db.close();

    assert_eq!(table.stats().merges, 1);
    assert_eq!(table.read_column(1, 1, 0).unwrap(), 2);
}
