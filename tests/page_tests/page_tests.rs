//! Page and PageRange Tests
//!
//! Tests verify:
//! - Append, read and in-place replace of cells
//! - Capacity limits
//! - Row writes across page-groups
//! - Base area exhaustion and tail growth

use lstore::page::{Page, PageGroup, PageRange, Slot, CELLS_PER_PAGE, CELL_SIZE, MAX_BASE_PAGES, PAGE_SIZE};
use lstore::LStoreError;

// =============================================================================
// Page Tests
// =============================================================================

#[test]
fn test_new_page_is_empty() {
    let page = Page::new();
    assert!(page.is_empty());
    assert_eq!(page.size(), 0);
    assert_eq!(page.num_records(), 0);
    assert!(page.has_capacity(CELL_SIZE));
}

#[test]
fn test_write_returns_sequential_offsets() {
    let page = Page::new();

    assert_eq!(page.write(11).unwrap(), 0);
    assert_eq!(page.write(22).unwrap(), 8);
    assert_eq!(page.write(33).unwrap(), 16);

    assert_eq!(page.read(0), Some(11));
    assert_eq!(page.read(8), Some(22));
    assert_eq!(page.read(16), Some(33));
    assert_eq!(page.num_records(), 3);
}

#[test]
fn test_read_unwritten_or_misaligned_offset() {
    let page = Page::new();
    page.write(7).unwrap();

    assert_eq!(page.read(8), None);
    assert_eq!(page.read(3), None);
}

#[test]
fn test_replace_overwrites_in_place() {
    let page = Page::new();
    let offset = page.write(1).unwrap();

    page.replace(offset, 99).unwrap();

    assert_eq!(page.read(offset), Some(99));
    assert_eq!(page.num_records(), 1);
}

#[test]
fn test_replace_unwritten_offset_fails() {
    let page = Page::new();
    assert_eq!(page.replace(0, 1), Err(LStoreError::InvalidOffset(0)));
}

#[test]
fn test_page_fills_to_capacity() {
    let page = Page::new();
    for i in 0..CELLS_PER_PAGE {
        page.write(i as u64).unwrap();
    }

    assert_eq!(page.size(), PAGE_SIZE);
    assert!(!page.has_capacity(CELL_SIZE));
    assert!(matches!(page.write(0), Err(LStoreError::CapacityExceeded(_))));
    assert_eq!(page.read(PAGE_SIZE - CELL_SIZE), Some((CELLS_PER_PAGE - 1) as u64));
}

#[test]
fn test_negative_values_round_trip_through_cells() {
    let page = Page::new();
    let offset = page.write((-42i64) as u64).unwrap();
    assert_eq!(page.read(offset).map(|cell| cell as i64), Some(-42));
}

// =============================================================================
// PageGroup Tests
// =============================================================================

#[test]
fn test_group_writes_one_cell_per_column() {
    let group = PageGroup::new(3);

    let offsets = group.write_row(&[1, 2, 3]).unwrap();
    assert_eq!(offsets, vec![0, 0, 0]);

    let offsets = group.write_row(&[4, 5, 6]).unwrap();
    assert_eq!(offsets, vec![8, 8, 8]);

    assert_eq!(group.read(2, 8), Some(6));
    assert_eq!(group.num_records(), 2);
}

#[test]
fn test_group_rejects_wrong_width() {
    let group = PageGroup::new(3);
    assert_eq!(
        group.write_row(&[1, 2]),
        Err(LStoreError::ColumnCountMismatch {
            expected: 3,
            actual: 2
        })
    );
    assert_eq!(group.num_records(), 0);
}

#[test]
fn test_full_group_rejects_row_without_partial_write() {
    let group = PageGroup::new(2);
    for i in 0..CELLS_PER_PAGE as u64 {
        group.write_row(&[i, i]).unwrap();
    }

    assert!(!group.has_capacity());
    assert!(matches!(
        group.write_row(&[0, 0]),
        Err(LStoreError::CapacityExceeded(_))
    ));
    assert_eq!(group.num_records(), CELLS_PER_PAGE);
}

// =============================================================================
// PageRange Tests
// =============================================================================

#[test]
fn test_slot_index_mapping() {
    assert_eq!(Slot::Base(3).page_slot_index(), 3);
    assert_eq!(Slot::Tail(0).page_slot_index(), MAX_BASE_PAGES);
    assert_eq!(Slot::from_page_slot_index(MAX_BASE_PAGES + 2), Slot::Tail(2));
    assert_eq!(Slot::from_page_slot_index(5), Slot::Base(5));
}

#[test]
fn test_base_writes_move_to_next_group_when_full() {
    let range = PageRange::new(2);
    for i in 0..CELLS_PER_PAGE as u64 {
        let (group, _) = range.write_base(&[i, i]).unwrap().unwrap();
        assert_eq!(group, 0);
    }

    let (group, offsets) = range.write_base(&[7, 7]).unwrap().unwrap();
    assert_eq!(group, 1);
    assert_eq!(offsets, vec![0, 0]);
    assert_eq!(range.current_base_group(), 1);
    assert_eq!(range.read(Slot::Base(1), 1, 0), Some(7));
}

#[test]
fn test_base_area_exhaustion_reports_none() {
    let range = PageRange::new(1);
    for i in 0..(MAX_BASE_PAGES * CELLS_PER_PAGE) as u64 {
        assert!(range.write_base(&[i]).unwrap().is_some());
    }

    assert!(range.is_base_full());
    assert!(range.write_base(&[0]).unwrap().is_none());
    assert_eq!(range.base_record_count(), MAX_BASE_PAGES * CELLS_PER_PAGE);
}

#[test]
fn test_tail_groups_allocated_on_demand() {
    let range = PageRange::new(1);
    assert_eq!(range.tail_group_count(), 0);

    let (group, offsets) = range.write_tail(&[5]).unwrap();
    assert_eq!(group, 0);
    assert_eq!(offsets, vec![0]);
    assert_eq!(range.tail_group_count(), 1);

    for i in 1..CELLS_PER_PAGE as u64 {
        range.write_tail(&[i]).unwrap();
    }
    let (group, _) = range.write_tail(&[9]).unwrap();
    assert_eq!(group, 1);
    assert_eq!(range.tail_group_count(), 2);
    assert_eq!(range.read(Slot::Tail(1), 0, 0), Some(9));
}

#[test]
fn test_explicit_tail_group_allocation() {
    let range = PageRange::new(3);
    assert_eq!(range.allocate_new_tail_group(), 0);
    assert_eq!(range.allocate_new_tail_group(), 1);
    assert_eq!(range.tail_group_count(), 2);

    let (group, _) = range.write_tail(&[1, 2, 3]).unwrap();
    assert_eq!(group, 1);
}

#[test]
fn test_range_replace_and_missing_groups() {
    let range = PageRange::new(2);
    let (group, offsets) = range.write_base(&[1, 2]).unwrap().unwrap();

    range.replace(Slot::Base(group), 0, offsets[0], 10).unwrap();
    assert_eq!(range.read(Slot::Base(group), 0, offsets[0]), Some(10));

    assert_eq!(range.read(Slot::Tail(0), 0, 0), None);
    assert!(range.replace(Slot::Tail(4), 0, 0, 1).is_err());
}
