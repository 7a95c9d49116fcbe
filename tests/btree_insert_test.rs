//! spec.md §8 scenario 1 and the "many small splits" property, exercised
//! as a black-box integration test against the crate's public API rather
//! than inline unit tests.

mod common;

use latchtree::btree::key::Key8;
use latchtree::btree::page_id::PageCategory;
use latchtree::rid::Rid;
use latchtree::{BTreeIndex, IsolationLevel, Transaction};

fn k(v: i64) -> Key8 {
    Key8::from_i64(v)
}

#[test]
fn leaf_split_produces_internal_root() {
    common::setup();
    let tree: BTreeIndex<Key8> = BTreeIndex::new(3, 3);
    let txn = Transaction::new(IsolationLevel::ReadCommitted);

    for i in 1..=4 {
        tree.insert(k(i), Rid::new(i as u32, 0), &txn).unwrap();
    }

    assert_eq!(tree.root_page_id().category, PageCategory::Internal);
    for i in 1..=4 {
        assert_eq!(tree.get_value(&k(i)), Some(Rid::new(i as u32, 0)));
    }
    tree.check_integrity();
}

#[test]
fn repeated_splits_keep_every_key_reachable_in_order() {
    common::setup();
    let tree: BTreeIndex<Key8> = BTreeIndex::new(4, 4);
    let txn = Transaction::new(IsolationLevel::ReadCommitted);

    for i in 0..500 {
        tree.insert(k(i), Rid::new(i as u32, 0), &txn).unwrap();
    }
    tree.check_integrity();

    let collected: Vec<i64> = tree.begin().map(|(key, _)| key.to_i64()).collect();
    assert_eq!(collected, (0..500).collect::<Vec<_>>());
}

#[test]
fn out_of_order_inserts_land_in_sorted_position() {
    common::setup();
    let tree: BTreeIndex<Key8> = BTreeIndex::new(4, 4);
    let txn = Transaction::new(IsolationLevel::ReadCommitted);

    for &i in &[50, 10, 90, 30, 70, 20, 80, 40, 60, 0] {
        tree.insert(k(i), Rid::new(i as u32, 0), &txn).unwrap();
    }
    tree.check_integrity();

    let collected: Vec<i64> = tree.begin().map(|(key, _)| key.to_i64()).collect();
    assert_eq!(collected, vec![0, 10, 20, 30, 40, 50, 60, 70, 80, 90]);
}
