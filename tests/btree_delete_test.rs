//! spec.md §8 scenario 2 ("removing down to an empty tree collapses the
//! root") and the insert/remove round-trip law, at the integration level.

mod common;

use latchtree::btree::key::Key8;
use latchtree::rid::Rid;
use latchtree::{BTreeIndex, IsolationLevel, Transaction};

fn k(v: i64) -> Key8 {
    Key8::from_i64(v)
}

#[test]
fn removing_everything_collapses_to_an_empty_tree() {
    common::setup();
    let tree: BTreeIndex<Key8> = BTreeIndex::new(3, 3);
    let txn = Transaction::new(IsolationLevel::ReadCommitted);

    for i in 0..30 {
        tree.insert(k(i), Rid::new(i as u32, 0), &txn).unwrap();
    }
    tree.check_integrity();

    for i in 0..30 {
        tree.remove(&k(i), &txn).unwrap();
    }

    assert!(tree.is_empty());
    assert_eq!(tree.get_value(&k(0)), None);
}

#[test]
fn interleaved_insert_and_remove_preserves_the_surviving_key_set() {
    common::setup();
    let tree: BTreeIndex<Key8> = BTreeIndex::new(4, 4);
    let txn = Transaction::new(IsolationLevel::ReadCommitted);

    for i in 0..200 {
        tree.insert(k(i), Rid::new(i as u32, 0), &txn).unwrap();
        if i % 5 == 0 && i > 0 {
            tree.remove(&k(i - 1), &txn).unwrap();
        }
    }
    tree.check_integrity();

    for i in 0..200 {
        let removed = i > 0 && i % 5 == 1;
        if removed {
            assert_eq!(tree.get_value(&k(i - 1)), None);
        }
    }
}

#[test]
fn deleting_a_missing_key_is_a_harmless_noop() {
    common::setup();
    let tree: BTreeIndex<Key8> = BTreeIndex::new(4, 4);
    let txn = Transaction::new(IsolationLevel::ReadCommitted);
    tree.insert(k(1), Rid::new(1, 0), &txn).unwrap();

    tree.remove(&k(999), &txn).unwrap();

    assert_eq!(tree.get_value(&k(1)), Some(Rid::new(1, 0)));
}
