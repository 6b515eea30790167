//! Deletes that force borrowing, merging and root collapse.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::e2e_tests::helpers::{TestDir, keys};

#[test]
fn test_delete_everything_in_random_order() {
    for (seed, branching_factor) in [(1, 2), (2, 3), (3, 4)] {
        let dir = TestDir::with_branching_factor(branching_factor);
        let mut store = dir.open::<u32, u32>("Shrink");
        let mut all: Vec<u32> = (0..400).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        all.shuffle(&mut rng);
        for &key in &all {
            store.insert(key, key * 2, false).unwrap();
        }
        let grown = store.tree().depth();

        all.shuffle(&mut rng);
        for (deleted, &key) in all.iter().enumerate() {
            assert_eq!(store.delete(&key).unwrap(), Some(key * 2));
            if deleted % 37 == 0 {
                store.tree().check_invariants().unwrap();
            }
        }
        assert!(store.is_empty());
        assert!(grown > store.tree().depth());
        store.tree().check_invariants().unwrap();
        drop(store);

        let reopened = dir.open::<u32, u32>("Shrink");
        assert!(reopened.is_empty());
    }
}

#[test]
fn test_delete_half_and_reopen() {
    let dir = TestDir::with_branching_factor(2);
    let mut store = dir.open::<u32, u32>("Half");
    for key in 0..256 {
        store.insert(key, key, false).unwrap();
    }
    for key in (0..256).filter(|k| k % 2 == 1) {
        store.delete(&key).unwrap();
    }
    let expected: Vec<u32> = (0..256).step_by(2).collect();
    assert_eq!(keys(&store), expected);
    drop(store);

    let reopened = dir.open::<u32, u32>("Half");
    assert_eq!(keys(&reopened), expected);
    reopened.tree().check_invariants().unwrap();
}
