//! Property-based tests for key fingerprint determinism

use proptest::prelude::*;
use querybind::{KeyPart, QueryKey};

fn key_part() -> impl Strategy<Value = KeyPart> {
    prop_oneof![
        any::<String>().prop_map(KeyPart::from),
        any::<i64>().prop_map(KeyPart::from),
        any::<bool>().prop_map(KeyPart::from),
    ]
}

/// Equal keys always hash the same, unequal keys (almost) never do
#[test]
fn test_fingerprint_follows_key_equality() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(
            &(
                prop::collection::vec(key_part(), 1..6),
                prop::collection::vec(key_part(), 1..6),
            ),
            |(left, right)| {
                let a = QueryKey::new(left.clone());
                let b = QueryKey::new(right.clone());

                assert_eq!(a.fingerprint(), QueryKey::new(left).fingerprint());
                if a == b {
                    assert_eq!(a.fingerprint(), b.fingerprint());
                } else {
                    prop_assume!(a.fingerprint() != b.fingerprint());
                }
                Ok(())
            },
        )
        .unwrap();
}

/// A target string and its single-part key are interchangeable
#[test]
fn test_target_key_matches_single_part_key() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&any::<String>(), |target| {
            let from_target = QueryKey::for_target(&target);
            let explicit = QueryKey::new([target.as_str()]);
            assert_eq!(from_target, explicit);
            assert_eq!(from_target.fingerprint(), explicit.fingerprint());
            assert_eq!(from_target.fingerprint().to_hex().len(), 64);
            Ok(())
        })
        .unwrap();
}

/// String "1" and number 1 are different key parts
#[test]
fn test_part_types_are_distinguished() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&any::<i64>(), |n| {
            let numeric = QueryKey::new([KeyPart::from(n)]);
            let text = QueryKey::new([KeyPart::from(n.to_string())]);
            assert_ne!(numeric.fingerprint(), text.fingerprint());
            Ok(())
        })
        .unwrap();
}
