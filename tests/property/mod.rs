//! Property-based tests for binding invariants and key hashing

mod key_determinism;
