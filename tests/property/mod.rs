//! Property-based tests for merge guarantees

mod determinism;
