//! Integration tests for the stability layer and the plant adapter.
//!
//! These tests verify end-to-end behavior across crates:
//! - Guarded solves under the shipped policy presets
//! - Adapter accelerations for healthy, ill-conditioned and degenerate models
//! - Per-thread ownership of inverters and statistics
//! - Batched evaluation with the `parallel` feature

pub mod batch_evaluation;
pub mod degenerate_models;
pub mod guarded_solves;
pub mod thread_ownership;
