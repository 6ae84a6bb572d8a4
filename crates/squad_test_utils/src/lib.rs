//! # Squad Test Utilities
//!
//! Shared testing utilities for all crates:
//! - Determinism test harness
//! - Fixture archetypes and scenarios
//! - A presentation sink that records intents
//! - Property-based testing strategies

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod determinism;
pub mod fixtures;
pub mod recording;

/// Re-export proptest for convenience.
pub use proptest;
