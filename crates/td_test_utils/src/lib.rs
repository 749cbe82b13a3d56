//! # TD Test Utilities
//!
//! Shared testing utilities for all crates:
//! - Fixed-point and position helpers
//! - Recording collaborators for lifecycle cleanup
//! - A recording entity factory for the spawn scheduler
//! - Property-based testing strategies

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod strategies;

/// Re-export proptest for convenience.
pub use proptest;
