//! Headless wave runner for CI and soak testing.
//!
//! Drives every `td_core` component through complete waves without a
//! renderer: the spawn scheduler feeds a straight-line zombie horde kept in
//! the spatial index, towers pick targets with closest-entity queries,
//! muzzle flashes come from an object pool with timer-driven expiry, and the
//! lifecycle orchestrator tears everything down between waves.
//!
//! The outcome of a run is a [`report::RunReport`], serialized as JSON.
//!
//! # Example
//!
//! ```bash
//! # Run the default three waves
//! cargo run -p td_headless -- run
//!
//! # Run five waves from a config file and save the report
//! cargo run -p td_headless -- run --config td.ron --waves 5 --output report.json
//! ```

pub mod error;
pub mod report;
pub mod runner;
pub mod world;

pub use error::HeadlessError;
pub use report::RunReport;
pub use runner::{HeadlessRunner, RunSettings};
