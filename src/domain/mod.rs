//! Domain types used throughout the dashboard.
//!
//! This module defines:
//!
//! - forecast API payloads (`Item`, `Metadata`, `SeriesPoint`, `MultiSeries`)
//! - the closed set of forecast horizons (`Horizon`)

pub mod types;

pub use types::*;
