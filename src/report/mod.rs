//! Reporting utilities for terminal output.

pub mod format;

pub use format::{format_metadata, format_multi, format_series};
