//! `vdash` library crate.
//!
//! The binary (`vdash`) is a thin wrapper around this library so that:
//!
//! - the dashboard state machine is testable without a terminal
//! - the API client is testable against a mock server
//! - the TUI stays a presentation layer over `dashboard`

pub mod app;
pub mod cli;
pub mod config;
pub mod dashboard;
pub mod data;
pub mod domain;
pub mod error;
pub mod report;
pub mod telemetry;
pub mod tui;
