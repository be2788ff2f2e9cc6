//! Data sources.
//!
//! The only source is the external forecast API (`forecast`).

pub mod forecast;

pub use forecast::{DEFAULT_TIMEOUT, ForecastClient, parse_base_url};
