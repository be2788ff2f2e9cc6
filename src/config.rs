//! Runtime settings.
//!
//! Sources, lowest to highest precedence: built-in defaults, `.env` (loaded
//! with `dotenvy` before argument parsing), process environment, CLI flags.
//! Clap resolves the layering; this module validates the result.

use std::path::PathBuf;
use std::time::Duration;

use reqwest::Url;

use crate::cli::GlobalArgs;
use crate::data::{ForecastClient, parse_base_url};
use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Settings {
    pub api_url: Url,
    pub timeout: Duration,
    pub log_file: PathBuf,
    pub verbose: bool,
}

impl Settings {
    pub fn from_args(args: &GlobalArgs) -> Result<Self, AppError> {
        let api_url = parse_base_url(&args.api_url)?;
        if args.timeout_secs == 0 {
            return Err(AppError::new(2, "--timeout-secs must be at least 1."));
        }
        Ok(Self {
            api_url,
            timeout: Duration::from_secs(args.timeout_secs),
            log_file: args.log_file.clone(),
            verbose: args.verbose,
        })
    }

    pub fn client(&self) -> Result<ForecastClient, AppError> {
        Ok(ForecastClient::new(self.api_url.as_str(), self.timeout)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(api_url: &str, timeout_secs: u64) -> GlobalArgs {
        GlobalArgs {
            api_url: api_url.to_string(),
            timeout_secs,
            log_file: PathBuf::from("vdash.log"),
            verbose: false,
        }
    }

    #[test]
    fn valid_settings() {
        let s = Settings::from_args(&args("http://localhost:8000", 5)).unwrap();
        assert_eq!(s.api_url.as_str(), "http://localhost:8000/");
        assert_eq!(s.timeout, Duration::from_secs(5));
        assert!(s.client().is_ok());
    }

    #[test]
    fn bad_url_is_a_usage_error() {
        let err = Settings::from_args(&args("localhost:8000", 5)).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = Settings::from_args(&args("http://localhost:8000", 0)).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
