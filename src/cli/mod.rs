//! Command-line parsing for the volatility dashboard.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! dashboard and API code. Settings validation lives in `crate::config`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::dashboard::ViewMode;
use crate::domain::Horizon;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "vdash",
    version,
    about = "Food price volatility dashboard (hybrid LSTM + GARCH forecasts)"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Launch the interactive dashboard (default).
    Tui(TuiArgs),
    /// List the selectable items and regions.
    Items,
    /// Print the predicted variance series for one horizon.
    Predict(PredictArgs),
    /// Print the predicted variance series for all horizons side by side.
    PredictMulti(PredictMultiArgs),
}

/// Options shared by every subcommand.
#[derive(Debug, Args, Clone)]
pub struct GlobalArgs {
    /// Base URL of the forecast API (endpoints live under `<url>/api/`).
    #[arg(long, env = "VDASH_API_URL", default_value = "http://localhost:8000", global = true)]
    pub api_url: String,

    /// Per-request timeout in seconds.
    #[arg(long, env = "VDASH_TIMEOUT_SECS", default_value_t = 10, global = true)]
    pub timeout_secs: u64,

    /// Log file used while the dashboard owns the terminal.
    #[arg(long, env = "VDASH_LOG_FILE", default_value = "vdash.log", global = true)]
    pub log_file: PathBuf,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Options for the interactive dashboard.
#[derive(Debug, Args, Clone)]
pub struct TuiArgs {
    /// Start in the single-horizon or multi-horizon view.
    #[arg(long, value_enum, default_value_t = ViewMode::Single)]
    pub view: ViewMode,

    /// Preselect an item code instead of the first one.
    #[arg(long)]
    pub item: Option<i64>,

    /// Preselect a region instead of the first one.
    #[arg(long = "state")]
    pub region: Option<String>,

    /// Initial forecast horizon in days.
    #[arg(long, value_enum, default_value_t = Horizon::D1)]
    pub horizon: Horizon,
}

/// Options for a one-horizon prediction.
#[derive(Debug, Args, Clone)]
pub struct PredictArgs {
    /// Item code.
    #[arg(long)]
    pub item: i64,

    /// Region (sent as `state`).
    #[arg(long = "state")]
    pub region: String,

    /// Forecast horizon in days.
    #[arg(long, value_enum, default_value_t = Horizon::D1)]
    pub horizon: Horizon,
}

/// Options for an all-horizon prediction.
#[derive(Debug, Args, Clone)]
pub struct PredictMultiArgs {
    /// Item code.
    #[arg(long)]
    pub item: i64,

    /// Region (sent as `state`).
    #[arg(long = "state")]
    pub region: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_predict_with_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "vdash", "predict", "--item", "101", "--state", "CA", "--horizon", "7", "--api-url",
            "http://forecast:9000",
        ])
        .unwrap();

        assert_eq!(cli.global.api_url, "http://forecast:9000");
        let Command::Predict(args) = cli.command else {
            panic!("expected predict");
        };
        assert_eq!(args.item, 101);
        assert_eq!(args.region, "CA");
        assert_eq!(args.horizon, Horizon::D7);
    }

    #[test]
    fn rejects_unknown_horizon() {
        let res = Cli::try_parse_from(["vdash", "predict", "--item", "1", "--state", "CA", "--horizon", "14"]);
        assert!(res.is_err());
    }

    #[test]
    fn tui_defaults() {
        let cli = Cli::try_parse_from(["vdash", "tui"]).unwrap();
        let Command::Tui(args) = cli.command else {
            panic!("expected tui");
        };
        assert_eq!(args.view, ViewMode::Single);
        assert_eq!(args.horizon, Horizon::D1);
        assert!(args.item.is_none() && args.region.is_none());
    }
}
