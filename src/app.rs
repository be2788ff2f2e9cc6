//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and parses CLI arguments
//! - validates settings and sets up logging
//! - runs the dashboard or a one-shot command

use clap::Parser;

use crate::cli::{Cli, Command, PredictArgs, PredictMultiArgs};
use crate::config::Settings;
use crate::error::AppError;

/// Entry point for the `vdash` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();

    // `vdash` and `vdash --api-url ...` behave like `vdash tui ...`.
    let argv = rewrite_args(std::env::args().collect());
    let cli = Cli::parse_from(argv);
    let settings = Settings::from_args(&cli.global)?;

    match cli.command {
        Command::Tui(args) => {
            crate::telemetry::init_file_logger(&settings.log_file, settings.verbose)?;
            tracing::info!(api_url = %settings.api_url, "starting dashboard");
            crate::tui::run(&settings, args)
        }
        Command::Items => {
            crate::telemetry::init_stderr_logger(settings.verbose);
            handle_items(&settings)
        }
        Command::Predict(args) => {
            crate::telemetry::init_stderr_logger(settings.verbose);
            handle_predict(&settings, args)
        }
        Command::PredictMulti(args) => {
            crate::telemetry::init_stderr_logger(settings.verbose);
            handle_predict_multi(&settings, args)
        }
    }
}

fn handle_items(settings: &Settings) -> Result<(), AppError> {
    let metadata = settings.client()?.fetch_metadata()?;
    print!("{}", crate::report::format_metadata(&metadata));
    Ok(())
}

fn handle_predict(settings: &Settings, args: PredictArgs) -> Result<(), AppError> {
    let series = settings
        .client()?
        .fetch_series(args.item, &args.region, args.horizon)?;
    print!("{}", crate::report::format_series(&series, args.horizon));
    Ok(())
}

fn handle_predict_multi(settings: &Settings, args: PredictMultiArgs) -> Result<(), AppError> {
    let multi = settings.client()?.fetch_multi_series(args.item, &args.region)?;
    print!("{}", crate::report::format_multi(&multi));
    Ok(())
}

/// Rewrite argv so `vdash` defaults to `vdash tui`.
///
/// Rules:
/// - `vdash`                         -> `vdash tui`
/// - `vdash --view multi ...`        -> `vdash tui --view multi ...`
/// - `vdash --help/--version/-h`     -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("tui".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(
        arg1.as_str(),
        "-h" | "--help" | "-V" | "--version" | "help"
    );
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(arg1.as_str(), "tui" | "items" | "predict" | "predict-multi");
    if is_subcommand {
        return argv;
    }

    // If the first token is a flag, treat it as "tui flags".
    if arg1.starts_with('-') {
        argv.insert(1, "tui".to_string());
        return argv;
    }

    // Otherwise, leave as-is.
    argv
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn bare_invocation_starts_tui() {
        assert_eq!(rewrite_args(argv(&["vdash"])), argv(&["vdash", "tui"]));
    }

    #[test]
    fn leading_flags_go_to_tui() {
        assert_eq!(
            rewrite_args(argv(&["vdash", "--view", "multi"])),
            argv(&["vdash", "tui", "--view", "multi"])
        );
    }

    #[test]
    fn subcommands_and_help_are_untouched() {
        let predict = argv(&["vdash", "predict", "--item", "1", "--state", "CA"]);
        assert_eq!(rewrite_args(predict.clone()), predict);
        assert_eq!(rewrite_args(argv(&["vdash", "--help"])), argv(&["vdash", "--help"]));
    }
}
