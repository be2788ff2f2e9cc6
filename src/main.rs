use std::process::ExitCode;

fn main() -> ExitCode {
    match vdash::app::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "exiting");
            eprintln!("{err}");
            ExitCode::from(err.exit_code())
        }
    }
}
