//! testfold: summarize `go test -json` output
//!
//! Reads the event stream from a file or stdin, prints a per-package report,
//! and exits with a code describing why the run failed.

use std::io;
use std::process::ExitCode;

use clap::Parser;
use testfold::config::Config;
use testfold::run::run;
use tracing::error;

fn main() -> ExitCode {
    let config = Config::parse();

    // Logs go to stderr; stdout carries the report
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(config.log_level().into()),
        )
        .init();

    let mut stdout = io::stdout().lock();
    match run(&config, &mut stdout) {
        Ok(outcome) => ExitCode::from(u8::try_from(outcome.exit_code()).unwrap_or(1)),
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
