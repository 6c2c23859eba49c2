// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Wire the configured input through the parser and out to the report

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};

use anyhow::{Context, Result};
use testfold_events::{RunOutcome, StreamParser, outcome};
use tracing::{debug, info};

use crate::config::Config;
use crate::report::{ReportOptions, write_report};

/// Parse the configured input, write the report to `out`, and return the run outcome
///
/// # Errors
///
/// Returns an error if the configuration is invalid, the input cannot be opened
/// or parsed, the parsed packages are inconsistent, or writing fails.
pub fn run<W: Write>(config: &Config, out: &mut W) -> Result<RunOutcome> {
    config.validate()?;

    let reader: Box<dyn BufRead> = match &config.file {
        Some(path) => {
            debug!(path = %path.display(), "reading from file");
            let file = File::open(path)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            Box::new(BufReader::new(file))
        }
        None => {
            debug!("reading from stdin");
            Box::new(io::stdin().lock())
        }
    };

    let mut parser = if config.dump {
        StreamParser::with_replay()
    } else {
        StreamParser::new()
    };

    let packages = match parser.read_all(reader).and_then(|()| parser.finish()) {
        Ok(packages) => packages,
        Err(err) => {
            if err.is_not_parseable() {
                if let Some(raw) = parser.take_replay() {
                    out.write_all(raw.as_bytes())
                        .context("Failed to dump raw input")?;
                }
            }
            return Err(err).context("Failed to parse go test output");
        }
    };

    let run_outcome = outcome::evaluate(&packages).context("Inconsistent test results")?;
    info!(
        packages = packages.len(),
        tests = packages.tests_total(),
        "parsed test output"
    );

    if config.json {
        serde_json::to_writer_pretty(&mut *out, &packages)
            .context("Failed to write JSON summary")?;
        writeln!(out)?;
    } else {
        let options = ReportOptions {
            sort: config.sort,
            show_all: config.all,
        };
        write_report(out, &packages, run_outcome, options).context("Failed to write report")?;
    }

    Ok(run_outcome)
}
