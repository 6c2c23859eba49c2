// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Command-line configuration for testfold
//!
//! This module provides the configuration type for the binary: where to read
//! `go test -json` output from, how to order and render the report, and
//! logging options.

use std::path::PathBuf;

use clap::Parser;
use testfold_events::SortOrder;

/// Summarize `go test -json` output by package
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "testfold")]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Read `go test -json` output from this file
    ///
    /// Defaults to stdin, so output can be piped:
    ///   go test ./... -json -cover | testfold
    #[arg(short, long, env = "TESTFOLD_FILE")]
    pub file: Option<PathBuf>,

    /// Package ordering: name, coverage or elapsed
    #[arg(short, long, default_value = "name", env = "TESTFOLD_SORT")]
    pub sort: SortOrder,

    /// List every test, not only failures
    #[arg(short, long, default_value = "false")]
    pub all: bool,

    /// Print the package model as JSON instead of the text report
    #[arg(long, default_value = "false")]
    pub json: bool,

    /// Echo the raw input to stdout if it cannot be parsed
    ///
    /// Useful when `go test` fails before producing any JSON, for example on
    /// a compile error in a non-test package.
    #[arg(long, default_value = "false")]
    pub dump: bool,

    /// Enable verbose logging (debug level)
    ///
    /// Logs are written to stderr so the report on stdout stays clean.
    #[arg(short, long, default_value = "false")]
    pub verbose: bool,

    /// Quiet mode - suppress info-level logs
    ///
    /// Only errors and warnings will be logged.
    #[arg(short, long, default_value = "false")]
    pub quiet: bool,
}

impl Config {
    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the input file is specified but doesn't exist or
    /// isn't a regular file.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(ref file) = self.file {
            if !file.exists() {
                return Err(ConfigError::InputNotFound(file.clone()));
            }
            if !file.is_file() {
                return Err(ConfigError::InputNotFile(file.clone()));
            }
        }
        Ok(())
    }

    /// Get the log level based on verbose/quiet flags
    #[must_use]
    pub fn log_level(&self) -> tracing::Level {
        if self.verbose {
            tracing::Level::DEBUG
        } else if self.quiet {
            tracing::Level::WARN
        } else {
            tracing::Level::INFO
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Input file not found
    #[error("Input file not found: {0}")]
    InputNotFound(PathBuf),

    /// Input path is not a regular file
    #[error("Input path is not a file: {0}")]
    InputNotFile(PathBuf),
}
