// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! `go test -json` event decoding and classification
//!
//! Each line of `go test -json` output is a [`TestEvent`](https://pkg.go.dev/cmd/test2json)
//! object. Besides its structured fields, the free-text `Output` field carries
//! markers the aggregator needs: package result lines, coverage, panics and
//! data race banners. Every predicate here works on already-decoded fields.
//!
//! # Example
//!
//! ```
//! use testfold_events::event::{Action, Event};
//!
//! let line = r#"{"Action":"output","Package":"app/db","Output":"coverage: 81.3% of statements\n"}"#;
//! let event = Event::parse(line).unwrap();
//! assert_eq!(event.action, Action::Output);
//! assert_eq!(event.cover(), Some(81.3));
//! ```

use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

// ============================================================================
// Output markers
// ============================================================================

const PROGRESS_PREFIXES: [&str; 3] = ["=== RUN", "=== PAUSE", "=== CONT"];
const NO_TEST_FILES_PREFIX: &str = "?   \t";
const NO_TEST_FILES_SUFFIX: &str = "\t[no test files]\n";
const NO_TESTS_TO_RUN: &str = "[no tests to run]";
const NO_TESTS_WARN: &str = "testing: warning: no tests to run\n";
const OK_PREFIX: &str = "ok  \t";
const CACHED: &str = "(cached)";
const PANIC_START: &str = "panic:";
const PANIC_CONFIRM: &str = "\tpanic:";
const DATA_RACE: &str = "WARNING: DATA RACE";
const BUILD_FAILED: &str = "[build failed]";
const SETUP_FAILED: &str = "[setup failed]";

static COVERAGE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"coverage: (\S+)% of statements").expect("Invalid regex pattern"));

// ============================================================================
// Action
// ============================================================================

/// The phase or outcome tag carried by every event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Test has started running
    Run,
    /// Test has been paused (`t.Parallel`)
    Pause,
    /// Test has continued running
    Cont,
    /// Test or package passed
    Pass,
    /// Test or package failed
    Fail,
    /// Benchmark printed log output
    Bench,
    /// Free-text output
    Output,
    /// Test or package was skipped
    Skip,
}

impl Action {
    /// Whether this action terminates a test (pass, fail or skip)
    #[must_use]
    pub fn is_outcome(self) -> bool {
        matches!(self, Self::Pass | Self::Fail | Self::Skip)
    }

    /// The wire value, as it appears in the `Action` field
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Run => "run",
            Self::Pause => "pause",
            Self::Cont => "cont",
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::Bench => "bench",
            Self::Output => "output",
            Self::Skip => "skip",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Run => "RUN",
            Self::Pause => "PAUSE",
            Self::Cont => "CONT",
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
            Self::Bench => "BENCH",
            Self::Output => "OUTPUT",
            Self::Skip => "SKIP",
        };
        f.pad(label)
    }
}

// ============================================================================
// Event
// ============================================================================

/// One decoded line of `go test -json` output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Event {
    /// When the event was emitted (absent for cached results)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,
    /// What happened
    pub action: Action,
    /// Import path of the package
    #[serde(default)]
    pub package: String,
    /// Test name; empty for package-level events
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub test: String,
    /// Output text, newline included
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub output: String,
    /// Seconds taken, on terminating pass/fail/skip events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed: Option<f64>,
    /// Import path of the package whose build failed (newer toolchains only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_build: Option<String>,
}

impl Event {
    /// Decode a single line of `go test -json` output
    ///
    /// # Errors
    ///
    /// Returns `DecodeError::Json` if the line is not an event object or names an
    /// unknown action, and `DecodeError::MissingPackage` if it has no package.
    pub fn parse(line: &str) -> Result<Self, DecodeError> {
        let event: Self = serde_json::from_str(line)?;
        if event.package.is_empty() {
            return Err(DecodeError::MissingPackage);
        }
        Ok(event)
    }

    /// The terminating line for a package: no test, no output, pass or fail
    #[must_use]
    pub fn is_summary(&self) -> bool {
        self.test.is_empty()
            && self.output.is_empty()
            && matches!(self.action, Action::Pass | Action::Fail)
    }

    /// Runner progress lines and package-level output that carries no marker
    #[must_use]
    pub fn is_discardable(&self) -> bool {
        if PROGRESS_PREFIXES
            .iter()
            .any(|prefix| self.output.starts_with(prefix))
        {
            return true;
        }
        self.action == Action::Output && self.test.is_empty() && !self.is_marker()
    }

    /// `?   \t<pkg>\t[no test files]\n`
    #[must_use]
    pub fn is_no_test_files(&self) -> bool {
        self.output.starts_with(NO_TEST_FILES_PREFIX)
            && self.output.ends_with(NO_TEST_FILES_SUFFIX)
    }

    /// Package result line reporting that no test matched, e.g. `ok  \tpkg\t0.01s [no tests to run]`
    #[must_use]
    pub fn is_no_tests_to_run(&self) -> bool {
        self.output.contains(NO_TESTS_TO_RUN)
    }

    /// A named test binary warning that it contains no tests
    #[must_use]
    pub fn is_no_tests_warn(&self) -> bool {
        !self.test.is_empty() && self.output == NO_TESTS_WARN
    }

    /// `ok  \t<pkg>\t(cached)...`; a bare `(cached)` elsewhere does not count
    #[must_use]
    pub fn is_cached(&self) -> bool {
        self.output
            .strip_prefix(OK_PREFIX)
            .and_then(|rest| rest.strip_prefix(self.package.as_str()))
            .and_then(|rest| rest.strip_prefix('\t'))
            .is_some_and(|rest| rest.starts_with(CACHED))
    }

    /// Coverage percentage from `coverage: <float>% of statements`
    ///
    /// Returns `None` unless the value starts with a digit, parses as a float and
    /// lies within `[0, 100]`.
    #[must_use]
    pub fn cover(&self) -> Option<f64> {
        let captures = COVERAGE_PATTERN.captures(&self.output)?;
        let raw = captures.get(1)?.as_str();
        if !raw.starts_with(|c: char| c.is_ascii_digit()) {
            return None;
        }
        let percent: f64 = raw.parse().ok()?;
        (0.0..=100.0).contains(&percent).then_some(percent)
    }

    /// First line of a panic signature
    #[must_use]
    pub fn is_panic_start(&self) -> bool {
        self.action == Action::Output && self.output.starts_with(PANIC_START)
    }

    /// Second line of a panic signature, confirming a preceding [`Event::is_panic_start`]
    #[must_use]
    pub fn is_panic_confirm(&self) -> bool {
        self.action == Action::Output && self.output.starts_with(PANIC_CONFIRM)
    }

    /// The race detector's banner
    #[must_use]
    pub fn is_race(&self) -> bool {
        self.output.contains(DATA_RACE)
    }

    /// Package could not be built or its test binary could not be set up
    #[must_use]
    pub fn is_build_or_setup_failure(&self) -> bool {
        self.failed_build.is_some()
            || self.output.contains(BUILD_FAILED)
            || self.output.contains(SETUP_FAILED)
    }

    fn is_marker(&self) -> bool {
        self.is_no_test_files()
            || self.is_no_tests_to_run()
            || self.is_cached()
            || self.cover().is_some()
            || self.is_panic_start()
            || self.is_panic_confirm()
            || self.is_race()
            || self.is_build_or_setup_failure()
    }
}
