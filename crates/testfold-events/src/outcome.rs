// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Run-level outcome and process exit code
//!
//! After the stream is parsed, [`finalize`] derives build/setup failures and
//! [`evaluate`] checks each package against its tests before classifying the
//! whole run.

use std::fmt;

use serde::Serialize;
use tracing::{debug, info};

use crate::error::ParseError;
use crate::event::Action;
use crate::package::{Package, Packages};

/// Why a run passed or failed, in increasing precedence
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every package passed
    Pass,
    /// At least one package failed because of a test
    TestFailure,
    /// At least one package panicked
    Panic,
    /// At least one package failed to build or set up
    BuildFailure,
    /// The race detector fired somewhere
    DataRace,
}

impl RunOutcome {
    /// Process exit code for this outcome
    ///
    /// | outcome        | code |
    /// |----------------|------|
    /// | `Pass`         | 0    |
    /// | `TestFailure`  | 1    |
    /// | `Panic`        | 1    |
    /// | `BuildFailure` | 2    |
    /// | `DataRace`     | 3    |
    #[must_use]
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Pass => 0,
            Self::TestFailure | Self::Panic => 1,
            Self::BuildFailure => 2,
            Self::DataRace => 3,
        }
    }

    /// Whether the run passed
    #[must_use]
    pub fn is_success(self) -> bool {
        self == Self::Pass
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pass => "pass",
            Self::TestFailure => "test failure",
            Self::Panic => "panic",
            Self::BuildFailure => "build failure",
            Self::DataRace => "data race",
        };
        f.pad(label)
    }
}

/// Mark packages that failed with no failing test and no panic as build/setup failures
pub fn finalize(packages: &mut Packages) {
    for pkg in packages.iter_mut() {
        if pkg.has_failed_build_or_setup || pkg.has_panic || pkg.action() != Action::Fail {
            continue;
        }
        if pkg.tests_by_status(Action::Fail).is_empty() {
            debug!(package = %pkg.name, "failed without a failing test, treating as build/setup failure");
            pkg.has_failed_build_or_setup = true;
        }
    }
}

/// Check a package's final action against the status of its tests
///
/// # Errors
///
/// Returns `ParseError::Inconsistent` if a failed package has no failing test,
/// panic or build/setup failure to account for it, or if a passed package
/// contains a failed test.
pub fn validate(pkg: &Package) -> Result<(), ParseError> {
    let failed = pkg.tests_by_status(Action::Fail);
    match pkg.action() {
        Action::Fail if failed.is_empty() && !pkg.has_panic && !pkg.has_failed_build_or_setup => {
            Err(ParseError::Inconsistent {
                package: pkg.name.clone(),
                reason: "package failed but no test failed".to_string(),
            })
        }
        Action::Pass if !failed.is_empty() => Err(ParseError::Inconsistent {
            package: pkg.name.clone(),
            reason: format!(
                "package passed but {} test(s) failed, first: {}",
                failed.len(),
                failed[0].name
            ),
        }),
        _ => Ok(()),
    }
}

/// Classify a single package
#[must_use]
pub fn classify(pkg: &Package) -> RunOutcome {
    if pkg.has_data_race {
        RunOutcome::DataRace
    } else if pkg.has_failed_build_or_setup && pkg.action() == Action::Fail {
        RunOutcome::BuildFailure
    } else if pkg.has_panic {
        RunOutcome::Panic
    } else if pkg.action() == Action::Fail {
        RunOutcome::TestFailure
    } else {
        RunOutcome::Pass
    }
}

/// Validate every package and classify the run as a whole
///
/// # Errors
///
/// Returns the first `ParseError::Inconsistent` found by [`validate`].
pub fn evaluate(packages: &Packages) -> Result<RunOutcome, ParseError> {
    let mut outcome = RunOutcome::Pass;
    for pkg in packages.iter() {
        validate(pkg)?;
        outcome = outcome.max(classify(pkg));
    }
    info!(%outcome, packages = packages.len(), "run evaluated");
    Ok(outcome)
}
