// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Plain text rendering of a finished run

use std::io::{self, Write};

use testfold_events::{Action, Package, Packages, RunOutcome, SortOrder};

/// Options controlling the text report
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportOptions {
    /// Package ordering
    pub sort: SortOrder,
    /// List every test instead of only failures
    pub show_all: bool,
}

/// Write one row per package, then details for failures, panics and races
///
/// # Errors
///
/// Returns any error from the underlying writer.
pub fn write_report<W: Write>(
    out: &mut W,
    packages: &Packages,
    outcome: RunOutcome,
    options: ReportOptions,
) -> io::Result<()> {
    let ordered = options.sort.apply(packages);

    for pkg in &ordered {
        writeln!(
            out,
            "{:<4}  {:>9}  {:>6}  {}",
            pkg.action(),
            elapsed_cell(pkg),
            coverage_cell(pkg),
            package_label(pkg)
        )?;
    }

    for pkg in &ordered {
        write_details(out, pkg, options.show_all)?;
    }

    writeln!(out)?;
    writeln!(
        out,
        "packages: {}  tests: {}  failed: {}  result: {}",
        packages.len(),
        packages.tests_total(),
        packages.failed_tests().len(),
        outcome
    )
}

fn write_details<W: Write>(out: &mut W, pkg: &Package, show_all: bool) -> io::Result<()> {
    if pkg.has_panic {
        let test = pkg
            .panic_events
            .first()
            .map(|e| e.test.as_str())
            .unwrap_or_default();
        writeln!(out, "\n--- PANIC  {} {}", pkg.name, test)?;
        for line in pkg.panic_output().lines() {
            writeln!(out, "    {line}")?;
        }
    }

    if pkg.has_data_race {
        writeln!(
            out,
            "\n--- DATA RACE  {}  {}",
            pkg.name,
            pkg.data_race_tests.join(", ")
        )?;
    }

    if pkg.has_failed_build_or_setup && pkg.action() == Action::Fail {
        writeln!(out, "\n--- BUILD FAILED  {}", pkg.name)?;
    }

    let tests: Vec<_> = if show_all {
        pkg.tests.values().collect()
    } else {
        pkg.tests_by_status(Action::Fail)
    };
    if tests.is_empty() || pkg.has_panic {
        return Ok(());
    }

    let counts = pkg.status_counts();
    let count = |action| counts.get(&action).copied().unwrap_or_default();
    writeln!(
        out,
        "\n--- {}  {}  (pass: {}  fail: {}  skip: {})",
        pkg.action(),
        pkg.name,
        count(Action::Pass),
        count(Action::Fail),
        count(Action::Skip)
    )?;
    for test in tests {
        let status = test.status();
        let indent = if test.is_subtest() { "      " } else { "    " };
        writeln!(
            out,
            "{indent}{:<4}  {} ({:.2}s)",
            status,
            test.name,
            test.elapsed()
        )?;
        if status == Action::Fail {
            for line in test.output() {
                writeln!(out, "        {}", line.trim_end())?;
            }
        }
    }
    Ok(())
}

fn elapsed_cell(pkg: &Package) -> String {
    if pkg.cached {
        return "(cached)".to_string();
    }
    pkg.elapsed()
        .map_or_else(|| "--".to_string(), |secs| format!("{secs:.2}s"))
}

fn coverage_cell(pkg: &Package) -> String {
    pkg.coverage()
        .map_or_else(|| "--".to_string(), |pct| format!("{pct:.1}%"))
}

fn package_label(pkg: &Package) -> String {
    if pkg.no_test_files {
        format!("{} [no test files]", pkg.name)
    } else if pkg.no_tests {
        format!("{} [no tests to run]", pkg.name)
    } else {
        pkg.name.clone()
    }
}
