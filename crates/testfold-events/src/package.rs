// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Package and test records built up from the event stream

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::warn;

use crate::event::{Action, Event};

// ============================================================================
// Test
// ============================================================================

/// Events for one named test (or example, or benchmark) within a package
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Test {
    /// Test name, including any `/subtest` path
    pub name: String,
    /// Package the test belongs to
    pub package: String,
    /// Events in arrival order
    pub events: Vec<Event>,
}

impl Test {
    /// Create an empty test record
    #[must_use]
    pub fn new(package: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            package: package.into(),
            events: Vec::new(),
        }
    }

    /// Seconds taken, as the largest elapsed value among the test's events
    ///
    /// Only the terminating event carries a meaningful value; repeated or stale
    /// reporting lines must not shrink or inflate it.
    #[must_use]
    pub fn elapsed(&self) -> f64 {
        self.events
            .iter()
            .filter_map(|e| e.elapsed)
            .fold(0.0, f64::max)
    }

    /// The most recent pass, fail or skip in chronological order
    ///
    /// Parallel subtests interleave, so arrival order is not trusted. A test with
    /// no terminating event never finished and is reported as failed.
    #[must_use]
    pub fn status(&self) -> Action {
        let mut ordered: Vec<&Event> = self.events.iter().collect();
        ordered.sort_by_key(|e| e.time);

        match ordered.iter().rev().find(|e| e.action.is_outcome()) {
            Some(event) => event.action,
            None => {
                warn!(
                    package = %self.package,
                    test = %self.name,
                    "test has no pass/fail/skip event, treating as failed"
                );
                Action::Fail
            }
        }
    }

    /// Output lines emitted by the test, in chronological order
    #[must_use]
    pub fn output(&self) -> Vec<&str> {
        let mut ordered: Vec<&Event> = self
            .events
            .iter()
            .filter(|e| e.action == Action::Output)
            .collect();
        ordered.sort_by_key(|e| e.time);
        ordered.into_iter().map(|e| e.output.as_str()).collect()
    }

    /// Whether this is a subtest (`TestParent/case`)
    #[must_use]
    pub fn is_subtest(&self) -> bool {
        self.name.contains('/')
    }
}

// ============================================================================
// Package
// ============================================================================

/// Everything learned about one package during a run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Package {
    /// Import path
    pub name: String,
    /// Terminating pass/fail event for the package
    pub summary: Option<Event>,
    /// Tests keyed by name
    pub tests: BTreeMap<String, Test>,

    /// Package has no `_test.go` files
    pub no_test_files: bool,
    /// Package has test files but no test matched
    pub no_tests: bool,
    /// Tests that warned they contained nothing to run
    pub no_test_slice: Vec<Event>,

    /// Result was reused from the test cache
    pub cached: bool,

    /// A panic was detected; subsequent output was captured raw
    pub has_panic: bool,
    /// Raw events from the panic onward
    pub panic_events: Vec<Event>,

    /// The race detector fired
    pub has_data_race: bool,
    /// Tests during which a race was reported
    pub data_race_tests: Vec<String>,

    /// Coverage was reported
    pub cover: bool,
    /// Statement coverage percentage
    pub coverage: f64,

    /// Package failed to build or set up its test binary
    pub has_failed_build_or_setup: bool,
}

impl Package {
    /// Create an empty record for the named package
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Append an event to its named test, creating the test on first sight
    pub fn add_event(&mut self, event: Event) {
        self.tests
            .entry(event.test.clone())
            .or_insert_with(|| Test::new(&self.name, &event.test))
            .events
            .push(event);
    }

    /// Look up a test by name
    #[must_use]
    pub fn test(&self, name: &str) -> Option<&Test> {
        self.tests.get(name)
    }

    /// Final pass/fail for the package
    ///
    /// A panic always fails the package. Packages with nothing to run always pass,
    /// overriding the runner's own `skip`. Otherwise the summary line decides; with
    /// no summary the tests do.
    #[must_use]
    pub fn action(&self) -> Action {
        if self.has_panic {
            return Action::Fail;
        }
        if self.no_test_files || self.no_tests {
            return Action::Pass;
        }
        match &self.summary {
            Some(summary) => summary.action,
            None if self.tests.values().any(|t| t.status() == Action::Fail) => Action::Fail,
            None => Action::Pass,
        }
    }

    /// Seconds the package took, from its summary line
    #[must_use]
    pub fn elapsed(&self) -> Option<f64> {
        self.summary.as_ref().and_then(|s| s.elapsed)
    }

    /// Statement coverage, if reported
    #[must_use]
    pub fn coverage(&self) -> Option<f64> {
        self.cover.then_some(self.coverage)
    }

    /// Tests whose status matches `action`, ordered by name
    #[must_use]
    pub fn tests_by_status(&self, action: Action) -> Vec<&Test> {
        self.tests
            .values()
            .filter(|t| t.status() == action)
            .collect()
    }

    /// Number of tests per status
    #[must_use]
    pub fn status_counts(&self) -> HashMap<Action, usize> {
        let mut counts = HashMap::new();
        for test in self.tests.values() {
            *counts.entry(test.status()).or_insert(0) += 1;
        }
        counts
    }

    /// Raw panic text, one line per captured event
    #[must_use]
    pub fn panic_output(&self) -> String {
        self.panic_events
            .iter()
            .map(|e| e.output.as_str())
            .collect()
    }
}

// ============================================================================
// Packages
// ============================================================================

/// Every package seen in one run, keyed by import path
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Packages {
    inner: HashMap<String, Package>,
}

impl Packages {
    /// Create an empty collection
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Find the package record for `name`, creating it if needed
    pub fn entry(&mut self, name: &str) -> &mut Package {
        self.inner
            .entry(name.to_string())
            .or_insert_with(|| Package::new(name))
    }

    /// Look up a package by import path
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Package> {
        self.inner.get(name)
    }

    /// Number of packages
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether no packages were seen
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Iterate packages in arbitrary order
    pub fn iter(&self) -> impl Iterator<Item = &Package> {
        self.inner.values()
    }

    /// Iterate packages mutably in arbitrary order
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Package> {
        self.inner.values_mut()
    }

    /// Total number of tests across all packages
    #[must_use]
    pub fn tests_total(&self) -> usize {
        self.inner.values().map(|p| p.tests.len()).sum()
    }

    /// Every failed test, across all packages
    #[must_use]
    pub fn failed_tests(&self) -> Vec<&Test> {
        self.inner
            .values()
            .flat_map(|p| p.tests_by_status(Action::Fail))
            .collect()
    }

    /// Whether the race detector fired in any package
    #[must_use]
    pub fn data_race_detected(&self) -> bool {
        self.inner.values().any(|p| p.has_data_race)
    }
}
