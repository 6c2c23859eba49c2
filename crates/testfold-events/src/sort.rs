// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Presentation orderings over finished packages

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::package::{Package, Packages};

/// How to order packages in a report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Ascending import path
    #[default]
    Name,
    /// Highest coverage first
    Coverage,
    /// Slowest first
    Elapsed,
}

impl SortOrder {
    /// Order `packages` by this strategy
    #[must_use]
    pub fn apply(self, packages: &Packages) -> Vec<&Package> {
        match self {
            Self::Name => by_name(packages),
            Self::Coverage => by_coverage(packages),
            Self::Elapsed => by_elapsed(packages),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Self::Name => "name",
            Self::Coverage => "coverage",
            Self::Elapsed => "elapsed",
        })
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "name" => Ok(Self::Name),
            "coverage" => Ok(Self::Coverage),
            "elapsed" => Ok(Self::Elapsed),
            other => Err(format!("unknown sort order: {other}")),
        }
    }
}

/// Ascending by import path
#[must_use]
pub fn by_name(packages: &Packages) -> Vec<&Package> {
    let mut sorted: Vec<&Package> = packages.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));
    sorted
}

/// Descending by coverage; packages without coverage last
#[must_use]
pub fn by_coverage(packages: &Packages) -> Vec<&Package> {
    let mut sorted = by_name(packages);
    sorted.sort_by(|a, b| descending(a.coverage(), b.coverage()));
    sorted
}

/// Descending by package elapsed time; cached packages last
#[must_use]
pub fn by_elapsed(packages: &Packages) -> Vec<&Package> {
    let mut sorted = by_name(packages);
    sorted.sort_by(|a, b| descending(elapsed_key(a), elapsed_key(b)));
    sorted
}

fn elapsed_key(pkg: &Package) -> Option<f64> {
    if pkg.cached { None } else { pkg.elapsed() }
}

/// Larger values first, `None` after every value
fn descending(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.total_cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
