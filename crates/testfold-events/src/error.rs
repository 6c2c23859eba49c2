// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Error types for testfold-events

use thiserror::Error;

/// Reasons a single input line fails to decode into an event
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The line is not a JSON event object (bad syntax, unknown action, wrong field types)
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The line is not valid UTF-8
    #[error("invalid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// The event decoded but names no package
    #[error("event has no package name")]
    MissingPackage,
}

/// Errors that end a parse of a `go test -json` stream
#[derive(Debug, Error)]
pub enum ParseError {
    /// The stream ended before a single valid event was seen
    #[error("stream not parseable: no valid test events found")]
    NoValidEvents,

    /// Too many undecodable lines before the first valid event
    #[error("stream not parseable: {bad_lines} malformed lines before the first valid event")]
    PrescanExceeded {
        /// Number of malformed lines seen
        bad_lines: usize,
    },

    /// A line failed to decode after valid events had already been seen
    #[error("stream not parseable: malformed line {line}: {source}")]
    MalformedLine {
        /// 1-based line number in the input
        line: usize,
        /// Why the line was rejected
        source: DecodeError,
    },

    /// The underlying reader failed
    #[error("failed scanning input at line {line}: {source}")]
    Scan {
        /// 1-based number of the line being read
        line: usize,
        /// The I/O error from the reader
        source: std::io::Error,
    },

    /// A package's derived outcome contradicts its tests
    #[error("inconsistent package {package}: {reason}")]
    Inconsistent {
        /// Package name
        package: String,
        /// Which invariant was broken
        reason: String,
    },
}

impl ParseError {
    /// Whether this error means the input as a whole was rejected as not parseable
    #[must_use]
    pub fn is_not_parseable(&self) -> bool {
        matches!(
            self,
            Self::NoValidEvents | Self::PrescanExceeded { .. } | Self::MalformedLine { .. }
        )
    }
}
