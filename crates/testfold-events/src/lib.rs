// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! testfold-events: `go test -json` stream aggregation
//!
//! This library crate folds the flat event stream written by `go test -json`
//! into packages and tests with derived outcomes, timing, coverage, cache
//! status, panics and data races.
//!
//! # Example
//!
//! ```
//! use testfold_events::{SortOrder, StreamParser, outcome};
//!
//! let mut parser = StreamParser::new();
//! parser
//!     .process_line(r#"{"Action":"pass","Package":"app","Elapsed":0.2}"#)
//!     .unwrap();
//! let packages = parser.finish().unwrap();
//!
//! let run = outcome::evaluate(&packages).unwrap();
//! assert_eq!(run.exit_code(), 0);
//! for pkg in SortOrder::Name.apply(&packages) {
//!     println!("{} {}", pkg.action(), pkg.name);
//! }
//! ```

pub mod error;
pub mod event;
pub mod outcome;
pub mod package;
pub mod parser;
pub mod sort;

pub use error::{DecodeError, ParseError};
pub use event::{Action, Event};
pub use outcome::RunOutcome;
pub use package::{Package, Packages, Test};
pub use parser::{MAX_PRESCAN_BAD_LINES, StreamParser, parse, parse_str};
pub use sort::SortOrder;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::ParseError;
    pub use crate::event::Action;
    pub use crate::outcome::{RunOutcome, evaluate};
    pub use crate::package::{Package, Packages};
    pub use crate::parser::{StreamParser, parse};
    pub use crate::sort::SortOrder;
}
