//! testfold library
//!
//! This module exports the command-line pieces of testfold for use in
//! integration tests and as a library.

pub mod config;
pub mod report;
pub mod run;
