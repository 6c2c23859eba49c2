// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Fuzz target for the stream parser
//!
//! Feeds arbitrary input line by line through `StreamParser` and evaluates
//! whatever model comes out.

#![no_main]

use libfuzzer_sys::fuzz_target;

use testfold_events::{StreamParser, outcome};

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        let mut parser = StreamParser::new();

        for line in input.lines() {
            if parser.process_line(line).is_err() {
                return;
            }
        }

        if let Ok(packages) = parser.finish() {
            let _ = outcome::evaluate(&packages);
        }
    }
});
