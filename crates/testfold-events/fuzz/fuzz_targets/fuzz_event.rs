// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Fuzz target for single-event decoding and classification

#![no_main]

use libfuzzer_sys::fuzz_target;

use testfold_events::Event;

fuzz_target!(|data: &[u8]| {
    if let Ok(line) = std::str::from_utf8(data) {
        if let Ok(event) = Event::parse(line) {
            let _ = event.is_summary();
            let _ = event.is_discardable();
            let _ = event.is_cached();
            let _ = event.cover();
        }
    }
});
