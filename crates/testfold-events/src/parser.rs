// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Streaming aggregation of `go test -json` output
//!
//! [`StreamParser`] folds events, in input order, into a [`Packages`]
//! collection. Until the first line decodes successfully the parser is in a
//! prescan state and tolerates up to [`MAX_PRESCAN_BAD_LINES`] malformed lines
//! (build noise printed before the JSON stream starts). Once a valid event has
//! been seen, any malformed line is fatal.
//!
//! # Example
//!
//! ```
//! use testfold_events::parser::parse_str;
//!
//! let output = r#"{"Action":"run","Package":"app","Test":"TestA"}
//! {"Action":"pass","Package":"app","Test":"TestA","Elapsed":0.01}
//! {"Action":"pass","Package":"app","Elapsed":0.02}"#;
//!
//! let packages = parse_str(output).unwrap();
//! assert_eq!(packages.len(), 1);
//! ```

use std::collections::BTreeMap;
use std::io::BufRead;

use tracing::{debug, trace};

use crate::error::{DecodeError, ParseError};
use crate::event::{Action, Event};
use crate::outcome;
use crate::package::{Package, Packages};

/// Malformed lines tolerated before the first valid event; one more is fatal
pub const MAX_PRESCAN_BAD_LINES: usize = 50;

/// Parse a complete stream from a reader
///
/// # Errors
///
/// Returns a not-parseable `ParseError` if the stream holds no valid events, too
/// many leading malformed lines, or a malformed line after valid events, and
/// `ParseError::Scan` if the reader fails.
pub fn parse<R: BufRead>(reader: R) -> Result<Packages, ParseError> {
    let mut parser = StreamParser::new();
    parser.read_all(reader)?;
    parser.finish()
}

/// Parse a complete stream held in memory
///
/// # Errors
///
/// See [`parse`].
pub fn parse_str(input: &str) -> Result<Packages, ParseError> {
    parse(input.as_bytes())
}

/// Incremental parser for `go test -json` output
///
/// Each parser owns its packages and, when built with
/// [`StreamParser::with_replay`], a copy of every raw line it was fed.
#[derive(Debug, Default)]
pub struct StreamParser {
    packages: Packages,
    started: bool,
    bad_lines: usize,
    line_no: usize,
    panic_candidates: BTreeMap<(String, String), Event>,
    replay: Option<String>,
}

impl StreamParser {
    /// Create a new streaming parser
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a parser that also keeps the raw input for later replay
    #[must_use]
    pub fn with_replay() -> Self {
        Self {
            replay: Some(String::new()),
            ..Self::default()
        }
    }

    /// Whether a valid event has been seen yet
    #[must_use]
    pub fn started(&self) -> bool {
        self.started
    }

    /// Raw input fed so far, if this parser keeps a replay buffer
    #[must_use]
    pub fn replay(&self) -> Option<&str> {
        self.replay.as_deref()
    }

    /// Take the replay buffer, leaving the parser without one
    pub fn take_replay(&mut self) -> Option<String> {
        self.replay.take()
    }

    /// Feed every line of `reader` to the parser
    ///
    /// Lines are split on `\n` and decoded as UTF-8 one at a time, so a line
    /// that is not valid UTF-8 counts as a malformed line rather than a read
    /// failure.
    ///
    /// # Errors
    ///
    /// Returns `ParseError::Scan` if reading fails, otherwise the first error from
    /// [`StreamParser::process_line`].
    pub fn read_all<R: BufRead>(&mut self, mut reader: R) -> Result<(), ParseError> {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let read = reader
                .read_until(b'\n', &mut buf)
                .map_err(|source| ParseError::Scan {
                    line: self.line_no + 1,
                    source,
                })?;
            if read == 0 {
                return Ok(());
            }
            let raw = buf.strip_suffix(b"\n").unwrap_or(buf.as_slice());
            let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
            self.process_bytes(raw)?;
        }
    }

    /// Process a single line of output
    ///
    /// Blank and whitespace-only lines are ignored, before and after the first
    /// valid event.
    ///
    /// # Errors
    ///
    /// Returns `ParseError::PrescanExceeded` when more than
    /// [`MAX_PRESCAN_BAD_LINES`] malformed lines precede the first valid event and
    /// `ParseError::MalformedLine` for a malformed line once streaming has begun.
    pub fn process_line(&mut self, line: &str) -> Result<(), ParseError> {
        self.line_no += 1;
        self.record(line);
        self.decode(line)
    }

    fn process_bytes(&mut self, raw: &[u8]) -> Result<(), ParseError> {
        self.line_no += 1;
        match std::str::from_utf8(raw) {
            Ok(line) => {
                self.record(line);
                self.decode(line)
            }
            Err(err) => {
                self.record(&String::from_utf8_lossy(raw));
                self.reject(DecodeError::Utf8(err))
            }
        }
    }

    fn record(&mut self, line: &str) {
        if let Some(replay) = &mut self.replay {
            replay.push_str(line);
            replay.push('\n');
        }
    }

    fn decode(&mut self, line: &str) -> Result<(), ParseError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(());
        }

        match Event::parse(line) {
            Ok(event) => {
                if !self.started {
                    debug!(
                        line = self.line_no,
                        skipped = self.bad_lines,
                        "first valid event, streaming"
                    );
                    self.started = true;
                }
                self.fold(event);
                Ok(())
            }
            Err(source) => self.reject(source),
        }
    }

    /// Count a line that failed to decode, or fail if streaming has begun
    fn reject(&mut self, source: DecodeError) -> Result<(), ParseError> {
        if self.started {
            return Err(ParseError::MalformedLine {
                line: self.line_no,
                source,
            });
        }
        self.bad_lines += 1;
        debug!(line = self.line_no, error = %source, "skipping malformed line before first event");
        if self.bad_lines > MAX_PRESCAN_BAD_LINES {
            return Err(ParseError::PrescanExceeded {
                bad_lines: self.bad_lines,
            });
        }
        Ok(())
    }

    /// Flush pending state and return the finished packages
    ///
    /// # Errors
    ///
    /// Returns `ParseError::NoValidEvents` if no line ever decoded.
    pub fn finish(&mut self) -> Result<Packages, ParseError> {
        for candidate in std::mem::take(&mut self.panic_candidates).into_values() {
            self.apply(candidate);
        }
        if !self.started {
            return Err(ParseError::NoValidEvents);
        }

        let mut packages = std::mem::take(&mut self.packages);
        outcome::finalize(&mut packages);
        debug!(
            packages = packages.len(),
            tests = packages.tests_total(),
            "finished parsing"
        );
        Ok(packages)
    }

    /// Route an event, holding `panic:` lines until the next event for the same test
    fn fold(&mut self, event: Event) {
        let key = (event.package.clone(), event.test.clone());

        if let Some(candidate) = self.panic_candidates.remove(&key) {
            if event.is_panic_confirm() {
                self.record_panic(candidate, event);
                return;
            }
            self.apply(candidate);
        }

        let panicked = self
            .packages
            .get(&event.package)
            .is_some_and(|p| p.has_panic);
        if event.is_panic_start() && !panicked {
            trace!(package = %event.package, test = %event.test, "holding panic candidate");
            self.panic_candidates.insert(key, event);
            return;
        }

        self.apply(event);
    }

    fn record_panic(&mut self, candidate: Event, confirm: Event) {
        debug!(package = %confirm.package, test = %confirm.test, "panic detected");
        let pkg = self.packages.entry(&confirm.package);
        pkg.has_panic = true;
        force_action(pkg, Action::Fail);
        pkg.panic_events.push(candidate);
        pkg.panic_events.push(confirm);
    }

    fn apply(&mut self, event: Event) {
        if self.packages.get(&event.package).is_none() {
            debug!(package = %event.package, "new package");
        }
        let pkg = self.packages.entry(&event.package);

        if pkg.has_panic {
            pkg.panic_events.push(event);
            return;
        }

        if event.is_no_test_files() {
            pkg.no_test_files = true;
            // go test reports these packages as "skip"
            force_action(pkg, Action::Pass);
        }
        if event.is_no_tests_to_run() {
            pkg.no_tests = true;
            force_action(pkg, Action::Pass);
        }
        if event.is_no_tests_warn() {
            pkg.no_test_slice.push(event.clone());
        }
        if event.is_cached() {
            pkg.cached = true;
        }
        if let Some(coverage) = event.cover() {
            pkg.cover = true;
            pkg.coverage = coverage;
        }
        if event.is_race() {
            pkg.has_data_race = true;
            if !event.test.is_empty() && !pkg.data_race_tests.contains(&event.test) {
                pkg.data_race_tests.push(event.test.clone());
            }
        }
        if event.is_build_or_setup_failure() {
            pkg.has_failed_build_or_setup = true;
        }

        if event.is_summary() {
            pkg.summary = Some(event);
            return;
        }

        if event.is_discardable() || event.test.is_empty() {
            trace!(package = %event.package, action = event.action.as_str(), "discarding package-level event");
            return;
        }

        pkg.add_event(event);
    }
}

/// Override the package's terminal action, creating a summary if none was seen
fn force_action(pkg: &mut Package, action: Action) {
    match &mut pkg.summary {
        Some(summary) => summary.action = action,
        None => {
            pkg.summary = Some(Event {
                time: None,
                action,
                package: pkg.name.clone(),
                test: String::new(),
                output: String::new(),
                elapsed: None,
                failed_build: None,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;
    use std::io::{self, BufReader, Read};

    const SUMMARY_ONLY: &str = r#"{"Time":"2026-01-17T02:33:06Z","Action":"pass","Package":"app/a","Elapsed":0.58}"#;

    fn lines(lines: &[&str]) -> String {
        lines.join("\n")
    }

    #[test]
    fn test_summary_only_package() {
        let packages = parse_str(SUMMARY_ONLY).expect("Should parse");
        assert_eq!(packages.len(), 1);

        let pkg = packages.get("app/a").expect("Should have package");
        assert_eq!(pkg.action(), Action::Pass);
        assert_eq!(pkg.tests.len(), 0);
        assert_eq!(pkg.elapsed(), Some(0.58));
    }

    #[test]
    fn test_no_test_files_forces_pass() {
        let input = lines(&[
            r#"{"Action":"output","Package":"app/cmd","Output":"?   \tapp/cmd\t[no test files]\n"}"#,
            r#"{"Action":"skip","Package":"app/cmd","Elapsed":0}"#,
        ]);
        let packages = parse_str(&input).expect("Should parse");
        let pkg = packages.get("app/cmd").expect("Should have package");

        assert!(pkg.no_test_files);
        assert_eq!(pkg.action(), Action::Pass);
        assert_eq!(pkg.summary.as_ref().map(|s| s.action), Some(Action::Pass));
        assert!(pkg.tests.is_empty());
    }

    #[test]
    fn test_no_tests_to_run() {
        let input = lines(&[
            r#"{"Action":"output","Package":"app","Test":"TestNone","Output":"testing: warning: no tests to run\n"}"#,
            r#"{"Action":"output","Package":"app","Output":"ok  \tapp\t0.011s [no tests to run]\n"}"#,
            r#"{"Action":"pass","Package":"app","Elapsed":0.011}"#,
        ]);
        let packages = parse_str(&input).expect("Should parse");
        let pkg = packages.get("app").expect("Should have package");

        assert!(pkg.no_tests);
        assert_eq!(pkg.no_test_slice.len(), 1);
        assert_eq!(pkg.no_test_slice[0].test, "TestNone");
        assert_eq!(pkg.action(), Action::Pass);
    }

    #[test]
    fn test_prescan_tolerates_49_bad_lines() {
        let mut input: Vec<&str> = vec!["go: downloading example.com/mod v1.0.0"; 49];
        input.push(SUMMARY_ONLY);
        let packages = parse_str(&lines(&input)).expect("Should parse");
        assert_eq!(packages.len(), 1);
    }

    #[test]
    fn test_prescan_tolerates_exactly_the_limit() {
        let mut input: Vec<&str> = vec!["not json"; MAX_PRESCAN_BAD_LINES];
        input.push(SUMMARY_ONLY);
        let packages = parse_str(&lines(&input)).expect("Should parse");
        assert_eq!(packages.len(), 1);
        assert_eq!(
            packages.get("app/a").map(Package::action),
            Some(Action::Pass)
        );
    }

    #[test]
    fn test_prescan_threshold_exceeded() {
        let mut input: Vec<&str> = vec!["not json"; MAX_PRESCAN_BAD_LINES + 1];
        input.push(SUMMARY_ONLY);
        let err = parse_str(&lines(&input)).expect_err("Should fail");
        assert!(matches!(err, ParseError::PrescanExceeded { bad_lines: 51 }));
        assert!(err.is_not_parseable());
    }

    #[test]
    fn test_non_utf8_noise_before_start_is_tolerated() {
        let mut input = b"# build noise \xff\xfe latin1\n".to_vec();
        input.extend_from_slice(SUMMARY_ONLY.as_bytes());
        input.push(b'\n');

        let mut parser = StreamParser::with_replay();
        parser.read_all(&input[..]).expect("Should tolerate noise");
        assert!(parser.started());
        assert!(
            parser
                .replay()
                .is_some_and(|raw| raw.starts_with("# build noise"))
        );

        let packages = parser.finish().expect("Should parse");
        assert_eq!(packages.len(), 1);
    }

    #[test]
    fn test_non_utf8_line_after_start_is_fatal() {
        let mut input = SUMMARY_ONLY.as_bytes().to_vec();
        input.extend_from_slice(b"\n\xff\xfe\n");

        let err = parse(&input[..]).expect_err("Should fail");
        match err {
            ParseError::MalformedLine { line, source } => {
                assert_eq!(line, 2);
                assert!(matches!(source, DecodeError::Utf8(_)));
            }
            other => panic!("Expected MalformedLine, got {other:?}"),
        }
    }

    #[test]
    fn test_crlf_line_endings() {
        let input = format!("{SUMMARY_ONLY}\r\n");
        let packages = parse(input.as_bytes()).expect("Should parse");
        assert_eq!(packages.len(), 1);
    }

    #[test]
    fn test_malformed_line_after_start_is_fatal() {
        let input = lines(&[
            r#"{"Action":"run","Package":"app","Test":"TestA"}"#,
            "panic: this is not json",
            r#"{"Action":"pass","Package":"app","Test":"TestA","Elapsed":0.1}"#,
            r#"{"Action":"pass","Package":"app","Elapsed":0.1}"#,
        ]);
        let err = parse_str(&input).expect_err("Should fail");
        assert!(matches!(err, ParseError::MalformedLine { line: 2, .. }));
        assert!(err.is_not_parseable());
    }

    #[test]
    fn test_unknown_action_after_start_is_fatal() {
        let input = lines(&[
            SUMMARY_ONLY,
            r#"{"Action":"start","Package":"app/b"}"#,
        ]);
        let err = parse_str(&input).expect_err("Should fail");
        assert!(matches!(err, ParseError::MalformedLine { line: 2, .. }));
    }

    #[test]
    fn test_no_valid_events() {
        assert!(matches!(parse_str(""), Err(ParseError::NoValidEvents)));
        assert!(matches!(
            parse_str("one\ntwo\nthree"),
            Err(ParseError::NoValidEvents)
        ));
    }

    #[test]
    fn test_blank_lines_ignored() {
        let input = format!("\n\n{SUMMARY_ONLY}\n\n   \n");
        let packages = parse_str(&input).expect("Should parse");
        assert_eq!(packages.len(), 1);
    }

    #[test]
    fn test_blank_line_mid_stream_is_not_malformed() {
        // test2json never emits blank lines; they carry no event, so they are
        // skipped rather than counted as decode failures
        let input = lines(&[
            r#"{"Action":"run","Package":"app","Test":"TestA"}"#,
            "",
            "\t ",
            r#"{"Action":"pass","Package":"app","Test":"TestA","Elapsed":0.1}"#,
            r#"{"Action":"pass","Package":"app","Elapsed":0.1}"#,
        ]);
        let packages = parse_str(&input).expect("Should parse");
        let pkg = packages.get("app").expect("Should have package");
        assert_eq!(pkg.action(), Action::Pass);
        assert_eq!(pkg.tests.len(), 1);
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::other("disk on fire"))
        }
    }

    #[test]
    fn test_read_error_is_wrapped() {
        let err = parse(BufReader::new(FailingReader)).expect_err("Should fail");
        match err {
            ParseError::Scan { line, source } => {
                assert_eq!(line, 1);
                assert_eq!(source.to_string(), "disk on fire");
            }
            other => panic!("Expected Scan error, got {other:?}"),
        }
    }

    #[test]
    fn test_panic_captures_rest_of_package() {
        let input = lines(&[
            r#"{"Action":"run","Package":"app","Test":"TestPanic"}"#,
            r#"{"Action":"output","Package":"app","Test":"TestPanic","Output":"=== RUN   TestPanic\n"}"#,
            r#"{"Action":"output","Package":"app","Test":"TestPanic","Output":"--- FAIL: TestPanic (0.00s)\n"}"#,
            r#"{"Action":"output","Package":"app","Test":"TestPanic","Output":"panic: runtime error: index out of range [1] with length 0 [recovered]\n"}"#,
            r#"{"Action":"output","Package":"app","Test":"TestPanic","Output":"\tpanic: runtime error: index out of range [1] with length 0\n"}"#,
            r#"{"Action":"output","Package":"app","Test":"TestPanic","Output":"goroutine 7 [running]:\n"}"#,
            r#"{"Action":"fail","Package":"app","Test":"TestPanic","Elapsed":0}"#,
            r#"{"Action":"output","Package":"app","Output":"FAIL\tapp\t0.012s\n"}"#,
            r#"{"Action":"fail","Package":"app","Elapsed":0.012}"#,
            r#"{"Action":"pass","Package":"other","Elapsed":0.1}"#,
        ]);
        let packages = parse_str(&input).expect("Should parse");

        let pkg = packages.get("app").expect("Should have package");
        assert!(pkg.has_panic);
        assert_eq!(pkg.action(), Action::Fail);
        assert_eq!(pkg.panic_events.len(), 6);
        assert!(pkg.panic_output().starts_with("panic: runtime error"));
        assert!(!pkg.has_failed_build_or_setup);

        // only pre-panic events reach the test
        let test = pkg.test("TestPanic").expect("Should have test");
        assert_eq!(test.events.len(), 2);

        let other = packages.get("other").expect("Should have other package");
        assert_eq!(other.action(), Action::Pass);
    }

    #[test]
    fn test_single_panic_line_is_not_a_panic() {
        let input = lines(&[
            r#"{"Action":"run","Package":"app","Test":"TestLog"}"#,
            r#"{"Action":"output","Package":"app","Test":"TestLog","Output":"panic: recovered and logged\n"}"#,
            r#"{"Action":"output","Package":"app","Test":"TestLog","Output":"    log_test.go:9: carrying on\n"}"#,
            r#"{"Action":"pass","Package":"app","Test":"TestLog","Elapsed":0.01}"#,
            r#"{"Action":"pass","Package":"app","Elapsed":0.02}"#,
        ]);
        let packages = parse_str(&input).expect("Should parse");
        let pkg = packages.get("app").expect("Should have package");

        assert!(!pkg.has_panic);
        assert_eq!(pkg.action(), Action::Pass);
        let test = pkg.test("TestLog").expect("Should have test");
        assert_eq!(test.events.len(), 4);
        assert_eq!(test.output()[0], "panic: recovered and logged\n");
    }

    #[test]
    fn test_panic_candidate_flushed_at_eof() {
        let input = lines(&[
            r#"{"Action":"run","Package":"app","Test":"TestA"}"#,
            r#"{"Action":"output","Package":"app","Test":"TestA","Output":"panic: dangling\n"}"#,
        ]);
        let packages = parse_str(&input).expect("Should parse");
        let pkg = packages.get("app").expect("Should have package");
        assert!(!pkg.has_panic);
        assert_eq!(pkg.test("TestA").map(|t| t.events.len()), Some(2));
    }

    #[test]
    fn test_race_cached_and_coverage() {
        let input = lines(&[
            r#"{"Action":"run","Package":"app/db","Test":"TestRace"}"#,
            r#"{"Action":"output","Package":"app/db","Test":"TestRace","Output":"WARNING: DATA RACE\n"}"#,
            r#"{"Action":"output","Package":"app/db","Test":"TestRace","Output":"    testing.go:1319: race detected during execution of test\n"}"#,
            r#"{"Action":"fail","Package":"app/db","Test":"TestRace","Elapsed":0.01}"#,
            r#"{"Action":"fail","Package":"app/db","Elapsed":0.02}"#,
            r#"{"Action":"output","Package":"app/cache","Output":"ok  \tapp/cache\t(cached)\tcoverage: 72.5% of statements\n"}"#,
            r#"{"Action":"pass","Package":"app/cache","Elapsed":0}"#,
        ]);
        let packages = parse_str(&input).expect("Should parse");

        let db = packages.get("app/db").expect("Should have db");
        assert!(db.has_data_race);
        assert_eq!(db.data_race_tests, vec!["TestRace".to_string()]);
        assert_eq!(db.action(), Action::Fail);

        let cache = packages.get("app/cache").expect("Should have cache");
        assert!(cache.cached);
        assert_eq!(cache.coverage(), Some(72.5));
        assert_eq!(cache.action(), Action::Pass);
    }

    #[test]
    fn test_build_failure_is_flagged() {
        let input = lines(&[
            r#"{"Action":"output","Package":"app/broken","Output":"FAIL\tapp/broken [build failed]\n"}"#,
            r#"{"Action":"fail","Package":"app/broken","Elapsed":0}"#,
        ]);
        let packages = parse_str(&input).expect("Should parse");
        let pkg = packages.get("app/broken").expect("Should have package");
        assert!(pkg.has_failed_build_or_setup);
        assert_eq!(pkg.action(), Action::Fail);
        assert!(pkg.tests.is_empty());
    }

    #[test]
    fn test_replay_buffer_is_per_parser() {
        let mut first = StreamParser::with_replay();
        first.process_line("garbage").expect("Should tolerate");
        first.process_line(SUMMARY_ONLY).expect("Should parse");

        let mut second = StreamParser::with_replay();
        second.process_line(SUMMARY_ONLY).expect("Should parse");

        assert_eq!(first.replay(), Some(format!("garbage\n{SUMMARY_ONLY}\n").as_str()));
        assert_eq!(second.replay(), Some(format!("{SUMMARY_ONLY}\n").as_str()));
        assert!(StreamParser::new().replay().is_none());

        assert_eq!(first.take_replay().map(|r| r.lines().count()), Some(2));
        assert!(first.replay().is_none());
    }

    #[test]
    fn test_streaming_state() {
        let mut parser = StreamParser::new();
        assert!(!parser.started());
        parser.process_line("noise").expect("Should tolerate");
        assert!(!parser.started());
        parser.process_line(SUMMARY_ONLY).expect("Should parse");
        assert!(parser.started());
        assert!(parser.process_line("noise").is_err());
    }
}
