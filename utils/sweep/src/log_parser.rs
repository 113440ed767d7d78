//! Extraction of test outcomes from VUnit run logs.
//!
//! Two line shapes are understood, checked in order:
//!
//! ```text
//! pass (P=1 S=0 F=0 T=2) lib.tb_timer.test_basic (0.4 s)
//! fail 1 of 15
//! ```
//!
//! The per-test lines win whenever at least one is present; the `N of M`
//! summary is only consulted when none are.

use std::borrow::Cow;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

static ANSI_PATTERN: OnceLock<Regex> = OnceLock::new();
static TEST_PATTERN: OnceLock<Regex> = OnceLock::new();
static SUMMARY_PATTERN: OnceLock<Regex> = OnceLock::new();
static FAILED_NAME_PATTERN: OnceLock<Regex> = OnceLock::new();

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("failed to read log {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Pass,
    Fail,
    Unknown,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Status::Pass => "PASS",
            Status::Fail => "FAIL",
            Status::Unknown => "UNKNOWN",
        })
    }
}

/// Outcome of one configuration's log.
///
/// `passed + failed == total` always holds. `failed_tests` may be empty even
/// when `failed > 0` if only the summary line was present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseResult {
    pub config: String,
    pub passed: u32,
    pub failed: u32,
    pub total: u32,
    pub failed_tests: Vec<String>,
}

impl ParseResult {
    pub fn empty(config: impl Into<String>) -> Self {
        Self {
            config: config.into(),
            passed: 0,
            failed: 0,
            total: 0,
            failed_tests: Vec::new(),
        }
    }

    pub fn status(&self) -> Status {
        if self.failed > 0 {
            Status::Fail
        } else if self.total > 0 {
            Status::Pass
        } else {
            Status::Unknown
        }
    }
}

/// Remove color sequences, including ones whose escape byte was already
/// stripped by the capture pipeline (`[32m`).
pub fn strip_ansi(text: &str) -> Cow<'_, str> {
    ANSI_PATTERN
        .get_or_init(|| Regex::new(r"\x1b\[[0-9;]*m|\[[0-9;]*m").unwrap())
        .replace_all(text, "")
}

/// `sweep_100MHz_1us.log` -> `100MHz_1us`
pub fn config_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().replace("sweep_", ""))
        .unwrap_or_default()
}

/// Parse the contents of one log.
pub fn parse_log(config: impl Into<String>, content: &str) -> ParseResult {
    let clean = strip_ansi(content);
    let mut result = ParseResult::empty(config);

    let test_pattern = TEST_PATTERN.get_or_init(|| {
        Regex::new(r"(pass|fail)\s+\(P=\d+\s+S=\d+\s+F=\d+\s+T=\d+\)\s+lib\.tb_timer\.(\S+)")
            .unwrap()
    });
    for caps in test_pattern.captures_iter(&clean) {
        if &caps[1] == "pass" {
            result.passed += 1;
        } else {
            result.failed += 1;
            result.failed_tests.push(caps[2].to_string());
        }
        result.total += 1;
    }

    if result.total == 0 {
        let summary_pattern = SUMMARY_PATTERN
            .get_or_init(|| Regex::new(r"(pass|fail)\s+(\d+)\s+of\s+(\d+)").unwrap());
        if let Some(caps) = summary_pattern.captures(&clean) {
            // Counts too large for u32 are treated as absent.
            if let (Ok(count), Ok(total)) = (caps[2].parse::<u32>(), caps[3].parse::<u32>()) {
                result.total = total;
                if &caps[1] == "pass" {
                    result.passed = total;
                } else {
                    result.failed = count.min(total);
                    result.passed = total - result.failed;
                }
            }
        }
    }

    if result.failed > 0 && result.failed_tests.is_empty() {
        let failed_name_pattern = FAILED_NAME_PATTERN
            .get_or_init(|| Regex::new(r"fail\s+lib\.tb_timer\.(\S+)\s+").unwrap());
        result.failed_tests = failed_name_pattern
            .captures_iter(&clean)
            .map(|caps| caps[1].to_string())
            .collect();
    }

    result
}

/// Last `pass … of …` (or `fail … of …`) line of a log, colors removed.
pub fn last_summary_line(content: &str, status: Status) -> Option<String> {
    let word = match status {
        Status::Pass => "pass",
        Status::Fail => "fail",
        Status::Unknown => return None,
    };
    let clean = strip_ansi(content);
    clean
        .lines()
        .rev()
        .find(|line| {
            line.find(word)
                .is_some_and(|at| line[at + word.len()..].contains("of"))
        })
        .map(|line| line.trim().to_string())
}

fn read_log(path: &Path) -> Result<String, LogError> {
    std::fs::read_to_string(path).map_err(|source| LogError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse one log file. Unreadable files yield an empty result and a warning.
pub fn parse_log_file(path: &Path) -> ParseResult {
    let config = config_name(path);
    match read_log(path) {
        Ok(content) => parse_log(config, &content),
        Err(err) => {
            tracing::warn!("Error parsing {}: {:#}", path.display(), anyhow::Error::from(err));
            ParseResult::empty(config)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_individual_results() {
        let log = "\
Starting lib.tb_timer.test_basic
pass (P=1 S=0 F=0 T=2) lib.tb_timer.test_basic (0.5 s)
Starting lib.tb_timer.test_overflow
fail (P=1 S=0 F=1 T=2) lib.tb_timer.test_overflow (0.7 s)
";
        let result = parse_log("100MHz_1us", log);
        assert_eq!(result.passed, 1);
        assert_eq!(result.failed, 1);
        assert_eq!(result.total, 2);
        assert_eq!(result.failed_tests, ["test_overflow"]);
        assert_eq!(result.status(), Status::Fail);
    }

    #[test]
    fn test_summary_fallback_pass() {
        let result = parse_log("cfg", "pass 12 of 12\n");
        assert_eq!((result.passed, result.failed, result.total), (12, 0, 12));
        assert_eq!(result.status(), Status::Pass);
    }

    #[test]
    fn test_summary_fallback_fail_collects_names() {
        let log = "\
==== Summary ====
pass lib.tb_timer.test_basic     (0.5 s)
fail lib.tb_timer.test_overflow  (0.7 s)
fail lib.tb_timer.test_reload    (0.2 s)
=================
pass 13 of 15
fail 2 of 15
";
        let result = parse_log("cfg", log);
        // The first summary line wins.
        assert_eq!((result.passed, result.failed, result.total), (15, 0, 15));

        let result = parse_log("cfg", &log.replace("pass 13 of 15\n", ""));
        assert_eq!((result.passed, result.failed, result.total), (13, 2, 15));
        assert_eq!(result.failed_tests, ["test_overflow", "test_reload"]);
    }

    #[test]
    fn test_failed_count_clamped_to_total() {
        let result = parse_log("cfg", "fail 5 of 3");
        assert_eq!((result.passed, result.failed, result.total), (0, 3, 3));
    }

    #[test]
    fn test_empty_log_is_unknown() {
        let result = parse_log("cfg", "");
        assert_eq!(result, ParseResult::empty("cfg"));
        assert_eq!(result.status(), Status::Unknown);
    }

    #[test]
    fn test_status_derivation() {
        for passed in 0..3u32 {
            for failed in 0..3u32 {
                let result = ParseResult {
                    passed,
                    failed,
                    total: passed + failed,
                    ..ParseResult::empty("cfg")
                };
                let expected = match (passed + failed, failed) {
                    (0, _) => Status::Unknown,
                    (_, 0) => Status::Pass,
                    _ => Status::Fail,
                };
                assert_eq!(result.status(), expected);
            }
        }
    }

    #[test]
    fn test_strip_ansi() {
        assert_eq!(strip_ansi("\x1b[32mpass\x1b[0m"), "pass");
        assert_eq!(strip_ansi("[1;31mfail[0m 2 of 3"), "fail 2 of 3");
        assert_eq!(strip_ansi("\x1b[1m[33mwarn\x1b[m"), "warn");
        assert_eq!(strip_ansi("array[3] := x;"), "array[3] := x;");
        assert_eq!(strip_ansi("plain text"), "plain text");
    }

    #[test]
    fn test_colored_results() {
        let log = "\x1b[32mpass\x1b[0m (P=1 S=0 F=0 T=1) lib.tb_timer.test_basic (0.1 s)\n\
                   [31mfail[0m (P=1 S=0 F=1 T=2) lib.tb_timer.test_overflow (0.1 s)\n";
        let result = parse_log("cfg", log);
        assert_eq!((result.passed, result.failed, result.total), (1, 1, 2));
        assert_eq!(result.failed_tests, ["test_overflow"]);
    }

    #[test]
    fn test_last_summary_line() {
        let log = "pass 3 of 4\n\x1b[31mfail\x1b[0m 1 of 4\n==== pass 4 of 4 ====\n";
        assert_eq!(
            last_summary_line(log, Status::Pass).as_deref(),
            Some("==== pass 4 of 4 ====")
        );
        assert_eq!(last_summary_line(log, Status::Fail).as_deref(), Some("fail 1 of 4"));
        assert_eq!(last_summary_line("compile error", Status::Fail), None);
    }

    #[test]
    fn test_parse_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sweep_200MHz_1us.log");
        std::fs::write(&path, "pass 3 of 3\n").unwrap();

        let result = parse_log_file(&path);
        assert_eq!(result.config, "200MHz_1us");
        assert_eq!(result.total, 3);

        let missing = parse_log_file(&dir.path().join("sweep_gone.log"));
        assert_eq!(missing, ParseResult::empty("gone"));
    }
}
