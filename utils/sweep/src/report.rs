use std::collections::BTreeMap;
use std::fmt::{self, Write as FmtWrite};
use std::path::PathBuf;

use serde::Serialize;

use crate::log_parser::{ParseResult, Status};

const UNKNOWN_LABEL: &str = "Unknown";
const RULE_WIDTH: usize = 80;

/// Split a configuration name such as `100MHz_1us` into its frequency and
/// delay labels.
pub fn split_config_label(config: &str) -> (&str, &str) {
    let mut parts = config.split('_');
    let freq = parts.next().unwrap_or(UNKNOWN_LABEL);
    let delay = parts.next().unwrap_or(UNKNOWN_LABEL);
    (freq, delay)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    Success,
    NoResults,
    Failure { pass_rate: f64 },
}

/// Totals and failure breakdowns over every parsed log.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct AggregateReport {
    pub total_passed: u64,
    pub total_failed: u64,
    pub total_tests: u64,
    /// Failing test -> distinct configurations it failed in, both sorted.
    pub failures_by_test: BTreeMap<String, Vec<String>>,
    /// Frequency label -> summed `failed` counts.
    pub failures_by_frequency: BTreeMap<String, u64>,
    /// Delay label -> summed `failed` counts.
    pub failures_by_delay: BTreeMap<String, u64>,
}

impl AggregateReport {
    pub fn from_results(results: &[ParseResult]) -> Self {
        let mut report = results
            .iter()
            .fold(AggregateReport::default(), |mut report, result| {
                report.total_passed += u64::from(result.passed);
                report.total_failed += u64::from(result.failed);
                report.total_tests += u64::from(result.total);

                for test in &result.failed_tests {
                    let configs = report.failures_by_test.entry(test.clone()).or_default();
                    if !configs.contains(&result.config) {
                        configs.push(result.config.clone());
                    }
                }

                if result.failed > 0 {
                    let (freq, delay) = split_config_label(&result.config);
                    *report.failures_by_frequency.entry(freq.to_string()).or_default() +=
                        u64::from(result.failed);
                    *report.failures_by_delay.entry(delay.to_string()).or_default() +=
                        u64::from(result.failed);
                }
                report
            });

        for configs in report.failures_by_test.values_mut() {
            configs.sort();
            configs.dedup();
        }
        report
    }

    pub fn verdict(&self) -> Verdict {
        if self.total_failed == 0 && self.total_tests > 0 {
            Verdict::Success
        } else if self.total_tests == 0 {
            Verdict::NoResults
        } else {
            Verdict::Failure {
                pass_rate: 100.0 * self.total_passed as f64 / self.total_tests as f64,
            }
        }
    }

    /// Test failing in the most configurations; ties go to the first name.
    pub fn most_problematic(&self) -> Option<(&str, usize)> {
        self.failures_by_test
            .iter()
            .fold(None, |best: Option<(&str, usize)>, (test, configs)| match best {
                Some((_, count)) if count >= configs.len() => best,
                _ => Some((test.as_str(), configs.len())),
            })
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "" } else { "s" }
}

/// Everything printed by `timer-sweep report`.
#[derive(Debug, Clone)]
pub struct SweepReport {
    pub source: String,
    pub log_files: Vec<PathBuf>,
    pub results: Vec<ParseResult>,
    pub aggregate: AggregateReport,
}

impl SweepReport {
    pub fn new(source: String, log_files: Vec<PathBuf>, results: Vec<ParseResult>) -> Self {
        let aggregate = AggregateReport::from_results(&results);
        Self {
            source,
            log_files,
            results,
            aggregate,
        }
    }

    fn write_table(&self, out: &mut impl FmtWrite) -> fmt::Result {
        let rule = "-".repeat(RULE_WIDTH);
        writeln!(out, "CONFIGURATION SUMMARY:")?;
        writeln!(out, "{rule}")?;
        writeln!(
            out,
            "{:<25} {:>8} {:>8} {:>8} {:>10}",
            "Configuration", "Passed", "Failed", "Total", "Status"
        )?;
        writeln!(out, "{rule}")?;
        for r in &self.results {
            let symbol = match r.status() {
                Status::Pass => "✓",
                Status::Fail => "✗",
                Status::Unknown => "?",
            };
            writeln!(
                out,
                "{:<25} {:>8} {:>8} {:>8} {:>5} {:>5}",
                r.config,
                r.passed,
                r.failed,
                r.total,
                symbol,
                r.status().to_string()
            )?;
        }
        writeln!(out, "{rule}")?;
        let agg = &self.aggregate;
        writeln!(
            out,
            "{:<25} {:>8} {:>8} {:>8}",
            "TOTAL", agg.total_passed, agg.total_failed, agg.total_tests
        )?;
        writeln!(out)
    }

    fn write_verdict(&self, out: &mut impl FmtWrite) -> fmt::Result {
        let agg = &self.aggregate;
        match agg.verdict() {
            Verdict::Success => {
                writeln!(out, "🎉 SUCCESS: ALL CONFIGURATIONS PASSED!")?;
                writeln!(out, "   ✓ {} configurations tested", self.results.len())?;
                writeln!(out, "   ✓ {} total tests executed", agg.total_tests)?;
                writeln!(out, "   ✓ 100% pass rate")
            }
            Verdict::NoResults => {
                writeln!(out, "⚠️  WARNING: No test results found in logs")?;
                writeln!(out, "   Check if logs contain VUnit output")
            }
            Verdict::Failure { pass_rate } => {
                writeln!(
                    out,
                    "❌ FAILURES DETECTED: {}/{} tests failed",
                    agg.total_failed, agg.total_tests
                )?;
                writeln!(out, "   Pass rate: {pass_rate:.1}%")
            }
        }
    }

    fn write_failures(&self, out: &mut impl FmtWrite) -> fmt::Result {
        let heavy = "=".repeat(RULE_WIDTH);
        let agg = &self.aggregate;

        writeln!(out)?;
        writeln!(out, "{heavy}")?;
        writeln!(out, "FAILURES BY CONFIGURATION:")?;
        writeln!(out, "{heavy}")?;
        for r in self.results.iter().filter(|r| r.failed > 0) {
            writeln!(
                out,
                "\n❌ {} ({} failure{}):",
                r.config,
                r.failed,
                plural(r.failed as usize)
            )?;
            if r.failed_tests.is_empty() {
                writeln!(out, "   (Failed tests not identified)")?;
            }
            for test in &r.failed_tests {
                writeln!(out, "   • {test}")?;
            }
        }

        writeln!(out)?;
        writeln!(out, "{heavy}")?;
        writeln!(out, "FAILURES BY TEST:")?;
        writeln!(out, "{heavy}")?;
        if agg.failures_by_test.is_empty() {
            return Ok(());
        }
        for (test, configs) in &agg.failures_by_test {
            writeln!(
                out,
                "\n❌ {test} ({} config{}):",
                configs.len(),
                plural(configs.len())
            )?;
            for config in configs {
                let (freq, delay) = split_config_label(config);
                writeln!(out, "   • {config} ({freq}, {delay})")?;
            }
        }

        writeln!(out)?;
        writeln!(out, "{heavy}")?;
        writeln!(out, "FAILURE ANALYSIS:")?;
        writeln!(out, "{heavy}")?;
        writeln!(out, "\nFailures by frequency:")?;
        for (freq, count) in &agg.failures_by_frequency {
            writeln!(out, "  • {freq}: {count} test(s) failed")?;
        }
        writeln!(out, "\nFailures by delay:")?;
        for (delay, count) in &agg.failures_by_delay {
            writeln!(out, "  • {delay}: {count} test(s) failed")?;
        }
        if let Some((test, count)) = agg.most_problematic() {
            writeln!(out, "\nMost problematic test:")?;
            writeln!(out, "  • {test}: failed in {count} configuration(s)")?;
        }
        Ok(())
    }
}

impl fmt::Display for SweepReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let heavy = "=".repeat(RULE_WIDTH);
        writeln!(f, "{heavy}")?;
        writeln!(f, "TIMER TEST SWEEP RESULTS SUMMARY")?;
        writeln!(f, "{heavy}")?;
        writeln!(
            f,
            "Found {} log file(s) in {}",
            self.log_files.len(),
            self.source
        )?;
        writeln!(f)?;

        self.write_table(f)?;
        self.write_verdict(f)?;
        if self.aggregate.total_failed > 0 {
            self.write_failures(f)?;
        }

        writeln!(f)?;
        writeln!(f, "{heavy}")?;
        writeln!(f, "\nLog files analyzed:")?;
        for log in &self.log_files {
            writeln!(f, "  • {}", log.display())?;
        }
        writeln!(f)
    }
}

/// One record per configuration, for pipelines consuming `--format json`.
#[derive(Debug, Serialize)]
pub struct ConfigRecord<'a> {
    pub config: &'a str,
    pub frequency: &'a str,
    pub delay: &'a str,
    pub passed: u32,
    pub failed: u32,
    pub total: u32,
    pub status: Status,
    pub failed_tests: &'a [String],
}

#[derive(Debug, Serialize)]
pub struct JsonSummary<'a> {
    pub configurations: Vec<ConfigRecord<'a>>,
    #[serde(flatten)]
    pub aggregate: &'a AggregateReport,
    #[serde(flatten)]
    pub verdict: Verdict,
}

impl SweepReport {
    pub fn json_summary(&self) -> JsonSummary<'_> {
        let configurations = self
            .results
            .iter()
            .map(|r| {
                let (frequency, delay) = split_config_label(&r.config);
                ConfigRecord {
                    config: &r.config,
                    frequency,
                    delay,
                    passed: r.passed,
                    failed: r.failed,
                    total: r.total,
                    status: r.status(),
                    failed_tests: &r.failed_tests,
                }
            })
            .collect();
        JsonSummary {
            configurations,
            aggregate: &self.aggregate,
            verdict: self.aggregate.verdict(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(config: &str, passed: u32, failed_tests: &[&str]) -> ParseResult {
        let failed = failed_tests.len() as u32;
        ParseResult {
            config: config.to_string(),
            passed,
            failed,
            total: passed + failed,
            failed_tests: failed_tests.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn test_split_config_label() {
        assert_eq!(split_config_label("100MHz_1us"), ("100MHz", "1us"));
        assert_eq!(split_config_label("1GHz"), ("1GHz", "Unknown"));
        assert_eq!(split_config_label("a_b_c"), ("a", "b"));
    }

    #[test]
    fn test_breakdowns() {
        let results = vec![
            ParseResult {
                failed: 2,
                total: 15,
                passed: 13,
                failed_tests: vec!["test_a".to_string()],
                config: "100MHz_1us".to_string(),
            },
            result("200MHz_1us", 14, &["test_a"]),
            result("10MHz_1us", 15, &[]),
        ];
        let report = AggregateReport::from_results(&results);

        assert_eq!(report.total_tests, 45);
        assert_eq!(report.total_failed, 3);
        assert_eq!(report.total_passed, 42);
        assert_eq!(
            report.failures_by_test["test_a"],
            ["100MHz_1us", "200MHz_1us"]
        );
        assert_eq!(
            report.failures_by_frequency,
            BTreeMap::from([("100MHz".to_string(), 2), ("200MHz".to_string(), 1)])
        );
        assert_eq!(
            report.failures_by_delay,
            BTreeMap::from([("1us".to_string(), 3)])
        );
        assert_eq!(report.most_problematic(), Some(("test_a", 2)));
    }

    #[test]
    fn test_grouping_ignores_input_order() {
        let mut results = vec![
            result("100MHz_1us", 10, &["test_b", "test_a"]),
            result("500MHz_10ns", 9, &["test_c", "test_a", "test_b"]),
            result("1GHz_10ns", 8, &["test_a"]),
        ];
        let forward = AggregateReport::from_results(&results);
        results.reverse();
        let backward = AggregateReport::from_results(&results);
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_most_problematic_tie_takes_first_name() {
        let results = vec![
            result("1GHz_10ns", 0, &["test_z", "test_b"]),
            result("100MHz_1us", 0, &["test_b", "test_z"]),
        ];
        let report = AggregateReport::from_results(&results);
        assert_eq!(report.most_problematic(), Some(("test_b", 2)));
    }

    #[test]
    fn test_repeated_name_counts_one_configuration() {
        let results = vec![
            result("100MHz_1us", 2, &["test_z", "test_z", "test_z"]),
            result("200MHz_1us", 1, &["test_a"]),
            result("500MHz_10ns", 1, &["test_a"]),
        ];
        let report = AggregateReport::from_results(&results);
        assert_eq!(report.failures_by_test["test_z"], ["100MHz_1us"]);
        assert_eq!(
            report.failures_by_test["test_a"],
            ["200MHz_1us", "500MHz_10ns"]
        );
        assert_eq!(report.most_problematic(), Some(("test_a", 2)));

        let text = SweepReport::new(".".to_string(), vec![], results).to_string();
        assert!(text.contains("❌ test_z (1 config):\n   • 100MHz_1us (100MHz, 1us)\n"));
    }

    #[test]
    fn test_verdict() {
        let ok = AggregateReport::from_results(&[result("a_b", 3, &[])]);
        assert_eq!(ok.verdict(), Verdict::Success);

        let empty = AggregateReport::from_results(&[ParseResult::empty("a_b")]);
        assert_eq!(empty.verdict(), Verdict::NoResults);

        let failing = AggregateReport::from_results(&[result("a_b", 2, &["t"])]);
        let Verdict::Failure { pass_rate } = failing.verdict() else {
            panic!("expected failure verdict");
        };
        assert_eq!(format!("{pass_rate:.1}"), "66.7");
    }

    #[test]
    fn test_rendered_report() {
        let report = SweepReport::new(
            "sweep_logs".to_string(),
            vec![
                PathBuf::from("sweep_logs/sweep_100MHz_1us.log"),
                PathBuf::from("sweep_logs/sweep_200MHz_1us.log"),
            ],
            vec![
                ParseResult {
                    failed: 2,
                    total: 15,
                    ..result("100MHz_1us", 13, &["test_a"])
                },
                result("200MHz_1us", 15, &[]),
            ],
        );
        let text = report.to_string();

        assert!(text.contains("Found 2 log file(s) in sweep_logs"));
        let row = format!(
            "100MHz_1us{}13{}2{}15{}✗  FAIL",
            " ".repeat(22),
            " ".repeat(8),
            " ".repeat(7),
            " ".repeat(5)
        );
        assert!(text.contains(&row));
        assert!(text.contains("❌ FAILURES DETECTED: 2/30 tests failed"));
        assert!(text.contains("   Pass rate: 93.3%"));
        assert!(text.contains("❌ 100MHz_1us (2 failures):\n   • test_a"));
        assert!(text.contains("❌ test_a (1 config):\n   • 100MHz_1us (100MHz, 1us)"));
        assert!(text.contains("  • 100MHz: 2 test(s) failed"));
        assert!(text.contains("  • test_a: failed in 1 configuration(s)"));
        assert!(text.contains("  • sweep_logs/sweep_200MHz_1us.log"));
    }

    #[test]
    fn test_unidentified_failures() {
        let report = SweepReport::new(
            ".".to_string(),
            vec![],
            vec![ParseResult {
                failed: 1,
                total: 1,
                ..ParseResult::empty("50MHz_1us")
            }],
        );
        let text = report.to_string();
        assert!(text.contains("❌ 50MHz_1us (1 failure):\n   (Failed tests not identified)"));
        assert!(!text.contains("FAILURE ANALYSIS"));
    }

    #[test]
    fn test_json_summary() {
        let report = SweepReport::new(
            "sweep_logs".to_string(),
            vec![],
            vec![result("100MHz_1us", 1, &["test_a"])],
        );
        let value = serde_json::to_value(report.json_summary()).unwrap();
        assert_eq!(value["verdict"], "failure");
        assert_eq!(value["pass_rate"], 50.0);
        assert_eq!(value["total_failed"], 1);
        assert_eq!(value["configurations"][0]["status"], "FAIL");
        assert_eq!(value["configurations"][0]["frequency"], "100MHz");
        assert_eq!(value["failures_by_test"]["test_a"][0], "100MHz_1us");
    }
}
