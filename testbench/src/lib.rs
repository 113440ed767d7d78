use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use sweep::{AggregateReport, ParseResult, parse_log_file};
use sweepgen::{Patched, default_matrix, patch_source};

pub const FIXTURES_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/fixtures");

fn load_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).context(format!("Failed to open {path:?}"))?;
    yaml_serde::from_reader(file).context(format!("Failed to parse {path:?}"))
}

/// `fixtures/logs/foo.log` -> `fixtures/logs/foo.yaml`
pub fn expectation_path(fixture: &Path) -> PathBuf {
    fixture.with_extension("yaml")
}

/// Expected parse of one log fixture.
#[derive(Deserialize, Debug)]
pub struct LogExpectation {
    pub passed: u32,
    pub failed: u32,
    pub total: u32,
    #[serde(default, rename = "failedTests")]
    pub failed_tests: Vec<String>,
    pub status: String,
}

pub fn check_log_fixture(log: &Path) -> Result<()> {
    let expected: LogExpectation = load_yaml(&expectation_path(log))?;
    let result = parse_log_file(log);

    let mut mismatches = Vec::new();
    if result.passed + result.failed != result.total {
        mismatches.push(format!(
            "totals invariant broken: {} + {} != {}",
            result.passed, result.failed, result.total
        ));
    }
    if (result.passed, result.failed, result.total)
        != (expected.passed, expected.failed, expected.total)
    {
        mismatches.push(format!(
            "counts: got P={} F={} T={}, expected P={} F={} T={}",
            result.passed,
            result.failed,
            result.total,
            expected.passed,
            expected.failed,
            expected.total
        ));
    }
    if result.failed_tests != expected.failed_tests {
        mismatches.push(format!(
            "failed tests: got {:?}, expected {:?}",
            result.failed_tests, expected.failed_tests
        ));
    }
    if result.status().to_string() != expected.status {
        mismatches.push(format!(
            "status: got {}, expected {}",
            result.status(),
            expected.status
        ));
    }

    if !mismatches.is_empty() {
        anyhow::bail!("{}", mismatches.join("\n"));
    }
    Ok(())
}

/// Expected aggregate over a directory of sweep logs.
#[derive(Deserialize, Debug)]
pub struct SweepExpectation {
    #[serde(rename = "totalPassed")]
    pub total_passed: u64,
    #[serde(rename = "totalFailed")]
    pub total_failed: u64,
    #[serde(rename = "totalTests")]
    pub total_tests: u64,
    #[serde(default, rename = "byTest")]
    pub by_test: BTreeMap<String, Vec<String>>,
    #[serde(default, rename = "byFrequency")]
    pub by_frequency: BTreeMap<String, u64>,
    #[serde(default, rename = "byDelay")]
    pub by_delay: BTreeMap<String, u64>,
    #[serde(default, rename = "mostProblematic")]
    pub most_problematic: Option<String>,
}

/// Parse every `sweep_*.log` in `dir`, in the order given.
pub fn parse_sweep_dir(dir: &Path, reverse: bool) -> Result<Vec<ParseResult>> {
    let logs = sweep::discover_logs(dir)?;
    let mut files = logs.files;
    if reverse {
        files.reverse();
    }
    Ok(files.iter().map(|path| parse_log_file(path)).collect())
}

pub fn check_sweep_fixture(dir: &Path) -> Result<()> {
    let expected: SweepExpectation = load_yaml(&dir.join("expected.yaml"))?;

    let forward = AggregateReport::from_results(&parse_sweep_dir(dir, false)?);
    let backward = AggregateReport::from_results(&parse_sweep_dir(dir, true)?);
    if forward != backward {
        anyhow::bail!("aggregate depends on log order:\n{forward:#?}\nvs\n{backward:#?}");
    }

    let report = forward;
    if (report.total_passed, report.total_failed, report.total_tests)
        != (
            expected.total_passed,
            expected.total_failed,
            expected.total_tests,
        )
    {
        anyhow::bail!(
            "totals: got {}/{}/{}, expected {}/{}/{}",
            report.total_passed,
            report.total_failed,
            report.total_tests,
            expected.total_passed,
            expected.total_failed,
            expected.total_tests
        );
    }
    if report.failures_by_test != expected.by_test {
        anyhow::bail!(
            "by test: got {:?}, expected {:?}",
            report.failures_by_test,
            expected.by_test
        );
    }
    if report.failures_by_frequency != expected.by_frequency {
        anyhow::bail!(
            "by frequency: got {:?}, expected {:?}",
            report.failures_by_frequency,
            expected.by_frequency
        );
    }
    if report.failures_by_delay != expected.by_delay {
        anyhow::bail!(
            "by delay: got {:?}, expected {:?}",
            report.failures_by_delay,
            expected.by_delay
        );
    }
    let most = report.most_problematic().map(|(test, _)| test.to_string());
    if most != expected.most_problematic {
        anyhow::bail!(
            "most problematic: got {most:?}, expected {:?}",
            expected.most_problematic
        );
    }
    Ok(())
}

/// Which declarations a testbench fixture is expected to carry.
#[derive(Deserialize, Debug)]
pub struct TestbenchExpectation {
    #[serde(rename = "freqApplied")]
    pub freq_applied: bool,
    #[serde(rename = "delayApplied")]
    pub delay_applied: bool,
}

fn changed_lines<'a>(before: &'a str, after: &'a str) -> Vec<(&'a str, &'a str)> {
    before
        .lines()
        .zip(after.lines())
        .filter(|(a, b)| a != b)
        .collect()
}

/// Apply every built-in configuration to a testbench fixture and check the
/// rewrite is idempotent and confined to the two declarations.
pub fn check_testbench_fixture(vhd: &Path) -> Result<()> {
    let expected: TestbenchExpectation = load_yaml(&expectation_path(vhd))?;
    let source = std::fs::read_to_string(vhd).context(format!("Failed to read {vhd:?}"))?;

    for config in default_matrix() {
        let once: Patched = patch_source(&source, &config);
        let twice = patch_source(&once.text, &config);
        if once.text != twice.text {
            anyhow::bail!("{}: rewrite is not idempotent", config.name);
        }
        if (once.freq_applied, once.delay_applied)
            != (expected.freq_applied, expected.delay_applied)
        {
            anyhow::bail!(
                "{}: applied freq={} delay={}, expected freq={} delay={}",
                config.name,
                once.freq_applied,
                once.delay_applied,
                expected.freq_applied,
                expected.delay_applied
            );
        }
        if once.text.lines().count() != source.lines().count() {
            anyhow::bail!("{}: line count changed", config.name);
        }
        for (before, after) in changed_lines(&source, &once.text) {
            let declaration = after.contains("constant TB_CLK_FREQ : natural := ")
                || after.contains("constant TB_DELAY    : time    := ");
            if !declaration {
                anyhow::bail!("{}: unexpected rewrite of `{before}` to `{after}`", config.name);
            }
        }
    }
    Ok(())
}
