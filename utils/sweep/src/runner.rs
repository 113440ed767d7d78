//! Native execution of the sweep.
//!
//! Configurations run strictly one after another: the testbench is patched,
//! the external runner is started and waited for, and only then does the
//! next configuration touch the testbench. There is no timeout; a runner
//! that never exits blocks the sweep.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{Context, Result};
use serde::Serialize;
use sweepgen::{Configuration, SweepSettings, group_thousands, patch_file};
use xshell::{Shell, cmd};

use crate::log_parser::{Status, last_summary_line};

const RULE: &str = "============================================================";

#[derive(Debug, Clone, Serialize)]
pub struct ConfigOutcome {
    pub name: String,
    pub frequency_hz: u64,
    pub delay: String,
    pub success: bool,
    pub freq_applied: bool,
    pub delay_applied: bool,
    pub log: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepOutcome {
    pub configurations: Vec<ConfigOutcome>,
}

impl SweepOutcome {
    pub fn total(&self) -> usize {
        self.configurations.len()
    }

    pub fn passed(&self) -> usize {
        self.configurations.iter().filter(|c| c.success).count()
    }

    pub fn failed(&self) -> usize {
        self.total() - self.passed()
    }

    pub fn write_summary(&self, path: &Path) -> Result<()> {
        let file = File::create(path).context(format!("Failed to create {path:?}"))?;
        serde_json::to_writer_pretty(file, self)
            .context(format!("Failed to write summary {path:?}"))?;
        Ok(())
    }
}

/// Run the external runner with stdout and stderr both sent to `log`.
fn run_logged(runner: &[String], log: &Path) -> Result<bool> {
    let (program, args) = runner
        .split_first()
        .ok_or_else(|| anyhow::anyhow!("Runner command is empty"))?;
    let stdout = File::create(log).context(format!("Failed to create log {log:?}"))?;
    let stderr = stdout.try_clone()?;

    let status = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(stdout)
        .stderr(stderr)
        .status()
        .context(format!("Failed to start {program}"))?;
    Ok(status.success())
}

fn run_one(sh: &Shell, settings: &SweepSettings, config: &Configuration) -> ConfigOutcome {
    println!();
    println!("Testing: {} - {}", config.name, config.description);
    println!("  Frequency: {} Hz", group_thousands(config.frequency_hz));
    println!("  Delay: {}", config.delay);
    println!("  Updating testbench...");

    let log = settings.log_path(config);
    let mut outcome = ConfigOutcome {
        name: config.name.clone(),
        frequency_hz: config.frequency_hz,
        delay: config.delay.to_string(),
        success: false,
        freq_applied: false,
        delay_applied: false,
        log: log.clone(),
    };

    if let Err(err) = sh.create_dir(&settings.results_dir) {
        println!("  [FAIL] {err}");
        return outcome;
    }

    match patch_file(&settings.testbench, config) {
        Ok(patched) => {
            outcome.freq_applied = patched.freq_applied;
            outcome.delay_applied = patched.delay_applied;
            if !patched.freq_applied {
                println!("  [WARN] TB_CLK_FREQ declaration not found; frequency not applied");
            }
            if !patched.delay_applied {
                println!("  [WARN] TB_DELAY declaration not found; delay not applied");
            }
        }
        Err(err) => {
            tracing::warn!("{:#}", anyhow::Error::from(err));
            println!("  [WARN] testbench not updated; configuration not applied");
        }
    }

    println!("  Running tests...");
    let success = match run_logged(&settings.runner, &log) {
        Ok(success) => success,
        Err(err) => {
            tracing::warn!(config = %config.name, "{err:#}");
            // Keep the reason next to the other logs.
            if let Err(write_err) = std::fs::write(&log, format!("{err:#}\n")) {
                tracing::warn!(log = ?log, "Failed to record runner error: {write_err}");
            }
            false
        }
    };
    outcome.success = success;

    let content = std::fs::read_to_string(&log).unwrap_or_default();
    if success {
        let line = last_summary_line(&content, Status::Pass).unwrap_or_default();
        println!("  [PASS] {line}");
    } else {
        let line = last_summary_line(&content, Status::Fail).unwrap_or_else(|| "unknown".into());
        println!("  [FAIL] {line}");
        println!("    See {} for details", log.display());
    }

    outcome
}

/// Run every configuration in order, continuing past failures, and write
/// `summary.json` into the results directory.
pub fn run_sweep(settings: &SweepSettings) -> Result<SweepOutcome> {
    let sh = Shell::new()?;

    println!("Running timer test suite across multiple configurations...");
    println!("{RULE}");

    let mut outcome = SweepOutcome::default();
    for config in &settings.configurations {
        tracing::debug!(config = %config.name, "starting configuration");
        outcome.configurations.push(run_one(&sh, settings, config));
    }

    println!();
    println!("{RULE}");
    println!("SWEEP COMPLETE");
    println!("{RULE}");
    println!("Total configurations: {}", outcome.total());
    println!("Passed: {}", outcome.passed());
    println!("Failed: {}", outcome.failed());
    println!();

    if outcome.failed() == 0 {
        println!("SUCCESS: ALL CONFIGURATIONS PASSED!");
    } else {
        println!("WARNING: Some configurations failed. Check logs:");
        for config in &outcome.configurations {
            println!("{}", config.log.display());
        }
        println!();
        println!("Run: timer-sweep report for detailed analysis");
    }

    sh.create_dir(&settings.results_dir)?;
    outcome.write_summary(&settings.results_dir.join("summary.json"))?;

    Ok(outcome)
}

fn describe_frequency(hz: u64) -> String {
    match hz {
        hz if hz >= 1_000_000_000 && hz % 1_000_000_000 == 0 => format!("{} GHz", hz / 1_000_000_000),
        hz if hz >= 1_000_000 && hz % 1_000_000 == 0 => format!("{} MHz", hz / 1_000_000),
        hz if hz >= 1_000 && hz % 1_000 == 0 => format!("{} kHz", hz / 1_000),
        hz => format!("{hz} Hz"),
    }
}

pub fn long_banner(config: &Configuration) -> String {
    let rule = "=".repeat(70);
    format!(
        "{rule}\nLONG DELAY TEST\n{rule}\n\
         Configuration: {} clock, {} delay\n\
         Expected cycles: {}\n\
         Simulation time: ~{} real time\n\
         {rule}\n",
        describe_frequency(config.frequency_hz),
        config.delay,
        group_thousands(config.expected_cycles()),
        config.delay,
    )
}

/// Single long-delay run; output goes straight to the terminal.
pub fn run_long(settings: &SweepSettings, config: &Configuration) -> Result<()> {
    let sh = Shell::new()?;

    println!("{}", long_banner(config));
    if !settings.long.testbench.exists() {
        tracing::warn!(testbench = ?settings.long.testbench, "long-delay testbench not found");
    }

    let (program, args) = settings
        .long
        .runner
        .split_first()
        .ok_or_else(|| anyhow::anyhow!("Long runner command is empty"))?;
    cmd!(sh, "{program} {args...}")
        .run()
        .context(format!("Long-delay run of {} failed", config.name))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sweepgen::{Delay, TimeUnit, long_delay};

    #[test]
    fn test_describe_frequency() {
        assert_eq!(describe_frequency(10_000_000), "10 MHz");
        assert_eq!(describe_frequency(1_000_000_000), "1 GHz");
        assert_eq!(describe_frequency(150_000_000), "150 MHz");
        assert_eq!(describe_frequency(32_768), "32768 Hz");
    }

    #[test]
    fn test_long_banner() {
        let banner = long_banner(&long_delay());
        assert!(banner.contains("Configuration: 10 MHz clock, 1 sec delay\n"));
        assert!(banner.contains("Expected cycles: 10,000,000\n"));
    }

    #[cfg(unix)]
    #[test]
    fn test_sweep_continues_after_failure() {
        let dir = tempfile::tempdir().unwrap();
        let testbench = dir.path().join("tb_timer.vhd");
        std::fs::write(
            &testbench,
            "constant TB_CLK_FREQ : natural := 1;\nconstant TB_DELAY    : time    := 1 ns;\n",
        )
        .unwrap();

        // Fails whenever the testbench is set to 20 MHz.
        let script = format!(
            "if grep -q ':= 20000000;' {tb}; then echo 'fail 1 of 2'; exit 1; fi; echo 'pass 2 of 2'",
            tb = testbench.display()
        );
        let settings = SweepSettings {
            results_dir: dir.path().join("logs"),
            testbench: testbench.clone(),
            runner: vec!["sh".to_string(), "-c".to_string(), script],
            configurations: vec![
                Configuration::new("10MHz_1us", 10_000_000, Delay::new(1.0, TimeUnit::Us), ""),
                Configuration::new("20MHz_1us", 20_000_000, Delay::new(1.0, TimeUnit::Us), ""),
                Configuration::new("30MHz_1us", 30_000_000, Delay::new(1.0, TimeUnit::Us), ""),
            ],
            ..SweepSettings::default()
        };

        let outcome = run_sweep(&settings).unwrap();
        assert_eq!(outcome.total(), 3);
        assert_eq!(outcome.passed(), 2);
        assert_eq!(outcome.failed(), 1);
        assert!(!outcome.configurations[1].success);
        assert!(outcome.configurations.iter().all(|c| c.freq_applied && c.delay_applied));

        let failed_log =
            std::fs::read_to_string(dir.path().join("logs/sweep_20MHz_1us.log")).unwrap();
        assert_eq!(failed_log, "fail 1 of 2\n");
        assert!(dir.path().join("logs/summary.json").exists());
        assert!(
            std::fs::read_to_string(&testbench)
                .unwrap()
                .contains("constant TB_CLK_FREQ : natural := 30000000;")
        );
    }

    #[test]
    fn test_missing_runner_is_a_failed_configuration() {
        let dir = tempfile::tempdir().unwrap();
        let settings = SweepSettings {
            results_dir: dir.path().join("logs"),
            testbench: dir.path().join("absent.vhd"),
            runner: vec!["timer-sweep-no-such-runner".to_string()],
            configurations: vec![Configuration::new(
                "10MHz_1us",
                10_000_000,
                Delay::new(1.0, TimeUnit::Us),
                "",
            )],
            ..SweepSettings::default()
        };

        let outcome = run_sweep(&settings).unwrap();
        assert_eq!(outcome.failed(), 1);
        assert!(!outcome.configurations[0].freq_applied);
        assert!(dir.path().join("logs/sweep_10MHz_1us.log").exists());
    }

    #[test]
    fn test_unwritable_log_is_a_failed_configuration() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the log should go makes every write to it fail.
        std::fs::create_dir_all(dir.path().join("logs/sweep_10MHz_1us.log")).unwrap();
        let settings = SweepSettings {
            results_dir: dir.path().join("logs"),
            testbench: dir.path().join("absent.vhd"),
            runner: vec!["timer-sweep-no-such-runner".to_string()],
            configurations: vec![Configuration::new(
                "10MHz_1us",
                10_000_000,
                Delay::new(1.0, TimeUnit::Us),
                "",
            )],
            ..SweepSettings::default()
        };

        let outcome = run_sweep(&settings).unwrap();
        assert_eq!(outcome.failed(), 1);
        assert!(dir.path().join("logs/sweep_10MHz_1us.log").is_dir());
        assert!(dir.path().join("logs/summary.json").exists());
    }
}
