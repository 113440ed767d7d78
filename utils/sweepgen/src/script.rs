use std::fmt::Write as FmtWrite;
use std::path::Path;

use anyhow::Context;

use crate::config::SweepSettings;
use crate::matrix::Configuration;
use crate::patch::{CLK_FREQ_PATTERN, DELAY_PATTERN};

const RULE_WIDTH: usize = 70;

/// `1000000` -> `1,000,000`
pub fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Human-readable overview of the matrix printed before the script is written.
pub fn render_preview(matrix: &[Configuration]) -> String {
    let rule = "-".repeat(RULE_WIDTH);
    let mut out = String::new();
    writeln!(out, "AVAILABLE CONFIGURATIONS:").unwrap();
    writeln!(out, "{rule}").unwrap();
    for (i, config) in matrix.iter().enumerate() {
        writeln!(
            out,
            "{:2}. {:15} | {:>12} Hz | {:>7} | {:25} | ~{} cycles",
            i + 1,
            config.name,
            group_thousands(config.frequency_hz),
            config.delay.to_string(),
            config.description,
            config.expected_cycles()
        )
        .unwrap();
    }
    writeln!(out, "{rule}").unwrap();
    out
}

fn shell_path(path: &Path) -> String {
    shell_words::quote(&path.to_string_lossy()).into_owned()
}

/// Bash driver that applies each configuration in turn and runs the
/// external test runner, continuing past failures.
pub fn render_script(settings: &SweepSettings) -> String {
    let testbench = shell_path(&settings.testbench);
    let results = shell_path(&settings.results_dir);
    let runner = shell_words::join(&settings.runner);
    let log = "\"$results_dir/sweep_${name}.log\"";

    let mut out = String::new();
    out.push_str(
        "#!/bin/bash\n\
         # Auto-generated sweep script\n\
         \n\
         echo \"Running timer test suite across multiple configurations...\"\n\
         echo \"============================================================\"\n\
         echo \"\"\n\
         \n",
    );
    writeln!(out, "results_dir={results}\n").unwrap();
    out.push_str("configs=(\n");
    for config in &settings.configurations {
        writeln!(
            out,
            "  \"{}|{}|{}|{}\"",
            config.name, config.frequency_hz, config.delay, config.description
        )
        .unwrap();
    }
    out.push_str(")\n\ntotal=0\npassed=0\nfailed=0\n\n");

    writeln!(out, "for config in \"${{configs[@]}}\"; do").unwrap();
    out.push_str(
        "    IFS='|' read -r name freq delay desc <<< \"$config\"\n\
         \n\
         \x20   echo \"\"\n\
         \x20   echo \"Testing: $name - $desc\"\n\
         \x20   echo \"  Frequency: $freq Hz\"\n\
         \x20   echo \"  Delay: $delay\"\n\
         \x20   echo \"  Updating testbench...\"\n",
    );
    out.push_str("    mkdir -p \"$results_dir\"\n");
    writeln!(
        out,
        "    sed -i.bak \"s/{CLK_FREQ_PATTERN}/constant TB_CLK_FREQ : natural := ${{freq}};/\" {testbench}"
    )
    .unwrap();
    writeln!(
        out,
        "    sed -i.bak \"s/{DELAY_PATTERN}/constant TB_DELAY    : time    := ${{delay}};/\" {testbench}"
    )
    .unwrap();
    writeln!(
        out,
        "    if ! grep -q \"constant TB_CLK_FREQ : natural := ${{freq}};\" {testbench}; then\n\
         \x20       echo \"  [WARN] TB_CLK_FREQ declaration not found; frequency not applied\"\n\
         \x20   fi"
    )
    .unwrap();
    writeln!(
        out,
        "    if ! grep -q \"constant TB_DELAY    : time    := ${{delay}};\" {testbench}; then\n\
         \x20       echo \"  [WARN] TB_DELAY declaration not found; delay not applied\"\n\
         \x20   fi"
    )
    .unwrap();
    out.push_str("\n    echo \"  Running tests...\"\n");
    writeln!(out, "    if {runner} > {log} 2>&1; then").unwrap();
    writeln!(out, "        result=$(grep \"pass.*of\" {log} | tail -1)").unwrap();
    out.push_str(
        "        echo \"  [PASS] $result\"\n\
         \x20       passed=$((passed + 1))\n\
         \x20   else\n",
    );
    writeln!(
        out,
        "        result=$(grep \"fail.*of\" {log} | tail -1)\n\
         \x20       echo \"  [FAIL] ${{result:-unknown}}\"\n\
         \x20       echo \"    See {} for details\"",
        log.trim_matches('"')
    )
    .unwrap();
    out.push_str(
        "        failed=$((failed + 1))\n\
         \x20   fi\n\
         \x20   total=$((total + 1))\n\
         done\n\
         \n\
         echo \"\"\n\
         echo \"============================================================\"\n\
         echo \"SWEEP COMPLETE\"\n\
         echo \"============================================================\"\n\
         echo \"Total configurations: $total\"\n\
         echo \"Passed: $passed\"\n\
         echo \"Failed: $failed\"\n\
         echo \"\"\n\
         \n\
         if [ $failed -eq 0 ]; then\n\
         \x20   echo \"SUCCESS: ALL CONFIGURATIONS PASSED!\"\n\
         else\n\
         \x20   echo \"WARNING: Some configurations failed. Check logs:\"\n",
    );
    out.push_str("    ls -1 \"$results_dir\"/sweep_*.log\n");
    out.push_str(
        "    echo \"\"\n\
         \x20   echo \"Run: timer-sweep report for detailed analysis\"\n\
         fi\n",
    );
    out
}

/// Write the driver script and mark it executable.
pub fn write_script(path: &Path, contents: &str) -> anyhow::Result<()> {
    std::fs::write(path, contents).context(format!("Failed to write {path:?}"))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
            .context(format!("Failed to mark {path:?} executable"))?;
    }

    Ok(())
}
