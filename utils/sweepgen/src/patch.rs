//! Rewriting of the clock and delay constants in the timer testbench.
//!
//! The testbench declares both parameters as plain VHDL constants:
//!
//! ```text
//! constant TB_CLK_FREQ : natural := 100_000_000;
//! constant TB_DELAY    : time    := 1 us;
//! ```
//!
//! Only lines matching those declarations are touched. Rewriting with the
//! same values twice yields the same text.

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::{NoExpand, Regex};

use crate::matrix::Configuration;

/// `sed` pattern for the clock declaration, shared with the driver script.
pub const CLK_FREQ_PATTERN: &str = "constant TB_CLK_FREQ : natural := [0-9_]*;";
/// `sed` pattern for the delay declaration, shared with the driver script.
pub const DELAY_PATTERN: &str = "constant TB_DELAY    : time    := .*;";

static CLK_FREQ_RE: OnceLock<Regex> = OnceLock::new();
static DELAY_RE: OnceLock<Regex> = OnceLock::new();

#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    #[error("failed to read testbench {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write testbench {path:?}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub fn clk_freq_declaration(frequency_hz: u64) -> String {
    format!("constant TB_CLK_FREQ : natural := {frequency_hz};")
}

pub fn delay_declaration(delay: &str) -> String {
    format!("constant TB_DELAY    : time    := {delay};")
}

/// Result of rewriting one testbench source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patched {
    pub text: String,
    pub freq_applied: bool,
    pub delay_applied: bool,
}

impl Patched {
    pub fn fully_applied(&self) -> bool {
        self.freq_applied && self.delay_applied
    }
}

fn substitute<'t>(re: &Regex, text: &'t str, replacement: &str) -> (Cow<'t, str>, bool) {
    let found = re.is_match(text);
    (re.replace_all(text, NoExpand(replacement)), found)
}

/// Rewrite both constants in `source` for `config`.
pub fn patch_source(source: &str, config: &Configuration) -> Patched {
    let clk_re = CLK_FREQ_RE.get_or_init(|| Regex::new(CLK_FREQ_PATTERN).unwrap());
    let delay_re = DELAY_RE.get_or_init(|| Regex::new(DELAY_PATTERN).unwrap());

    let (text, freq_applied) =
        substitute(clk_re, source, &clk_freq_declaration(config.frequency_hz));
    let (text, delay_applied) =
        substitute(delay_re, &text, &delay_declaration(&config.delay.to_string()));

    Patched {
        text: text.into_owned(),
        freq_applied,
        delay_applied,
    }
}

/// Rewrite the testbench file in place, leaving the previous contents in
/// `<path>.bak`.
pub fn patch_file(path: &Path, config: &Configuration) -> Result<Patched, PatchError> {
    let source = std::fs::read_to_string(path).map_err(|source| PatchError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let backup = backup_path(path);
    std::fs::write(&backup, &source).map_err(|source| PatchError::Write {
        path: backup.clone(),
        source,
    })?;

    let patched = patch_source(&source, config);
    std::fs::write(path, &patched.text).map_err(|source| PatchError::Write {
        path: path.to_path_buf(),
        source,
    })?;

    if !patched.freq_applied {
        tracing::warn!(testbench = ?path, config = %config.name, "TB_CLK_FREQ declaration not found; frequency not applied");
    }
    if !patched.delay_applied {
        tracing::warn!(testbench = ?path, config = %config.name, "TB_DELAY declaration not found; delay not applied");
    }

    Ok(patched)
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".bak");
    PathBuf::from(name)
}
