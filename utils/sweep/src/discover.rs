use std::path::{Path, PathBuf};

use anyhow::Result;
use glob::glob;

/// Log files picked up by the report, sorted by file name.
#[derive(Debug, Clone)]
pub struct LogSet {
    /// Glob the files were matched against.
    pub pattern: String,
    /// Where the logs were found, for display.
    pub source: String,
    pub files: Vec<PathBuf>,
}

/// Look for `sweep_*.log` in `results_dir`, or in the current directory if
/// `results_dir` does not exist.
pub fn discover_logs(results_dir: &Path) -> Result<LogSet> {
    let (pattern, source) = if results_dir.is_dir() {
        (
            results_dir.join("sweep_*.log").to_string_lossy().into_owned(),
            results_dir.display().to_string(),
        )
    } else {
        ("sweep_*.log".to_string(), "current directory".to_string())
    };

    let mut files = Vec::new();
    for entry in glob(&pattern)? {
        let path = entry?;
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();

    Ok(LogSet {
        pattern,
        source,
        files,
    })
}
