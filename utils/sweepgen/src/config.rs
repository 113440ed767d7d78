use std::fs::File;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::matrix::{Configuration, default_matrix};

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to read sweep settings {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse sweep settings {path:?}")]
    Parse {
        path: PathBuf,
        #[source]
        source: yaml_serde::Error,
    },
    #[error("`{0}` must name a program to run")]
    EmptyRunner(&'static str),
    #[error("sweep settings define no configurations")]
    EmptyMatrix,
}

#[derive(Deserialize, Debug, Clone)]
pub struct LongSettings {
    #[serde(default = "default_long_testbench")]
    pub testbench: PathBuf,
    #[serde(default = "default_long_runner")]
    pub runner: Vec<String>,
}

impl Default for LongSettings {
    fn default() -> Self {
        Self {
            testbench: default_long_testbench(),
            runner: default_long_runner(),
        }
    }
}

/// Where the sweep reads and writes, and which configurations it covers.
#[derive(Deserialize, Debug, Clone)]
pub struct SweepSettings {
    #[serde(rename = "resultsDir", default = "default_results_dir")]
    pub results_dir: PathBuf,
    #[serde(default = "default_testbench")]
    pub testbench: PathBuf,
    #[serde(default = "default_runner")]
    pub runner: Vec<String>,
    #[serde(default = "default_script")]
    pub script: PathBuf,
    #[serde(default)]
    pub long: LongSettings,
    #[serde(default = "default_matrix")]
    pub configurations: Vec<Configuration>,
}

fn default_results_dir() -> PathBuf {
    PathBuf::from("sweep_logs")
}

fn default_testbench() -> PathBuf {
    PathBuf::from("tb/tb_timer.vhd")
}

fn default_runner() -> Vec<String> {
    vec!["python".to_string(), "run.py".to_string()]
}

fn default_script() -> PathBuf {
    PathBuf::from("run_sweep_all.sh")
}

fn default_long_testbench() -> PathBuf {
    PathBuf::from("tb/tb_timer_long.vhd")
}

fn default_long_runner() -> Vec<String> {
    vec!["python".to_string(), "run_long.py".to_string()]
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            results_dir: default_results_dir(),
            testbench: default_testbench(),
            runner: default_runner(),
            script: default_script(),
            long: LongSettings::default(),
            configurations: default_matrix(),
        }
    }
}

impl SweepSettings {
    pub fn from_path(path: &Path) -> Result<Self, SettingsError> {
        let file = File::open(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: SweepSettings =
            yaml_serde::from_reader(file).map_err(|source| SettingsError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load `path` if it exists, otherwise fall back to the built-in defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, SettingsError> {
        if path.exists() {
            Self::from_path(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_yaml(text: &str) -> Result<Self, SettingsError> {
        let settings: SweepSettings =
            yaml_serde::from_str(text).map_err(|source| SettingsError::Parse {
                path: PathBuf::from("<inline>"),
                source,
            })?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if self.runner.is_empty() {
            return Err(SettingsError::EmptyRunner("runner"));
        }
        if self.long.runner.is_empty() {
            return Err(SettingsError::EmptyRunner("long.runner"));
        }
        if self.configurations.is_empty() {
            return Err(SettingsError::EmptyMatrix);
        }
        Ok(())
    }

    /// Log file written for one configuration.
    pub fn log_path(&self, config: &Configuration) -> PathBuf {
        self.results_dir.join(format!("sweep_{}.log", config.name))
    }
}
