// ABOUTME: Configuration management for gridflow application
// ABOUTME: Handles loading and merging configuration from files and environment variables

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::engine::{ExecutionMode, DEFAULT_MAX_CONCURRENT_JOBS, DEFAULT_STEP_TIMEOUT};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,

    #[serde(default)]
    pub default_mode: ExecutionMode,

    #[serde(with = "humantime_serde", default = "default_step_timeout")]
    pub step_timeout: Duration,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

fn default_max_concurrent_jobs() -> usize {
    DEFAULT_MAX_CONCURRENT_JOBS
}

fn default_step_timeout() -> Duration {
    DEFAULT_STEP_TIMEOUT
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: DEFAULT_MAX_CONCURRENT_JOBS,
            default_mode: ExecutionMode::DryRun,
            step_timeout: DEFAULT_STEP_TIMEOUT,
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file path or default locations
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p,
            None => Self::find_config_file(),
        };

        let mut config = if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)
                .with_context(|| format!("reading {}", config_path.display()))?;
            serde_yaml::from_str(&contents)
                .with_context(|| format!("parsing {}", config_path.display()))?
        } else {
            Config::default()
        };

        config.merge_env()?;
        Ok(config)
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> PathBuf {
        let possible_paths = [
            PathBuf::from("gridflow.yaml"),
            PathBuf::from("gridflow.yml"),
            PathBuf::from(".gridflow.yaml"),
            PathBuf::from(".gridflow.yml"),
        ];

        for path in possible_paths {
            if path.exists() {
                return path;
            }
        }

        if let Some(home_dir) = dirs::home_dir() {
            let home_config = home_dir.join(".gridflow").join("config.yaml");
            if home_config.exists() {
                return home_config;
            }
        }

        // Default path (may not exist)
        PathBuf::from("gridflow.yaml")
    }

    /// Merge environment variables into configuration
    fn merge_env(&mut self) -> Result<()> {
        if let Ok(level) = std::env::var("GRIDFLOW_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("GRIDFLOW_LOG_FORMAT") {
            self.logging.format = format;
        }
        if let Ok(max_jobs) = std::env::var("GRIDFLOW_MAX_CONCURRENT") {
            self.max_concurrent_jobs = max_jobs
                .parse()
                .with_context(|| format!("GRIDFLOW_MAX_CONCURRENT='{}'", max_jobs))?;
        }
        if let Ok(timeout) = std::env::var("GRIDFLOW_STEP_TIMEOUT") {
            self.step_timeout = humantime_serde::re::humantime::parse_duration(&timeout)
                .with_context(|| format!("GRIDFLOW_STEP_TIMEOUT='{}'", timeout))?;
        }
        if let Ok(mode) = std::env::var("GRIDFLOW_MODE") {
            self.default_mode = mode.parse().map_err(anyhow::Error::msg)?;
        }
        Ok(())
    }
}
