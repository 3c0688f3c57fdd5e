//! Harness configuration
//!
//! Everything has a default matching the kernel's `make qemu` boot, so the
//! config file is optional. Command-line flags are applied on top by the
//! binary.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::defaults::{DEFAULT_ARGS, DEFAULT_COMMAND, DEFAULT_PATTERNS};
use crate::error::{Error, Result};
use crate::pattern::PatternSet;
use crate::trial::TrialRunner;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Config {
    /// The boot command to supervise
    #[serde(default)]
    pub command: CommandConfig,

    /// Trial count and timing
    #[serde(default)]
    pub campaign: CampaignConfig,

    /// Expected output, as regular expressions
    #[serde(default = "default_patterns")]
    pub patterns: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            command: CommandConfig::default(),
            campaign: CampaignConfig::default(),
            patterns: default_patterns(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CommandConfig {
    #[serde(default = "default_program")]
    pub program: String,

    #[serde(default = "default_args")]
    pub args: Vec<String>,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: default_args(),
        }
    }
}

/// Timing is in milliseconds
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CampaignConfig {
    #[serde(default = "default_trials")]
    pub trials: usize,

    /// Liveness budget for one trial
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Wait between SIGTERM and SIGKILL
    #[serde(default = "default_grace_ms")]
    pub grace_ms: u64,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            trials: default_trials(),
            timeout_ms: default_timeout_ms(),
            grace_ms: default_grace_ms(),
        }
    }
}

fn default_program() -> String {
    DEFAULT_COMMAND.to_string()
}
fn default_args() -> Vec<String> {
    DEFAULT_ARGS.iter().map(|s| s.to_string()).collect()
}
fn default_patterns() -> Vec<String> {
    DEFAULT_PATTERNS.iter().map(|s| s.to_string()).collect()
}
fn default_trials() -> usize {
    100
}
fn default_timeout_ms() -> u64 {
    5_000
}
fn default_grace_ms() -> u64 {
    100
}

impl Config {
    /// Load configuration from `path`, or defaults when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|source| Error::FileRead {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::parse(&content, path)
            }
            None => Ok(Self::default()),
        }
    }

    fn parse(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|source| Error::ConfigParse {
            path: PathBuf::from(path),
            source,
        })
    }

    pub fn liveness_timeout(&self) -> Duration {
        Duration::from_millis(self.campaign.timeout_ms)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.campaign.grace_ms)
    }

    /// Compile the patterns and build the runner for one trial
    pub fn trial_runner(&self) -> Result<TrialRunner> {
        if self.command.program.trim().is_empty() {
            return Err(Error::Config("command program must not be empty".to_string()));
        }
        let patterns = PatternSet::new(&self.patterns)?;
        Ok(TrialRunner::new(
            self.command.program.clone(),
            self.command.args.clone(),
            patterns,
            self.liveness_timeout(),
        )
        .with_grace_period(self.grace_period()))
    }
}
