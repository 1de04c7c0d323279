use crate::error::ConfigError;
use crate::utils::config_paths;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

pub const DEFAULT_PROMPT: &str = ">>>";
// Matches the historical fixed table size
pub const DEFAULT_MAX_JOBS: usize = 1024;

pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const MAX_JOBS_ENV: &str = "DOIT_MAX_JOBS";
pub const PROMPT_ENV: &str = "DOIT_PROMPT";
pub const TABLE_FULL_POLICY_ENV: &str = "DOIT_TABLE_FULL_POLICY";
pub const LOG_ENV: &str = "DOIT_LOG";

/// What to do with a background command when every job slot is taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableFullPolicy {
    /// Report the capacity error and start nothing
    #[default]
    Reject,
    /// Run the command in the foreground instead
    Foreground,
}

impl FromStr for TableFullPolicy {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(TableFullPolicy::Reject),
            "foreground" => Ok(TableFullPolicy::Foreground),
            _ => Err(ConfigError::InvalidValue {
                key: "table_full_policy",
                value: value.to_string(),
            }),
        }
    }
}

impl fmt::Display for TableFullPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableFullPolicy::Reject => f.write_str("reject"),
            TableFullPolicy::Foreground => f.write_str("foreground"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    pub max_jobs: usize,
    pub prompt: String,
    pub table_full_policy: TableFullPolicy,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            max_jobs: DEFAULT_MAX_JOBS,
            prompt: DEFAULT_PROMPT.to_string(),
            table_full_policy: TableFullPolicy::default(),
        }
    }
}

impl ShellConfig {
    /// Loads the file layer, then the environment layer.
    ///
    /// An explicit path must exist; the default location is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let base = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match config_paths::default_config_file() {
                Some(path) if path.is_file() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        base.with_env(|key| std::env::var(key).ok())
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::InvalidFormat {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Applies `DOIT_*` overrides read through `lookup`.
    pub fn with_env<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(MAX_JOBS_ENV) {
            self.max_jobs = parse_max_jobs(&value)?;
        }
        if let Some(value) = lookup(PROMPT_ENV) {
            self.prompt = value;
        }
        if let Some(value) = lookup(TABLE_FULL_POLICY_ENV) {
            self.table_full_policy = value.parse()?;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_jobs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_jobs",
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_max_jobs(value: &str) -> Result<usize, ConfigError> {
    value
        .trim()
        .parse::<usize>()
        .map_err(|_| ConfigError::InvalidValue {
            key: "max_jobs",
            value: value.to_string(),
        })
}
