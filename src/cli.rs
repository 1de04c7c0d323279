//! CLI 命令行参数解析
//!
//! 使用 clap 定义命令行接口；剩余参数作为单次执行的命令

use crate::config::{ShellConfig, TableFullPolicy};
use crate::error::ConfigError;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(
    name = "doit",
    version,
    about = "Interactive shell with background jobs and resource-usage reports"
)]
pub struct Cli {
    /// Config file (default: $XDG_CONFIG_HOME/doit/config.toml)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Capacity of the background job table
    #[arg(long, value_name = "N")]
    pub max_jobs: Option<usize>,

    /// Prompt shown before each command
    #[arg(long)]
    pub prompt: Option<String>,

    /// What to do with `cmd &` when the job table is full: reject | foreground
    #[arg(long, value_name = "POLICY")]
    pub table_full_policy: Option<String>,

    /// Log filter, e.g. `debug` or `doit=trace` (overrides DOIT_LOG)
    #[arg(long, value_name = "FILTER")]
    pub log_level: Option<String>,

    /// Also append logs to this file
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Run this command once instead of starting the prompt loop
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

impl Cli {
    /// File and environment layers, then the flags on top.
    pub fn resolve_config(&self) -> Result<ShellConfig, ConfigError> {
        let base = ShellConfig::load(self.config.as_deref())?;
        self.apply_to(base)
    }

    pub fn apply_to(&self, mut config: ShellConfig) -> Result<ShellConfig, ConfigError> {
        if let Some(max_jobs) = self.max_jobs {
            config.max_jobs = max_jobs;
        }
        if let Some(prompt) = &self.prompt {
            config.prompt = prompt.clone();
        }
        if let Some(policy) = &self.table_full_policy {
            config.table_full_policy = policy.parse::<TableFullPolicy>()?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn is_single_shot(&self) -> bool {
        !self.command.is_empty()
    }
}
