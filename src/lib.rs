//! doit Library
//!
//! Job-control core of a small interactive shell: launching commands,
//! tracking background jobs in a bounded table, reaping them on SIGCHLD and
//! reporting per-command resource usage.

pub mod builtins;
pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod launcher;
pub mod logging;
pub mod platform;
pub mod reaper;
pub mod shell;
pub mod signal;
pub mod tokenizer;
pub mod utils;

// Re-export commonly used types for convenience
pub use config::{ShellConfig, TableFullPolicy};
pub use crate::core::job_table::{Completion, JobId, JobSummary, JobTable};
pub use crate::core::usage::{ChildrenSampler, ResourceUsage, Sampler, Timestamp, UsageReport};
pub use error::{ShellError, ShellResult};
pub use launcher::{Launcher, Outcome};
pub use shell::Shell;
