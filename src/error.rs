//! Unified error handling for the doit shell
//!
//! Every error raised while running a command is local: the command loop
//! prints its user message and keeps going. Only configuration problems at
//! start-up end the process.

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the shell
#[derive(Error, Debug)]
pub enum ShellError {
    #[error(transparent)]
    Launch(#[from] LaunchError),

    #[error(transparent)]
    Builtin(#[from] BuiltinError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Writing to the terminal or reading a command line failed
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Failures while starting or waiting for an external command
#[derive(Error, Debug)]
pub enum LaunchError {
    /// The process-creation primitive itself failed
    #[error("failed to start '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    /// The program image could not be found or loaded
    #[error("{command}: {source}")]
    Exec {
        command: String,
        #[source]
        source: io::Error,
    },

    /// No free slot for a background job
    #[error("job table full ({capacity} jobs); '{command}' not started")]
    TableFull { command: String, capacity: usize },

    #[error("failed to wait for '{command}': {source}")]
    Wait {
        command: String,
        #[source]
        source: io::Error,
    },
}

impl LaunchError {
    /// Classifies a spawn error: a missing or non-executable program image is
    /// an exec failure, anything else a launch failure.
    pub fn from_spawn(command: impl Into<String>, source: io::Error) -> Self {
        let command = command.into();
        match source.kind() {
            io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => {
                LaunchError::Exec { command, source }
            }
            _ => LaunchError::Spawn { command, source },
        }
    }
}

#[derive(Error, Debug)]
pub enum BuiltinError {
    #[error("need argument for \"{builtin}\"")]
    MissingArgument { builtin: &'static str },

    #[error("cd: {}: {source}", path.display())]
    ChangeDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{builtin}: {source}")]
    Output {
        builtin: &'static str,
        #[source]
        source: io::Error,
    },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file error ({}): {message}", path.display())]
    Io { path: PathBuf, message: String },
    #[error("Invalid config file {}: {message}", path.display())]
    InvalidFormat { path: PathBuf, message: String },
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Error categories for user messaging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Launch,
    Exec,
    Capacity,
    Builtin,
    Config,
    Io,
}

impl ErrorCategory {
    pub fn display_name(&self) -> &'static str {
        match self {
            ErrorCategory::Launch => "launch",
            ErrorCategory::Exec => "exec",
            ErrorCategory::Capacity => "capacity",
            ErrorCategory::Builtin => "builtin",
            ErrorCategory::Config => "config",
            ErrorCategory::Io => "io",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl ShellError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ShellError::Launch(LaunchError::Exec { .. }) => ErrorCategory::Exec,
            ShellError::Launch(LaunchError::TableFull { .. }) => ErrorCategory::Capacity,
            ShellError::Launch(_) => ErrorCategory::Launch,
            ShellError::Builtin(_) => ErrorCategory::Builtin,
            ShellError::Config(_) => ErrorCategory::Config,
            ShellError::Io(_) => ErrorCategory::Io,
        }
    }

    /// Whether the command loop can keep running after this error
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, ShellError::Config(_))
    }

    /// Line printed to the user, already prefixed with the shell name
    pub fn user_message(&self) -> String {
        format!("doit: {}", self)
    }
}

pub type ShellResult<T> = Result<T, ShellError>;
