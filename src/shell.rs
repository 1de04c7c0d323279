//! 交互式命令循环
//!
//! Owns the job table, the launcher and the reaper thread. Errors from a
//! single command are printed and the loop carries on; only `exit` (or end
//! of input) stops it.

use crate::config::ShellConfig;
use crate::core::job_table::JobTable;
use crate::core::usage::{ChildrenSampler, Sampler};
use crate::error::ShellResult;
use crate::launcher::Launcher;
use crate::logging::{debug, warn};
use crate::reaper::{Reaper, ReaperHandle};
use crate::signal::ReapTrigger;
use crate::tokenizer::{self, CommandLine};
use std::io::{self, BufRead, Write};
use std::sync::Arc;

pub struct Shell {
    config: ShellConfig,
    launcher: Launcher,
    reaper: Option<ReaperHandle>,
}

impl Shell {
    /// Builds the table and starts the reaper before any child can exist.
    pub fn new(config: ShellConfig) -> ShellResult<Self> {
        config.validate()?;

        let table = Arc::new(JobTable::with_capacity(config.max_jobs));
        let sampler: Arc<dyn Sampler> = Arc::new(ChildrenSampler);
        let reaper = Reaper::new(table.clone(), sampler.clone()).spawn(ReapTrigger::new())?;
        let launcher = Launcher::new(table, sampler, reaper.trigger(), config.table_full_policy);

        debug(format!(
            "shell ready: max_jobs={} table_full_policy={}",
            config.max_jobs, config.table_full_policy
        ));
        Ok(Self {
            config,
            launcher,
            reaper: Some(reaper),
        })
    }

    pub fn launcher(&self) -> &Launcher {
        &self.launcher
    }

    /// Prompt, read, dispatch until `exit` or end of input.
    pub fn run_interactive<R: BufRead>(&mut self, mut input: R) -> ShellResult<()> {
        let mut line = String::new();
        loop {
            {
                let mut stdout = io::stdout().lock();
                write!(stdout, "{}", self.config.prompt)?;
                stdout.flush()?;
            }

            line.clear();
            if input.read_line(&mut line)? == 0 {
                debug("end of input");
                println!();
                break;
            }

            let command = tokenizer::tokenize(&line);
            if command.is_empty() {
                continue;
            }
            if !self.dispatch(&command) {
                break;
            }
        }
        self.finish();
        Ok(())
    }

    /// Runs one command taken from the process arguments.
    pub fn run_single(&mut self, args: Vec<String>) -> ShellResult<()> {
        let command = CommandLine::from_args(args);
        if !command.is_empty() {
            self.dispatch(&command);
        }
        self.finish();
        Ok(())
    }

    /// Runs one command; `false` once the loop should end, after `exit` or an
    /// unrecoverable error.
    pub fn dispatch(&self, command: &CommandLine) -> bool {
        // Unlocked handle: the reaper must be able to print while a
        // foreground command is being waited for.
        let mut out = io::stdout();
        match self.launcher.run(&command.argv, command.background, &mut out) {
            Ok(outcome) => outcome.keep_running(),
            Err(err) => {
                debug(format!("{} error: {}", err.category(), err));
                eprintln!("{}", err.user_message());
                err.is_recoverable()
            }
        }
    }

    fn finish(&mut self) {
        if let Some(reaper) = self.reaper.take() {
            reaper.shutdown();
        }
        let remaining = self.launcher.table().len();
        if remaining > 0 {
            warn(format!(
                "exiting with {} background job(s) still running",
                remaining
            ));
        }
    }
}

impl Drop for Shell {
    fn drop(&mut self) {
        if let Some(reaper) = self.reaper.take() {
            reaper.shutdown();
        }
    }
}
