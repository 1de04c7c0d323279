//! 内建命令
//!
//! Builtins run in-process and never create a child. A handler returns
//! `false` to end the command loop.

use crate::core::job_table::JobTable;
use crate::error::BuiltinError;
use std::io::Write;
use std::path::PathBuf;

/// State a builtin may read or write.
pub struct BuiltinContext<'a> {
    pub jobs: &'a JobTable,
    pub out: &'a mut dyn Write,
}

pub type BuiltinFn = fn(&[String], &mut BuiltinContext<'_>) -> Result<bool, BuiltinError>;

#[derive(Clone)]
pub struct Builtins {
    table: Vec<(&'static str, BuiltinFn)>,
}

impl Builtins {
    pub fn standard() -> Self {
        Self {
            table: vec![
                ("cd", cd as BuiltinFn),
                ("jobs", jobs as BuiltinFn),
                ("exit", exit as BuiltinFn),
                ("quit", exit as BuiltinFn),
            ],
        }
    }

    pub fn lookup(&self, name: &str) -> Option<BuiltinFn> {
        self.table
            .iter()
            .find(|(builtin, _)| *builtin == name)
            .map(|(_, handler)| *handler)
    }
}

impl Default for Builtins {
    fn default() -> Self {
        Self::standard()
    }
}

fn cd(argv: &[String], _ctx: &mut BuiltinContext<'_>) -> Result<bool, BuiltinError> {
    let target = argv
        .get(1)
        .ok_or(BuiltinError::MissingArgument { builtin: "cd" })?;
    let path = PathBuf::from(shellexpand::tilde(target).into_owned());

    std::env::set_current_dir(&path)
        .map_err(|source| BuiltinError::ChangeDirectory { path, source })?;
    Ok(true)
}

fn jobs(_argv: &[String], ctx: &mut BuiltinContext<'_>) -> Result<bool, BuiltinError> {
    for job in ctx.jobs.list() {
        writeln!(ctx.out, "[{}] {} {}", job.id, job.pid, job.command_name)
            .map_err(|source| BuiltinError::Output {
                builtin: "jobs",
                source,
            })?;
    }
    Ok(true)
}

fn exit(_argv: &[String], _ctx: &mut BuiltinContext<'_>) -> Result<bool, BuiltinError> {
    Ok(false)
}
