//! 命令分发与子进程启动
//!
//! Builtins run in-process. External commands get a before-sample, a child
//! process, and then either a blocking wait with an immediate report or a
//! job-table registration.

use crate::builtins::{BuiltinContext, Builtins};
use crate::config::TableFullPolicy;
use crate::core::job_table::{JobId, JobProcess, JobTable, NewJob};
use crate::core::usage::{self, Sampler, UsageReport};
use crate::error::{LaunchError, ShellResult};
use crate::logging::{debug, info};
use crate::platform;
use crate::signal::ReapTrigger;
use std::io::Write;
use std::process::{Command, ExitStatus};
use std::sync::Arc;

/// What a dispatched command turned into.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Nothing to run (empty argv).
    Empty,
    Builtin { keep_running: bool },
    Foreground(ForegroundReport),
    Background { id: JobId, pid: u32 },
}

impl Outcome {
    /// `false` only after `exit`.
    pub fn keep_running(&self) -> bool {
        !matches!(
            self,
            Outcome::Builtin {
                keep_running: false
            }
        )
    }
}

#[derive(Debug, Clone)]
pub struct ForegroundReport {
    pub command_name: String,
    pub pid: u32,
    pub status: ExitStatus,
    pub usage: UsageReport,
}

pub struct Launcher {
    table: Arc<JobTable>,
    sampler: Arc<dyn Sampler>,
    builtins: Builtins,
    trigger: ReapTrigger,
    table_full_policy: TableFullPolicy,
}

impl Launcher {
    pub fn new(
        table: Arc<JobTable>,
        sampler: Arc<dyn Sampler>,
        trigger: ReapTrigger,
        table_full_policy: TableFullPolicy,
    ) -> Self {
        Self {
            table,
            sampler,
            builtins: Builtins::standard(),
            trigger,
            table_full_policy,
        }
    }

    pub fn table(&self) -> &Arc<JobTable> {
        &self.table
    }

    /// Runs `argv[0]` with `argv[1..]`, writing user-facing lines to `out`.
    ///
    /// Any error leaves the job table as it was.
    pub fn run(&self, argv: &[String], background: bool, out: &mut dyn Write) -> ShellResult<Outcome> {
        let Some(command_name) = argv.first() else {
            return Ok(Outcome::Empty);
        };

        if let Some(handler) = self.builtins.lookup(command_name) {
            let mut ctx = BuiltinContext {
                jobs: &self.table,
                out: &mut *out,
            };
            let keep_running = handler(argv, &mut ctx)?;
            return Ok(Outcome::Builtin { keep_running });
        }

        if background {
            if self.table.has_free_slot() {
                return self.run_background(argv, out);
            }
            match self.table_full_policy {
                TableFullPolicy::Reject => {
                    return Err(LaunchError::TableFull {
                        command: command_name.clone(),
                        capacity: self.table.capacity(),
                    }
                    .into());
                }
                TableFullPolicy::Foreground => {
                    info(format!(
                        "job table full; running '{}' in the foreground",
                        command_name
                    ));
                }
            }
        }

        self.run_foreground(argv, out)
    }

    fn spawn(&self, argv: &[String]) -> Result<std::process::Child, LaunchError> {
        let command_name = &argv[0];
        Command::new(command_name)
            .args(&argv[1..])
            .spawn()
            .map_err(|source| LaunchError::from_spawn(command_name.as_str(), source))
    }

    fn run_foreground(&self, argv: &[String], out: &mut dyn Write) -> ShellResult<Outcome> {
        let (usage_before, time_before) = self.sampler.sample();
        let mut child = self.spawn(argv)?;
        let pid = child.id();
        debug(format!("started foreground '{}' pid={}", argv[0], pid));

        let report = self.wait_and_report(&argv[0], &mut child, usage_before, time_before, out)?;
        Ok(Outcome::Foreground(report))
    }

    fn wait_and_report(
        &self,
        command_name: &str,
        process: &mut dyn JobProcess,
        usage_before: usage::ResourceUsage,
        time_before: usage::Timestamp,
        out: &mut dyn Write,
    ) -> ShellResult<ForegroundReport> {
        let pid = process.pid();
        let status = process.wait().map_err(|source| LaunchError::Wait {
            command: command_name.to_string(),
            source,
        })?;
        let (usage_after, time_after) = self.sampler.sample();
        debug(format!(
            "foreground '{}' pid={} {}",
            command_name,
            pid,
            platform::describe_exit(&status)
        ));

        let report = usage::diff(&usage_before, &usage_after, &time_before, &time_after);
        write!(out, "{}\n{}", usage::banner(command_name), report)?;
        out.flush()?;

        Ok(ForegroundReport {
            command_name: command_name.to_string(),
            pid,
            status,
            usage: report,
        })
    }

    fn run_background(&self, argv: &[String], out: &mut dyn Write) -> ShellResult<Outcome> {
        let (usage_before, time_before) = self.sampler.sample();
        let child = self.spawn(argv)?;
        debug(format!("started background '{}' pid={}", argv[0], child.id()));

        let job = NewJob {
            process: Box::new(child),
            command_name: argv[0].clone(),
            usage_before,
            time_before,
        };
        self.register_or_wait(job, out)
    }

    /// Registers a started job, or waits for it here when no slot is left.
    fn register_or_wait(&self, job: NewJob, out: &mut dyn Write) -> ShellResult<Outcome> {
        let pid = job.process.pid();
        match self.table.register(job) {
            Ok(id) => {
                self.trigger.poke();
                writeln!(out, "[{}] {}", id, pid)?;
                out.flush()?;
                Ok(Outcome::Background { id, pid })
            }
            Err(mut job) => {
                info(format!(
                    "no free slot for pid={}; waiting for it in the foreground",
                    pid
                ));
                let report = self.wait_and_report(
                    &job.command_name,
                    job.process.as_mut(),
                    job.usage_before,
                    job.time_before,
                    out,
                )?;
                Ok(Outcome::Foreground(report))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::usage::ChildrenSampler;
    use crate::error::ShellError;
    use crate::reaper::Reaper;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::{Duration, Instant};

    fn args(argv: &[&str]) -> Vec<String> {
        argv.iter().map(|s| s.to_string()).collect()
    }

    fn launcher(capacity: usize, policy: TableFullPolicy) -> Launcher {
        Launcher::new(
            Arc::new(JobTable::with_capacity(capacity)),
            Arc::new(ChildrenSampler),
            ReapTrigger::new(),
            policy,
        )
    }

    fn drain(launcher: &Launcher) {
        let reaper = Reaper::new(launcher.table().clone(), Arc::new(ChildrenSampler));
        let deadline = Instant::now() + Duration::from_secs(10);
        while !launcher.table().is_empty() && Instant::now() < deadline {
            reaper.reap_once(&mut Vec::new()).unwrap();
            thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn empty_argv_does_nothing() {
        let launcher = launcher(1, TableFullPolicy::Reject);
        let outcome = launcher.run(&[], false, &mut Vec::new()).unwrap();
        assert!(matches!(outcome, Outcome::Empty));
        assert!(outcome.keep_running());
    }

    #[test]
    fn builtin_runs_in_process() {
        let launcher = launcher(1, TableFullPolicy::Reject);
        let outcome = launcher.run(&args(&["exit"]), true, &mut Vec::new()).unwrap();
        assert!(!outcome.keep_running());
        assert!(launcher.table().is_empty());
    }

    #[test]
    fn foreground_command_prints_banner_and_report() {
        let launcher = launcher(1, TableFullPolicy::Reject);
        let mut out = Vec::new();

        let outcome = launcher.run(&args(&["sh", "-c", "exit 3"]), false, &mut out).unwrap();
        let Outcome::Foreground(report) = outcome else {
            panic!("expected a foreground outcome");
        };
        assert_eq!(report.status.code(), Some(3));
        assert!(report.usage.cpu_ms >= 0.0);
        assert!(report.usage.wall_ms >= 0.0);

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("***************** sh ****************\n"));
        assert_eq!(text.lines().count(), 8);
        assert!(launcher.table().is_empty());
    }

    #[test]
    fn foreground_command_never_enters_the_table() {
        let launcher = Arc::new(launcher(4, TableFullPolicy::Reject));
        let running = Arc::new(AtomicBool::new(true));

        let worker = {
            let launcher = launcher.clone();
            let running = running.clone();
            thread::spawn(move || {
                launcher
                    .run(&args(&["sleep", "0.3"]), false, &mut Vec::new())
                    .unwrap();
                running.store(false, Ordering::SeqCst);
            })
        };

        while running.load(Ordering::SeqCst) {
            assert!(launcher.table().list().is_empty());
            thread::sleep(Duration::from_millis(5));
        }
        worker.join().unwrap();
    }

    #[test]
    fn missing_program_is_reported_without_side_effects() {
        let launcher = launcher(2, TableFullPolicy::Reject);
        for background in [false, true] {
            let err = launcher
                .run(&args(&["doit-no-such-program"]), background, &mut Vec::new())
                .unwrap_err();
            assert!(matches!(err, ShellError::Launch(LaunchError::Exec { .. })));
        }
        assert!(launcher.table().is_empty());
    }

    #[test]
    fn background_command_is_registered_and_announced() {
        let launcher = launcher(2, TableFullPolicy::Reject);
        let mut out = Vec::new();

        let outcome = launcher.run(&args(&["sleep", "0.1"]), true, &mut out).unwrap();
        let Outcome::Background { id, pid } = outcome else {
            panic!("expected a background outcome");
        };
        assert_eq!(id.number(), 1);
        assert_eq!(String::from_utf8(out).unwrap(), format!("[1] {}\n", pid));
        assert_eq!(launcher.table().list()[0].command_name, "sleep");

        drain(&launcher);
        assert!(launcher.table().is_empty());
    }

    #[test]
    fn full_table_rejects_without_starting_anything() {
        let launcher = launcher(1, TableFullPolicy::Reject);
        launcher.run(&args(&["sleep", "0.5"]), true, &mut Vec::new()).unwrap();

        let mut out = Vec::new();
        let err = launcher
            .run(&args(&["sleep", "0.5"]), true, &mut out)
            .unwrap_err();
        assert!(matches!(
            err,
            ShellError::Launch(LaunchError::TableFull { capacity: 1, .. })
        ));
        assert!(out.is_empty());
        assert_eq!(launcher.table().len(), 1);

        drain(&launcher);
    }

    #[test]
    fn full_table_can_fall_back_to_foreground() {
        let launcher = launcher(1, TableFullPolicy::Foreground);
        launcher.run(&args(&["sleep", "0.5"]), true, &mut Vec::new()).unwrap();

        let outcome = launcher.run(&args(&["true"]), true, &mut Vec::new()).unwrap();
        assert!(matches!(outcome, Outcome::Foreground(_)));
        assert_eq!(launcher.table().len(), 1);

        drain(&launcher);
    }

    #[derive(Debug)]
    struct FinishedOnWait {
        pid: u32,
        waited: Arc<AtomicBool>,
    }

    impl JobProcess for FinishedOnWait {
        fn pid(&self) -> u32 {
            self.pid
        }

        fn try_exit(&mut self) -> std::io::Result<Option<ExitStatus>> {
            Ok(None)
        }

        fn wait(&mut self) -> std::io::Result<ExitStatus> {
            use std::os::unix::process::ExitStatusExt;
            self.waited.store(true, Ordering::SeqCst);
            Ok(ExitStatus::from_raw(0))
        }
    }

    fn started_job(pid: u32, waited: &Arc<AtomicBool>) -> NewJob {
        let (usage_before, time_before) = ChildrenSampler.sample();
        NewJob {
            process: Box::new(FinishedOnWait {
                pid,
                waited: waited.clone(),
            }),
            command_name: "fake".to_string(),
            usage_before,
            time_before,
        }
    }

    #[test]
    fn job_without_a_slot_is_waited_for_in_the_foreground() {
        let launcher = launcher(1, TableFullPolicy::Reject);
        let occupant = Arc::new(AtomicBool::new(false));
        launcher
            .register_or_wait(started_job(500, &occupant), &mut Vec::new())
            .unwrap();

        let waited = Arc::new(AtomicBool::new(false));
        let mut out = Vec::new();
        let outcome = launcher
            .register_or_wait(started_job(501, &waited), &mut out)
            .unwrap();

        let Outcome::Foreground(report) = outcome else {
            panic!("expected a foreground outcome");
        };
        assert_eq!(report.pid, 501);
        assert!(waited.load(Ordering::SeqCst));
        assert!(!occupant.load(Ordering::SeqCst));
        assert!(String::from_utf8(out)
            .unwrap()
            .starts_with("***************** fake ****************\n"));

        let listed = launcher.table().list();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].pid, 500);
    }
}
