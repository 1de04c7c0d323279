//! 后台任务回收
//!
//! A dedicated `doit-reaper` thread runs a current-thread tokio runtime that
//! waits for SIGCHLD (or a launcher poke) and then scans the job table.

use crate::core::job_table::{Completion, JobTable};
use crate::core::usage::{self, Sampler};
use crate::logging::{debug, warn};
use crate::signal::{ChildDeathNotifier, ReapTrigger};
use std::io::{self, Write};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio::sync::oneshot;

/// `[n] pid Completed`, the banner and the usage report.
pub fn completion_notice(completion: &Completion) -> String {
    format!(
        "\n[{}] {} Completed\n{}\n{}",
        completion.id,
        completion.pid,
        usage::banner(&completion.command_name),
        completion.report()
    )
}

#[derive(Clone)]
pub struct Reaper {
    table: Arc<JobTable>,
    sampler: Arc<dyn Sampler>,
}

impl Reaper {
    pub fn new(table: Arc<JobTable>, sampler: Arc<dyn Sampler>) -> Self {
        Self { table, sampler }
    }

    /// Reaps every finished job and writes one notice per job.
    ///
    /// Each notice goes out in a single write so concurrent output cannot
    /// split it.
    pub fn reap_once(&self, out: &mut dyn Write) -> io::Result<Vec<Completion>> {
        let completions = self.table.reap_all(self.sampler.as_ref());
        for completion in &completions {
            out.write_all(completion_notice(completion).as_bytes())?;
            out.flush()?;
        }
        Ok(completions)
    }

    /// Starts the background reaper.
    ///
    /// SIGCHLD is registered before this returns, so children spawned
    /// afterwards can never be missed.
    pub fn spawn(self, trigger: ReapTrigger) -> io::Result<ReaperHandle> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let notifier = {
            let _guard = runtime.enter();
            ChildDeathNotifier::install(trigger.clone())?
        };
        let (stop_tx, stop_rx) = oneshot::channel();

        let thread = thread::Builder::new()
            .name("doit-reaper".to_string())
            .spawn(move || runtime.block_on(self.run(notifier, stop_rx)))?;

        Ok(ReaperHandle {
            trigger,
            stop: Some(stop_tx),
            thread: Some(thread),
        })
    }

    async fn run(self, mut notifier: ChildDeathNotifier, mut stop: oneshot::Receiver<()>) {
        debug("reaper started");
        loop {
            tokio::select! {
                _ = notifier.notified() => {}
                _ = &mut stop => break,
            }
            self.reap_to_stdout();
        }
        self.reap_to_stdout();
        debug("reaper stopped");
    }

    fn reap_to_stdout(&self) {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        if let Err(err) = self.reap_once(&mut out) {
            warn(format!("failed to write completion notice: {}", err));
        }
    }
}

/// Owner of the reaper thread; stops it on [`ReaperHandle::shutdown`] or drop.
pub struct ReaperHandle {
    trigger: ReapTrigger,
    stop: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl ReaperHandle {
    pub fn trigger(&self) -> ReapTrigger {
        self.trigger.clone()
    }

    /// Stops the task after one last scan and joins the thread.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn("reaper thread panicked");
            }
        }
    }
}

impl Drop for ReaperHandle {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}
