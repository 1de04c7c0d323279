//! 后台任务表
//!
//! Fixed-capacity registry of in-flight background jobs. A job's identity is
//! its slot index; users see it as `slot + 1`.
//!
//! The launcher is the only caller of [`JobTable::register`] and the reaper
//! the only caller of [`JobTable::reap_all`]. Each record is written whole
//! under the lock, so a half-initialised slot is never observable.

use crate::core::usage::{self, ResourceUsage, Sampler, Timestamp, UsageReport};
use crate::logging::{debug, warn};
use crate::platform;
use parking_lot::Mutex;
use std::fmt;
use std::io;
use std::process::{Child, ExitStatus};

/// Index-based handle to a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(usize);

impl JobId {
    pub fn slot(&self) -> usize {
        self.0
    }

    /// Number shown to the user, `slot + 1`.
    pub fn number(&self) -> usize {
        self.0 + 1
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// A running child as seen by the job table.
pub trait JobProcess: Send + fmt::Debug {
    fn pid(&self) -> u32;

    /// Non-blocking termination check; reaps the child when it has exited.
    fn try_exit(&mut self) -> io::Result<Option<ExitStatus>>;

    /// Blocks until the child terminates.
    fn wait(&mut self) -> io::Result<ExitStatus>;
}

impl JobProcess for Child {
    fn pid(&self) -> u32 {
        self.id()
    }

    fn try_exit(&mut self) -> io::Result<Option<ExitStatus>> {
        self.try_wait()
    }

    fn wait(&mut self) -> io::Result<ExitStatus> {
        Child::wait(self)
    }
}

/// Everything the launcher hands over when registering a job.
#[derive(Debug)]
pub struct NewJob {
    pub process: Box<dyn JobProcess>,
    pub command_name: String,
    pub usage_before: ResourceUsage,
    pub time_before: Timestamp,
}

#[derive(Debug)]
struct JobRecord {
    pid: u32,
    command_name: String,
    usage_before: ResourceUsage,
    time_before: Timestamp,
    process: Box<dyn JobProcess>,
}

#[derive(Debug)]
enum Slot {
    Free,
    Occupied(JobRecord),
}

/// One row of the `jobs` listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSummary {
    pub id: JobId,
    pub pid: u32,
    pub command_name: String,
}

/// A reaped job, owning its name and both samples.
#[derive(Debug, Clone)]
pub struct Completion {
    pub id: JobId,
    pub pid: u32,
    pub command_name: String,
    pub usage_before: ResourceUsage,
    pub time_before: Timestamp,
    pub usage_after: ResourceUsage,
    pub time_after: Timestamp,
    /// `None` when the child could no longer be waited for.
    pub status: Option<ExitStatus>,
}

impl Completion {
    pub fn report(&self) -> UsageReport {
        usage::diff(
            &self.usage_before,
            &self.usage_after,
            &self.time_before,
            &self.time_after,
        )
    }
}

#[derive(Debug)]
pub struct JobTable {
    slots: Mutex<Vec<Slot>>,
}

impl JobTable {
    pub fn with_capacity(capacity: usize) -> Self {
        let slots = (0..capacity).map(|_| Slot::Free).collect();
        Self {
            slots: Mutex::new(slots),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.lock().len()
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .iter()
            .filter(|slot| matches!(slot, Slot::Occupied(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn has_free_slot(&self) -> bool {
        self.slots
            .lock()
            .iter()
            .any(|slot| matches!(slot, Slot::Free))
    }

    /// Stores `job` in the first free slot.
    ///
    /// A full table hands the job back so the caller keeps ownership of the
    /// child and can pick a fallback.
    pub fn register(&self, job: NewJob) -> Result<JobId, NewJob> {
        let mut slots = self.slots.lock();
        let Some(index) = slots.iter().position(|slot| matches!(slot, Slot::Free)) else {
            return Err(job);
        };

        let pid = job.process.pid();
        slots[index] = Slot::Occupied(JobRecord {
            pid,
            command_name: job.command_name,
            usage_before: job.usage_before,
            time_before: job.time_before,
            process: job.process,
        });
        debug(format!("registered job [{}] pid={}", index + 1, pid));
        Ok(JobId(index))
    }

    /// Occupied slots in ascending order.
    pub fn list(&self) -> Vec<JobSummary> {
        self.slots
            .lock()
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| match slot {
                Slot::Occupied(record) => Some(JobSummary {
                    id: JobId(index),
                    pid: record.pid,
                    command_name: record.command_name.clone(),
                }),
                Slot::Free => None,
            })
            .collect()
    }

    /// Reaps every terminated job and frees its slot.
    ///
    /// The after-sample is taken right after each child is waited for, so the
    /// children domain already includes that child's usage.
    pub fn reap_all(&self, sampler: &dyn Sampler) -> Vec<Completion> {
        let mut slots = self.slots.lock();
        let mut completions = Vec::new();

        for (index, slot) in slots.iter_mut().enumerate() {
            let status = match slot {
                Slot::Free => continue,
                Slot::Occupied(record) => match record.process.try_exit() {
                    Ok(Some(status)) => Some(status),
                    Ok(None) => continue,
                    Err(err) => {
                        warn(format!(
                            "job [{}] pid={} can no longer be waited for: {}",
                            index + 1,
                            record.pid,
                            err
                        ));
                        None
                    }
                },
            };

            let (usage_after, time_after) = sampler.sample();
            if let Slot::Occupied(record) = std::mem::replace(slot, Slot::Free) {
                if let Some(status) = &status {
                    debug(format!(
                        "reaped job [{}] pid={} {} (started {})",
                        index + 1,
                        record.pid,
                        platform::describe_exit(status),
                        record.time_before.wall().format("%H:%M:%S%.3f")
                    ));
                }
                completions.push(Completion {
                    id: JobId(index),
                    pid: record.pid,
                    command_name: record.command_name,
                    usage_before: record.usage_before,
                    time_before: record.time_before,
                    usage_after,
                    time_after,
                    status,
                });
            }
        }

        completions
    }
}
