//! 资源使用采样与差值统计
//!
//! Snapshots of the "children" resource domain and the per-command deltas
//! printed after every external command.

use crate::platform;
use chrono::{DateTime, Utc};
use std::fmt;
use std::ops::Add;
use std::time::{Duration, Instant};

/// Accumulated usage of all reaped descendants at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceUsage {
    pub user_time: Duration,
    pub system_time: Duration,
    /// Peak resident set size as reported by the platform (KiB on Linux).
    pub max_rss: i64,
    pub minor_faults: i64,
    pub major_faults: i64,
    pub voluntary_switches: i64,
    pub involuntary_switches: i64,
}

impl ResourceUsage {
    pub fn cpu_time(&self) -> Duration {
        self.user_time + self.system_time
    }
}

/// Wall-clock timestamp paired with a monotonic reading.
///
/// Durations are taken from the monotonic side so a clock adjustment between
/// two samples can never produce a negative wall time.
#[derive(Debug, Clone, Copy)]
pub struct Timestamp {
    wall: DateTime<Utc>,
    mono: Instant,
}

impl Timestamp {
    pub fn now() -> Self {
        Self {
            wall: Utc::now(),
            mono: Instant::now(),
        }
    }

    pub fn wall(&self) -> DateTime<Utc> {
        self.wall
    }

    /// Milliseconds from `self` to `later`, zero if `later` is earlier.
    pub fn millis_until(&self, later: &Timestamp) -> f64 {
        later.mono.saturating_duration_since(self.mono).as_micros() as f64 / 1000.0
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Duration) -> Timestamp {
        let wall = chrono::Duration::from_std(rhs)
            .ok()
            .and_then(|delta| self.wall.checked_add_signed(delta))
            .unwrap_or(self.wall);
        Timestamp {
            wall,
            mono: self.mono + rhs,
        }
    }
}

/// Source of usage snapshots.
pub trait Sampler: Send + Sync {
    fn sample(&self) -> (ResourceUsage, Timestamp);
}

/// Samples the calling process's `RUSAGE_CHILDREN` domain.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChildrenSampler;

impl Sampler for ChildrenSampler {
    fn sample(&self) -> (ResourceUsage, Timestamp) {
        let usage = platform::children_usage();
        (usage, Timestamp::now())
    }
}

/// Deltas between two snapshots of the same domain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UsageReport {
    pub cpu_ms: f64,
    pub wall_ms: f64,
    pub involuntary_preemptions: i64,
    pub voluntary_preemptions: i64,
    pub major_faults: i64,
    pub minor_faults: i64,
    /// Raw delta; may be negative when the counter is a running maximum.
    pub peak_rss_delta: i64,
}

/// Computes the report for one command from its before/after samples.
pub fn diff(
    before: &ResourceUsage,
    after: &ResourceUsage,
    t_before: &Timestamp,
    t_after: &Timestamp,
) -> UsageReport {
    let cpu_us = after.cpu_time().as_micros() as i128 - before.cpu_time().as_micros() as i128;

    UsageReport {
        cpu_ms: cpu_us as f64 / 1000.0,
        wall_ms: t_before.millis_until(t_after),
        involuntary_preemptions: after.involuntary_switches - before.involuntary_switches,
        voluntary_preemptions: after.voluntary_switches - before.voluntary_switches,
        major_faults: after.major_faults - before.major_faults,
        minor_faults: after.minor_faults - before.minor_faults,
        peak_rss_delta: after.max_rss - before.max_rss,
    }
}

/// `***************** <command_name> ****************`
pub fn banner(command_name: &str) -> String {
    format!("***************** {} ****************", command_name)
}

impl fmt::Display for UsageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<20.6}: CPU time used (ms).", self.cpu_ms)?;
        writeln!(f, "{:<20.6}: wall-clock time (ms).", self.wall_ms)?;
        writeln!(
            f,
            "{:<20}: Number of times preempted involuntarily.",
            self.involuntary_preemptions
        )?;
        writeln!(
            f,
            "{:<20}: Number of times preempted voluntarily.",
            self.voluntary_preemptions
        )?;
        writeln!(f, "{:<20}: Number of page faults.", self.major_faults)?;
        writeln!(f, "{:<20}: Number of page reclaims.", self.minor_faults)?;
        writeln!(
            f,
            "{:<20}: Peak resident set size delta.",
            self.peak_rss_delta
        )
    }
}
