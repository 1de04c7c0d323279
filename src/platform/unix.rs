use crate::core::usage::ResourceUsage;
use crate::logging::warn;
use nix::sys::resource::{getrusage, UsageWho};
use nix::sys::signal::Signal;
use nix::sys::time::TimeVal;
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;
use std::time::Duration;

/// Query accumulated usage of all terminated, waited-for children
///
/// Never blocks. A failed query is logged and yields an all-zero snapshot.
pub fn children_usage() -> ResourceUsage {
    match getrusage(UsageWho::RUSAGE_CHILDREN) {
        Ok(usage) => ResourceUsage {
            user_time: timeval_to_duration(usage.user_time()),
            system_time: timeval_to_duration(usage.system_time()),
            max_rss: i64::from(usage.max_rss()),
            minor_faults: i64::from(usage.minor_page_faults()),
            major_faults: i64::from(usage.major_page_faults()),
            voluntary_switches: i64::from(usage.voluntary_context_switches()),
            involuntary_switches: i64::from(usage.involuntary_context_switches()),
        },
        Err(errno) => {
            warn(format!("getrusage(RUSAGE_CHILDREN) failed: {}", errno));
            ResourceUsage::default()
        }
    }
}

fn timeval_to_duration(tv: TimeVal) -> Duration {
    let secs = u64::try_from(tv.tv_sec()).unwrap_or(0);
    let micros = u32::try_from(tv.tv_usec()).unwrap_or(0);
    Duration::new(secs, micros.saturating_mul(1000))
}

/// Human-readable termination cause, used in log lines
pub fn describe_exit(status: &ExitStatus) -> String {
    match (status.code(), status.signal()) {
        (Some(code), _) => format!("exited with status {}", code),
        (None, Some(signal)) => match Signal::try_from(signal) {
            Ok(name) => format!("killed by {}", name.as_str()),
            Err(_) => format!("killed by signal {}", signal),
        },
        (None, None) => "terminated".to_string(),
    }
}
