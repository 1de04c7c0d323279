//! 子进程终止通知
//!
//! SIGCHLD is never handled inline. The signal only wakes an async stream,
//! and the reaper task does the work in ordinary thread context.

use std::io;
use std::sync::Arc;
use tokio::signal::unix::{signal, Signal, SignalKind};
use tokio::sync::Notify;

/// Wakes the reaper without a signal.
///
/// The launcher pokes it after every background registration, so a child
/// that exited before its slot was written is still reaped.
#[derive(Debug, Clone, Default)]
pub struct ReapTrigger(Arc<Notify>);

impl ReapTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a permit when nobody is waiting; wake-ups are never lost.
    pub fn poke(&self) {
        self.0.notify_one();
    }

    async fn poked(&self) {
        self.0.notified().await;
    }
}

/// SIGCHLD stream merged with the manual trigger.
pub struct ChildDeathNotifier {
    sigchld: Signal,
    trigger: ReapTrigger,
}

impl ChildDeathNotifier {
    /// Registers for SIGCHLD. Must run inside a tokio runtime context.
    pub fn install(trigger: ReapTrigger) -> io::Result<Self> {
        let sigchld = signal(SignalKind::child())?;
        Ok(Self { sigchld, trigger })
    }

    /// Resolves when at least one child may have changed state.
    pub async fn notified(&mut self) {
        tokio::select! {
            _ = self.sigchld.recv() => {}
            _ = self.trigger.poked() => {}
        }
    }
}
