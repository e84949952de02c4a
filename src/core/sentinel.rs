//! # Sentinel: a check command whose success triggers a leader restart.
//!
//! [`Sentinel::run_forever`] runs the check to completion over and over. Exit status
//! zero invokes the [`OnSuccess`] hook (normally a leader restart) and loops again
//! with no delay; any other status is fatal.
//!
//! ```text
//! loop {
//!   ├─► spawn check ─► SentinelStarted
//!   ├─► wait for exit
//!   │     ├─ killed (shutdown)  ─► return Ok
//!   │     ├─ status != 0        ─► SentinelFailed, return Err(SentinelFailed)
//!   │     └─ status == 0        ─► SentinelPassed
//!   └─► hook.on_success(&self)
//!         ├─ Ok                 ─► continue
//!         └─ Err(LeaderGone)    ─► return Ok (the leader reports its own failure)
//! }
//! ```
//!
//! Throttling between checks is the check command's job.

use std::process::ExitStatus;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use super::process::{self, ProcessSlot};
use crate::command::CommandSpec;
use crate::error::{FatalCondition, RestartError};
use crate::events::{Bus, Event, EventKind};

/// Callback invoked after every successful sentinel run.
#[async_trait]
pub trait OnSuccess: Send + Sync + 'static {
    /// Reacts to a zero exit of `sentinel`'s check.
    ///
    /// Returning an error stops the sentinel quietly.
    async fn on_success(&self, sentinel: &Sentinel) -> Result<(), RestartError>;
}

/// Periodic check process.
pub struct Sentinel {
    name: Arc<str>,
    command: CommandSpec,
    label: Arc<str>,
    hook: Arc<dyn OnSuccess>,
    slot: ProcessSlot,
    runs: AtomicU64,
    bus: Bus,
}

impl Sentinel {
    /// Creates a sentinel named `name` running `command`.
    pub fn new(
        name: impl Into<Arc<str>>,
        command: CommandSpec,
        hook: Arc<dyn OnSuccess>,
        bus: Bus,
    ) -> Self {
        let label: Arc<str> = command.to_string().into();
        Self {
            name: name.into(),
            command,
            label,
            hook,
            slot: ProcessSlot::new(),
            runs: AtomicU64::new(0),
            bus,
        }
    }

    /// Entity name used in events.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Display form of the check command.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Command specification of the check.
    pub fn command(&self) -> &CommandSpec {
        &self.command
    }

    /// Pid of the in-flight check, if any.
    pub fn pid(&self) -> Option<u32> {
        self.slot.pid()
    }

    /// Number of check runs started so far.
    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::SeqCst)
    }

    /// Runs the check forever.
    ///
    /// Returns `Err` on a nonzero exit, `Ok(())` once killed or once the hook reports
    /// that the leader is gone.
    pub async fn run_forever(&self) -> Result<(), FatalCondition> {
        loop {
            let Some((status, run)) = self.run_once().await? else {
                return Ok(());
            };

            if !status.success() {
                self.bus.publish(
                    self.event(EventKind::SentinelFailed)
                        .with_status(status)
                        .with_attempt(run),
                );
                return Err(FatalCondition::SentinelFailed {
                    command: self.label.to_string(),
                    status,
                });
            }
            self.bus.publish(
                self.event(EventKind::SentinelPassed)
                    .with_status(status)
                    .with_attempt(run),
            );

            if let Err(err) = self.hook.on_success(self).await {
                self.bus.publish(
                    self.event(EventKind::RestartDiscarded)
                        .with_reason(err.to_string()),
                );
                return Ok(());
            }
        }
    }

    /// Runs the check once. `None` if the sentinel was killed.
    async fn run_once(&self) -> Result<Option<(ExitStatus, u64)>, FatalCondition> {
        if self.slot.is_stopped() {
            return Ok(None);
        }
        let child = self
            .command
            .spawn()
            .map_err(|source| FatalCondition::SpawnFailed {
                command: self.label.to_string(),
                source,
            })?;
        let (mut child, handle, rx) = process::controlled(child);
        let pid = handle.pid();

        if !self.slot.install(handle) {
            let _ = child.start_kill();
            let _ = child.wait().await;
            return Ok(None);
        }

        let run = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
        self.bus.publish(
            self.event(EventKind::SentinelStarted)
                .with_pid(pid)
                .with_attempt(run),
        );

        let status = process::watch(child, rx).await;
        self.slot.clear();
        let status = status.map_err(|source| FatalCondition::WaitFailed {
            command: self.label.to_string(),
            source,
        })?;

        if self.slot.is_stopped() {
            return Ok(None);
        }
        Ok(Some((status, run)))
    }

    /// Force-terminates the in-flight check, if any, and stops the loop.
    pub fn kill(&self) {
        self.slot.kill();
    }

    fn event(&self, kind: EventKind) -> Event {
        Event::new(kind)
            .with_source(Arc::clone(&self.name))
            .with_command(Arc::clone(&self.label))
    }
}
