//! # LogWriter - event logger backed by `tracing`
//!
//! Renders every [`Event`] as one structured `tracing` record under the
//! `procvisor::events` target. Routine lifecycle events are logged at `debug`/`info`,
//! failures at `warn`/`error`.
//!
//! ## Example output (fmt layer)
//! ```text
//! INFO  procvisor::events: leader started source="leader" command="./wpt serve" pid=4121 instance=1
//! DEBUG procvisor::events: restarting following signal from sentinel source="sentinel[0]" command="sync-wpt.py"
//! INFO  procvisor::events: leader interrupted source="leader" pid=4121
//! ERROR procvisor::events: fatal condition command="sync-cert.py" reason="sentinel exited with ..."
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

const TARGET: &str = "procvisor::events";

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn status(e: &Event) -> String {
    e.status.map(|s| s.to_string()).unwrap_or_default()
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let source = e.source.as_deref().unwrap_or("");
        let command = e.command.as_deref().unwrap_or("");
        let reason = e.reason.as_deref().unwrap_or("");

        match e.kind {
            EventKind::LeaderStarted => {
                tracing::info!(target: TARGET, source, command, pid = ?e.pid, instance = ?e.attempt, "leader started");
            }
            EventKind::LeaderExited => {
                tracing::info!(target: TARGET, source, command, pid = ?e.pid, status = %status(e), "leader exited");
            }
            EventKind::LeaderInterrupted => {
                tracing::info!(target: TARGET, source, pid = ?e.pid, "leader interrupted");
            }
            EventKind::LeaderForceKilled => {
                tracing::warn!(target: TARGET, source, pid = ?e.pid, "leader ignored interrupt; killed");
            }
            EventKind::LeaderRestarted => {
                tracing::info!(target: TARGET, source, command, instance = ?e.attempt, "leader restarted");
            }
            EventKind::RestartRequested => {
                tracing::debug!(target: TARGET, source, command, "restarting following signal from sentinel");
            }
            EventKind::RestartDiscarded => {
                tracing::debug!(target: TARGET, source, "restart request discarded; leader is gone");
            }
            EventKind::SentinelStarted => {
                tracing::debug!(target: TARGET, source, command, pid = ?e.pid, run = ?e.attempt, "sentinel started");
            }
            EventKind::SentinelPassed => {
                tracing::debug!(target: TARGET, source, command, run = ?e.attempt, "sentinel passed");
            }
            EventKind::SentinelFailed => {
                tracing::warn!(target: TARGET, source, command, status = %status(e), run = ?e.attempt, "sentinel failed");
            }
            EventKind::FatalReceived => {
                tracing::error!(target: TARGET, command, reason, "fatal condition");
            }
            EventKind::FatalSuppressed => {
                tracing::warn!(target: TARGET, command, reason, "fatal condition suppressed");
            }
            EventKind::ShutdownRequested => {
                tracing::info!(target: TARGET, "shutdown requested");
            }
            EventKind::ProcessKilled => {
                tracing::debug!(target: TARGET, source, pid = ?e.pid, "killed");
            }
            EventKind::ShutdownCompleted => {
                tracing::info!(target: TARGET, "all processes stopped");
            }
            EventKind::GraceExceeded => {
                tracing::warn!(target: TARGET, aborted = reason, "grace exceeded");
            }
            EventKind::SubscriberOverflow => {
                tracing::warn!(target: TARGET, subscriber = source, reason, "subscriber overflow");
            }
            EventKind::SubscriberPanicked => {
                tracing::error!(target: TARGET, subscriber = source, reason, "subscriber panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
