//! # Runtime events emitted by the leader, sentinels and coordinator.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Leader events**: process instances starting, exiting, being interrupted
//! - **Sentinel events**: check runs starting, passing, failing
//! - **Coordinator events**: fatal conditions, shutdown progress
//! - **Subscriber events**: overflow and panics inside subscribers
//!
//! The [`Event`] struct carries additional metadata such as timestamps, the emitting
//! entity, its command line, pid, exit status and instance counters.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use procvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::SentinelPassed)
//!     .with_source("sentinel[0]")
//!     .with_command("sync-wpt.py")
//!     .with_attempt(3);
//!
//! assert_eq!(ev.kind, EventKind::SentinelPassed);
//! assert_eq!(ev.command.as_deref(), Some("sync-wpt.py"));
//! ```

use std::process::ExitStatus;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::SystemTime;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets `source` (subscriber name) and `reason` (panic message).
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets `source` (subscriber name) and `reason`.
    SubscriberOverflow,

    // === Leader events ===
    /// A new leader process instance was spawned.
    ///
    /// Sets `source`, `command`, `pid`, `attempt` (1-based instance number).
    LeaderStarted,

    /// A leader process instance terminated.
    ///
    /// Sets `source`, `command`, `pid`, `status` (if the wait succeeded).
    LeaderExited,

    /// The running leader was sent a graceful interrupt for a restart.
    ///
    /// Sets `source`, `command`, `pid`.
    LeaderInterrupted,

    /// The interrupted leader outlived `interrupt_grace` and was force-killed.
    ///
    /// Sets `source`, `command`, `pid`.
    LeaderForceKilled,

    /// A restart handshake completed: old instance gone, new one spawned.
    ///
    /// Sets `source`, `command`, `attempt` (number of the new instance).
    LeaderRestarted,

    // === Restart requests ===
    /// A restart was requested (a sentinel succeeded).
    ///
    /// Sets `source` (requesting sentinel) and `command` (its command line).
    RestartRequested,

    /// A restart request was discarded because the leader loop is gone.
    ///
    /// Sets `source` (requesting sentinel).
    RestartDiscarded,

    // === Sentinel events ===
    /// A sentinel check process was spawned.
    ///
    /// Sets `source`, `command`, `pid`, `attempt` (1-based run number).
    SentinelStarted,

    /// A sentinel check exited with status zero.
    ///
    /// Sets `source`, `command`, `status`, `attempt`.
    SentinelPassed,

    /// A sentinel check exited with a nonzero status.
    ///
    /// Sets `source`, `command`, `status`, `attempt`.
    SentinelFailed,

    // === Coordinator events ===
    /// The first fatal condition reached the coordinator.
    ///
    /// Sets `command` and `reason` (condition message).
    FatalReceived,

    /// A later fatal condition was drained after the first one won.
    ///
    /// Sets `command` and `reason`.
    FatalSuppressed,

    /// Shutdown requested (OS signal observed).
    ShutdownRequested,

    /// An entity was killed during shutdown.
    ///
    /// Sets `source` and `pid` (if a process was live).
    ProcessKilled,

    /// All tasks finished within the configured grace period.
    ShutdownCompleted,

    /// Grace period exceeded; remaining tasks were aborted.
    ///
    /// Sets `reason` (names of the aborted tasks).
    GraceExceeded,
}

impl EventKind {
    /// True for the event that closes a supervisor run; nothing is published after it.
    pub fn ends_run(self) -> bool {
        matches!(self, EventKind::ShutdownCompleted | EventKind::GraceExceeded)
    }
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Emitting entity (`leader`, `sentinel[0]`, subscriber name, ...).
    pub source: Option<Arc<str>>,
    /// Command line of the process concerned.
    pub command: Option<Arc<str>>,
    /// OS process id, if a process was involved.
    pub pid: Option<u32>,
    /// Exit status of a finished process.
    pub status: Option<ExitStatus>,
    /// Instance / run counter (starting from 1).
    pub attempt: Option<u64>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            source: None,
            command: None,
            pid: None,
            status: None,
            attempt: None,
            reason: None,
        }
    }

    /// Attaches the emitting entity.
    #[inline]
    pub fn with_source(mut self, source: impl Into<Arc<str>>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Attaches a command line.
    #[inline]
    pub fn with_command(mut self, command: impl Into<Arc<str>>) -> Self {
        self.command = Some(command.into());
        self
    }

    /// Attaches a pid (no-op for `None`).
    #[inline]
    pub fn with_pid(mut self, pid: Option<u32>) -> Self {
        self.pid = pid.or(self.pid);
        self
    }

    /// Attaches an exit status.
    #[inline]
    pub fn with_status(mut self, status: ExitStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Attaches an instance / run counter.
    #[inline]
    pub fn with_attempt(mut self, n: u64) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_source(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_source(subscriber)
            .with_reason(info)
    }
}
