//! # Global runtime configuration.
//!
//! Provides [`Config`] centralized settings for the supervisor runtime.
//! The same value is handed to the [`Supervisor`](crate::Supervisor), which passes the
//! relevant parts down to the leader and sentinels it constructs.
//!
//! ## Sentinel values
//! - `grace = 0s` → do not wait for tasks after killing them; abort immediately
//! - `interrupt_grace = None` → wait for an interrupted leader indefinitely

use std::path::PathBuf;
use std::time::Duration;

/// Global configuration for the supervisor runtime.
///
/// ## Field semantics
/// - `grace`: Maximum wait for killed tasks to be joined during shutdown
/// - `interrupt_grace`: Maximum wait for an interrupted leader before force-killing it
/// - `bus_capacity`: Event bus ring buffer size (min 1; clamped by Bus)
/// - `shell`: Shell used by [`CommandSpec::shell`](crate::CommandSpec::shell) command lines
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum time to wait for every task to finish after `kill()` was issued.
    ///
    /// Tasks still running afterwards are aborted; their children are killed on drop.
    pub grace: Duration,

    /// How long an interrupted leader may take to exit before it is force-killed.
    ///
    /// `None` waits indefinitely, giving the leader all the time it needs to flush state.
    pub interrupt_grace: Option<Duration>,

    /// Capacity of the event bus broadcast channel ring buffer.
    pub bus_capacity: usize,

    /// Shell program for sentinel command lines.
    pub shell: PathBuf,
}

impl Config {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `grace = 5s`
    /// - `interrupt_grace = None` (never escalate)
    /// - `bus_capacity = 1024`
    /// - `shell = /bin/sh`
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(5),
            interrupt_grace: None,
            bus_capacity: 1024,
            shell: PathBuf::from("/bin/sh"),
        }
    }
}
