//! # Registry of process-owning tasks.
//!
//! Every task the coordinator starts (the leader loop and one loop per sentinel) is
//! recorded together with the entity that owns its OS processes. Shutdown walks the
//! registry instead of relying on process exit to reap background work.
//!
//! ## Shutdown
//! ```text
//! kill_all(grace)
//!   ├─► for each entry: target.kill()          → ProcessKilled
//!   ├─► join each task until now + grace
//!   │     └─ still running → abort (children are killed on drop)
//!   └─► names of aborted tasks (the caller publishes the terminal event)
//! ```
//!
//! ## Rules
//! - Registry owns the task handles (JoinHandle + kill target)
//! - `kill_all` drains the registry; entries are never reused
//! - Kill errors are swallowed; shutdown always completes

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::leader::Leader;
use super::sentinel::Sentinel;
use crate::events::{Bus, Event, EventKind};

/// Entity owning OS processes that can be force-stopped.
pub(crate) trait Kill: Send + Sync + 'static {
    /// Entity name for events.
    fn name(&self) -> &str;
    /// Pid of the live process, if any.
    fn pid(&self) -> Option<u32>;
    /// Force-terminates the live process and stops the entity's loop.
    fn kill(&self);
}

impl Kill for Leader {
    fn name(&self) -> &str {
        Leader::name(self)
    }
    fn pid(&self) -> Option<u32> {
        Leader::pid(self)
    }
    fn kill(&self) {
        Leader::kill(self)
    }
}

impl Kill for Sentinel {
    fn name(&self) -> &str {
        Sentinel::name(self)
    }
    fn pid(&self) -> Option<u32> {
        Sentinel::pid(self)
    }
    fn kill(&self) {
        Sentinel::kill(self)
    }
}

/// Handle to a running entity task.
struct Handle {
    target: Arc<dyn Kill>,
    join: JoinHandle<()>,
}

/// Tracks every spawned task and the entity whose processes it drives.
pub(crate) struct Registry {
    entries: Mutex<Vec<Handle>>,
    bus: Bus,
}

impl Registry {
    pub(crate) fn new(bus: Bus) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            bus,
        }
    }

    /// Spawns `fut` and records it together with its kill target.
    pub(crate) async fn spawn<F>(&self, target: Arc<dyn Kill>, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let join = tokio::spawn(fut);
        self.entries.lock().await.push(Handle { target, join });
    }

    /// Returns names of the registered entities, in registration order.
    pub(crate) async fn names(&self) -> Vec<String> {
        self.entries
            .lock()
            .await
            .iter()
            .map(|h| h.target.name().to_string())
            .collect()
    }

    /// Kills every entity, then joins their tasks within `grace`.
    ///
    /// Returns the names of tasks that had to be aborted.
    pub(crate) async fn kill_all(&self, grace: Duration) -> Vec<String> {
        let handles: Vec<Handle> = std::mem::take(&mut *self.entries.lock().await);

        for h in &handles {
            let pid = h.target.pid();
            h.target.kill();
            self.bus.publish(
                Event::new(EventKind::ProcessKilled)
                    .with_source(h.target.name())
                    .with_pid(pid),
            );
        }

        let deadline = tokio::time::Instant::now() + grace;
        let mut aborted = Vec::new();
        for mut h in handles {
            if tokio::time::timeout_at(deadline, &mut h.join).await.is_err() {
                h.join.abort();
                let _ = h.join.await;
                aborted.push(h.target.name().to_string());
            }
        }
        aborted
    }
}
