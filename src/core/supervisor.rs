//! # Supervisor: wires sentinels to the leader and owns shutdown.
//!
//! The [`Supervisor`] owns the event bus, a [`SubscriberSet`] and the runtime
//! [`Config`]. [`Supervisor::run`] starts one leader loop and one loop per sentinel as
//! independent tasks, then waits for the first [`FatalCondition`] (or an OS signal).
//!
//! ## High-level architecture
//! ```text
//! run(leader_cmd, sentinel_cmds)
//!   ├─► Leader::new(leader_cmd)
//!   ├─► Sentinel::new(cmd_i, hook = leader)        (one per sentinel)
//!   ├─► Registry::spawn(entity, report(entity.run_forever(), results_tx))
//!   │
//!   ├─► select! {
//!   │     results_rx.recv() → first FatalCondition   → FatalReceived
//!   │     shutdown signal   → no cause               → ShutdownRequested
//!   │   }
//!   ├─► Registry::kill_all(cfg.grace)   (every entity killed, tasks joined or aborted)
//!   ├─► drain results_rx                (later conditions → FatalSuppressed)
//!   ├─► ShutdownCompleted | GraceExceeded{aborted}   (last event of the run)
//!   └─► flush subscribers, return Err(first) | Ok(())
//! ```
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use procvisor::{CommandSpec, Config, LogWriter, Supervisor};
//!
//! #[tokio::main(flavor = "multi_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = Config::default();
//!     let sup = Supervisor::new(cfg.clone(), vec![Arc::new(LogWriter::new())]);
//!
//!     let leader = CommandSpec::new(["./wpt", "serve"])?;
//!     let sentinels = vec![CommandSpec::shell(&cfg.shell, "sync-wpt.py")];
//!
//!     sup.run(leader, sentinels).await?;
//!     Ok(())
//! }
//! ```

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use super::leader::Leader;
use super::registry::Registry;
use super::sentinel::{OnSuccess, Sentinel};
use super::shutdown;
use crate::command::CommandSpec;
use crate::config::Config;
use crate::error::FatalCondition;
use crate::events::{Bus, Event, EventKind};
use crate::subscribers::{Subscribe, SubscriberSet};

/// Coordinates the leader, the sentinels, event delivery and shutdown.
pub struct Supervisor {
    cfg: Config,
    bus: Bus,
    listener: JoinHandle<()>,
}

impl Supervisor {
    /// Creates a new supervisor with the given config and subscribers.
    ///
    /// Must be called from within a tokio runtime (subscriber workers are spawned here).
    pub fn new(cfg: Config, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        let bus = Bus::new(cfg.bus_capacity_clamped());
        let set = SubscriberSet::new(subscribers, bus.clone());
        let listener = tokio::spawn(set.forward(bus.subscribe()));
        Self { cfg, bus, listener }
    }

    /// Returns a receiver for every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Runs until the first fatal condition or an OS termination signal.
    ///
    /// Returns `Err` with the first [`FatalCondition`]; `Ok(())` after a signal.
    /// In both cases every leader and sentinel process has been killed.
    pub async fn run(
        self,
        leader: CommandSpec,
        sentinels: Vec<CommandSpec>,
    ) -> Result<(), FatalCondition> {
        self.run_until(leader, sentinels, shutdown::os_signal()).await
    }

    /// Like [`Supervisor::run`], with a custom shutdown trigger instead of OS signals.
    pub async fn run_until<S>(
        self,
        leader: CommandSpec,
        sentinels: Vec<CommandSpec>,
        shutdown: S,
    ) -> Result<(), FatalCondition>
    where
        S: Future<Output = ()>,
    {
        let (results_tx, mut results_rx) = mpsc::unbounded_channel::<FatalCondition>();
        let registry = Registry::new(self.bus.clone());

        let leader = Arc::new(Leader::new(leader, &self.cfg, self.bus.clone()));
        let hook: Arc<dyn OnSuccess> = leader.clone();

        for (i, cmd) in sentinels.into_iter().enumerate() {
            let sentinel = Arc::new(Sentinel::new(
                format!("sentinel[{i}]"),
                cmd,
                Arc::clone(&hook),
                self.bus.clone(),
            ));
            let task = {
                let sentinel = Arc::clone(&sentinel);
                report(results_tx.clone(), async move { sentinel.run_forever().await })
            };
            registry.spawn(sentinel, task).await;
        }
        let task = {
            let leader = Arc::clone(&leader);
            report(results_tx.clone(), async move { leader.run_forever().await })
        };
        registry.spawn(leader, task).await;
        drop(results_tx);

        tracing::debug!(tasks = ?registry.names().await, "supervisor started");

        let first = tokio::select! {
            fatal = results_rx.recv() => fatal,
            _ = shutdown => {
                self.bus.publish(Event::new(EventKind::ShutdownRequested));
                None
            }
        };
        if let Some(cause) = &first {
            self.bus.publish(
                Event::new(EventKind::FatalReceived)
                    .with_command(cause.command())
                    .with_reason(cause.to_string()),
            );
        }

        let aborted = registry.kill_all(self.cfg.grace).await;

        while let Ok(extra) = results_rx.try_recv() {
            self.bus.publish(
                Event::new(EventKind::FatalSuppressed)
                    .with_command(extra.command())
                    .with_reason(extra.to_string()),
            );
        }
        if aborted.is_empty() {
            self.bus.publish(Event::new(EventKind::ShutdownCompleted));
        } else {
            self.bus
                .publish(Event::new(EventKind::GraceExceeded).with_reason(aborted.join(",")));
        }

        self.flush().await;
        match first {
            Some(cause) => Err(cause),
            None => Ok(()),
        }
    }

    /// Waits (up to `grace`) for subscribers to drain the events of this run.
    async fn flush(self) {
        if tokio::time::timeout(self.cfg.grace, self.listener).await.is_err() {
            tracing::warn!("subscribers did not drain within grace");
        }
    }
}

/// Runs `fut`, pushing its fatal condition (if any) onto the results channel.
async fn report<F>(results: mpsc::UnboundedSender<FatalCondition>, fut: F)
where
    F: Future<Output = Result<(), FatalCondition>>,
{
    if let Err(cause) = fut.await {
        let _ = results.send(cause);
    }
}
