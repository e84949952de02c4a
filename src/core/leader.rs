//! # Leader: the single long-running process kept alive by the supervisor.
//!
//! [`Leader::run_forever`] spawns the leader command, hands each instance to a watcher
//! task and then waits on the [`Rendezvous`] for the next token. Exit watchers and
//! restart callers use the same handoff; the token's [`TokenKind`] decides the branch.
//!
//! ## Restart cycle
//! ```text
//!            ┌──────────────────────────────────────────────────────────────┐
//!            ▼                                                              │
//!   Idle ─► Spawning ─► Running ──token──┬─ Exited ──────────► Failed       │
//!           (complete pending restart)   │                                  │
//!                                        └─ RestartRequested ─► Terminating ┘
//!                                             SIGINT, wait for Exited token,
//!                                             release watcher, keep caller pending
//! ```
//!
//! ## Rules
//! - At most one leader process is live; the slot is empty between exit and respawn
//! - [`Leader::restart`] returns only after the old instance exited **and** the new one
//!   was spawned (not necessarily ready)
//! - Concurrent restart requests serialize on an async mutex; handshakes never interleave
//! - A restart request dequeued while the instance is still alive is honored, even if
//!   the instance exits on its own before the interrupt lands
//! - An instance found dead when a token is dequeued is fatal, whatever the token;
//!   the restart caller gets [`RestartError::LeaderGone`]
//! - `kill()` ends the loop with `Ok(())` from any state

use std::process::ExitStatus;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::process::{self, ProcessSlot};
use super::rendezvous::{Released, Rendezvous, Token, TokenKind};
use super::sentinel::{OnSuccess, Sentinel};
use crate::command::CommandSpec;
use crate::config::Config;
use crate::error::{FatalCondition, RestartError};
use crate::events::{Bus, Event, EventKind};

/// Exit watcher of one spawned instance.
struct Watcher {
    join: JoinHandle<std::io::Result<ExitStatus>>,
    /// Set before the watcher hands in its `Exited` token.
    exited: Arc<AtomicBool>,
}

impl Watcher {
    fn has_exited(&self) -> bool {
        self.exited.load(Ordering::SeqCst)
    }
}

/// Supervised leader process.
pub struct Leader {
    name: Arc<str>,
    command: CommandSpec,
    label: Arc<str>,
    rendezvous: Arc<Rendezvous>,
    restart_lock: Mutex<()>,
    slot: ProcessSlot,
    interrupt_grace: Option<Duration>,
    instances: AtomicU64,
    bus: Bus,
}

impl Leader {
    /// Creates a leader for `command`. Nothing is spawned until [`Leader::run_forever`].
    pub fn new(command: CommandSpec, cfg: &Config, bus: Bus) -> Self {
        let label: Arc<str> = command.to_string().into();
        Self {
            name: "leader".into(),
            command,
            label,
            rendezvous: Arc::new(Rendezvous::new()),
            restart_lock: Mutex::new(()),
            slot: ProcessSlot::new(),
            interrupt_grace: cfg.interrupt_grace,
            instances: AtomicU64::new(0),
            bus,
        }
    }

    /// Entity name used in events.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Command specification of the leader.
    pub fn command(&self) -> &CommandSpec {
        &self.command
    }

    /// Pid of the live instance, if any.
    pub fn pid(&self) -> Option<u32> {
        self.slot.pid()
    }

    /// Number of instances spawned so far.
    pub fn instances(&self) -> u64 {
        self.instances.load(Ordering::SeqCst)
    }

    /// Keeps the leader running until it exits on its own or is killed.
    ///
    /// Returns `Ok(())` only after [`Leader::kill`]. Any restart request still queued
    /// when the loop ends is released with [`RestartError::LeaderGone`].
    pub async fn run_forever(&self) -> Result<(), FatalCondition> {
        let res = self.cycle().await;
        self.rendezvous.close().await;
        res
    }

    async fn cycle(&self) -> Result<(), FatalCondition> {
        // Restart caller waiting for the next instance to be spawned.
        let mut pending: Option<Token> = None;

        loop {
            let Some(watcher) = self.spawn_instance().await? else {
                return Ok(());
            };
            if let Some(token) = pending.take() {
                self.bus.publish(
                    self.event(EventKind::LeaderRestarted).with_attempt(self.instances()),
                );
                token.complete();
            }

            let token = tokio::select! {
                _ = self.slot.stopped() => return self.teardown(watcher).await,
                token = self.rendezvous.next() => token,
            };
            let Some(token) = token else {
                return self.teardown(watcher).await;
            };

            match token.kind() {
                TokenKind::Exited => {
                    token.complete();
                    return self.exited_on_its_own(watcher).await;
                }
                TokenKind::RestartRequested if watcher.has_exited() => {
                    // Died before the request arrived; dropping the token refuses it.
                    drop(token);
                    let pid = self.slot.pid();
                    let Some(exited) = self.await_exit(pid).await else {
                        return self.teardown(watcher).await;
                    };
                    exited.complete();
                    return self.exited_on_its_own(watcher).await;
                }
                TokenKind::RestartRequested => {
                    let pid = self.slot.pid();
                    self.slot.interrupt();
                    self.bus
                        .publish(self.event(EventKind::LeaderInterrupted).with_pid(pid));

                    let Some(exited) = self.await_exit(pid).await else {
                        return self.teardown(watcher).await;
                    };
                    exited.complete();
                    self.reap(watcher).await?;
                    pending = Some(token);
                }
            }
        }
    }

    /// Spawns one instance and its exit watcher. `None` if the leader was killed.
    async fn spawn_instance(&self) -> Result<Option<Watcher>, FatalCondition> {
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

        let n = self.instances.fetch_add(1, Ordering::SeqCst) + 1;
        self.bus.publish(
            self.event(EventKind::LeaderStarted)
                .with_pid(pid)
                .with_attempt(n),
        );

        let rendezvous = Arc::clone(&self.rendezvous);
        let exited = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&exited);
        let join = tokio::spawn(async move {
            let status = process::watch(child, rx).await;
            flag.store(true, Ordering::SeqCst);
            rendezvous.signal(TokenKind::Exited).await;
            status
        });
        Ok(Some(Watcher { join, exited }))
    }

    /// Reaps an instance that terminated without being asked to.
    async fn exited_on_its_own(&self, watcher: Watcher) -> Result<(), FatalCondition> {
        self.reap(watcher).await?;
        if self.slot.is_stopped() {
            return Ok(());
        }
        Err(FatalCondition::LeaderExitedUnexpectedly {
            command: self.label.to_string(),
        })
    }

    /// Waits for the interrupted instance's `Exited` token.
    ///
    /// Escalates to a kill after `interrupt_grace`. `None` if killed meanwhile.
    async fn await_exit(&self, pid: Option<u32>) -> Option<Token> {
        let deadline = self.interrupt_grace.map(|g| tokio::time::Instant::now() + g);
        let mut escalated = false;

        loop {
            let armed = deadline.filter(|_| !escalated);
            let escalate = async move {
                match armed {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            };
            let token = tokio::select! {
                _ = self.slot.stopped() => return None,
                _ = escalate => {
                    escalated = true;
                    self.slot.force();
                    self.bus.publish(self.event(EventKind::LeaderForceKilled).with_pid(pid));
                    continue;
                }
                token = self.rendezvous.next() => token?,
            };
            match token.kind() {
                TokenKind::Exited => return Some(token),
                // Callers hold the restart lock, so a second request cannot be queued here.
                TokenKind::RestartRequested => drop(token),
            }
        }
    }

    /// Joins the watcher of an exited instance and empties the slot.
    async fn reap(&self, watcher: Watcher) -> Result<ExitStatus, FatalCondition> {
        let pid = self.slot.pid();
        self.slot.clear();
        let status = match watcher.join.await {
            Ok(Ok(status)) => status,
            Ok(Err(source)) => {
                return Err(FatalCondition::WaitFailed {
                    command: self.label.to_string(),
                    source,
                })
            }
            Err(join) => {
                return Err(FatalCondition::WaitFailed {
                    command: self.label.to_string(),
                    source: std::io::Error::other(join),
                })
            }
        };
        self.bus.publish(
            self.event(EventKind::LeaderExited)
                .with_pid(pid)
                .with_status(status),
        );
        Ok(status)
    }

    /// Stop path: release the watcher, wait for the killed instance, report `Ok`.
    async fn teardown(&self, watcher: Watcher) -> Result<(), FatalCondition> {
        self.slot.kill();
        self.rendezvous.close().await;
        let _ = self.reap(watcher).await;
        Ok(())
    }

    /// Restarts the leader and waits until the new instance has been spawned.
    ///
    /// Serialized: a second caller waits until the first handshake fully completes.
    pub async fn restart(&self) -> Result<(), RestartError> {
        let _guard = self.restart_lock.lock().await;
        match self.rendezvous.signal(TokenKind::RestartRequested).await {
            Released::Completed => Ok(()),
            Released::Discarded => Err(RestartError::LeaderGone),
        }
    }

    /// Force-terminates the live instance (if any) and stops the loop.
    ///
    /// Safe to call at any point, including mid-handshake.
    pub fn kill(&self) {
        self.slot.kill();
    }

    fn event(&self, kind: EventKind) -> Event {
        Event::new(kind)
            .with_source(Arc::clone(&self.name))
            .with_command(Arc::clone(&self.label))
    }
}

/// Restarts the leader; the hook the supervisor installs on every sentinel.
#[async_trait]
impl OnSuccess for Leader {
    async fn on_success(&self, sentinel: &Sentinel) -> Result<(), RestartError> {
        self.bus.publish(
            Event::new(EventKind::RestartRequested)
                .with_source(sentinel.name())
                .with_command(sentinel.label()),
        );
        self.restart().await
    }
}
