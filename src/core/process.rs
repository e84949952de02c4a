//! # Watched child processes and their control slot.
//!
//! Every spawned child is owned by exactly one [`watch`] future, which waits for the
//! process to exit while accepting [`Control`] requests. Because only the owner of the
//! [`Child`] ever signals it, a pid that has already been reaped is never targeted.
//!
//! On Unix each child leads its own process group (see `CommandSpec::spawn`), and
//! signals go to the whole group: a `sh -c` wrapper and everything it started are
//! interrupted or killed together.
//!
//! ```text
//! Leader / Sentinel                         watch(child, rx)
//!   ProcessSlot::install(tx) ─────────┐       loop {
//!   ProcessSlot::interrupt() ── tx ───┼──►      select! {
//!   ProcessSlot::kill()      ── tx ───┘           child.wait()  → SIGKILL leftovers in the group,
//!                                                                 return status
//!                                                 Interrupt     → SIGINT to the group
//!                                                 Kill          → SIGKILL to the group
//!                                               }
//!                                             }
//! ```
//!
//! ## Rules
//! - At most one control handle is installed in a slot at any instant
//! - Once a slot is stopped it refuses new children; the caller kills what it spawned
//! - Control requests for an already exited child are silently dropped
//! - A child's process group does not outlive the child

use std::process::ExitStatus;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::process::Child;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Requests accepted by a watched child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Control {
    /// Graceful termination (SIGINT).
    Interrupt,
    /// Forced termination (SIGKILL).
    Kill,
}

/// Sender side used to steer one watched child.
#[derive(Debug, Clone)]
pub(crate) struct ControlHandle {
    pid: Option<u32>,
    tx: mpsc::UnboundedSender<Control>,
}

impl ControlHandle {
    /// OS pid of the child at spawn time.
    pub(crate) fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn send(&self, ctl: Control) {
        let _ = self.tx.send(ctl);
    }
}

/// Pairs a freshly spawned child with its control channel.
pub(crate) fn controlled(child: Child) -> (Child, ControlHandle, mpsc::UnboundedReceiver<Control>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = ControlHandle {
        pid: child.id(),
        tx,
    };
    (child, handle, rx)
}

/// Waits for `child` to exit, applying control requests as they arrive.
pub(crate) async fn watch(
    mut child: Child,
    mut rx: mpsc::UnboundedReceiver<Control>,
) -> std::io::Result<ExitStatus> {
    let group = child.id();
    let status = loop {
        tokio::select! {
            status = child.wait() => break status,
            Some(ctl) = rx.recv() => match ctl {
                Control::Interrupt => interrupt(&mut child),
                Control::Kill => kill(&mut child),
            },
        }
    };
    reap_group(group);
    status
}

#[cfg(unix)]
fn signal_group(pgid: u32, sig: nix::sys::signal::Signal) -> nix::Result<()> {
    use nix::unistd::Pid;

    nix::sys::signal::killpg(Pid::from_raw(pgid as i32), sig)
}

#[cfg(unix)]
fn interrupt(child: &mut Child) {
    // `id()` is None once the child has been reaped.
    if let Some(pid) = child.id() {
        if let Err(err) = signal_group(pid, nix::sys::signal::Signal::SIGINT) {
            tracing::debug!(pid, error = %err, "interrupt failed");
        }
    }
}

#[cfg(unix)]
fn kill(child: &mut Child) {
    if let Some(pid) = child.id() {
        let _ = signal_group(pid, nix::sys::signal::Signal::SIGKILL);
    }
    let _ = child.start_kill();
}

/// Kills whatever the exited child left behind in its process group.
#[cfg(unix)]
fn reap_group(group: Option<u32>) {
    if let Some(pgid) = group {
        match signal_group(pgid, nix::sys::signal::Signal::SIGKILL) {
            Ok(()) => tracing::debug!(pgid, "killed leftover processes"),
            Err(nix::errno::Errno::ESRCH) => {}
            Err(err) => tracing::debug!(pgid, error = %err, "group cleanup failed"),
        }
    }
}

#[cfg(not(unix))]
fn interrupt(child: &mut Child) {
    let _ = child.start_kill();
}

#[cfg(not(unix))]
fn kill(child: &mut Child) {
    let _ = child.start_kill();
}

#[cfg(not(unix))]
fn reap_group(_group: Option<u32>) {}

/// Holds the control handle of the currently running child of one entity.
///
/// Shared between the entity's run loop (install / clear) and `kill()` callers.
#[derive(Debug, Default)]
pub(crate) struct ProcessSlot {
    current: Mutex<Option<ControlHandle>>,
    stopped: CancellationToken,
}

impl ProcessSlot {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<ControlHandle>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Installs the handle of a new child.
    ///
    /// Returns `false` (and installs nothing) if the slot was already stopped; the
    /// caller then owns the child and must kill it.
    pub(crate) fn install(&self, handle: ControlHandle) -> bool {
        let mut current = self.lock();
        if self.stopped.is_cancelled() {
            return false;
        }
        *current = Some(handle);
        true
    }

    /// Removes the handle after its child has exited.
    pub(crate) fn clear(&self) {
        self.lock().take();
    }

    /// Asks the current child, if any, to terminate gracefully.
    pub(crate) fn interrupt(&self) {
        if let Some(h) = self.lock().as_ref() {
            h.send(Control::Interrupt);
        }
    }

    /// Force-terminates the current child, if any, and refuses future ones.
    pub(crate) fn kill(&self) {
        let current = self.lock();
        self.stopped.cancel();
        if let Some(h) = current.as_ref() {
            h.send(Control::Kill);
        }
    }

    /// Force-terminates the current child without stopping the slot.
    pub(crate) fn force(&self) {
        if let Some(h) = self.lock().as_ref() {
            h.send(Control::Kill);
        }
    }

    /// Returns true once [`ProcessSlot::kill`] was called.
    pub(crate) fn is_stopped(&self) -> bool {
        self.stopped.is_cancelled()
    }

    /// Completes when [`ProcessSlot::kill`] is called.
    pub(crate) async fn stopped(&self) {
        self.stopped.cancelled().await
    }

    /// Pid of the current child, if one is installed.
    pub(crate) fn pid(&self) -> Option<u32> {
        self.lock().as_ref().and_then(ControlHandle::pid)
    }
}
