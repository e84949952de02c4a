//! Runtime core: leader, sentinels and their coordination.
//!
//! The public API from this module is [`Supervisor`], which wires sentinels to the
//! leader and owns shutdown, plus the [`Leader`] and [`Sentinel`] entities and the
//! [`OnSuccess`] hook for embedding them directly.
//!
//! Internal modules:
//! - [`process`]: watched children and the control slot used to signal them;
//! - [`rendezvous`]: one-shot tagged handoff between watchers, restart callers and the leader loop;
//! - [`leader`]: keeps one leader process alive and runs the restart handshake;
//! - [`sentinel`]: runs a check forever, restarting the leader on success;
//! - [`registry`]: tracks spawned tasks and kills them on shutdown;
//! - [`shutdown`]: cross-platform shutdown signal handling;
//! - [`supervisor`]: starts everything and waits for the first fatal condition.

mod leader;
mod process;
mod registry;
mod rendezvous;
mod sentinel;
mod shutdown;
mod supervisor;

pub use leader::Leader;
pub use sentinel::{OnSuccess, Sentinel};
pub use supervisor::Supervisor;
