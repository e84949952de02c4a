//! # procvisor
//!
//! **Procvisor** keeps one long-running *leader* process alive and restarts it every
//! time one of its *sentinel* check processes exits successfully.
//!
//! A sentinel is typically a script that blocks until something upstream changed
//! (new certificates, a fresh checkout, rotated config) and then exits `0`. A nonzero
//! sentinel exit, or the leader dying without being asked to, is fatal: every process
//! is killed and the supervisor reports the condition.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │ sentinel[0]  │   │ sentinel[1]  │   │ sentinel[N]  │
//!     │ (check loop) │   │ (check loop) │   │ (check loop) │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            │ exit 0 ─► OnSuccess::on_success ─► Leader::restart()
//!            ▼                  ▼                  ▼
//!     ┌─────────────────────────────────────────────────────────┐
//!     │  Leader                                                 │
//!     │  - restart lock (one handshake at a time)               │
//!     │  - Rendezvous (Exited | RestartRequested tokens)        │
//!     │  - ProcessSlot (the single live instance)               │
//!     └──────────────────────────┬──────────────────────────────┘
//!                                │ Err(FatalCondition)
//!            ┌───────────────────┴──────────────────┐
//!            ▼                                      ▼
//! ┌──────────────────────────────────┐   ┌──────────────────────────┐
//! │ Supervisor                       │   │ Bus (broadcast channel)  │
//! │ - first fatal wins               │──►│ ─► SubscriberSet::forward│
//! │ - Registry::kill_all(grace)      │   │ ─► SubscriberSet         │
//! │ - later fatals are suppressed    │   │ ─► LogWriter / custom    │
//! └──────────────────────────────────┘   └──────────────────────────┘
//! ```
//!
//! ### Restart handshake
//! ```text
//! sentinel exits 0
//!   ├─► Leader::restart()            (serialized by the restart lock)
//!   ├─► RestartRequested token ──► leader loop
//!   │                                ├─► SIGINT to the live instance
//!   │                                ├─► wait for its Exited token (kill after interrupt_grace)
//!   │                                ├─► spawn the next instance
//!   │                                └─► complete the RestartRequested token
//!   └─► restart() returns; the sentinel runs again
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                 |
//! |-------------------|--------------------------------------------------------------|------------------------------------|
//! | **Supervision**   | Leader/sentinel wiring, fatal handling, exhaustive shutdown. | [`Supervisor`]                     |
//! | **Entities**      | Use the leader and sentinels on their own.                   | [`Leader`], [`Sentinel`], [`OnSuccess`] |
//! | **Commands**      | Argv or shell command lines with cwd/env.                    | [`CommandSpec`]                    |
//! | **Subscriber API**| Observe lifecycle events (logging, metrics, tests).          | [`Subscribe`], [`Event`], [`LogWriter`] |
//! | **Errors**        | Typed fatal and restart errors.                              | [`FatalCondition`], [`RestartError`] |
//! | **Configuration** | Grace periods, bus capacity, shell.                          | [`Config`]                         |
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
//!     let sentinels = vec![
//!         CommandSpec::shell(&cfg.shell, "sync-wpt.py"),
//!         CommandSpec::shell(&cfg.shell, "sync-cert.py"),
//!     ];
//!
//!     // Runs until a fatal condition or SIGINT/SIGTERM.
//!     sup.run(leader, sentinels).await?;
//!     Ok(())
//! }
//! ```

mod command;
mod config;
mod core;
mod error;
mod events;
mod subscribers;

// ---- Public re-exports ----

pub use command::CommandSpec;
pub use config::Config;
pub use crate::core::{Leader, OnSuccess, Sentinel, Supervisor};
pub use error::{CommandError, FatalCondition, RestartError};
pub use events::{Bus, Event, EventKind};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
