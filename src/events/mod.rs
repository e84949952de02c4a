//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to runtime events emitted by the leader loop, the
//! sentinels and the coordinator.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Leader`, `Sentinel`, `Supervisor`, `Registry`,
//!   `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: `SubscriberSet::forward` (one per supervisor run)
//!   and anything holding a receiver from [`Supervisor::subscribe`](crate::Supervisor::subscribe).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
