//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to supervision events emitted by the engine and the
//! supervisor loop.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Engine` (registry, active set, router, alerts, reconciler),
//!   `Supervisor` (shutdown).
//! - **Consumers**: `Supervisor::subscriber_listener()` (fans out to `SubscriberSet`).
//!
//! Events are notifications about the model, not the model itself: snapshots are
//! read through [`SupervisorHandle`](crate::SupervisorHandle).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
