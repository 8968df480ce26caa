//! # Event subscribers for the unitvisor runtime.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out and
//! the built-in [`LogWriter`].
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   Engine ── publish(Event) ──► Bus ──► subscriber_listener ──► SubscriberSet::emit(&Event)
//!                                                                ┌─────────┼─────────┐
//!                                                                ▼         ▼         ▼
//!                                                            LogWriter  Dashboard  Custom
//! ```
//!
//! ## Implementing custom subscribers
//! ```no_run
//! use unitvisor::{Event, EventKind, Subscribe};
//! use async_trait::async_trait;
//!
//! struct Pager;
//!
//! #[async_trait]
//! impl Subscribe for Pager {
//!     async fn on_event(&self, event: &Event) {
//!         if event.kind == EventKind::AlertRaised {
//!             // page the on-call operator
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str {
//!         "pager"
//!     }
//! }
//! ```

mod embedded;
mod set;
mod subscribe;

pub use embedded::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
