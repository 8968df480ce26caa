//! Supervision core: state, routing and the async runtime around it.
//!
//! The public surface of this module is [`Supervisor`] (with its builder and
//! handle) for async embedding and [`Engine`] for driving the same state
//! machine synchronously.
//!
//! Internal modules:
//! - [`registry`]: case-insensitive catalogue of unit descriptors;
//! - [`active`]: supervised units, run-state and feature state machines;
//! - [`reconciler`]: desired topic set and minimal subscription diffs;
//! - [`router`]: owner resolution and topic classification;
//! - [`engine`]: ties the above together and publishes events;
//! - [`handle`]: command channel between callers and the supervision loop;
//! - [`supervisor`]: supervision loop, bus writer, graceful shutdown;
//! - [`shutdown`]: cross-platform shutdown signal handling.

mod active;
mod builder;
mod config;
mod engine;
mod handle;
mod reconciler;
mod registry;
mod router;
mod shutdown;
mod supervisor;

pub use active::{ActiveSet, FeatureOutcome, SupervisedUnit, Telemetry};
pub use builder::SupervisorBuilder;
pub use config::Config;
pub use engine::{BusOp, Engine};
pub use handle::SupervisorHandle;
pub use reconciler::{SubscriptionDiff, SubscriptionReconciler, desired_topics, diff};
pub use registry::UnitRegistry;
pub use router::{DiscardReason, FeatureReport, Route, route};
pub use supervisor::Supervisor;
