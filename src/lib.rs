//! # unitvisor
//!
//! **Unitvisor** is an observe-only supervision engine for devices ("units") that
//! talk over a publish/subscribe message bus.
//!
//! It turns loosely typed broker traffic (arbitrary topics, optional leading
//! slashes, malformed JSON, stale producers) into a consistent per-unit,
//! per-feature status model and a bounded list of alerts. The crate is designed
//! as a building block under a dashboard or an operations agent.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   raw definitions (AAS JSON)         SupervisorHandle (lifecycle + snapshots)
//!            │                                     │
//!            ▼                                     ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Supervisor (single supervision loop)                             │
//! │  - Engine                                                         │
//! │      UnitRegistry ──► ActiveSet ──► SubscriptionReconciler        │
//! │                          ▲                  │                     │
//! │           router ────────┘                  ▼                     │
//! │             └──► AlertBuffer            BusOp queue ──► bus writer│
//! │  - Bus (broadcast events)                                         │
//! │  - SubscriberSet (fans out to user subscribers)                   │
//! └──────┬─────────────────────────────────────────────────┬──────────┘
//!        │ BusEvent::{Connected, Reconnected,               │ subscribe /
//!        │            Message, Error}                        │ unsubscribe
//!        ▲                                                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                 BusConnection (MQTT client, MemoryBus, ...)       │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ### Message path
//! ```text
//! topic ──► normalize ──► owner (longest base prefix) ──► Running?
//!                                                          ├─ no  ─► discard
//!                                                          └─ yes ─► feat/<key>/$state ─► feature machine ─► alert?
//!                                                                    data   ─► alert marker or telemetry cache
//!                                                                    status ─► alert
//!                                                                    ack    ─► no-op
//! ```
//!
//! ## Features
//! | Area              | Description                                                      | Key types / traits                              |
//! |-------------------|------------------------------------------------------------------|-------------------------------------------------|
//! | **Topics**        | Normalization, feature-state grammar, subscription sets.         | [`topics`]                                      |
//! | **Units**         | Descriptors, AAS definition parsing, status vocabulary.          | [`UnitDescriptor`], [`parse_definition`]        |
//! | **Supervision**   | Registry, active set, reconciler, router in one loop.            | [`Supervisor`], [`SupervisorHandle`], [`Engine`]|
//! | **Alerts**        | Bounded newest-first buffer with acknowledge/clear.              | [`Alert`], [`AlertBuffer`]                      |
//! | **Connection**    | Broker abstraction and an in-memory double.                      | [`BusConnection`], [`MemoryBus`]                |
//! | **Subscriber API**| Hook into supervision events (logging, metrics, custom sinks).   | [`Subscribe`], [`LogWriter`]                    |
//! | **Errors**        | Typed errors for callers, payloads and the connection.           | [`SupervisorError`], [`DecodeError`], [`BusError`] |
//! | **Configuration** | Centralize runtime settings.                                     | [`Config`]                                      |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use serde_json::json;
//! use unitvisor::{Config, FeatureStatus, MemoryBus, SupervisorBuilder};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bus = Arc::new(MemoryBus::new());
//!     let sup = SupervisorBuilder::new(Config::default()).build(bus.clone());
//!     let handle = sup.start()?;
//!
//!     handle.register(json!({
//!         "submodels": [{
//!             "idShort": "DataConnection",
//!             "submodelElements": [
//!                 { "idShort": "CpsId", "modelType": "Property", "value": "CPS-001" },
//!                 { "idShort": "MqttBaseTopic", "modelType": "Property", "value": "/cps/x/u1" }
//!             ]
//!         }]
//!     })).await?;
//!     handle.add("CPS-001", true).await?;
//!
//!     let unit = handle.unit("cps-001").await?.expect("active");
//!     assert!(unit.features.iter().all(|f| f.status == FeatureStatus::Unknown));
//!
//!     sup.shutdown().await?;
//!     Ok(())
//! }
//! ```

mod alerts;
mod connection;
mod core;
mod error;
mod events;
mod loader;
mod subscribers;
pub mod topics;
mod units;

// ---- Public re-exports ----

pub use crate::core::{
    ActiveSet, BusOp, Config, DiscardReason, Engine, FeatureOutcome, FeatureReport, Route,
    SubscriptionDiff, SubscriptionReconciler, SupervisedUnit, Supervisor, SupervisorBuilder,
    SupervisorHandle, Telemetry, UnitRegistry, desired_topics, diff, route,
};
pub use alerts::{Alert, AlertBuffer, DEFAULT_ALERT_CAPACITY, Severity};
pub use connection::{BusCall, BusConnection, BusEvent, MemoryBus};
pub use error::{BusError, DecodeError, SupervisorError};
pub use events::{Bus, Event, EventKind};
pub use loader::load_definitions;
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
pub use units::{
    DEFAULT_BUS_ENDPOINT, FeatureDescriptor, FeatureState, FeatureStatus, RunState, UnitDescriptor,
    parse_definition,
};
