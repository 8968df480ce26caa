//! # Supervision events emitted by the engine and the supervisor loop.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Catalogue events**: registration and removal of unit descriptors
//! - **Lifecycle events**: units added, removed, started, stopped
//! - **Traffic events**: feature updates, telemetry, alerts, dropped messages
//! - **Connection events**: broker up/down, subscription changes, shutdown
//!
//! The [`Event`] struct carries additional metadata such as timestamps, unit,
//! feature, topic and reasons.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use unitvisor::{Event, EventKind, FeatureStatus};
//!
//! let ev = Event::new(EventKind::FeatureUpdated)
//!     .with_unit("CPS-001")
//!     .with_feature("soldagem")
//!     .with_status(FeatureStatus::Failure);
//!
//! assert_eq!(ev.kind, EventKind::FeatureUpdated);
//! assert_eq!(ev.unit.as_deref(), Some("CPS-001"));
//! assert_eq!(ev.status, Some(FeatureStatus::Failure));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

use crate::alerts::Severity;
use crate::units::{FeatureStatus, RunState};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of supervision events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Catalogue events ===
    /// A definition was accepted (new or replacing).
    ///
    /// Sets:
    /// - `unit`: unit id
    /// - `topic`: base topic
    UnitRegistered,

    /// A definition was rejected.
    ///
    /// Sets:
    /// - `reason`: why
    RegistrationRejected,

    /// A descriptor was removed from the registry.
    ///
    /// Sets:
    /// - `unit`: unit id
    UnitUnregistered,

    // === Lifecycle events ===
    /// A unit entered the active set.
    ///
    /// Sets:
    /// - `unit`: unit id
    /// - `run_state`: initial run-state
    UnitAdded,

    /// A unit left the active set (remove or unplug).
    ///
    /// Sets:
    /// - `unit`: unit id
    UnitRemoved,

    /// A unit's run-state changed.
    ///
    /// Sets:
    /// - `unit`: unit id
    /// - `run_state`: new run-state
    RunStateChanged,

    // === Traffic events ===
    /// A feature accepted a state report.
    ///
    /// Sets:
    /// - `unit`, `feature`
    /// - `status`: resulting status
    FeatureUpdated,

    /// A state report named a status outside the feature's vocabulary.
    ///
    /// Sets:
    /// - `unit`, `feature`
    /// - `status`: retained status
    /// - `reason`: the rejected wire word
    StatusRejected,

    /// Generic telemetry was cached for a unit.
    ///
    /// Sets:
    /// - `unit`, `topic`
    TelemetryCached,

    /// An alert was raised.
    ///
    /// Sets:
    /// - `unit`, `severity`
    /// - `reason`: alert id
    AlertRaised,

    /// Alerts were acknowledged.
    ///
    /// Sets:
    /// - `reason`: acknowledged id
    /// - `count`: removed alerts
    AlertsAcknowledged,

    /// The alert buffer was cleared.
    ///
    /// Sets:
    /// - `count`: removed alerts
    AlertsCleared,

    /// A payload could not be decoded.
    ///
    /// Sets:
    /// - `unit`, `topic`
    /// - `reason`: decoder message
    DecodeFailed,

    /// A message was dropped without effect.
    ///
    /// Sets:
    /// - `topic`
    /// - `unit`: owner, when resolved
    /// - `reason`: `no_owner`, `not_running`, `unknown_feature` or `unclassified`
    MessageDiscarded,

    // === Connection events ===
    /// The broker (re)connected; a full resubscription follows.
    Connected,

    /// The connection reported an error; subscriptions are void.
    ///
    /// Sets:
    /// - `reason`: error message
    ConnectionLost,

    /// The reconciler changed the subscription set.
    ///
    /// Sets:
    /// - `count`: subscribed + unsubscribed topics
    SubscriptionsChanged,

    /// Shutdown requested (explicit call or OS signal).
    ShutdownRequested,
}

/// Supervision event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Unit id, if applicable.
    pub unit: Option<Arc<str>>,
    /// Feature key, if applicable.
    pub feature: Option<Arc<str>>,
    /// Bus topic, if applicable.
    pub topic: Option<Arc<str>>,
    /// Human-readable reason (errors, rejected words, alert ids).
    pub reason: Option<Arc<str>>,
    pub run_state: Option<RunState>,
    pub status: Option<FeatureStatus>,
    pub severity: Option<Severity>,
    /// Item count (alerts removed, topics changed).
    pub count: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            unit: None,
            feature: None,
            topic: None,
            reason: None,
            run_state: None,
            status: None,
            severity: None,
            count: None,
        }
    }

    #[inline]
    pub fn with_unit(mut self, unit: impl Into<Arc<str>>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    #[inline]
    pub fn with_feature(mut self, feature: impl Into<Arc<str>>) -> Self {
        self.feature = Some(feature.into());
        self
    }

    #[inline]
    pub fn with_topic(mut self, topic: impl Into<Arc<str>>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    #[inline]
    pub fn with_run_state(mut self, state: RunState) -> Self {
        self.run_state = Some(state);
        self
    }

    #[inline]
    pub fn with_status(mut self, status: FeatureStatus) -> Self {
        self.status = Some(status);
        self
    }

    #[inline]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    /// Attaches a count (saturating at `u32::MAX`).
    #[inline]
    pub fn with_count(mut self, n: usize) -> Self {
        self.count = Some(u32::try_from(n).unwrap_or(u32::MAX));
        self
    }

    /// Creates a discard event for `topic`.
    #[inline]
    pub fn discarded(topic: &str, reason: &'static str) -> Self {
        Event::new(EventKind::MessageDiscarded)
            .with_topic(topic)
            .with_reason(reason)
    }
}
