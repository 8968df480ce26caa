//! # Engine: the synchronous supervision core.
//!
//! The [`Engine`] owns every piece of mutable state (registry, active set,
//! reconciler, alert buffer) and is driven by exactly one caller at a time. In the
//! async runtime that caller is the supervisor loop; tests drive it directly.
//!
//! ```text
//!   lifecycle calls                     bus events
//!   (register/add/stop/...)             (Connected/Message/Error)
//!          │                                   │
//!          ▼                                   ▼
//!   ┌─────────────────────────── Engine ───────────────────────────┐
//!   │ UnitRegistry ──► ActiveSet ──► SubscriptionReconciler        │
//!   │                     ▲              │                         │
//!   │        route() ─────┘              └─► BusOp ──► ops channel ─┼──► bus writer
//!   │           └─► AlertBuffer                                     │
//!   └───────────────────────────┬───────────────────────────────────┘
//!                               └─► Bus.publish(Event) ──► subscribers
//! ```
//!
//! ## Rules
//! - Every lifecycle change that can alter the desired topic set ends with a resync.
//! - Bus operations are queued, never awaited; unsubscribe is queued before subscribe.
//! - Nothing on the message path returns an error: failures become events and logs.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::alerts::{Alert, AlertBuffer};
use crate::connection::BusEvent;
use crate::core::Config;
use crate::core::active::{ActiveSet, FeatureOutcome, SupervisedUnit, Telemetry};
use crate::core::reconciler::{self, SubscriptionReconciler};
use crate::core::registry::UnitRegistry;
use crate::core::router::{self, FeatureReport, Route};
use crate::error::{BusError, SupervisorError};
use crate::events::{Bus, Event, EventKind};
use crate::units::{RunState, UnitDescriptor};

/// One call for the bus writer, executed in queue order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusOp {
    Subscribe(Vec<String>),
    Unsubscribe(Vec<String>),
}

/// Owned supervision state plus its outputs (event bus, bus-op queue).
pub struct Engine {
    registry: UnitRegistry,
    active: ActiveSet,
    reconciler: SubscriptionReconciler,
    alerts: AlertBuffer,
    bus: Bus,
    ops: mpsc::UnboundedSender<BusOp>,
}

impl Engine {
    /// Creates an empty, disconnected engine.
    pub fn new(cfg: &Config, bus: Bus, ops: mpsc::UnboundedSender<BusOp>) -> Self {
        Self {
            registry: UnitRegistry::new(),
            active: ActiveSet::new(),
            reconciler: SubscriptionReconciler::new(),
            alerts: AlertBuffer::new(cfg.alert_capacity_clamped()),
            bus,
            ops,
        }
    }

    // ---------------------------
    // Catalogue
    // ---------------------------

    /// Parses and registers a raw definition.
    pub fn register(&mut self, raw: &Value) -> Result<UnitDescriptor, SupervisorError> {
        match self.registry.register(raw) {
            Ok(desc) => {
                self.announce_registered(&desc);
                Ok((*desc).clone())
            }
            Err(err) => {
                warn!(error = %err, "unit definition rejected");
                self.bus.publish(
                    Event::new(EventKind::RegistrationRejected).with_reason(err.to_string()),
                );
                Err(err)
            }
        }
    }

    /// Registers an already-built descriptor.
    pub fn register_descriptor(&mut self, desc: UnitDescriptor) -> UnitDescriptor {
        let desc = self.registry.insert(desc);
        self.announce_registered(&desc);
        (*desc).clone()
    }

    fn announce_registered(&self, desc: &UnitDescriptor) {
        info!(unit = %desc.id, base = %desc.base_topic, features = desc.features.len(), "unit registered");
        self.bus.publish(
            Event::new(EventKind::UnitRegistered)
                .with_unit(desc.id.as_str())
                .with_topic(desc.base_topic.as_str()),
        );
    }

    /// Removes a unit from the catalogue. Supervised copies are untouched.
    pub fn unregister(&mut self, name_or_id: &str) -> bool {
        match self.registry.unregister(name_or_id) {
            Some(desc) => {
                self.bus
                    .publish(Event::new(EventKind::UnitUnregistered).with_unit(desc.id.as_str()));
                true
            }
            None => false,
        }
    }

    // ---------------------------
    // Lifecycle
    // ---------------------------

    /// Starts supervising a registered unit.
    pub fn add(
        &mut self,
        name_or_id: &str,
        start_running: bool,
    ) -> Result<SupervisedUnit, SupervisorError> {
        let desc = self
            .registry
            .lookup(name_or_id)
            .ok_or_else(|| SupervisorError::not_found(name_or_id))?;
        let run_state = if start_running {
            RunState::Running
        } else {
            RunState::Stopped
        };
        let unit = self.active.insert((*desc).clone(), run_state)?.clone();

        info!(unit = %unit.id(), %run_state, "unit added");
        self.bus.publish(
            Event::new(EventKind::UnitAdded)
                .with_unit(unit.id())
                .with_run_state(run_state),
        );
        self.resync();
        Ok(unit)
    }

    /// Stops supervising a unit. Returns whether one was removed.
    pub fn remove(&mut self, name_or_id: &str) -> bool {
        let Some(unit) = self.active.remove(name_or_id) else {
            return false;
        };
        info!(unit = %unit.id(), "unit removed");
        self.bus
            .publish(Event::new(EventKind::UnitRemoved).with_unit(unit.id()));
        self.resync();
        true
    }

    /// Starts or stops accepting messages for unit `unit_id`.
    ///
    /// Nothing is sent to the unit itself.
    pub fn set_run_state(&mut self, unit_id: &str, target: RunState) -> Result<(), SupervisorError> {
        let id = self
            .active
            .find(unit_id)
            .map(|u| u.id().to_string())
            .ok_or_else(|| SupervisorError::not_found(unit_id))?;
        if self.active.set_run_state(&id, target)? {
            info!(unit = %id, run_state = %target, "run-state changed");
            self.bus.publish(
                Event::new(EventKind::RunStateChanged)
                    .with_unit(id.as_str())
                    .with_run_state(target),
            );
            self.resync();
        }
        Ok(())
    }

    /// Removes an active unit and forgets its definition.
    pub fn unplug(&mut self, name_or_id: &str) -> Result<(), SupervisorError> {
        let id = self
            .active
            .find(name_or_id)
            .map(|u| u.id().to_string())
            .ok_or_else(|| SupervisorError::not_found(name_or_id))?;
        self.remove(&id);
        self.unregister(&id);
        Ok(())
    }

    // ---------------------------
    // Alerts
    // ---------------------------

    /// Removes every alert with `id`. Returns how many were removed.
    pub fn acknowledge(&mut self, id: &str) -> usize {
        let removed = self.alerts.acknowledge(id);
        if removed > 0 {
            self.bus.publish(
                Event::new(EventKind::AlertsAcknowledged)
                    .with_reason(id)
                    .with_count(removed),
            );
        }
        removed
    }

    /// Drops every alert. Returns how many were removed.
    pub fn clear_alerts(&mut self) -> usize {
        let removed = self.alerts.clear();
        self.bus
            .publish(Event::new(EventKind::AlertsCleared).with_count(removed));
        removed
    }

    fn raise(&mut self, alert: Alert) {
        warn!(
            unit = %alert.unit_id,
            id = %alert.id,
            severity = %alert.severity,
            component = %alert.component,
            "alert raised"
        );
        self.bus.publish(
            Event::new(EventKind::AlertRaised)
                .with_unit(alert.unit_id.as_str())
                .with_severity(alert.severity)
                .with_reason(alert.id.as_str()),
        );
        let evicted = self.alerts.raise(alert);
        if evicted > 0 {
            debug!(evicted, "alert buffer full, oldest dropped");
        }
    }

    // ---------------------------
    // Snapshots
    // ---------------------------

    /// Sorted display names of registered units.
    pub fn names(&self) -> Vec<String> {
        self.registry.names()
    }

    /// Every supervised unit, in insertion order.
    pub fn units(&self) -> Vec<SupervisedUnit> {
        self.active.iter().cloned().collect()
    }

    pub fn unit(&self, name_or_id: &str) -> Option<SupervisedUnit> {
        self.active.find(name_or_id).cloned()
    }

    /// Alerts, newest first.
    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.list()
    }

    /// Cached telemetry of an active unit.
    pub fn telemetry(&self, name_or_id: &str) -> Option<Telemetry> {
        self.active.find(name_or_id)?.telemetry.clone()
    }

    /// Topics the engine believes are subscribed.
    pub fn subscribed(&self) -> &BTreeSet<String> {
        self.reconciler.subscribed()
    }

    /// One operator-facing line per active unit.
    ///
    /// ```text
    /// Welder (CPS-001) @ broker.hivemq.com/cps/x/u1 [running] soldagem=failure | {"temp":21}
    /// ```
    pub fn overview(&self) -> Vec<String> {
        self.active.iter().map(overview_line).collect()
    }

    // ---------------------------
    // Bus side
    // ---------------------------

    /// Dispatches one event from the bus connection.
    pub fn on_bus_event(&mut self, event: BusEvent, arrived: DateTime<Utc>) {
        match event {
            BusEvent::Connected | BusEvent::Reconnected => self.on_connected(),
            BusEvent::Error(err) => self.on_connection_error(&err),
            BusEvent::Message { topic, payload } => self.handle_message(&topic, &payload, arrived),
        }
    }

    /// The broker holds no subscriptions: resend the full desired set.
    pub fn on_connected(&mut self) {
        info!("bus connected, resubscribing");
        self.reconciler.on_connected();
        self.bus.publish(Event::new(EventKind::Connected));
        self.resync();
    }

    /// Subscriptions are void until the next connect.
    pub fn on_connection_error(&mut self, err: &BusError) {
        warn!(error = %err, label = err.as_label(), "bus connection error");
        self.reconciler.on_lost();
        self.bus
            .publish(Event::new(EventKind::ConnectionLost).with_reason(err.to_string()));
    }

    /// Routes one inbound message.
    pub fn handle_message(&mut self, topic: &str, payload: &[u8], arrived: DateTime<Utc>) {
        match router::route(&self.active, topic) {
            Route::Discard { unit, reason } => {
                debug!(topic, unit = ?unit, reason = reason.as_label(), "message discarded");
                let mut ev = Event::discarded(topic, reason.as_label());
                if let Some(unit) = unit {
                    ev = ev.with_unit(unit);
                }
                self.bus.publish(ev);
            }
            Route::FeatureState { unit, key } => {
                self.on_feature_state(&unit, &key, topic, payload, arrived)
            }
            Route::Data { unit } => self.on_data(&unit, topic, payload, arrived),
            Route::Status { unit } => self.on_status(&unit, topic, payload, arrived),
            Route::Ack { unit } => {
                debug!(unit = %unit, topic, "ack ignored");
            }
        }
    }

    fn on_feature_state(
        &mut self,
        unit_id: &str,
        key: &str,
        topic: &str,
        payload: &[u8],
        arrived: DateTime<Utc>,
    ) {
        let report = match FeatureReport::decode(payload) {
            Ok(r) => r,
            Err(err) => return self.decode_failed(unit_id, topic, &err.to_string()),
        };
        let ts_ms = report.ts_millis().unwrap_or_else(|| arrived.timestamp_millis());
        let at = crate::alerts::from_millis(ts_ms).unwrap_or(arrived);
        let word = report.status.trim().to_lowercase();

        let Some(unit) = self.active.get_mut(unit_id) else {
            return;
        };
        let outcome = unit.apply_report(key, &word, at, report.details.clone());

        match outcome {
            FeatureOutcome::UnknownFeature => {
                debug!(unit = unit_id, feature = key, "state report for undeclared feature");
                self.bus.publish(
                    Event::discarded(topic, "unknown_feature")
                        .with_unit(unit_id)
                        .with_feature(key),
                );
            }
            FeatureOutcome::Rejected { retained } => {
                debug!(unit = unit_id, feature = key, word = %word, "status outside vocabulary");
                self.bus.publish(
                    Event::new(EventKind::StatusRejected)
                        .with_unit(unit_id)
                        .with_feature(key)
                        .with_status(retained)
                        .with_reason(word.as_str()),
                );
            }
            FeatureOutcome::Accepted { previous, current } => {
                debug!(unit = unit_id, feature = key, from = %previous, to = %current, "feature updated");
                self.bus.publish(
                    Event::new(EventKind::FeatureUpdated)
                        .with_unit(unit_id)
                        .with_feature(key)
                        .with_status(current),
                );

                let Some(severity) = current.alert_severity() else {
                    return;
                };
                let alert = self.active.get(unit_id).and_then(|u| {
                    let feature = u.descriptor.feature(key)?;
                    Some(Alert::feature_state(
                        &u.descriptor,
                        key,
                        &feature.name,
                        severity,
                        &word,
                        ts_ms,
                        report.details.as_ref(),
                    ))
                });
                if let Some(alert) = alert {
                    self.raise(alert);
                }
            }
        }
    }

    fn on_data(&mut self, unit_id: &str, topic: &str, payload: &[u8], arrived: DateTime<Utc>) {
        let telemetry = match router::decode_json(payload) {
            Ok(value) if router::is_alert_marker(&value) => {
                let alert = self
                    .active
                    .get(unit_id)
                    .map(|u| Alert::from_data(&u.descriptor, value, arrived));
                if let Some(alert) = alert {
                    self.raise(alert);
                }
                return;
            }
            Ok(value) => Telemetry::Structured(value),
            Err(err) => {
                debug!(unit = unit_id, topic, error = %err, "data payload kept as raw text");
                Telemetry::Raw(String::from_utf8_lossy(payload).into_owned())
            }
        };

        if let Some(unit) = self.active.get_mut(unit_id) {
            unit.telemetry = Some(telemetry);
            self.bus.publish(
                Event::new(EventKind::TelemetryCached)
                    .with_unit(unit_id)
                    .with_topic(topic),
            );
        }
    }

    fn on_status(&mut self, unit_id: &str, topic: &str, payload: &[u8], arrived: DateTime<Utc>) {
        let value = match router::decode_json(payload) {
            Ok(v) => v,
            Err(err) => return self.decode_failed(unit_id, topic, &err.to_string()),
        };
        let alert = self
            .active
            .get(unit_id)
            .map(|u| Alert::from_status(&u.descriptor, value, arrived));
        if let Some(alert) = alert {
            self.raise(alert);
        }
    }

    fn decode_failed(&self, unit_id: &str, topic: &str, reason: &str) {
        warn!(unit = unit_id, topic, reason, "undecodable payload dropped");
        self.bus.publish(
            Event::new(EventKind::DecodeFailed)
                .with_unit(unit_id)
                .with_topic(topic)
                .with_reason(reason),
        );
    }

    /// Brings broker subscriptions in line with the Running units.
    pub fn resync(&mut self) {
        let change = self
            .reconciler
            .reconcile(reconciler::desired_topics(&self.active));
        if change.is_empty() {
            return;
        }

        let count = change.len();
        debug!(
            subscribe = change.subscribe.len(),
            unsubscribe = change.unsubscribe.len(),
            "subscriptions changed"
        );
        if !change.unsubscribe.is_empty() {
            self.queue(BusOp::Unsubscribe(change.unsubscribe));
        }
        if !change.subscribe.is_empty() {
            self.queue(BusOp::Subscribe(change.subscribe));
        }
        self.bus
            .publish(Event::new(EventKind::SubscriptionsChanged).with_count(count));
    }

    fn queue(&self, op: BusOp) {
        if self.ops.send(op).is_err() {
            warn!("bus writer gone, operation dropped");
        }
    }
}

fn overview_line(unit: &SupervisedUnit) -> String {
    let desc = &unit.descriptor;
    let features = unit
        .features
        .iter()
        .map(|f| format!("{}={}", f.key, f.status))
        .collect::<Vec<_>>()
        .join(", ");
    let tail = match &unit.telemetry {
        Some(Telemetry::Structured(v)) => v.to_string(),
        Some(Telemetry::Raw(s)) => s.clone(),
        None => "no telemetry".to_string(),
    };
    format!(
        "{} ({}) @ {}/{} [{}] {} | {}",
        desc.name,
        desc.id,
        desc.bus_endpoint,
        desc.base_topic,
        unit.run_state,
        if features.is_empty() { "-" } else { features.as_str() },
        tail
    )
}
