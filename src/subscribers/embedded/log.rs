//! # LogWriter: tracing event renderer
//!
//! A subscriber that turns every [`Event`] into a `tracing` record under the
//! `unitvisor::events` target. Install any `tracing` subscriber to see them.
//!
//! ## Example output (fmt layer)
//! ```text
//! INFO  unitvisor::events: unit added unit="CPS-001" run_state=running
//! INFO  unitvisor::events: feature updated unit="CPS-001" feature="soldagem" status=failure
//! WARN  unitvisor::events: alert raised unit="CPS-001" severity=high id="CPS-001-soldagem-1000"
//! DEBUG unitvisor::events: message discarded topic="cps/x/u9/data" reason="no_owner"
//! ```

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

const TARGET: &str = "unitvisor::events";

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let unit = e.unit.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");
        let topic = e.topic.as_deref().unwrap_or("-");

        match e.kind {
            EventKind::UnitRegistered => {
                info!(target: TARGET, unit, topic, "unit registered");
            }
            EventKind::RegistrationRejected => {
                warn!(target: TARGET, reason, "registration rejected");
            }
            EventKind::UnitUnregistered => {
                info!(target: TARGET, unit, "unit unregistered");
            }
            EventKind::UnitAdded => {
                info!(target: TARGET, unit, run_state = ?e.run_state, "unit added");
            }
            EventKind::UnitRemoved => {
                info!(target: TARGET, unit, "unit removed");
            }
            EventKind::RunStateChanged => {
                info!(target: TARGET, unit, run_state = ?e.run_state, "run-state changed");
            }
            EventKind::FeatureUpdated => {
                info!(
                    target: TARGET,
                    unit,
                    feature = e.feature.as_deref().unwrap_or("-"),
                    status = ?e.status,
                    "feature updated"
                );
            }
            EventKind::StatusRejected => {
                debug!(
                    target: TARGET,
                    unit,
                    feature = e.feature.as_deref().unwrap_or("-"),
                    word = reason,
                    "status outside vocabulary"
                );
            }
            EventKind::TelemetryCached => {
                debug!(target: TARGET, unit, topic, "telemetry cached");
            }
            EventKind::AlertRaised => {
                warn!(target: TARGET, unit, severity = ?e.severity, id = reason, "alert raised");
            }
            EventKind::AlertsAcknowledged => {
                info!(target: TARGET, id = reason, count = ?e.count, "alerts acknowledged");
            }
            EventKind::AlertsCleared => {
                info!(target: TARGET, count = ?e.count, "alerts cleared");
            }
            EventKind::DecodeFailed => {
                warn!(target: TARGET, unit, topic, reason, "undecodable payload");
            }
            EventKind::MessageDiscarded => {
                debug!(target: TARGET, topic, reason, "message discarded");
            }
            EventKind::Connected => {
                info!(target: TARGET, "bus connected");
            }
            EventKind::ConnectionLost => {
                warn!(target: TARGET, reason, "bus connection lost");
            }
            EventKind::SubscriptionsChanged => {
                debug!(target: TARGET, count = ?e.count, "subscriptions changed");
            }
            EventKind::ShutdownRequested => {
                info!(target: TARGET, "shutdown requested");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
