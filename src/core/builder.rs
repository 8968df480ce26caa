use std::sync::Arc;

use crate::{
    connection::BusConnection,
    core::Config,
    events::Bus,
    subscribers::{Subscribe, SubscriberSet},
};

use super::supervisor::Supervisor;

/// Builder for constructing a [`Supervisor`] over a bus connection.
pub struct SupervisorBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl SupervisorBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive supervision events (unit lifecycle, feature updates,
    /// alerts, connection changes) through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds and returns the Supervisor instance.
    ///
    /// Must be called inside a Tokio runtime when subscribers are set (their
    /// workers are spawned here). Nothing touches the connection until
    /// [`Supervisor::start`].
    pub fn build(self, connection: Arc<dyn BusConnection>) -> Arc<Supervisor> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = Arc::new(SubscriberSet::new(self.subscribers));
        Arc::new(Supervisor::new_internal(self.cfg, bus, subs, connection))
    }
}
