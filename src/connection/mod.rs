//! # Bus connection contract.
//!
//! The runtime never talks to a broker directly. It drives a [`BusConnection`]
//! supplied by the embedding application (MQTT client, NATS, test double...).
//!
//! ## Contract
//! - `subscribe`/`unsubscribe` are called from a single writer task, in the order
//!   the reconciler produced them; their results only feed logging.
//! - `events()` hands out the inbound stream **once**; it carries messages and
//!   lifecycle notifications ([`BusEvent`]).
//! - After `Connected`/`Reconnected` the runtime assumes the broker holds **no**
//!   subscriptions and resends the full desired set.
//! - `publish` exists for command issuance by the embedding application; the
//!   supervision core never calls it.
//!
//! [`MemoryBus`] is an in-process implementation for tests and demos.

mod memory;

pub use memory::{BusCall, MemoryBus};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::BusError;

/// Inbound traffic and lifecycle notifications from the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    /// First successful connect.
    Connected,
    /// Connection re-established after a loss; broker-side subscriptions are gone.
    Reconnected,
    /// A message on `topic`.
    Message { topic: String, payload: Vec<u8> },
    /// Connection-level failure; subscriptions are void until the next connect.
    Error(BusError),
}

/// Connection to a publish/subscribe broker.
#[async_trait]
pub trait BusConnection: Send + Sync + 'static {
    /// Subscribes to every topic in `topics`.
    async fn subscribe(&self, topics: &[String]) -> Result<(), BusError>;

    /// Unsubscribes from every topic in `topics`.
    async fn unsubscribe(&self, topics: &[String]) -> Result<(), BusError>;

    /// Publishes a payload (unused by the supervision core).
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), BusError>;

    /// Takes the inbound event stream. Fails with [`BusError::EventsTaken`] on the second call.
    fn events(&self) -> Result<mpsc::UnboundedReceiver<BusEvent>, BusError>;

    /// Releases the connection.
    async fn disconnect(&self) -> Result<(), BusError>;

    /// Human-readable name (for logs).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
