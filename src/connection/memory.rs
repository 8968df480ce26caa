//! # MemoryBus: in-process broker double
//!
//! Records every call made by the runtime and keeps a broker-side subscription
//! set, so tests can assert exactly what was (un)subscribed and when.
//!
//! ## Behavior
//! - A `Connected` event is queued at construction.
//! - [`MemoryBus::inject`] delivers a message regardless of subscriptions
//!   (an in-flight message racing an unsubscribe).
//! - [`MemoryBus::deliver`] delivers only when the exact topic is subscribed.
//! - [`MemoryBus::reconnect`] forgets broker-side subscriptions and queues `Reconnected`.
//! - [`MemoryBus::fail`] forgets subscriptions and queues an `Error`.

use std::collections::BTreeSet;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;

use super::{BusConnection, BusEvent};
use crate::error::BusError;

/// One call made against the [`MemoryBus`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusCall {
    Subscribe(Vec<String>),
    Unsubscribe(Vec<String>),
    Publish { topic: String, payload: Vec<u8> },
    Disconnect,
}

/// In-process [`BusConnection`].
pub struct MemoryBus {
    tx: mpsc::UnboundedSender<BusEvent>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<BusEvent>>>,
    calls: Mutex<Vec<BusCall>>,
    subscribed: Mutex<BTreeSet<String>>,
    reject_subscribe: Mutex<Option<String>>,
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBus {
    /// Creates a connected bus.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(BusEvent::Connected);
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
            calls: Mutex::new(Vec::new()),
            subscribed: Mutex::new(BTreeSet::new()),
            reject_subscribe: Mutex::new(None),
        }
    }

    /// Delivers a message unconditionally.
    pub fn inject(&self, topic: impl Into<String>, payload: impl Into<Vec<u8>>) {
        let _ = self.tx.send(BusEvent::Message {
            topic: topic.into(),
            payload: payload.into(),
        });
    }

    /// Delivers a JSON message unconditionally.
    pub fn inject_json(&self, topic: impl Into<String>, payload: &Value) {
        self.inject(topic, payload.to_string());
    }

    /// Delivers a message only if the broker holds a subscription for `topic`.
    ///
    /// Returns whether the message was delivered.
    pub fn deliver(&self, topic: &str, payload: impl Into<Vec<u8>>) -> bool {
        if !self.subscribed.lock().contains(topic) {
            return false;
        }
        self.inject(topic, payload);
        true
    }

    /// Simulates a reconnect: broker-side subscriptions are lost.
    pub fn reconnect(&self) {
        self.subscribed.lock().clear();
        let _ = self.tx.send(BusEvent::Reconnected);
    }

    /// Simulates a connection failure.
    pub fn fail(&self, reason: impl Into<String>) {
        self.subscribed.lock().clear();
        let _ = self
            .tx
            .send(BusEvent::Error(BusError::ConnectionFailed(reason.into())));
    }

    /// Makes the next subscribe call fail with `reason`.
    pub fn reject_next_subscribe(&self, reason: impl Into<String>) {
        *self.reject_subscribe.lock() = Some(reason.into());
    }

    /// All calls so far, oldest first.
    pub fn calls(&self) -> Vec<BusCall> {
        self.calls.lock().clone()
    }

    /// Drains the recorded calls.
    pub fn take_calls(&self) -> Vec<BusCall> {
        std::mem::take(&mut *self.calls.lock())
    }

    /// Topics the broker currently delivers.
    pub fn subscribed(&self) -> BTreeSet<String> {
        self.subscribed.lock().clone()
    }
}

#[async_trait]
impl BusConnection for MemoryBus {
    async fn subscribe(&self, topics: &[String]) -> Result<(), BusError> {
        self.calls.lock().push(BusCall::Subscribe(topics.to_vec()));
        if let Some(reason) = self.reject_subscribe.lock().take() {
            return Err(BusError::SubscribeFailed(reason));
        }
        self.subscribed.lock().extend(topics.iter().cloned());
        Ok(())
    }

    async fn unsubscribe(&self, topics: &[String]) -> Result<(), BusError> {
        self.calls.lock().push(BusCall::Unsubscribe(topics.to_vec()));
        let mut subscribed = self.subscribed.lock();
        for topic in topics {
            subscribed.remove(topic);
        }
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), BusError> {
        self.calls.lock().push(BusCall::Publish {
            topic: topic.to_string(),
            payload: payload.to_vec(),
        });
        Ok(())
    }

    fn events(&self) -> Result<mpsc::UnboundedReceiver<BusEvent>, BusError> {
        self.rx.lock().take().ok_or(BusError::EventsTaken)
    }

    async fn disconnect(&self) -> Result<(), BusError> {
        self.calls.lock().push(BusCall::Disconnect);
        self.subscribed.lock().clear();
        Ok(())
    }

    fn name(&self) -> &'static str {
        "MemoryBus"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_calls_and_subscriptions() {
        let bus = MemoryBus::new();
        bus.subscribe(&["a".into(), "b".into()]).await.unwrap();
        bus.unsubscribe(&["a".into()]).await.unwrap();

        assert_eq!(bus.subscribed(), BTreeSet::from(["b".to_string()]));
        assert_eq!(
            bus.calls(),
            vec![
                BusCall::Subscribe(vec!["a".into(), "b".into()]),
                BusCall::Unsubscribe(vec!["a".into()]),
            ]
        );
    }

    #[tokio::test]
    async fn test_events_are_taken_once_and_start_connected() {
        let bus = MemoryBus::new();
        let mut rx = bus.events().unwrap();
        assert_eq!(bus.events().unwrap_err(), BusError::EventsTaken);
        assert_eq!(rx.recv().await, Some(BusEvent::Connected));
    }

    #[tokio::test]
    async fn test_deliver_requires_subscription() {
        let bus = MemoryBus::new();
        let mut rx = bus.events().unwrap();
        let _ = rx.recv().await;

        assert!(!bus.deliver("a", "x"));
        bus.subscribe(&["a".into()]).await.unwrap();
        assert!(bus.deliver("a", "x"));
        assert_eq!(
            rx.recv().await,
            Some(BusEvent::Message {
                topic: "a".into(),
                payload: b"x".to_vec()
            })
        );
    }

    #[tokio::test]
    async fn test_rejected_subscribe_is_reported_once() {
        let bus = MemoryBus::new();
        bus.reject_next_subscribe("denied");
        assert!(bus.subscribe(&["a".into()]).await.is_err());
        assert!(bus.subscribe(&["a".into()]).await.is_ok());
        assert!(bus.subscribed().contains("a"));
    }
}
