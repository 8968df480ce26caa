//! # Subscription reconciler.
//!
//! Keeps the broker-side subscription set equal to the topics of every Running
//! unit, sending only the difference.
//!
//! ```text
//! ActiveSet ──► desired_topics() ──► diff(subscribed, desired)
//!                                       ├─► unsubscribe: subscribed − desired
//!                                       └─► subscribe:   desired − subscribed
//!
//! Connected / Reconnected ──► subscribed = ∅ ──► full resubscribe
//! Error                   ──► subscribed = ∅, no calls until the next connect
//! ```
//!
//! The reconciler never talks to the broker itself; it returns a
//! [`SubscriptionDiff`] that the supervisor hands to its bus writer.

use std::collections::BTreeSet;

use crate::core::active::ActiveSet;
use crate::topics;

/// Topics to leave and to join, each sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionDiff {
    pub unsubscribe: Vec<String>,
    pub subscribe: Vec<String>,
}

impl SubscriptionDiff {
    pub fn is_empty(&self) -> bool {
        self.unsubscribe.is_empty() && self.subscribe.is_empty()
    }

    /// Topics touched in total.
    pub fn len(&self) -> usize {
        self.unsubscribe.len() + self.subscribe.len()
    }
}

/// Union of the subscription topics of every Running unit.
pub fn desired_topics(active: &ActiveSet) -> BTreeSet<String> {
    active
        .running()
        .flat_map(|u| topics::subscription_topics_for(&u.descriptor))
        .collect()
}

/// Minimal change turning `previous` into `desired`.
pub fn diff(previous: &BTreeSet<String>, desired: &BTreeSet<String>) -> SubscriptionDiff {
    SubscriptionDiff {
        unsubscribe: previous.difference(desired).cloned().collect(),
        subscribe: desired.difference(previous).cloned().collect(),
    }
}

/// Tracks what the broker is believed to deliver.
#[derive(Debug, Default)]
pub struct SubscriptionReconciler {
    subscribed: BTreeSet<String>,
    connected: bool,
}

impl SubscriptionReconciler {
    /// Starts disconnected with nothing subscribed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves to `desired`, returning the calls to make.
    ///
    /// While disconnected nothing is sent and nothing is recorded; the next
    /// [`on_connected`](Self::on_connected) resends the full set.
    pub fn reconcile(&mut self, desired: BTreeSet<String>) -> SubscriptionDiff {
        if !self.connected {
            return SubscriptionDiff::default();
        }
        let change = diff(&self.subscribed, &desired);
        self.subscribed = desired;
        change
    }

    /// The broker (re)connected and holds no subscriptions.
    pub fn on_connected(&mut self) {
        self.connected = true;
        self.subscribed.clear();
    }

    /// The connection failed; subscriptions are void.
    pub fn on_lost(&mut self) {
        self.connected = false;
        self.subscribed.clear();
    }

    /// Topics believed subscribed.
    pub fn subscribed(&self) -> &BTreeSet<String> {
        &self.subscribed
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::{RunState, UnitDescriptor};

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_diff_is_minimal() {
        let change = diff(&set(&["a", "b"]), &set(&["b", "c"]));
        assert_eq!(change.unsubscribe, vec!["a".to_string()]);
        assert_eq!(change.subscribe, vec!["c".to_string()]);
        assert_eq!(change.len(), 2);
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let mut rec = SubscriptionReconciler::new();
        rec.on_connected();

        let first = rec.reconcile(set(&["a", "b"]));
        assert_eq!(first.subscribe.len(), 2);
        assert!(rec.reconcile(set(&["a", "b"])).is_empty());
    }

    #[test]
    fn test_disconnected_reconcile_sends_nothing() {
        let mut rec = SubscriptionReconciler::new();
        assert!(rec.reconcile(set(&["a"])).is_empty());
        assert!(rec.subscribed().is_empty());

        rec.on_connected();
        assert_eq!(rec.reconcile(set(&["a"])).subscribe, vec!["a".to_string()]);
    }

    #[test]
    fn test_reconnect_resends_full_set() {
        let mut rec = SubscriptionReconciler::new();
        rec.on_connected();
        rec.reconcile(set(&["a", "b"]));

        rec.on_lost();
        assert!(!rec.is_connected());
        rec.on_connected();
        let change = rec.reconcile(set(&["a", "b"]));
        assert_eq!(change.subscribe, vec!["a".to_string(), "b".to_string()]);
        assert!(change.unsubscribe.is_empty());
    }

    #[test]
    fn test_desired_topics_only_from_running_units() {
        let mut active = ActiveSet::new();
        active
            .insert(UnitDescriptor::new("a", "a", "cps/a"), RunState::Running)
            .unwrap();
        active
            .insert(UnitDescriptor::new("b", "b", "cps/b"), RunState::Stopped)
            .unwrap();

        let desired = desired_topics(&active);
        assert!(desired.contains("cps/a/data"));
        assert!(desired.contains("/cps/a"));
        assert!(!desired.iter().any(|t| t.contains("cps/b")));
    }
}
