use std::collections::VecDeque;

use super::Alert;

/// Capacity used when the configuration asks for none.
pub const DEFAULT_ALERT_CAPACITY: usize = 200;

/// Bounded, newest-first alert store.
///
/// ### Rules
/// - `raise` prepends; when full the **oldest inserted** entry is evicted
///   (insertion order, not timestamp order).
/// - `acknowledge` filters by id, so duplicate ids are all removed.
#[derive(Debug, Clone)]
pub struct AlertBuffer {
    entries: VecDeque<Alert>,
    capacity: usize,
}

impl Default for AlertBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_ALERT_CAPACITY)
    }
}

impl AlertBuffer {
    /// Creates an empty buffer. Capacity is clamped to a minimum of 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Prepends an alert, evicting the oldest entries beyond capacity.
    ///
    /// Returns the number of evicted alerts.
    pub fn raise(&mut self, alert: Alert) -> usize {
        self.entries.push_front(alert);
        let evicted = self.entries.len().saturating_sub(self.capacity);
        self.entries.truncate(self.capacity);
        evicted
    }

    /// Removes every alert with the given id; returns how many were removed.
    pub fn acknowledge(&mut self, id: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|a| a.id != id);
        before - self.entries.len()
    }

    /// Empties the buffer; returns how many alerts were dropped.
    pub fn clear(&mut self) -> usize {
        let n = self.entries.len();
        self.entries.clear();
        n
    }

    /// Snapshot, newest first.
    pub fn list(&self) -> Vec<Alert> {
        self.entries.iter().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Alert> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
