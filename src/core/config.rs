//! # Global runtime configuration.
//!
//! Provides [`Config`] centralized settings for the supervisor runtime.
//!
//! Config is used in two ways:
//! 1. **Supervisor creation**: `SupervisorBuilder::new(config)`
//! 2. **Engine creation**: `Engine::new(&config, bus, ops)` sizes the alert buffer
//!
//! ## Sentinel values
//! - `bus_capacity = 0`, `alert_capacity = 0`, `command_capacity = 0` are clamped to 1
//! - `grace = 0s` → no wait for the bus writer on shutdown

use std::time::Duration;

use crate::alerts::DEFAULT_ALERT_CAPACITY;

/// Global configuration for the supervisor runtime.
///
/// ## Field semantics
/// - `bus_capacity`: internal event bus ring buffer size (min 1)
/// - `alert_capacity`: alerts kept newest-first before the oldest is evicted (min 1)
/// - `command_capacity`: queued handle calls before `try_*` calls see `Full` (min 1)
/// - `grace`: maximum wait for in-flight bus calls on shutdown
///
/// ## Notes
/// All fields are public for flexibility. Prefer using helper accessors to avoid
/// sprinkling sentinel checks (`0`) across the codebase.
#[derive(Clone, Debug)]
pub struct Config {
    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow subscribers that lag behind more than `bus_capacity` messages will
    /// receive `Lagged` and skip older items.
    pub bus_capacity: usize,

    /// Number of alerts kept by the alert buffer.
    pub alert_capacity: usize,

    /// Capacity of the command channel between handles and the supervisor loop.
    pub command_capacity: usize,

    /// Maximum time to wait for the bus writer to drain on shutdown.
    ///
    /// When shutdown is requested:
    /// - the supervisor loop is cancelled via `CancellationToken`
    /// - pending subscribe/unsubscribe calls get up to `grace` to finish
    /// - the connection is then disconnected regardless
    pub grace: Duration,
}

impl Config {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns an alert capacity clamped to a minimum of 1.
    #[inline]
    pub fn alert_capacity_clamped(&self) -> usize {
        self.alert_capacity.max(1)
    }

    /// Returns a command channel capacity clamped to a minimum of 1.
    #[inline]
    pub fn command_capacity_clamped(&self) -> usize {
        self.command_capacity.max(1)
    }

    /// Returns the shutdown grace as an `Option`.
    ///
    /// - `None` → do not wait for the writer
    /// - `Some(d)` → wait up to `d`
    #[inline]
    pub fn shutdown_grace(&self) -> Option<Duration> {
        if self.grace == Duration::ZERO {
            None
        } else {
            Some(self.grace)
        }
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `bus_capacity = 1024` (good baseline)
    /// - `alert_capacity = 200` (operator-facing list)
    /// - `command_capacity = 256`
    /// - `grace = 5s`
    fn default() -> Self {
        Self {
            bus_capacity: 1024,
            alert_capacity: DEFAULT_ALERT_CAPACITY,
            command_capacity: 256,
            grace: Duration::from_secs(5),
        }
    }
}
