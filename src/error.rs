//! Error types used by the unitvisor runtime.
//!
//! This module defines three enums:
//!
//! - [`SupervisorError`]: errors returned to callers of lifecycle operations.
//! - [`DecodeError`]: malformed payloads on the bus (logged, never surfaced as failures).
//! - [`BusError`]: failures reported by the bus connection.
//!
//! Each type provides `as_label` for logs/metrics.

use thiserror::Error;

/// # Errors returned by lifecycle and registration calls.
///
/// These are discriminated results for the caller; none of them stops the runtime.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SupervisorError {
    /// A unit definition lacked mandatory identity or topic fields, or was not structured data.
    #[error("invalid unit definition: {reason}")]
    InvalidDefinition {
        /// What was wrong with the definition.
        reason: String,
    },

    /// The operation referenced a unit that is not registered (or not active).
    #[error("unit '{unit}' not found")]
    NotFound {
        /// Name or id as given by the caller.
        unit: String,
    },

    /// A unit with the same id is already under supervision.
    #[error("unit '{unit}' is already active")]
    AlreadyActive {
        /// Id of the active unit.
        unit: String,
    },

    /// `Supervisor::start` was called twice.
    #[error("supervisor already started")]
    AlreadyStarted,

    /// The supervisor loop is gone (shut down or never started).
    #[error("supervisor is not running")]
    Closed,

    /// The bus connection refused to hand out its event stream.
    #[error("bus connection: {0}")]
    Connection(#[from] BusError),
}

impl SupervisorError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use unitvisor::SupervisorError;
    ///
    /// let err = SupervisorError::NotFound { unit: "press-1".into() };
    /// assert_eq!(err.as_label(), "unit_not_found");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            SupervisorError::InvalidDefinition { .. } => "invalid_definition",
            SupervisorError::NotFound { .. } => "unit_not_found",
            SupervisorError::AlreadyActive { .. } => "unit_already_active",
            SupervisorError::AlreadyStarted => "supervisor_already_started",
            SupervisorError::Closed => "supervisor_closed",
            SupervisorError::Connection(_) => "bus_connection",
        }
    }

    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        SupervisorError::InvalidDefinition {
            reason: reason.into(),
        }
    }

    pub(crate) fn not_found(unit: impl Into<String>) -> Self {
        SupervisorError::NotFound { unit: unit.into() }
    }
}

/// # Malformed message payload.
///
/// The bus is an untrusted, best-effort channel: decode errors are logged and the
/// message is dropped (or degraded), never propagated.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Payload is not JSON, or JSON of the wrong shape.
    #[error("malformed payload: {reason}")]
    Malformed {
        /// Parser message.
        reason: String,
    },
}

impl DecodeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            DecodeError::Malformed { .. } => "decode_malformed",
        }
    }
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        DecodeError::Malformed {
            reason: err.to_string(),
        }
    }
}

/// # Errors reported by a [`BusConnection`](crate::BusConnection).
///
/// Subscription state is treated as void after any of these until the next
/// successful connect.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    /// Connecting (or reconnecting) to the broker failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The broker rejected or dropped a subscribe request.
    #[error("subscribe failed: {0}")]
    SubscribeFailed(String),

    /// The broker rejected or dropped an unsubscribe request.
    #[error("unsubscribe failed: {0}")]
    UnsubscribeFailed(String),

    /// Publishing failed.
    #[error("publish failed: {0}")]
    PublishFailed(String),

    /// The connection is closed.
    #[error("connection closed")]
    Disconnected,

    /// The event stream has already been handed out.
    #[error("event stream already taken")]
    EventsTaken,
}

impl BusError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            BusError::ConnectionFailed(_) => "bus_connection_failed",
            BusError::SubscribeFailed(_) => "bus_subscribe_failed",
            BusError::UnsubscribeFailed(_) => "bus_unsubscribe_failed",
            BusError::PublishFailed(_) => "bus_publish_failed",
            BusError::Disconnected => "bus_disconnected",
            BusError::EventsTaken => "bus_events_taken",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_are_stable() {
        assert_eq!(
            SupervisorError::invalid("x").as_label(),
            "invalid_definition"
        );
        assert_eq!(
            SupervisorError::AlreadyActive { unit: "u".into() }.as_label(),
            "unit_already_active"
        );
        assert_eq!(BusError::Disconnected.as_label(), "bus_disconnected");
    }

    #[test]
    fn test_decode_error_from_serde() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let decoded: DecodeError = err.into();
        assert_eq!(decoded.as_label(), "decode_malformed");
        assert!(decoded.to_string().starts_with("malformed payload"));
    }

    #[test]
    fn test_bus_error_converts_into_supervisor_error() {
        let err: SupervisorError = BusError::EventsTaken.into();
        assert_eq!(err, SupervisorError::Connection(BusError::EventsTaken));
        assert_eq!(err.to_string(), "bus connection: event stream already taken");
    }
}
