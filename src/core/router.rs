//! # Message router: owner resolution and classification.
//!
//! [`route`] decides **what** an inbound message is; the engine decides what to do
//! with it.
//!
//! ```text
//! topic ──► normalize ──► owner_of (longest base prefix)
//!              │               └─ none ──────────────► Discard(NoOwner)
//!              ├─ owner not Running ─────────────────► Discard(NotRunning)
//!              ├─ <base>/feat/<key>/$state ──────────► FeatureState{key}
//!              └─ classify(base, topic)
//!                   ├─ data   ──► Data
//!                   ├─ status ──► Status
//!                   ├─ ack    ──► Ack
//!                   └─ none   ──► Discard(Unclassified)
//! ```
//!
//! There is no fallback: a message whose longest-prefix owner is stopped is dropped
//! even when a shorter base would match.

use serde::Deserialize;
use serde_json::{Number, Value};

use crate::core::active::ActiveSet;
use crate::error::DecodeError;
use crate::topics::{self, TopicClass};

/// Why a message was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    NoOwner,
    NotRunning,
    Unclassified,
}

impl DiscardReason {
    pub fn as_label(&self) -> &'static str {
        match self {
            DiscardReason::NoOwner => "no_owner",
            DiscardReason::NotRunning => "not_running",
            DiscardReason::Unclassified => "unclassified",
        }
    }
}

/// Routing decision for one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    FeatureState { unit: String, key: String },
    Data { unit: String },
    Status { unit: String },
    Ack { unit: String },
    Discard {
        unit: Option<String>,
        reason: DiscardReason,
    },
}

/// Resolves owner and class of `topic`.
pub fn route(active: &ActiveSet, topic: &str) -> Route {
    let Some(owner) = active.owner_of(topic) else {
        return Route::Discard {
            unit: None,
            reason: DiscardReason::NoOwner,
        };
    };
    let unit = owner.id().to_string();
    if !owner.is_running() {
        return Route::Discard {
            unit: Some(unit),
            reason: DiscardReason::NotRunning,
        };
    }

    let base = &owner.descriptor.base_topic;
    if let Some(key) = topics::match_feature_state(base, topic) {
        return Route::FeatureState {
            unit,
            key: key.to_string(),
        };
    }

    match topics::classify(base, topic) {
        Some(TopicClass::Data) => Route::Data { unit },
        Some(TopicClass::Status) => Route::Status { unit },
        Some(TopicClass::Ack) => Route::Ack { unit },
        None => Route::Discard {
            unit: Some(unit),
            reason: DiscardReason::Unclassified,
        },
    }
}

/// Payload of a `$state` topic.
///
/// ```json
/// { "status": "falha", "ts": 1700000000000, "details": { "code": 7 } }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FeatureReport {
    /// Wire status word (case-insensitive).
    pub status: String,
    /// Report time in epoch milliseconds.
    #[serde(default)]
    ts: Option<Number>,
    #[serde(default)]
    pub details: Option<Value>,
}

impl FeatureReport {
    /// Decodes a `$state` payload; `status` must be a string.
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        Ok(serde_json::from_slice(payload)?)
    }

    /// `ts` as whole milliseconds; fractional values are truncated.
    pub fn ts_millis(&self) -> Option<i64> {
        let ts = self.ts.as_ref()?;
        ts.as_i64().or_else(|| ts.as_f64().map(|f| f as i64))
    }
}

/// Decodes any JSON payload.
pub fn decode_json(payload: &[u8]) -> Result<Value, DecodeError> {
    Ok(serde_json::from_slice(payload)?)
}

/// True for `{"type": "alert", ...}` on a data topic.
pub fn is_alert_marker(payload: &Value) -> bool {
    payload.get("type").and_then(Value::as_str) == Some("alert")
}
