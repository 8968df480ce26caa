use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::units::UnitDescriptor;

/// Operator-facing urgency of an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// Parses `low|medium|high` case-insensitively.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            _ => None,
        }
    }

    pub fn as_label(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// A raised alert. Immutable once created.
///
/// Ids are derived from the unit id, the feature key (when any) and a millisecond
/// timestamp, so two transitions of one feature within the same millisecond share
/// an id. `acknowledge` removes both in that case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub unit_id: String,
    pub unit_name: String,
    /// Feature display name, or a generic label for unit-level alerts.
    pub component: String,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
    /// Correlation id supplied by the producer, if any.
    pub correlation_id: Option<String>,
    /// Decoded payload (or the feature-state summary) that caused the alert.
    pub raw: Value,
}

/// Component used for `data` alerts that name none.
pub(crate) const DATA_COMPONENT: &str = "Data";
/// Component used for `status` alerts that name none.
pub(crate) const STATUS_COMPONENT: &str = "Status";

impl Alert {
    /// Alert for a feature that landed in `Failure` or `Maintenance`.
    ///
    /// `ts_ms` is the effective report time in epoch milliseconds.
    pub fn feature_state(
        unit: &UnitDescriptor,
        feature_key: &str,
        feature_name: &str,
        severity: Severity,
        status_word: &str,
        ts_ms: i64,
        details: Option<&Value>,
    ) -> Self {
        Self {
            id: format!("{}-{}-{}", unit.id, feature_key, ts_ms),
            unit_id: unit.id.clone(),
            unit_name: unit.name.clone(),
            component: feature_name.to_string(),
            severity,
            timestamp: from_millis(ts_ms).unwrap_or_else(Utc::now),
            correlation_id: None,
            raw: json!({
                "type": "feature_state",
                "status": status_word,
                "featureKey": feature_key,
                "details": details.cloned().unwrap_or(Value::Null),
            }),
        }
    }

    /// Alert for an explicit `{"type": "alert"}` marker on the `data` topic.
    ///
    /// Severity defaults to `low`.
    pub fn from_data(unit: &UnitDescriptor, payload: Value, arrived: DateTime<Utc>) -> Self {
        let correlation_id = str_field(&payload, "correlation_id");
        let id = correlation_id
            .clone()
            .unwrap_or_else(|| format!("{}-{}", unit.id, arrived.timestamp_millis()));

        Self {
            id,
            unit_id: unit.id.clone(),
            unit_name: unit.name.clone(),
            component: str_field(&payload, "component").unwrap_or_else(|| DATA_COMPONENT.into()),
            severity: severity_field(&payload).unwrap_or(Severity::Low),
            timestamp: timestamp_field(&payload).unwrap_or(arrived),
            correlation_id,
            raw: payload,
        }
    }

    /// Alert for a report on the `status` topic.
    ///
    /// Severity comes from the payload; otherwise `low` when `below_threshold` is
    /// `true`, else `medium`.
    pub fn from_status(unit: &UnitDescriptor, payload: Value, arrived: DateTime<Utc>) -> Self {
        let correlation_id = str_field(&payload, "correlation_id");
        let variable = str_field(&payload, "variable").unwrap_or_else(|| "variable".into());
        let id = correlation_id.clone().unwrap_or_else(|| {
            format!("{}-{}-{}", unit.id, variable, arrived.timestamp_millis())
        });
        let below = payload.get("below_threshold").and_then(Value::as_bool) == Some(true);
        let fallback = if below { Severity::Low } else { Severity::Medium };

        Self {
            id,
            unit_id: unit.id.clone(),
            unit_name: unit.name.clone(),
            component: str_field(&payload, "component")
                .unwrap_or_else(|| STATUS_COMPONENT.into()),
            severity: severity_field(&payload).unwrap_or(fallback),
            timestamp: timestamp_field(&payload).unwrap_or(arrived),
            correlation_id,
            raw: payload,
        }
    }
}

/// Epoch milliseconds to UTC, `None` when out of range.
pub(crate) fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

fn str_field(payload: &Value, key: &str) -> Option<String> {
    match payload.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn severity_field(payload: &Value) -> Option<Severity> {
    payload
        .get("severity")
        .and_then(Value::as_str)
        .and_then(Severity::from_label)
}

fn timestamp_field(payload: &Value) -> Option<DateTime<Utc>> {
    match payload.get("timestamp")? {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        Value::Number(n) => n.as_i64().and_then(from_millis),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit() -> UnitDescriptor {
        UnitDescriptor::new("U1", "Press", "plant/u1")
    }

    fn arrived() -> DateTime<Utc> {
        from_millis(5_000).unwrap()
    }

    #[test]
    fn test_feature_state_alert_shape() {
        let details = json!({ "code": 7 });
        let alert = Alert::feature_state(
            &unit(),
            "weld",
            "Welding",
            Severity::High,
            "falha",
            1000,
            Some(&details),
        );
        assert_eq!(alert.id, "U1-weld-1000");
        assert_eq!(alert.component, "Welding");
        assert_eq!(alert.timestamp.timestamp_millis(), 1000);
        assert_eq!(alert.raw["type"], "feature_state");
        assert_eq!(alert.raw["featureKey"], "weld");
        assert_eq!(alert.raw["details"]["code"], 7);
    }

    #[test]
    fn test_data_alert_defaults() {
        let alert = Alert::from_data(&unit(), json!({ "type": "alert" }), arrived());
        assert_eq!(alert.severity, Severity::Low);
        assert_eq!(alert.id, "U1-5000");
        assert_eq!(alert.component, DATA_COMPONENT);
        assert_eq!(alert.timestamp, arrived());
    }

    #[test]
    fn test_data_alert_uses_payload_fields() {
        let payload = json!({
            "type": "alert",
            "severity": "HIGH",
            "component": "Spindle",
            "correlation_id": "c-42",
            "timestamp": "2024-05-01T10:00:00Z",
            "risk_score": 0.9
        });
        let alert = Alert::from_data(&unit(), payload, arrived());
        assert_eq!(alert.severity, Severity::High);
        assert_eq!(alert.id, "c-42");
        assert_eq!(alert.correlation_id.as_deref(), Some("c-42"));
        assert_eq!(alert.component, "Spindle");
        assert_eq!(alert.timestamp.to_rfc3339(), "2024-05-01T10:00:00+00:00");
        assert_eq!(alert.raw["risk_score"], 0.9);
    }

    #[test]
    fn test_status_alert_severity_fallbacks() {
        let below = Alert::from_status(&unit(), json!({ "below_threshold": true }), arrived());
        assert_eq!(below.severity, Severity::Low);
        assert_eq!(below.component, STATUS_COMPONENT);
        assert_eq!(below.id, "U1-variable-5000");

        let above = Alert::from_status(
            &unit(),
            json!({ "variable": "temp", "below_threshold": false }),
            arrived(),
        );
        assert_eq!(above.severity, Severity::Medium);
        assert_eq!(above.id, "U1-temp-5000");

        let explicit = Alert::from_status(
            &unit(),
            json!({ "severity": "high", "below_threshold": true }),
            arrived(),
        );
        assert_eq!(explicit.severity, Severity::High);
    }

    #[test]
    fn test_unknown_severity_label_falls_back() {
        let alert = Alert::from_data(
            &unit(),
            json!({ "type": "alert", "severity": "catastrophic" }),
            arrived(),
        );
        assert_eq!(alert.severity, Severity::Low);
    }
}
