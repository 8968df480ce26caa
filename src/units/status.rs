//! Supervisor-local state machines.
//!
//! ```text
//! run-state:   Stopped ⇄ Running            (caller-initiated only)
//!
//! feature:     Unknown ──► { Waiting, Active, Failure, Maintenance }
//!                          (free transitions inside the set, gated by the allow-list)
//! ```
//! `Unknown` is the initial feature status and is never re-entered.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::alerts::Severity;

/// Whether inbound messages for a unit are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Stopped,
    Running,
}

impl RunState {
    pub fn as_label(&self) -> &'static str {
        match self {
            RunState::Stopped => "stopped",
            RunState::Running => "running",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Status of a single feature.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureStatus {
    /// No accepted report yet.
    #[default]
    Unknown,
    Waiting,
    Active,
    Failure,
    Maintenance,
}

impl FeatureStatus {
    /// Maps a lowercased wire word to a status.
    ///
    /// Units report in Portuguese (`espera`, `falha`, `manutencao`, `ativo`) or English;
    /// both vocabularies are understood. `Unknown` is never produced.
    pub fn from_wire(word: &str) -> Option<Self> {
        match word {
            "espera" | "waiting" => Some(FeatureStatus::Waiting),
            "ativo" | "ok" | "rodando" | "active" | "running" => Some(FeatureStatus::Active),
            "falha" | "failure" | "fault" => Some(FeatureStatus::Failure),
            "manutencao" | "manutenção" | "maintenance" => Some(FeatureStatus::Maintenance),
            _ => None,
        }
    }

    pub fn as_label(&self) -> &'static str {
        match self {
            FeatureStatus::Unknown => "unknown",
            FeatureStatus::Waiting => "waiting",
            FeatureStatus::Active => "active",
            FeatureStatus::Failure => "failure",
            FeatureStatus::Maintenance => "maintenance",
        }
    }

    /// Severity of the alert raised when a feature lands in this status, if any.
    pub fn alert_severity(&self) -> Option<Severity> {
        match self {
            FeatureStatus::Failure => Some(Severity::High),
            FeatureStatus::Maintenance => Some(Severity::Medium),
            _ => None,
        }
    }
}

impl fmt::Display for FeatureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Mutable per-feature state held by a supervised unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureState {
    /// Feature key (matches [`FeatureDescriptor::key`](crate::units::FeatureDescriptor::key)).
    pub key: String,
    pub status: FeatureStatus,
    /// Timestamp of the last decoded state report.
    pub last_update: Option<DateTime<Utc>>,
    /// `details` of the last decoded state report.
    pub last_details: Option<Value>,
}

impl FeatureState {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            status: FeatureStatus::Unknown,
            last_update: None,
            last_details: None,
        }
    }
}
