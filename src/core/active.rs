//! # Active set: units currently under supervision.
//!
//! Each [`SupervisedUnit`] owns a copy of its descriptor, a run-state, one
//! [`FeatureState`] per declared feature and the last generic telemetry seen on its
//! `data` topic.
//!
//! ```text
//! add ──► SupervisedUnit{run_state, features[Unknown..], telemetry: None}
//!            │ set_run_state(Stopped) ──► telemetry dropped, features kept
//!            │ apply_report(key, word)  ──► Accepted | Rejected | UnknownFeature
//!            └ remove / unplug ──► gone (with its telemetry)
//! ```
//!
//! ## Rules
//! - At most one supervised unit per descriptor id.
//! - A report is accepted only when the word is in the feature's allow-list **and**
//!   maps to a known status; `last_update`/`last_details` move on every decoded report.
//! - Ownership of a topic goes to the unit with the longest segment-aligned base prefix.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::error::SupervisorError;
use crate::topics;
use crate::units::{FeatureState, FeatureStatus, RunState, UnitDescriptor};

/// Last generic payload seen on a unit's `data` topic.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Telemetry {
    /// Decoded JSON.
    Structured(Value),
    /// Payload that was not JSON, kept verbatim (lossy UTF-8).
    Raw(String),
}

/// Result of applying one decoded feature-state report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureOutcome {
    /// The unit declares no feature with that key.
    UnknownFeature,
    /// The report changed (or confirmed) the feature status.
    Accepted {
        previous: FeatureStatus,
        current: FeatureStatus,
    },
    /// The word was outside the vocabulary; the status was kept.
    Rejected { retained: FeatureStatus },
}

/// A unit under supervision.
#[derive(Debug, Clone, Serialize)]
pub struct SupervisedUnit {
    pub descriptor: UnitDescriptor,
    pub run_state: RunState,
    /// One entry per declared feature, in declaration order.
    pub features: Vec<FeatureState>,
    pub telemetry: Option<Telemetry>,
}

impl SupervisedUnit {
    /// Starts supervising `descriptor` with every feature `Unknown`.
    pub fn new(descriptor: UnitDescriptor, run_state: RunState) -> Self {
        let features = descriptor
            .features
            .iter()
            .map(|f| FeatureState::new(f.key.clone()))
            .collect();
        Self {
            descriptor,
            run_state,
            features,
            telemetry: None,
        }
    }

    #[inline]
    pub fn id(&self) -> &str {
        &self.descriptor.id
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.run_state == RunState::Running
    }

    /// State of feature `key`.
    pub fn feature(&self, key: &str) -> Option<&FeatureState> {
        self.features.iter().find(|f| f.key == key)
    }

    /// Applies a decoded state report for feature `key`.
    ///
    /// `at` and `details` are recorded even when the word is rejected.
    pub fn apply_report(
        &mut self,
        key: &str,
        word: &str,
        at: DateTime<Utc>,
        details: Option<Value>,
    ) -> FeatureOutcome {
        let Some(desc) = self.descriptor.feature(key) else {
            return FeatureOutcome::UnknownFeature;
        };
        let mapped = desc
            .allows(word)
            .then(|| FeatureStatus::from_wire(&word.trim().to_lowercase()))
            .flatten();

        let Some(state) = self.features.iter_mut().find(|f| f.key == key) else {
            return FeatureOutcome::UnknownFeature;
        };
        state.last_update = Some(at);
        state.last_details = details;

        match mapped {
            Some(current) => {
                let previous = std::mem::replace(&mut state.status, current);
                FeatureOutcome::Accepted { previous, current }
            }
            None => FeatureOutcome::Rejected {
                retained: state.status,
            },
        }
    }
}

/// Ordered collection of supervised units (insertion order).
#[derive(Debug, Default)]
pub struct ActiveSet {
    units: Vec<SupervisedUnit>,
}

impl ActiveSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a unit; fails with [`SupervisorError::AlreadyActive`] when its id is present.
    pub fn insert(
        &mut self,
        descriptor: UnitDescriptor,
        run_state: RunState,
    ) -> Result<&SupervisedUnit, SupervisorError> {
        if self.units.iter().any(|u| u.id() == descriptor.id) {
            return Err(SupervisorError::AlreadyActive {
                unit: descriptor.id,
            });
        }
        self.units.push(SupervisedUnit::new(descriptor, run_state));
        let last = self.units.len() - 1;
        Ok(&self.units[last])
    }

    /// Removes the unit answering to `name_or_id`.
    pub fn remove(&mut self, name_or_id: &str) -> Option<SupervisedUnit> {
        let idx = self
            .units
            .iter()
            .position(|u| u.descriptor.answers_to(name_or_id))?;
        Some(self.units.remove(idx))
    }

    /// Unit answering to `name_or_id` (case-insensitive).
    pub fn find(&self, name_or_id: &str) -> Option<&SupervisedUnit> {
        self.units
            .iter()
            .find(|u| u.descriptor.answers_to(name_or_id))
    }

    /// Unit with exactly this id.
    pub fn get(&self, id: &str) -> Option<&SupervisedUnit> {
        self.units.iter().find(|u| u.id() == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut SupervisedUnit> {
        self.units.iter_mut().find(|u| u.id() == id)
    }

    /// Changes the run-state of unit `id`.
    ///
    /// Stopping discards cached telemetry; feature states are kept. Returns whether
    /// the state actually changed.
    pub fn set_run_state(&mut self, id: &str, target: RunState) -> Result<bool, SupervisorError> {
        let unit = self
            .get_mut(id)
            .ok_or_else(|| SupervisorError::not_found(id))?;
        if target == RunState::Stopped {
            unit.telemetry = None;
        }
        let changed = unit.run_state != target;
        unit.run_state = target;
        Ok(changed)
    }

    /// The unit owning `topic`: its base equals or is a segment-aligned prefix of the
    /// normalized topic. The longest base wins; on equal bases the earliest added unit.
    pub fn owner_of(&self, topic: &str) -> Option<&SupervisedUnit> {
        self.owner_index(topic).map(|i| &self.units[i])
    }

    fn owner_index(&self, topic: &str) -> Option<usize> {
        self.units
            .iter()
            .enumerate()
            .filter(|(_, u)| topics::relative_path(&u.descriptor.base_topic, topic).is_some())
            .map(|(i, u)| (i, topics::normalize(&u.descriptor.base_topic).len()))
            .fold(None, |best: Option<(usize, usize)>, (i, len)| match best {
                Some((_, best_len)) if best_len >= len => best,
                _ => Some((i, len)),
            })
            .map(|(i, _)| i)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SupervisedUnit> {
        self.units.iter()
    }

    /// Units whose messages are accepted.
    pub fn running(&self) -> impl Iterator<Item = &SupervisedUnit> {
        self.units.iter().filter(|u| u.is_running())
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::FeatureDescriptor;
    use serde_json::json;

    fn welder() -> UnitDescriptor {
        UnitDescriptor::new("CPS-001", "Welder", "/cps/x/u1").with_feature(
            FeatureDescriptor::new("soldagem", "Welding").with_allowed(["ativo", "falha", "espera"]),
        )
    }

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn test_insert_rejects_duplicate_id() {
        let mut set = ActiveSet::new();
        set.insert(welder(), RunState::Running).unwrap();
        let err = set.insert(welder(), RunState::Stopped).unwrap_err();
        assert_eq!(err, SupervisorError::AlreadyActive { unit: "CPS-001".into() });
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_new_unit_has_unknown_features() {
        let mut set = ActiveSet::new();
        let unit = set.insert(welder(), RunState::Stopped).unwrap();
        assert_eq!(unit.features.len(), 1);
        assert_eq!(unit.features[0].status, FeatureStatus::Unknown);
        assert!(unit.telemetry.is_none());
    }

    #[test]
    fn test_accepted_report_changes_status() {
        let mut unit = SupervisedUnit::new(welder(), RunState::Running);
        let out = unit.apply_report("soldagem", "FALHA", now(), Some(json!({"code": 7})));
        assert_eq!(
            out,
            FeatureOutcome::Accepted {
                previous: FeatureStatus::Unknown,
                current: FeatureStatus::Failure
            }
        );
        let state = unit.feature("soldagem").unwrap();
        assert_eq!(state.last_details, Some(json!({"code": 7})));
    }

    #[test]
    fn test_rejected_report_keeps_status_but_records_time() {
        let mut unit = SupervisedUnit::new(welder(), RunState::Running);
        unit.apply_report("soldagem", "ativo", now(), None);
        let at = now();
        let out = unit.apply_report("soldagem", "bogus", at, None);

        assert_eq!(out, FeatureOutcome::Rejected { retained: FeatureStatus::Active });
        let state = unit.feature("soldagem").unwrap();
        assert_eq!(state.status, FeatureStatus::Active);
        assert_eq!(state.last_update, Some(at));
    }

    #[test]
    fn test_word_allowed_but_unmapped_is_rejected() {
        let desc = UnitDescriptor::new("u", "u", "u")
            .with_feature(FeatureDescriptor::new("f", "F").with_allowed(["parado"]));
        let mut unit = SupervisedUnit::new(desc, RunState::Running);
        let out = unit.apply_report("f", "parado", now(), None);
        assert_eq!(out, FeatureOutcome::Rejected { retained: FeatureStatus::Unknown });
    }

    #[test]
    fn test_unknown_feature() {
        let mut unit = SupervisedUnit::new(welder(), RunState::Running);
        assert_eq!(
            unit.apply_report("pintura", "ativo", now(), None),
            FeatureOutcome::UnknownFeature
        );
    }

    #[test]
    fn test_stopping_drops_telemetry_only() {
        let mut set = ActiveSet::new();
        set.insert(welder(), RunState::Running).unwrap();
        {
            let unit = set.get_mut("CPS-001").unwrap();
            unit.telemetry = Some(Telemetry::Raw("x".into()));
            unit.apply_report("soldagem", "falha", now(), None);
        }

        assert!(set.set_run_state("CPS-001", RunState::Stopped).unwrap());
        let unit = set.get("CPS-001").unwrap();
        assert!(unit.telemetry.is_none());
        assert_eq!(unit.features[0].status, FeatureStatus::Failure);

        assert!(!set.set_run_state("CPS-001", RunState::Stopped).unwrap());
        assert!(set.set_run_state("nope", RunState::Running).is_err());
    }

    #[test]
    fn test_owner_is_longest_segment_aligned_prefix() {
        let mut set = ActiveSet::new();
        set.insert(UnitDescriptor::new("a", "a", "cps/x"), RunState::Running)
            .unwrap();
        set.insert(UnitDescriptor::new("b", "b", "cps/x/u1"), RunState::Running)
            .unwrap();

        assert_eq!(set.owner_of("/cps/x/u1/data").map(|u| u.id()), Some("b"));
        assert_eq!(set.owner_of("cps/x/u10/data").map(|u| u.id()), Some("a"));
        assert_eq!(set.owner_of("cps/x").map(|u| u.id()), Some("a"));
        assert!(set.owner_of("cps/y/data").is_none());
    }

    #[test]
    fn test_equal_bases_resolve_to_first_added() {
        let mut set = ActiveSet::new();
        set.insert(UnitDescriptor::new("a", "a", "cps/x"), RunState::Running)
            .unwrap();
        set.insert(UnitDescriptor::new("b", "b", "/cps/x/"), RunState::Stopped)
            .unwrap();

        assert_eq!(set.owner_of("cps/x/feat/weld/$state").map(|u| u.id()), Some("a"));

        set.remove("a");
        assert_eq!(set.owner_of("cps/x/data").map(|u| u.id()), Some("b"));
    }

    #[test]
    fn test_remove_by_name() {
        let mut set = ActiveSet::new();
        set.insert(welder(), RunState::Running).unwrap();
        assert!(set.remove("welder").is_some());
        assert!(set.is_empty());
        assert!(set.remove("welder").is_none());
    }
}
