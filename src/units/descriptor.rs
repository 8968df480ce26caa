use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::topics;

/// Immutable description of a supervised unit.
///
/// Owned by the registry; the active set keeps its own copy, so unregistering a
/// unit never changes a unit that is already supervised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitDescriptor {
    pub id: String,
    /// Display name.
    pub name: String,
    pub description: String,
    /// Broker address the unit publishes to.
    pub bus_endpoint: String,
    /// Normalized base topic (no outer slashes).
    pub base_topic: String,
    /// Features in declaration order.
    pub features: Vec<FeatureDescriptor>,
}

/// One sub-capability of a unit with its own status lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureDescriptor {
    pub key: String,
    pub name: String,
    pub description: String,
    /// Topic carrying `$state` reports. Filled from the unit base when empty.
    pub state_topic: String,
    /// Lowercased wire words this feature may report.
    pub allowed_statuses: BTreeSet<String>,
}

impl UnitDescriptor {
    /// Creates a descriptor without features.
    ///
    /// The base topic is stored normalized; the endpoint defaults to
    /// [`DEFAULT_BUS_ENDPOINT`](crate::units::DEFAULT_BUS_ENDPOINT).
    pub fn new(id: impl Into<String>, name: impl Into<String>, base_topic: &str) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            bus_endpoint: super::DEFAULT_BUS_ENDPOINT.to_string(),
            base_topic: topics::normalize(base_topic).to_string(),
            features: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.bus_endpoint = endpoint.into();
        self
    }

    /// Appends a feature; an empty state topic is derived from the base topic.
    pub fn with_feature(mut self, mut feature: FeatureDescriptor) -> Self {
        if feature.state_topic.is_empty() {
            feature.state_topic = topics::state_topic(&self.base_topic, &feature.key);
        }
        self.features.push(feature);
        self
    }

    /// Returns the feature with the given key.
    pub fn feature(&self, key: &str) -> Option<&FeatureDescriptor> {
        self.features.iter().find(|f| f.key == key)
    }

    /// Case-insensitive match against id or name.
    pub fn answers_to(&self, name_or_id: &str) -> bool {
        let wanted = fold(name_or_id);
        fold(&self.id) == wanted || fold(&self.name) == wanted
    }
}

impl FeatureDescriptor {
    /// Creates a feature with an empty vocabulary (every report is rejected until
    /// [`FeatureDescriptor::with_allowed`] is called).
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            description: String::new(),
            state_topic: String::new(),
            allowed_statuses: BTreeSet::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Replaces the allowed vocabulary (stored lowercased, blanks dropped).
    pub fn with_allowed<I, S>(mut self, statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed_statuses = statuses
            .into_iter()
            .map(|s| fold(s.as_ref()))
            .filter(|s| !s.is_empty())
            .collect();
        self
    }

    /// Case-insensitive membership test against the allowed vocabulary.
    #[inline]
    pub fn allows(&self, word: &str) -> bool {
        self.allowed_statuses.contains(&fold(word))
    }
}

/// Case folding used for every name, id and status comparison.
#[inline]
pub(crate) fn fold(s: &str) -> String {
    s.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_state_topic_derived_from_base() {
        let unit = UnitDescriptor::new("U1", "Unit", "/cps/x/u1/")
            .with_feature(FeatureDescriptor::new("weld", "Welding"));
        assert_eq!(unit.base_topic, "cps/x/u1");
        assert_eq!(unit.features[0].state_topic, "cps/x/u1/feat/weld/$state");
    }

    #[test]
    fn test_allows_is_case_insensitive() {
        let f = FeatureDescriptor::new("weld", "Welding").with_allowed(["Espera", " FALHA ", ""]);
        assert!(f.allows("espera"));
        assert!(f.allows("Falha"));
        assert!(!f.allows("manutencao"));
        assert_eq!(f.allowed_statuses.len(), 2);
    }

    #[test]
    fn test_answers_to_id_or_name() {
        let unit = UnitDescriptor::new("CPS-001", "RoboSoldagemAlfa", "cps/1");
        assert!(unit.answers_to("cps-001"));
        assert!(unit.answers_to("ROBOSOLDAGEMALFA"));
        assert!(!unit.answers_to("CPS-002"));
    }
}
