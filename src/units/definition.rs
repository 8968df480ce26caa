//! # Unit definitions in Asset Administration Shell layout.
//!
//! The catalogue delivers one JSON record per unit:
//! ```text
//! { "submodels": [
//!     { "idShort": "DataConnection", "submodelElements": [
//!         { "idShort": "CpsId",         "modelType": "Property", "value": "CPS-001" },
//!         { "idShort": "Name",          "modelType": "Property", "value": "RoboSoldagemAlfa" },
//!         { "idShort": "Description",   ... }, { "idShort": "MqttServer", ... },
//!         { "idShort": "MqttBaseTopic", "modelType": "Property", "value": "cps/proj/cps1" } ] },
//!     { "idShort": "Functions", "submodelElements": [
//!         { "idShort": "soldagem", "value": [
//!             { "idShort": "Name",            "modelType": "Property", "value": "Soldagem" },
//!             { "idShort": "AllowedStatuses", "modelType": "Property", "value": "espera|falha|manutencao" } ] } ] } ] }
//! ```
//!
//! ## Rules
//! - `DataConnection` and a non-empty `CpsId` (or `cpsId`) are mandatory.
//! - `Name` defaults to the id, `MqttBaseTopic` to the id, `MqttServer` to [`DEFAULT_BUS_ENDPOINT`].
//! - A base topic that is empty after normalization is rejected.
//! - Function elements without `idShort` are skipped.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

use super::{FeatureDescriptor, UnitDescriptor};
use crate::{error::SupervisorError, topics};

/// Broker used when a definition names none.
pub const DEFAULT_BUS_ENDPOINT: &str = "broker.hivemq.com";

const DATA_CONNECTION: &str = "DataConnection";
const FUNCTIONS: &str = "Functions";
const PROPERTY: &str = "Property";

#[derive(Debug, Deserialize)]
struct RawDefinition {
    #[serde(default)]
    submodels: Vec<Submodel>,
}

#[derive(Debug, Deserialize)]
struct Submodel {
    #[serde(rename = "idShort", default)]
    id_short: Option<String>,
    #[serde(rename = "submodelElements", default)]
    elements: Vec<Element>,
}

#[derive(Debug, Deserialize)]
struct Element {
    #[serde(rename = "idShort", default)]
    id_short: Option<String>,
    #[serde(rename = "modelType", default)]
    model_type: Value,
    #[serde(default)]
    value: Value,
}

impl Element {
    /// `modelType` is either a plain string or `{ "name": "Property" }`.
    fn is_property(&self) -> bool {
        match &self.model_type {
            Value::String(s) => s == PROPERTY,
            Value::Object(map) => map.get("name").and_then(Value::as_str) == Some(PROPERTY),
            _ => false,
        }
    }
}

/// Parses one raw definition into a [`UnitDescriptor`].
///
/// Fails with [`SupervisorError::InvalidDefinition`] when the record is not an AAS
/// object, lacks the `DataConnection` submodel, or lacks an id or a usable topic.
pub fn parse_definition(raw: &Value) -> Result<UnitDescriptor, SupervisorError> {
    let def = RawDefinition::deserialize(raw).map_err(|e| SupervisorError::invalid(e.to_string()))?;

    let conn = find_submodel(&def, DATA_CONNECTION)
        .ok_or_else(|| SupervisorError::invalid("submodel \"DataConnection\" missing"))?;
    let props = properties(&conn.elements);

    let id = first_of(&props, &["CpsId", "cpsId"])
        .ok_or_else(|| SupervisorError::invalid("DataConnection has no CpsId"))?;
    let name = first_of(&props, &["Name", "name"]).unwrap_or(id);
    let description = first_of(&props, &["Description", "description"]).unwrap_or_default();
    let endpoint = first_of(&props, &["MqttServer"]).unwrap_or(DEFAULT_BUS_ENDPOINT);
    let base = first_of(&props, &["MqttBaseTopic"]).unwrap_or(id);

    if topics::normalize(base).is_empty() {
        return Err(SupervisorError::invalid(format!(
            "unit '{id}' has an empty base topic"
        )));
    }

    let mut unit = UnitDescriptor::new(id, name, base)
        .with_description(description)
        .with_endpoint(endpoint);

    for element in find_submodel(&def, FUNCTIONS)
        .map(|sm| sm.elements.as_slice())
        .unwrap_or_default()
    {
        let Some(key) = element.id_short.as_deref().filter(|k| !k.trim().is_empty()) else {
            continue;
        };
        let children: Vec<Element> =
            Vec::<Element>::deserialize(&element.value).unwrap_or_default();
        let dict = properties(&children);

        let feature = FeatureDescriptor::new(key, first_of(&dict, &["Name"]).unwrap_or(key))
            .with_description(first_of(&dict, &["Description"]).unwrap_or_default())
            .with_allowed(
                first_of(&dict, &["AllowedStatuses"])
                    .unwrap_or_default()
                    .split('|'),
            );
        unit = unit.with_feature(feature);
    }

    Ok(unit)
}

fn find_submodel<'a>(def: &'a RawDefinition, id_short: &str) -> Option<&'a Submodel> {
    def.submodels
        .iter()
        .find(|sm| sm.id_short.as_deref() == Some(id_short))
}

/// Collects `Property` elements into `idShort → value` (scalars rendered as text).
fn properties(elements: &[Element]) -> HashMap<&str, String> {
    elements
        .iter()
        .filter(|e| e.is_property())
        .filter_map(|e| {
            let key = e.id_short.as_deref()?;
            let value = match &e.value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => return None,
            };
            Some((key, value))
        })
        .collect()
}

/// First non-blank value among `keys`.
fn first_of<'a>(props: &'a HashMap<&str, String>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| props.get(*k))
        .map(|v| v.trim())
        .find(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn prop(id: &str, value: Value) -> Value {
        json!({ "idShort": id, "modelType": "Property", "value": value })
    }

    fn definition() -> Value {
        json!({
            "submodels": [
                {
                    "idShort": "DataConnection",
                    "submodelElements": [
                        prop("CpsId", json!("CPS-001")),
                        prop("Name", json!("RoboSoldagemAlfa")),
                        prop("Description", json!("6-axis welding cell")),
                        prop("MqttServer", json!("broker.local")),
                        prop("MqttBaseTopic", json!("/cps/proj/cps1/")),
                    ]
                },
                {
                    "idShort": "Functions",
                    "submodelElements": [
                        {
                            "idShort": "soldagem",
                            "value": [
                                prop("Name", json!("Soldagem")),
                                prop("AllowedStatuses", json!("espera|Falha||manutencao")),
                            ]
                        },
                        { "value": [] },
                        { "idShort": "inspecao" }
                    ]
                }
            ]
        })
    }

    #[test]
    fn test_parses_identity_and_features() {
        let unit = parse_definition(&definition()).unwrap();
        assert_eq!(unit.id, "CPS-001");
        assert_eq!(unit.name, "RoboSoldagemAlfa");
        assert_eq!(unit.bus_endpoint, "broker.local");
        assert_eq!(unit.base_topic, "cps/proj/cps1");
        assert_eq!(unit.features.len(), 2);

        let weld = &unit.features[0];
        assert_eq!(weld.name, "Soldagem");
        assert_eq!(weld.state_topic, "cps/proj/cps1/feat/soldagem/$state");
        assert!(weld.allows("falha"));
        assert_eq!(weld.allowed_statuses.len(), 3);

        let inspect = &unit.features[1];
        assert_eq!(inspect.name, "inspecao");
        assert!(inspect.allowed_statuses.is_empty());
    }

    #[test]
    fn test_defaults_fall_back_to_id() {
        let raw = json!({
            "submodels": [{
                "idShort": "DataConnection",
                "submodelElements": [ { "idShort": "cpsId", "modelType": { "name": "Property" }, "value": "CPS-9" } ]
            }]
        });
        let unit = parse_definition(&raw).unwrap();
        assert_eq!(unit.name, "CPS-9");
        assert_eq!(unit.base_topic, "CPS-9");
        assert_eq!(unit.bus_endpoint, DEFAULT_BUS_ENDPOINT);
        assert!(unit.features.is_empty());
    }

    #[test]
    fn test_missing_data_connection_is_invalid() {
        let err = parse_definition(&json!({ "submodels": [] })).unwrap_err();
        assert!(matches!(err, SupervisorError::InvalidDefinition { .. }));
    }

    #[test]
    fn test_missing_id_is_invalid() {
        let raw = json!({
            "submodels": [{
                "idShort": "DataConnection",
                "submodelElements": [ prop("Name", json!("Nameless")) ]
            }]
        });
        assert!(matches!(
            parse_definition(&raw),
            Err(SupervisorError::InvalidDefinition { .. })
        ));
    }

    #[test]
    fn test_slash_only_topic_is_invalid() {
        let raw = json!({
            "submodels": [{
                "idShort": "DataConnection",
                "submodelElements": [ prop("CpsId", json!("X")), prop("MqttBaseTopic", json!("///")) ]
            }]
        });
        assert!(parse_definition(&raw).is_err());
    }

    #[test]
    fn test_non_object_is_invalid() {
        assert!(parse_definition(&json!(42)).is_err());
        assert!(parse_definition(&json!({ "submodels": "nope" })).is_err());
    }
}
