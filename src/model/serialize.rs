//! Flat `{name, prefix, value, type}` serialization of one shape's properties

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::property::PropertyValue;
use super::{NodeId, ShapeTree};
use crate::defaults;
use crate::errors::ModelError;
use crate::log::{debug, warn};

/// Record type of every serialized property
pub const LITERAL: &str = "literal";

/// Names that describe structure rather than a property; never stored as hidden properties
const STRUCTURAL_NAMES: [&str; 8] = ["type", "bounds", "parent", "target", "dockers", "docker", "outgoing", "incoming"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedProperty {
    pub name: String,
    pub prefix: String,
    pub value: PropertyValue,
    #[serde(rename = "type")]
    pub kind: String,
}

impl SerializedProperty {
    pub fn literal(prefix: impl Into<String>, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        Self {
            name: name.into(),
            prefix: prefix.into(),
            value: value.into(),
            kind: LITERAL.to_string(),
        }
    }

    pub fn key(&self) -> String {
        format!("{}-{}", self.prefix, self.name)
    }
}

fn split_key(key: &str) -> (&str, &str) {
    key.split_once('-').unwrap_or((defaults::PROPERTY_PREFIX, key))
}

/// A list-typed value read from a string: JSON arrays are parsed, anything
/// else becomes a one-element list.
fn coerce_list(raw: &str) -> PropertyValue {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return PropertyValue::Json(Value::Array(Vec::new()));
    }
    if !trimmed.starts_with('[') {
        return PropertyValue::Json(Value::Array(vec![Value::String(trimmed.to_string())]));
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(list @ Value::Array(_)) => PropertyValue::Json(list),
        Ok(other) => PropertyValue::Json(Value::Array(vec![other])),
        Err(err) => {
            warn!(%err, value = trimmed, "list property is not valid JSON, keeping it as a single item");
            PropertyValue::Json(Value::Array(vec![Value::String(trimmed.to_string())]))
        }
    }
}

impl ShapeTree {
    /// The type marker, then hidden properties, then every schema property in
    /// declaration order (empty ones included).
    pub fn serialize(&self, id: NodeId) -> Result<Vec<SerializedProperty>, ModelError> {
        let node = self.get(id)?;
        let mut out = vec![SerializedProperty::literal(
            defaults::PROPERTY_PREFIX,
            "type",
            node.stencil.id(),
        )];

        for (key, value) in &node.hidden_properties {
            let (prefix, name) = split_key(key);
            out.push(SerializedProperty::literal(prefix, name, value.clone()));
        }

        for schema in &node.schema.properties {
            let value = node.properties.get(&schema.key()).cloned().unwrap_or_default();
            out.push(SerializedProperty::literal(schema.prefix.clone(), schema.id.clone(), value));
        }
        Ok(out)
    }

    /// Apply serialized records to a shape.
    ///
    /// Records whose key isn't a property of the shape go first, so hidden
    /// properties are in place before schema properties are written; schema
    /// properties follow in property-map order. A `parent` record moves the
    /// shape under the shape with that resource id.
    pub fn deserialize(&mut self, id: NodeId, records: &[SerializedProperty]) -> Result<(), ModelError> {
        let node = self.get(id)?;
        let mut sorted: Vec<&SerializedProperty> = records.iter().collect();
        let rank = |record: &SerializedProperty| node.properties.get_index_of(&record.key()).map_or(0, |i| i + 1);
        sorted.sort_by_key(|record| rank(*record));
        let stencil = node.schema.clone();

        for record in sorted {
            let key = record.key();
            let value = match &record.value {
                PropertyValue::Json(object @ Value::Object(_)) => PropertyValue::String(object.to_string()),
                other => other.clone(),
            };

            if record.name == "parent" {
                self.reparent_by_resource_id(id, &value)?;
                continue;
            }

            match stencil.property(&key) {
                Some(schema) => {
                    let value = match value {
                        PropertyValue::String(raw) if schema.is_list() => coerce_list(&raw),
                        other => schema.normalize(other),
                    };
                    self.set_property(id, &schema.key(), value)?;
                }
                None if self.get(id)?.properties.contains_key(&key) => {
                    self.set_property(id, &key, value)?;
                }
                None if STRUCTURAL_NAMES.contains(&record.name.as_str()) => {}
                None => {
                    self.set_hidden_property(id, &key, Some(value))?;
                }
            }
        }
        Ok(())
    }

    fn reparent_by_resource_id(&mut self, id: NodeId, value: &PropertyValue) -> Result<(), ModelError> {
        let Some(resource_id) = value.as_str() else {
            return Ok(());
        };
        match self.find_by_resource_id(resource_id) {
            Some(parent) if self.parent(id) != Some(parent) => self.add(parent, id),
            Some(_) => Ok(()),
            None => {
                debug!(resource_id, "parent not found, shape stays where it is");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_coercion() {
        assert_eq!(coerce_list(""), PropertyValue::Json(serde_json::json!([])));
        assert_eq!(coerce_list(" a "), PropertyValue::Json(serde_json::json!(["a"])));
        assert_eq!(coerce_list(r#"["a","b"]"#), PropertyValue::Json(serde_json::json!(["a", "b"])));
        assert_eq!(coerce_list("[broken"), PropertyValue::Json(serde_json::json!(["[broken"])));
    }

    #[test]
    fn keys_split_at_first_dash() {
        assert_eq!(split_key("raziel-parent-id"), ("raziel", "parent-id"));
        assert_eq!(split_key("plain"), ("oryx", "plain"));
    }

    #[test]
    fn record_wire_format() {
        let record = SerializedProperty::literal("oryx", "name", "Task");
        insta::assert_snapshot!(serde_json::to_string(&record).unwrap(), @r#"{"name":"name","prefix":"oryx","value":"Task","type":"literal"}"#);
    }
}
