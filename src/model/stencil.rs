//! Stencil sets: the schemas shapes are instantiated from
//!
//! A stencil set is read from a JSON document:
//!
//! ```json
//! {
//!   "namespace": "http://b3mn.org/stencilset/bpmn2.0#",
//!   "stencils": [
//!     { "type": "node", "id": "Task", "superId": "Activity",
//!       "properties": [{ "id": "name", "type": "String", "value": "" }] }
//!   ]
//! }
//! ```

use std::rc::Rc;

use serde::Deserialize;

use super::property::PropertyValue;
use crate::defaults;
use crate::errors::ModelError;

/// Declared type of a stencil property, compared case-insensitively
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "String")]
pub enum PropertyType {
    String,
    Boolean,
    Integer,
    Float,
    Color,
    Date,
    Choice,
    Url,
    DiagramLink,
    Text,
    RichText,
    Complex,
    MultipleComplex,
    Other,
}

impl PropertyType {
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "string" => PropertyType::String,
            "boolean" => PropertyType::Boolean,
            "integer" => PropertyType::Integer,
            "float" => PropertyType::Float,
            "color" => PropertyType::Color,
            "date" => PropertyType::Date,
            "choice" => PropertyType::Choice,
            "url" => PropertyType::Url,
            "diagramlink" => PropertyType::DiagramLink,
            "text" => PropertyType::Text,
            "richtext" => PropertyType::RichText,
            "complex" => PropertyType::Complex,
            "multiplecomplex" => PropertyType::MultipleComplex,
            _ => PropertyType::Other,
        }
    }

    /// Complex values travel as JSON strings
    pub fn is_complex(self) -> bool {
        matches!(self, PropertyType::Complex | PropertyType::MultipleComplex)
    }
}

impl From<String> for PropertyType {
    fn from(name: String) -> Self {
        PropertyType::from_name(&name)
    }
}

fn default_prefix() -> String {
    defaults::PROPERTY_PREFIX.to_string()
}

/// One property a stencil declares
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertySchema {
    pub id: String,
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(rename = "type")]
    pub kind: PropertyType,
    #[serde(default)]
    pub value: PropertyValue,
    #[serde(default)]
    pub is_list: bool,
    /// `strftime` format used when exporting dates
    #[serde(default)]
    pub date_format: Option<String>,
}

impl PropertySchema {
    /// Property map key: `prefix-id`
    pub fn key(&self) -> String {
        format!("{}-{}", self.prefix, self.id)
    }

    pub fn is_list(&self) -> bool {
        self.is_list || self.kind == PropertyType::MultipleComplex
    }

    /// The declared default, normalized for this property's type
    pub fn default_value(&self) -> PropertyValue {
        self.normalize(self.value.clone())
    }

    /// Bring a value into the form this property stores. Arrays stay arrays on
    /// list properties; see [`PropertyValue::coerce`] for the rest.
    pub fn normalize(&self, value: PropertyValue) -> PropertyValue {
        match value {
            list @ PropertyValue::Json(serde_json::Value::Array(_)) if self.is_list() => list,
            other => other.coerce(self.kind),
        }
    }
}

/// Role of the shapes a stencil describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StencilKind {
    Node,
    Edge,
    Diagram,
}

/// A shape type
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stencil {
    #[serde(rename = "type")]
    pub kind: StencilKind,
    #[serde(rename = "id")]
    short_id: String,
    #[serde(skip)]
    namespace: String,
    #[serde(default)]
    pub super_id: Option<String>,
    #[serde(default)]
    pub properties: Vec<PropertySchema>,
}

impl Stencil {
    /// Full id, namespace included
    pub fn id(&self) -> String {
        format!("{}{}", self.namespace, self.short_id)
    }

    pub fn id_without_ns(&self) -> &str {
        &self.short_id
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Schema of the property stored under `key` (`prefix-id`, case-insensitive)
    pub fn property(&self, key: &str) -> Option<&PropertySchema> {
        self.properties.iter().find(|p| p.key().eq_ignore_ascii_case(key))
    }

    /// Schema whose id (without prefix) is `id`
    pub fn property_by_id(&self, id: &str) -> Option<&PropertySchema> {
        self.properties.iter().find(|p| p.id.eq_ignore_ascii_case(id))
    }
}

#[derive(Deserialize)]
struct StencilSetDocument {
    namespace: String,
    stencils: Vec<Stencil>,
}

/// All stencils of one namespace
#[derive(Debug, Clone, PartialEq)]
pub struct StencilSet {
    namespace: String,
    stencils: Vec<Rc<Stencil>>,
}

impl StencilSet {
    pub fn from_json(source: &str) -> Result<Self, ModelError> {
        let document: StencilSetDocument = serde_json::from_str(source)?;
        let namespace = document.namespace;
        let stencils = document
            .stencils
            .into_iter()
            .map(|mut stencil| {
                stencil.namespace = namespace.clone();
                Rc::new(stencil)
            })
            .collect();
        Ok(Self { namespace, stencils })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn stencils(&self) -> impl Iterator<Item = &Rc<Stencil>> {
        self.stencils.iter()
    }

    /// Look up by full id (`namespace#Id`) or by id alone, case-insensitively.
    pub fn stencil(&self, id: &str) -> Result<Rc<Stencil>, ModelError> {
        self.stencils
            .iter()
            .find(|s| s.id().eq_ignore_ascii_case(id) || s.id_without_ns().eq_ignore_ascii_case(id))
            .cloned()
            .ok_or_else(|| ModelError::UnknownStencil { id: id.to_string() })
    }

    /// The stencil `stencil` inherits from, if it names one
    pub fn super_stencil(&self, stencil: &Stencil) -> Result<Option<Rc<Stencil>>, ModelError> {
        match &stencil.super_id {
            Some(super_id) => self.stencil(&format!("{}{super_id}", stencil.namespace)).map(Some),
            None => Ok(None),
        }
    }
}
