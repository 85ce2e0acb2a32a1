//! JSON tree form of a diagram: `{resourceId, properties, stencil, childShapes, ...}`

use std::fmt::Write as _;

use chrono::NaiveDateTime;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::property::PropertyValue;
use super::stencil::{PropertySchema, PropertyType};
use super::{Docker, NodeId, ShapeRole, ShapeTree};
use crate::errors::ModelError;
use crate::log::{debug, warn};
use crate::types::{Bounds, Point};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StencilRef {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRef {
    pub resource_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundsJson {
    pub lower_right: Point,
    pub upper_left: Point,
}

impl From<Bounds> for BoundsJson {
    fn from(bounds: Bounds) -> Self {
        Self {
            lower_right: bounds.lower_right(),
            upper_left: bounds.upper_left(),
        }
    }
}

impl From<BoundsJson> for Bounds {
    fn from(json: BoundsJson) -> Self {
        Bounds::from_corners(json.upper_left, json.lower_right)
    }
}

/// One shape and its subtree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeJson {
    pub resource_id: String,
    /// Keys without their prefix
    pub properties: IndexMap<String, Value>,
    pub stencil: StencilRef,
    #[serde(default)]
    pub child_shapes: Vec<ShapeJson>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outgoing: Option<Vec<ResourceRef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<BoundsJson>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dockers: Option<Vec<Point>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<ResourceRef>,
}

fn strip_prefix(key: &str) -> &str {
    key.split_once('-').map_or(key, |(_, name)| name)
}

fn format_date(date: &NaiveDateTime, format: &str) -> Option<String> {
    let mut out = String::new();
    write!(out, "{}", date.format(format)).ok()?;
    Some(out)
}

/// Exported form of one property value
fn export_value(schema: Option<&PropertySchema>, value: &PropertyValue) -> Value {
    match (schema, value) {
        (Some(schema), PropertyValue::String(raw)) if schema.kind.is_complex() => {
            serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone()))
        }
        (Some(schema), PropertyValue::Date(date)) if schema.kind == PropertyType::Date => {
            let formatted = schema.date_format.as_deref().and_then(|format| {
                let formatted = format_date(date, format);
                if formatted.is_none() {
                    warn!(format, "date format can't be rendered, exporting the plain date");
                }
                formatted
            });
            formatted.map_or_else(|| Value::from(value.clone()), Value::String)
        }
        _ => Value::from(value.clone()),
    }
}

impl ShapeTree {
    /// JSON tree of a shape and its visible descendants.
    pub fn to_json(&self, id: NodeId) -> Result<ShapeJson, ModelError> {
        let node = self.get(id)?;

        let mut properties = IndexMap::new();
        for (key, value) in node.properties.iter().chain(&node.hidden_properties) {
            let schema = node.schema.property(key);
            properties.insert(strip_prefix(key).to_string(), export_value(schema, value));
        }

        let child_shapes = self
            .get_child_shapes(id, false)
            .into_iter()
            .map(|child| self.to_json(child))
            .collect::<Result<Vec<_>, _>>()?;

        let resource_ref = |id: NodeId| {
            self.node(id).map(|n| ResourceRef {
                resource_id: n.resource_id.clone(),
            })
        };

        let is_root = id == self.root;
        let outgoing = if is_root {
            None
        } else {
            Some(self.outgoing(id)?.into_iter().filter_map(resource_ref).collect())
        };
        let dockers = if is_root {
            None
        } else {
            Some(
                node.dockers
                    .iter()
                    .map(|d| match (d.docked, d.reference_point) {
                        (Some(_), Some(reference)) => reference,
                        _ => d.center,
                    })
                    .collect(),
            )
        };
        let target = match node.role() {
            ShapeRole::Edge => node.dockers.last().and_then(|d| d.docked).and_then(resource_ref),
            _ => None,
        };

        Ok(ShapeJson {
            resource_id: node.resource_id.clone(),
            properties,
            stencil: StencilRef {
                id: node.stencil.id_without_ns().to_string(),
            },
            child_shapes,
            outgoing,
            bounds: Some(node.bounds.into()),
            dockers,
            target,
        })
    }

    /// Build `json` and its subtree under `parent`. Connections are resolved
    /// once the whole subtree exists.
    pub fn import_json(&mut self, parent: NodeId, json: &ShapeJson) -> Result<NodeId, ModelError> {
        let id = self.import_shape(parent, json)?;
        self.resolve_connections(json)?;
        Ok(id)
    }

    /// Load a whole diagram into this tree: the root takes the canvas's
    /// resource id, properties and bounds, and its children are imported.
    pub fn import_canvas(&mut self, json: &ShapeJson) -> Result<(), ModelError> {
        let root = self.root;
        self.rename(root, &json.resource_id)?;
        self.apply_json(root, json)?;
        for child in &json.child_shapes {
            self.import_shape(root, child)?;
        }
        self.resolve_connections(json)
    }

    fn rename(&mut self, id: NodeId, resource_id: &str) -> Result<(), ModelError> {
        match self.by_resource_id.get(resource_id) {
            Some(existing) if *existing == id => return Ok(()),
            Some(_) => {
                return Err(ModelError::DuplicateResourceId {
                    resource_id: resource_id.to_string(),
                });
            }
            None => {}
        }
        let node = self.get_mut(id)?;
        let old = std::mem::replace(&mut node.resource_id, resource_id.to_string());
        self.by_resource_id.remove(&old);
        self.by_resource_id.insert(resource_id.to_string(), id);
        Ok(())
    }

    fn import_shape(&mut self, parent: NodeId, json: &ShapeJson) -> Result<NodeId, ModelError> {
        let id = self.create_shape_with_id(&json.stencil.id, &json.resource_id)?;
        self.add(parent, id)?;
        self.apply_json(id, json)?;
        for child in &json.child_shapes {
            self.import_shape(id, child)?;
        }
        debug!(resource_id = %json.resource_id, children = json.child_shapes.len(), "imported shape");
        Ok(id)
    }

    fn apply_json(&mut self, id: NodeId, json: &ShapeJson) -> Result<(), ModelError> {
        let stencil = self.get(id)?.schema.clone();
        for (name, value) in &json.properties {
            let value = PropertyValue::from(value.clone());
            match stencil.property_by_id(name) {
                Some(schema) => {
                    self.set_property(id, &schema.key(), schema.normalize(value))?;
                }
                None => {
                    self.set_hidden_property(id, name, Some(value))?;
                }
            }
        }
        if let Some(bounds) = json.bounds {
            self.set_bounds(id, bounds.into())?;
        }
        if let Some(dockers) = &json.dockers {
            if !dockers.is_empty() {
                self.set_dockers(id, dockers.iter().copied().map(Docker::at).collect())?;
            }
        }
        Ok(())
    }

    /// Dock edge ends named by `outgoing` and `target`. Docker positions read
    /// from JSON are reference points of the docked shape until then.
    fn resolve_connections(&mut self, json: &ShapeJson) -> Result<(), ModelError> {
        let Some(source) = self.find_by_resource_id(&json.resource_id) else {
            return Ok(());
        };
        for edge in json.outgoing.iter().flatten() {
            if let Some(edge) = self.find_by_resource_id(&edge.resource_id) {
                self.dock_end(edge, DockEnd::First, source)?;
            }
        }
        if let Some(target) = json.target.as_ref().and_then(|t| self.find_by_resource_id(&t.resource_id)) {
            self.dock_end(source, DockEnd::Last, target)?;
        }
        for child in &json.child_shapes {
            self.resolve_connections(child)?;
        }
        Ok(())
    }

    fn dock_end(&mut self, edge: NodeId, end: DockEnd, shape: NodeId) -> Result<(), ModelError> {
        let origin = self.absolute_bounds(shape)?.upper_left();
        let node = self.get_mut(edge)?;
        if node.role() != ShapeRole::Edge {
            return Ok(());
        }
        let docker = match end {
            DockEnd::First => node.dockers.first_mut(),
            DockEnd::Last => node.dockers.last_mut(),
        };
        let Some(docker) = docker.filter(|d| d.docked.is_none()) else {
            return Ok(());
        };
        let reference = docker.center;
        *docker = Docker::at(origin + reference).docked_to(shape, reference);
        let dockers = node.dockers.clone();
        self.set_dockers(edge, dockers)
    }
}

#[derive(Clone, Copy)]
enum DockEnd {
    First,
    Last,
}
