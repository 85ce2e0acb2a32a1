//! Shape tree model
//!
//! Shapes live in an arena owned by [`ShapeTree`] and are addressed by
//! generational [`NodeId`]s, so a handle to a removed shape never resolves to a
//! shape that reused its slot. Parent links are plain ids. Child order is
//! z-order: later children paint above earlier ones.

pub mod events;
pub mod json;
pub mod property;
pub mod serialize;
pub mod stencil;

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use uuid::Uuid;

use crate::defaults;
use crate::errors::ModelError;
use crate::geometry::is_point_in_line;
use crate::log::debug;
use crate::shape::ShapeGeometry;
use crate::types::{Bounds, Point};

use events::{BoxedListener, ListenerId, NotifyState, PendingEvent, PropertyChanged};
use property::PropertyValue;
use stencil::{Stencil, StencilKind, StencilSet};

/// Handle to a shape in a [`ShapeTree`]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    idx: u32,
    generation: u32,
}

impl NodeId {
    pub fn index(self) -> u32 {
        self.idx
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({}@gen{})", self.idx, self.generation)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.idx, self.generation)
    }
}

/// What a shape is, from its stencil
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeRole {
    Canvas,
    Node,
    Edge,
}

impl From<StencilKind> for ShapeRole {
    fn from(kind: StencilKind) -> Self {
        match kind {
            StencilKind::Diagram => ShapeRole::Canvas,
            StencilKind::Node => ShapeRole::Node,
            StencilKind::Edge => ShapeRole::Edge,
        }
    }
}

/// Docking point of an edge
#[derive(Debug, Clone, PartialEq)]
pub struct Docker {
    /// Absolute position
    pub center: Point,
    /// Shape this end is attached to
    pub docked: Option<NodeId>,
    /// Attachment point in the docked shape's coordinates
    pub reference_point: Option<Point>,
}

impl Docker {
    pub fn at(center: Point) -> Self {
        Self {
            center,
            docked: None,
            reference_point: None,
        }
    }

    pub fn docked_to(mut self, shape: NodeId, reference_point: Point) -> Self {
        self.docked = Some(shape);
        self.reference_point = Some(reference_point);
        self
    }
}

/// One diagram shape
#[derive(Debug)]
pub struct ShapeNode {
    resource_id: String,
    stencil: Rc<Stencil>,
    schema: Rc<Stencil>,
    properties: IndexMap<String, PropertyValue>,
    dirty: IndexMap<String, bool>,
    hidden_properties: IndexMap<String, PropertyValue>,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
    /// Relative to the parent for nodes, absolute for edges
    bounds: Bounds,
    geometries: Vec<ShapeGeometry>,
    dockers: Vec<Docker>,
    visible: bool,
    changed: bool,
    notify: NotifyState,
}

impl ShapeNode {
    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    /// The stencil this shape was instantiated from
    pub fn stencil(&self) -> &Rc<Stencil> {
        &self.stencil
    }

    /// The stencil whose properties this shape carries: the super stencil when
    /// the shape's stencil names one, the stencil itself otherwise
    pub fn schema(&self) -> &Rc<Stencil> {
        &self.schema
    }

    pub fn role(&self) -> ShapeRole {
        self.stencil.kind.into()
    }

    pub fn properties(&self) -> &IndexMap<String, PropertyValue> {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    pub fn hidden_properties(&self) -> &IndexMap<String, PropertyValue> {
        &self.hidden_properties
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn geometries(&self) -> &[ShapeGeometry] {
        &self.geometries
    }

    pub fn dockers(&self) -> &[Docker] {
        &self.dockers
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn notify_state(&self) -> NotifyState {
        self.notify
    }
}

/// Arena of shapes rooted at a canvas
pub struct ShapeTree {
    stencils: Rc<StencilSet>,
    slots: Vec<Option<ShapeNode>>,
    generations: Vec<u32>,
    free: Vec<u32>,
    by_resource_id: HashMap<String, NodeId>,
    root: NodeId,
    listeners: Vec<(ListenerId, BoxedListener)>,
    listener_ids: HashSet<ListenerId>,
    removed_listeners: Vec<ListenerId>,
    next_listener: u64,
    pending: VecDeque<PendingEvent>,
    /// Nodes whose event is being delivered, with the nodes that led to it
    delivering: Vec<NodeId>,
    dispatching: bool,
}

impl fmt::Debug for ShapeTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShapeTree")
            .field("root", &self.root)
            .field("shapes", &self.by_resource_id.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl ShapeTree {
    /// A tree whose root canvas is an instance of `root_stencil`.
    pub fn new(stencils: Rc<StencilSet>, root_stencil: &str) -> Result<Self, ModelError> {
        let mut tree = Self {
            stencils,
            slots: Vec::new(),
            generations: Vec::new(),
            free: Vec::new(),
            by_resource_id: HashMap::new(),
            root: NodeId { idx: 0, generation: 0 },
            listeners: Vec::new(),
            listener_ids: HashSet::new(),
            removed_listeners: Vec::new(),
            next_listener: 0,
            pending: VecDeque::new(),
            delivering: Vec::new(),
            dispatching: false,
        };
        tree.root = tree.create_shape(root_stencil)?;
        Ok(tree)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn stencils(&self) -> &Rc<StencilSet> {
        &self.stencils
    }

    pub fn node(&self, id: NodeId) -> Option<&ShapeNode> {
        if self.generations.get(id.idx as usize) != Some(&id.generation) {
            return None;
        }
        self.slots.get(id.idx as usize)?.as_ref()
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut ShapeNode> {
        if self.generations.get(id.idx as usize) != Some(&id.generation) {
            return None;
        }
        self.slots.get_mut(id.idx as usize)?.as_mut()
    }

    pub(crate) fn get(&self, id: NodeId) -> Result<&ShapeNode, ModelError> {
        self.node(id).ok_or_else(|| ModelError::UnknownNode { id: id.to_string() })
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Result<&mut ShapeNode, ModelError> {
        self.node_mut(id).ok_or_else(|| ModelError::UnknownNode { id: id.to_string() })
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    /// Number of live shapes, root and detached ones included
    pub fn len(&self) -> usize {
        self.by_resource_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_resource_id.is_empty()
    }

    /// Shape with this resource id anywhere in the arena
    pub fn find_by_resource_id(&self, resource_id: &str) -> Option<NodeId> {
        self.by_resource_id.get(resource_id).copied()
    }

    // ------------------------------------------------------------------------
    // Creation and structure
    // ------------------------------------------------------------------------

    /// Instantiate a stencil as a detached shape with a fresh resource id.
    pub fn create_shape(&mut self, stencil_id: &str) -> Result<NodeId, ModelError> {
        let resource_id = format!(
            "{}{}",
            defaults::RESOURCE_ID_PREFIX,
            Uuid::new_v4().to_string().to_uppercase()
        );
        self.create_shape_with_id(stencil_id, &resource_id)
    }

    /// Instantiate a stencil as a detached shape.
    ///
    /// Properties start at the schema's defaults, all flagged dirty. When the
    /// stencil has a super stencil, the super stencil is the schema and the
    /// stencil's own defaults are then applied as ordinary writes.
    pub fn create_shape_with_id(&mut self, stencil_id: &str, resource_id: &str) -> Result<NodeId, ModelError> {
        if self.by_resource_id.contains_key(resource_id) {
            return Err(ModelError::DuplicateResourceId {
                resource_id: resource_id.to_string(),
            });
        }
        let declared = self.stencils.stencil(stencil_id)?;
        let super_stencil = self.stencils.super_stencil(&declared)?;
        let schema = super_stencil.clone().unwrap_or_else(|| declared.clone());

        let mut properties = IndexMap::new();
        let mut dirty = IndexMap::new();
        for prop in &schema.properties {
            properties.insert(prop.key(), prop.default_value());
            dirty.insert(prop.key(), true);
        }

        let node = ShapeNode {
            resource_id: resource_id.to_string(),
            stencil: declared.clone(),
            schema,
            properties,
            dirty,
            hidden_properties: IndexMap::new(),
            children: Vec::new(),
            parent: None,
            bounds: Bounds::default(),
            geometries: Vec::new(),
            dockers: Vec::new(),
            visible: true,
            changed: true,
            notify: NotifyState::Idle,
        };
        let id = self.alloc(node);
        self.by_resource_id.insert(resource_id.to_string(), id);
        debug!(resource_id, stencil = %declared.id(), "created shape");

        if super_stencil.is_some() {
            for prop in &declared.properties {
                self.set_property(id, &prop.key(), prop.default_value())?;
            }
        }
        Ok(id)
    }

    fn alloc(&mut self, node: ShapeNode) -> NodeId {
        match self.free.pop() {
            Some(idx) => {
                self.slots[idx as usize] = Some(node);
                NodeId {
                    idx,
                    generation: self.generations[idx as usize],
                }
            }
            None => {
                let idx = self.slots.len() as u32;
                self.slots.push(Some(node));
                self.generations.push(0);
                NodeId { idx, generation: 0 }
            }
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id)?.parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map_or(&[], |n| &n.children)
    }

    /// Whether `ancestor` is `id` or one of its ancestors
    fn is_ancestor_or_self(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(c) = current {
            if c == ancestor {
                return true;
            }
            current = self.parent(c);
        }
        false
    }

    /// Append `child` to `parent`'s children (topmost).
    pub fn add(&mut self, parent: NodeId, child: NodeId) -> Result<(), ModelError> {
        let index = self.get(parent)?.children.len();
        self.insert(parent, child, index)
    }

    /// Move `child` under `parent` at z-index `index` (clamped).
    pub fn insert(&mut self, parent: NodeId, child: NodeId, index: usize) -> Result<(), ModelError> {
        self.get(parent)?;
        self.get(child)?;
        if child == self.root {
            return Err(ModelError::RootIsFixed);
        }
        if self.is_ancestor_or_self(child, parent) {
            return Err(ModelError::WouldCreateCycle {
                child: self.get(child)?.resource_id.clone(),
                parent: self.get(parent)?.resource_id.clone(),
            });
        }

        self.detach(child);
        let siblings = &mut self.get_mut(parent)?.children;
        let index = index.min(siblings.len());
        siblings.insert(index, child);
        self.get_mut(child)?.parent = Some(parent);
        self.mark_changed(parent);
        Ok(())
    }

    fn detach(&mut self, child: NodeId) {
        let Some(old_parent) = self.parent(child) else {
            return;
        };
        if let Some(parent) = self.node_mut(old_parent) {
            parent.children.retain(|c| *c != child);
        }
        if let Some(node) = self.node_mut(child) {
            node.parent = None;
        }
        self.mark_changed(old_parent);
    }

    /// Remove a shape and everything below it. Dockers attached to removed
    /// shapes float free.
    pub fn remove(&mut self, id: NodeId) -> Result<(), ModelError> {
        self.get(id)?;
        if id == self.root {
            return Err(ModelError::RootIsFixed);
        }
        self.detach(id);

        let mut doomed = vec![id];
        doomed.extend(self.get_child_shapes_all(id));
        for gone in &doomed {
            let idx = gone.idx as usize;
            if let Some(node) = self.slots[idx].take() {
                self.by_resource_id.remove(&node.resource_id);
            }
            self.generations[idx] += 1;
            self.free.push(gone.idx);
        }
        for node in self.slots.iter_mut().flatten() {
            for docker in &mut node.dockers {
                if docker.docked.is_some_and(|d| doomed.contains(&d)) {
                    docker.docked = None;
                }
            }
        }
        debug!(removed = doomed.len(), "removed shapes");
        Ok(())
    }

    /// Every descendant regardless of visibility, pre-order
    fn get_child_shapes_all(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev());
        }
        out
    }

    pub fn set_visible(&mut self, id: NodeId, visible: bool) -> Result<(), ModelError> {
        self.get_mut(id)?.visible = visible;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Geometry
    // ------------------------------------------------------------------------

    /// Nodes are placed relative to their parent, edges absolutely.
    pub fn set_bounds(&mut self, id: NodeId, bounds: Bounds) -> Result<(), ModelError> {
        let node = self.get_mut(id)?;
        if node.bounds != bounds {
            node.bounds = bounds;
            self.mark_changed(id);
        }
        Ok(())
    }

    pub fn bounds(&self, id: NodeId) -> Result<Bounds, ModelError> {
        Ok(self.get(id)?.bounds)
    }

    /// Bounds in canvas coordinates. The canvas's own offset doesn't count.
    pub fn absolute_bounds(&self, id: NodeId) -> Result<Bounds, ModelError> {
        let node = self.get(id)?;
        let bounds = node.bounds;
        if node.role() != ShapeRole::Node {
            return Ok(bounds);
        }
        match node.parent {
            Some(parent) if self.get(parent)?.role() != ShapeRole::Canvas => {
                let offset = self.absolute_bounds(parent)?.upper_left();
                Ok(bounds.translate(offset.x, offset.y))
            }
            _ => Ok(bounds),
        }
    }

    pub fn add_geometry(&mut self, id: NodeId, geometry: ShapeGeometry) -> Result<(), ModelError> {
        self.get_mut(id)?.geometries.push(geometry);
        Ok(())
    }

    pub fn geometries_mut(&mut self, id: NodeId) -> Result<&mut Vec<ShapeGeometry>, ModelError> {
        Ok(&mut self.get_mut(id)?.geometries)
    }

    /// Replace an edge's dockers; its bounds then span the docker centres.
    pub fn set_dockers(&mut self, id: NodeId, dockers: Vec<Docker>) -> Result<(), ModelError> {
        let node = self.get_mut(id)?;
        if node.role() == ShapeRole::Edge {
            if let Some(bounds) = Bounds::enclosing(dockers.iter().map(|d| d.center)) {
                node.bounds = bounds;
            }
        }
        node.dockers = dockers;
        self.mark_changed(id);
        Ok(())
    }

    /// Nodes: edges whose first docker is attached to the node.
    /// Edges: the shape attached to the last docker.
    pub fn outgoing(&self, id: NodeId) -> Result<Vec<NodeId>, ModelError> {
        let node = self.get(id)?;
        Ok(match node.role() {
            ShapeRole::Edge => node.dockers.last().and_then(|d| d.docked).into_iter().collect(),
            _ => self
                .slots
                .iter()
                .enumerate()
                .filter_map(|(idx, slot)| {
                    let edge = slot.as_ref()?;
                    let starts_here = edge.role() == ShapeRole::Edge && edge.dockers.first()?.docked == Some(id);
                    starts_here.then(|| NodeId {
                        idx: idx as u32,
                        generation: self.generations[idx],
                    })
                })
                .collect(),
        })
    }

    /// Edges whose last docker is attached to `id`
    pub fn incoming(&self, id: NodeId) -> Result<Vec<NodeId>, ModelError> {
        self.get(id)?;
        let mut edges = Vec::new();
        for (idx, slot) in self.slots.iter().enumerate() {
            let Some(edge) = slot else { continue };
            if edge.role() == ShapeRole::Edge && edge.dockers.last().and_then(|d| d.docked) == Some(id) {
                edges.push(NodeId {
                    idx: idx as u32,
                    generation: self.generations[idx],
                });
            }
        }
        Ok(edges)
    }

    /// Hit test in canvas coordinates.
    pub fn is_point_included(&self, id: NodeId, x: f64, y: f64) -> bool {
        let Some(node) = self.node(id) else {
            return false;
        };
        if !node.visible {
            return false;
        }
        let Ok(abs) = self.absolute_bounds(id) else {
            return false;
        };

        match node.role() {
            ShapeRole::Canvas => abs.is_included(x, y, 0.0),
            ShapeRole::Node => {
                if !abs.is_included(x, y, 0.0) {
                    return false;
                }
                if node.geometries.is_empty() {
                    return true;
                }
                let (lx, ly) = (x - abs.x(), y - abs.y());
                node.geometries.iter().any(|g| g.is_point_included(lx, ly))
            }
            ShapeRole::Edge => {
                let offset = defaults::OFFSET_EDGE_BOUNDS;
                if !abs.is_included(x, y, offset) {
                    return false;
                }
                node.dockers.windows(2).any(|pair| {
                    let (a, b) = (pair[0].center, pair[1].center);
                    is_point_in_line(x, y, a.x, a.y, b.x, b.y, offset)
                })
            }
        }
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Visible children in z-order; with `deep`, every visible descendant pre-order.
    pub fn get_child_shapes(&self, id: NodeId, deep: bool) -> Vec<NodeId> {
        self.get_child_shapes_with(id, deep, |_| {})
    }

    /// Like [`Self::get_child_shapes`], calling `visitor` once per shape in the same order.
    pub fn get_child_shapes_with(&self, id: NodeId, deep: bool, mut visitor: impl FnMut(NodeId)) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_children(id, deep, &mut |child| {
            visitor(child);
            out.push(child);
        });
        out
    }

    fn collect_children(&self, id: NodeId, deep: bool, sink: &mut dyn FnMut(NodeId)) {
        for &child in self.children(id) {
            if !self.node(child).is_some_and(|n| n.visible) {
                continue;
            }
            sink(child);
            if deep {
                self.collect_children(child, deep, sink);
            }
        }
    }

    fn has_role(&self, id: NodeId, role: ShapeRole) -> bool {
        self.node(id).is_some_and(|n| n.role() == role)
    }

    pub fn get_child_nodes(&self, id: NodeId, deep: bool) -> Vec<NodeId> {
        self.get_child_shapes(id, deep)
            .into_iter()
            .filter(|c| self.has_role(*c, ShapeRole::Node))
            .collect()
    }

    pub fn get_child_edges(&self, id: NodeId) -> Vec<NodeId> {
        self.get_child_shapes(id, false)
            .into_iter()
            .filter(|c| self.has_role(*c, ShapeRole::Edge))
            .collect()
    }

    pub fn get_child_shape_by_resource_id(&self, id: NodeId, resource_id: &str) -> Option<NodeId> {
        self.get_child_shapes_all(id)
            .into_iter()
            .find(|c| self.node(*c).is_some_and(|n| n.resource_id == resource_id))
    }

    pub fn has_child_shape(&self, id: NodeId, child: NodeId) -> bool {
        child != id && self.contains(child) && self.is_ancestor_or_self(id, child)
    }

    /// Shapes under `(x, y)`, topmost last: `id` itself, then hits among its
    /// child nodes, then hits among its child edges, each group in z-order.
    pub fn get_abstract_shapes_at_position(&self, id: NodeId, x: f64, y: f64) -> Vec<NodeId> {
        if !self.is_point_included(id, x, y) {
            return Vec::new();
        }
        let mut result = vec![id];
        for group in [self.get_child_nodes(id, false), self.get_child_edges(id)] {
            for child in group {
                result.extend(self.get_abstract_shapes_at_position(child, x, y));
            }
        }
        result
    }

    // ------------------------------------------------------------------------
    // Properties
    // ------------------------------------------------------------------------

    pub fn property(&self, id: NodeId, key: &str) -> Option<&PropertyValue> {
        self.node(id)?.properties.get(key)
    }

    /// Write a property. Returns `false` (no event) if the value is unchanged.
    pub fn set_property(&mut self, id: NodeId, key: &str, value: impl Into<PropertyValue>) -> Result<bool, ModelError> {
        self.set_property_with(id, key, value.into(), false)
    }

    /// Write a property and notify even if the value is unchanged.
    pub fn set_property_forced(&mut self, id: NodeId, key: &str, value: impl Into<PropertyValue>) -> Result<bool, ModelError> {
        self.set_property_with(id, key, value.into(), true)
    }

    pub fn set_property_with(&mut self, id: NodeId, key: &str, value: PropertyValue, force: bool) -> Result<bool, ModelError> {
        let node = self.get_mut(id)?;
        let old_value = node.properties.get(key).cloned().unwrap_or_default();
        if !force && old_value == value {
            return Ok(false);
        }
        node.properties.insert(key.to_string(), value.clone());
        node.dirty.insert(key.to_string(), true);
        self.mark_changed(id);
        self.queue_event(PropertyChanged {
            elements: vec![id],
            name: key.to_string(),
            value,
            old_value,
        });
        Ok(true)
    }

    /// Write a property outside the stencil schema; `None` deletes it.
    /// Keys without a prefix get the default one.
    pub fn set_hidden_property(&mut self, id: NodeId, key: &str, value: Option<PropertyValue>) -> Result<bool, ModelError> {
        let key = if key.contains('-') {
            key.to_string()
        } else {
            format!("{}-{key}", defaults::PROPERTY_PREFIX)
        };
        let node = self.get_mut(id)?;
        let old_value = node.hidden_properties.get(&key).cloned();
        let value = match value {
            Some(value) if old_value.as_ref() == Some(&value) => return Ok(false),
            Some(value) => {
                node.hidden_properties.insert(key.clone(), value.clone());
                value
            }
            None if old_value.is_none() => return Ok(false),
            None => {
                node.hidden_properties.shift_remove(&key);
                PropertyValue::Null
            }
        };
        node.dirty.insert(key.clone(), true);
        self.mark_changed(id);
        self.queue_event(PropertyChanged {
            elements: vec![id],
            name: key,
            value,
            old_value: old_value.unwrap_or_default(),
        });
        Ok(true)
    }

    pub fn hidden_property(&self, id: NodeId, key: &str) -> Option<&PropertyValue> {
        self.node(id)?.hidden_properties.get(key)
    }

    /// Any dirty property on this shape
    pub fn is_property_changed(&self, id: NodeId) -> bool {
        self.node(id).is_some_and(|n| n.dirty.values().any(|d| *d))
    }

    /// Clear the dirty flags and the changed flag of one shape.
    pub fn mark_clean(&mut self, id: NodeId) -> Result<(), ModelError> {
        let node = self.get_mut(id)?;
        node.dirty.values_mut().for_each(|d| *d = false);
        node.changed = false;
        Ok(())
    }

    /// Whether the shape or anything below it changed since `mark_clean`
    pub fn is_changed(&self, id: NodeId) -> bool {
        self.node(id).is_some_and(|n| n.changed)
    }

    fn mark_changed(&mut self, id: NodeId) {
        let mut current = Some(id);
        while let Some(c) = current {
            match self.node_mut(c) {
                Some(node) => {
                    node.changed = true;
                    current = node.parent;
                }
                None => break,
            }
        }
    }
}
