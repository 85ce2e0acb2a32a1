//! Shape geometry adapter: one bounds-based interface over every primitive
//!
//! A [`ShapeGeometry`] owns the [`Element`] it was read from. Bounds changes are
//! staged with the setters and written into the element by [`ShapeGeometry::update`],
//! which also moves the "old" baseline forward and drops cached hit-test data.

pub mod primitives;

use std::cell::OnceCell;

use crate::defaults;
use crate::errors::ShapeError;
use crate::log::debug;
use crate::svg::Element;
use crate::types::{Bounds, NumericError, Point};

pub use primitives::{Primitive, PrimitiveShape, ShapeKind};

/// Resize behavior from the `resize` extension attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResizeFlags {
    pub horizontal: bool,
    pub vertical: bool,
}

/// Edges the shape sticks to while its parent is resized, from `anchors`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Anchors {
    pub left: bool,
    pub right: bool,
    pub top: bool,
    pub bottom: bool,
}

fn tokens(raw: Option<&str>) -> impl Iterator<Item = String> + '_ {
    raw.into_iter()
        .flat_map(|s| s.split(|c: char| c.is_whitespace() || c == ','))
        .filter(|t| !t.is_empty())
        .map(str::to_ascii_lowercase)
}

fn parse_resize(raw: Option<&str>) -> ResizeFlags {
    let mut flags = ResizeFlags::default();
    for token in tokens(raw) {
        match token.as_str() {
            "horizontal" => flags.horizontal = true,
            "vertical" => flags.vertical = true,
            _ => {}
        }
    }
    flags
}

fn parse_anchors(raw: Option<&str>) -> Anchors {
    let mut anchors = Anchors::default();
    for token in tokens(raw) {
        match token.as_str() {
            "left" => anchors.left = true,
            "right" => anchors.right = true,
            "top" => anchors.top = true,
            "bottom" => anchors.bottom = true,
            _ => {}
        }
    }
    anchors
}

/// Visibility of an element, walking up its containers.
fn element_visible(element: &Element) -> bool {
    if element.tag() == "g" && element.has_class(defaults::MAIN_GROUP_CLASS) {
        return true;
    }
    if element.attr("fill") == Some("none") && element.attr("stroke") == Some("none") {
        return false;
    }
    match element.attr("display") {
        Some("none") => false,
        Some(_) => true,
        None => element.parent().is_none_or(element_visible),
    }
}

/// Adapter over one visual primitive of a shape
#[derive(Debug, Clone)]
pub struct ShapeGeometry {
    element: Element,
    primitive: PrimitiveShape,
    /// Bounds as last committed to the element
    old_bounds: Bounds,
    bounds: Bounds,
    resize: ResizeFlags,
    anchors: Anchors,
    allow_dockers: bool,
    resize_marker_mid: bool,
    visible: OnceCell<bool>,
}

impl ShapeGeometry {
    /// Read geometry and extension attributes from `element`.
    pub fn from_element(element: Element) -> Result<Self, ShapeError> {
        let primitive = PrimitiveShape::read(&element)?;
        let bounds = primitive.native_bounds();

        let resize = parse_resize(element.extension_attr("resize"));
        let anchors = parse_anchors(element.extension_attr("anchors"));
        let (allow_dockers, resize_marker_mid) = if primitive.kind() == ShapeKind::Path {
            (
                element
                    .extension_attr("allowDockers")
                    .is_none_or(|v| !v.eq_ignore_ascii_case("no")),
                element
                    .extension_attr("resizeMarker-mid")
                    .is_some_and(|v| v.eq_ignore_ascii_case("yes")),
            )
        } else {
            (true, false)
        };

        debug!(tag = element.tag(), %bounds, "read shape geometry");

        Ok(Self {
            element,
            primitive,
            old_bounds: bounds,
            bounds,
            resize,
            anchors,
            allow_dockers,
            resize_marker_mid,
            visible: OnceCell::new(),
        })
    }

    pub fn kind(&self) -> ShapeKind {
        self.primitive.kind()
    }

    pub fn element(&self) -> &Element {
        &self.element
    }

    pub fn primitive(&self) -> &PrimitiveShape {
        &self.primitive
    }

    /// Pending bounds (what `update` will commit)
    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Bounds of the last commit
    pub fn old_bounds(&self) -> Bounds {
        self.old_bounds
    }

    pub fn x(&self) -> f64 {
        self.bounds.x()
    }

    pub fn y(&self) -> f64 {
        self.bounds.y()
    }

    pub fn width(&self) -> f64 {
        self.bounds.width()
    }

    pub fn height(&self) -> f64 {
        self.bounds.height()
    }

    pub fn set_bounds(&mut self, bounds: Bounds) {
        self.bounds = bounds;
    }

    pub fn set_position(&mut self, x: f64, y: f64) {
        self.bounds = self.bounds.with_upper_left(Point::new(x, y));
    }

    /// Resize keeping the upper-left corner; NaN, infinite and negative sizes are rejected.
    pub fn set_size(&mut self, width: f64, height: f64) -> Result<(), NumericError> {
        self.bounds = Bounds::try_new(self.bounds.x(), self.bounds.y(), width, height)?;
        Ok(())
    }

    /// `rx` of a circle or ellipse, as committed.
    pub fn radius_x(&self) -> Option<f64> {
        self.primitive.radii().map(|(rx, _)| rx)
    }

    pub fn radius_y(&self) -> Option<f64> {
        self.primitive.radii().map(|(_, ry)| ry)
    }

    pub fn is_horizontally_resizable(&self) -> bool {
        self.resize.horizontal
    }

    pub fn is_vertically_resizable(&self) -> bool {
        self.resize.vertical
    }

    pub fn anchors(&self) -> Anchors {
        self.anchors
    }

    pub fn allow_dockers(&self) -> bool {
        self.allow_dockers
    }

    pub fn resize_marker_mid(&self) -> bool {
        self.resize_marker_mid
    }

    /// Write pending bounds into the element. Does nothing if they haven't changed.
    pub fn update(&mut self) {
        if self.bounds == self.old_bounds {
            return;
        }
        debug!(tag = self.element.tag(), from = %self.old_bounds, to = %self.bounds, "commit shape geometry");
        self.primitive.commit(&mut self.element, &self.old_bounds, &self.bounds);
        self.old_bounds = self.bounds;
        self.visible = OnceCell::new();
    }

    /// Hit test against the committed geometry, in the shape's own coordinates.
    ///
    /// Invisible shapes never match. `(0, 0)` is a valid point; only NaN is rejected.
    pub fn is_point_included(&self, px: f64, py: f64) -> bool {
        if px.is_nan() || py.is_nan() || !self.is_visible() {
            return false;
        }
        self.primitive.contains(px, py)
    }

    pub fn is_visible(&self) -> bool {
        *self.visible.get_or_init(|| element_visible(&self.element))
    }
}
