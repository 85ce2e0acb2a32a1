//! Per-kind readers and writers for native shape geometry
//!
//! Each kind is its own type that knows how to:
//! - Read its bounds from an [`Element`]
//! - Write new bounds back into the element
//! - Hit-test a point against its committed geometry

use std::cell::OnceCell;

use enum_dispatch::enum_dispatch;
use glam::{DVec2, dvec2};

use crate::defaults;
use crate::errors::ShapeError;
use crate::geometry::{is_point_in_ellipse, is_point_in_line, is_point_in_polygon};
use crate::svg::path::{EditHandler, MinMaxHandler, PathSegment, PointsHandler, parse_path, walk};
use crate::svg::{Element, format_points, parse_points};
use crate::types::{Bounds, Point};

/// The closed set of primitives a stencil can be drawn with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    Rect,
    Circle,
    Ellipse,
    Line,
    Polyline,
    Path,
}

/// Common behavior for all primitives
#[enum_dispatch]
pub trait Primitive {
    fn kind(&self) -> ShapeKind;

    /// Bounds described by the native attributes as last read or written
    fn native_bounds(&self) -> Bounds;

    /// Write `next` into `element`. `old` is the previously committed bounds.
    fn commit(&mut self, element: &mut Element, old: &Bounds, next: &Bounds);

    /// Hit test in the shape's own coordinate space
    fn contains(&self, px: f64, py: f64) -> bool;

    /// `(rx, ry)` for round kinds
    fn radii(&self) -> Option<(f64, f64)> {
        None
    }
}

/// Maps points from one bounds onto another.
///
/// An axis whose old extent is 0 gets scale 0, collapsing onto the new origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rescale {
    from: DVec2,
    to: DVec2,
    scale: DVec2,
}

impl Rescale {
    pub fn between(old: &Bounds, next: &Bounds) -> Self {
        let ratio = |new: f64, old: f64| if old == 0.0 { 0.0 } else { new / old };
        Self {
            from: old.upper_left().as_dvec2(),
            to: next.upper_left().as_dvec2(),
            scale: dvec2(ratio(next.width(), old.width()), ratio(next.height(), old.height())),
        }
    }

    pub fn apply(&self, p: DVec2) -> DVec2 {
        (p - self.from) * self.scale + self.to
    }
}

fn number_attr(value: f64) -> String {
    format!("{value}")
}

fn points_to_bounds(coords: &[f64]) -> Option<Bounds> {
    Bounds::enclosing(coords.chunks_exact(2).map(|p| Point::new(p[0], p[1])))
}

// ============================================================================
// Rect
// ============================================================================

/// `rect` and `image`
#[derive(Debug, Clone, PartialEq)]
pub struct RectShape {
    bounds: Bounds,
}

impl RectShape {
    pub fn read(element: &Element) -> Result<Self, ShapeError> {
        let x = element.required_number("x")?;
        let y = element.required_number("y")?;
        let width = element.required_number("width")?;
        let height = element.required_number("height")?;
        Ok(Self {
            bounds: Bounds::new(x, y, width, height),
        })
    }
}

impl Primitive for RectShape {
    fn kind(&self) -> ShapeKind {
        ShapeKind::Rect
    }

    fn native_bounds(&self) -> Bounds {
        self.bounds
    }

    fn commit(&mut self, element: &mut Element, old: &Bounds, next: &Bounds) {
        // only the attributes that moved are rewritten
        if next.x() != old.x() {
            element.set_attr("x", number_attr(next.x()));
        }
        if next.y() != old.y() {
            element.set_attr("y", number_attr(next.y()));
        }
        if next.width() != old.width() {
            element.set_attr("width", number_attr(next.width()));
        }
        if next.height() != old.height() {
            element.set_attr("height", number_attr(next.height()));
        }
        self.bounds = *next;
    }

    fn contains(&self, px: f64, py: f64) -> bool {
        let ul = self.bounds.upper_left();
        let lr = self.bounds.lower_right();
        is_point_in_polygon(px, py, &[ul.x, ul.y, lr.x, ul.y, lr.x, lr.y, ul.x, lr.y]).unwrap_or(false)
    }
}

// ============================================================================
// Circle
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct CircleShape {
    center: Point,
    radius: f64,
}

impl CircleShape {
    pub fn read(element: &Element) -> Result<Self, ShapeError> {
        let cx = element.required_number("cx")?;
        let cy = element.required_number("cy")?;
        let radius = element.required_number("r")?;
        Ok(Self {
            center: Point::new(cx, cy),
            radius,
        })
    }
}

impl Primitive for CircleShape {
    fn kind(&self) -> ShapeKind {
        ShapeKind::Circle
    }

    fn native_bounds(&self) -> Bounds {
        let r = self.radius;
        Bounds::new(self.center.x - r, self.center.y - r, 2.0 * r, 2.0 * r)
    }

    fn commit(&mut self, element: &mut Element, _old: &Bounds, next: &Bounds) {
        // inscribed in the new bounds
        self.radius = next.width().min(next.height()) / 2.0;
        self.center = Point::new(next.x() + next.width() / 2.0, next.y() + next.height() / 2.0);
        element.set_attr("cx", number_attr(self.center.x));
        element.set_attr("cy", number_attr(self.center.y));
        element.set_attr("r", number_attr(self.radius));
    }

    fn contains(&self, px: f64, py: f64) -> bool {
        is_point_in_ellipse(px, py, self.center.x, self.center.y, self.radius, self.radius).unwrap_or(false)
    }

    fn radii(&self) -> Option<(f64, f64)> {
        Some((self.radius, self.radius))
    }
}

// ============================================================================
// Ellipse
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct EllipseShape {
    center: Point,
    rx: f64,
    ry: f64,
}

impl EllipseShape {
    pub fn read(element: &Element) -> Result<Self, ShapeError> {
        Ok(Self {
            center: Point::new(element.required_number("cx")?, element.required_number("cy")?),
            rx: element.required_number("rx")?,
            ry: element.required_number("ry")?,
        })
    }
}

impl Primitive for EllipseShape {
    fn kind(&self) -> ShapeKind {
        ShapeKind::Ellipse
    }

    fn native_bounds(&self) -> Bounds {
        Bounds::new(self.center.x - self.rx, self.center.y - self.ry, 2.0 * self.rx, 2.0 * self.ry)
    }

    fn commit(&mut self, element: &mut Element, _old: &Bounds, next: &Bounds) {
        self.rx = next.width() / 2.0;
        self.ry = next.height() / 2.0;
        self.center = Point::new(next.x() + self.rx, next.y() + self.ry);
        element.set_attr("cx", number_attr(self.center.x));
        element.set_attr("cy", number_attr(self.center.y));
        element.set_attr("rx", number_attr(self.rx));
        element.set_attr("ry", number_attr(self.ry));
    }

    fn contains(&self, px: f64, py: f64) -> bool {
        is_point_in_ellipse(px, py, self.center.x, self.center.y, self.rx, self.ry).unwrap_or(false)
    }

    fn radii(&self) -> Option<(f64, f64)> {
        Some((self.rx, self.ry))
    }
}

// ============================================================================
// Line
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct LineShape {
    start: Point,
    end: Point,
}

impl LineShape {
    pub fn read(element: &Element) -> Result<Self, ShapeError> {
        Ok(Self {
            start: Point::new(element.required_number("x1")?, element.required_number("y1")?),
            end: Point::new(element.required_number("x2")?, element.required_number("y2")?),
        })
    }

    pub fn endpoints(&self) -> (Point, Point) {
        (self.start, self.end)
    }
}

impl Primitive for LineShape {
    fn kind(&self) -> ShapeKind {
        ShapeKind::Line
    }

    fn native_bounds(&self) -> Bounds {
        Bounds::from_corners(self.start, self.end)
    }

    fn commit(&mut self, element: &mut Element, old: &Bounds, next: &Bounds) {
        // both ends follow the resize, so the direction survives
        let rescale = Rescale::between(old, next);
        self.start = rescale.apply(self.start.as_dvec2()).into();
        self.end = rescale.apply(self.end.as_dvec2()).into();
        element.set_attr("x1", number_attr(self.start.x));
        element.set_attr("y1", number_attr(self.start.y));
        element.set_attr("x2", number_attr(self.end.x));
        element.set_attr("y2", number_attr(self.end.y));
    }

    fn contains(&self, px: f64, py: f64) -> bool {
        is_point_in_line(
            px,
            py,
            self.start.x,
            self.start.y,
            self.end.x,
            self.end.y,
            defaults::LINE_OFFSET,
        )
    }
}

// ============================================================================
// Polyline
// ============================================================================

/// `polyline` and `polygon`
#[derive(Debug, Clone, PartialEq)]
pub struct PolylineShape {
    coords: Vec<f64>,
    bounds: Bounds,
}

impl PolylineShape {
    pub fn read(element: &Element) -> Result<Self, ShapeError> {
        let coords = match element.point_list() {
            Some(list) => list.iter().flat_map(|p| [p.x, p.y]).collect(),
            None => match element.attr("points") {
                Some(raw) => parse_points("points", raw)?,
                None => Vec::new(),
            },
        };
        let bounds = match points_to_bounds(&coords) {
            Some(bounds) if coords.len() >= 2 => bounds,
            _ => {
                return Err(ShapeError::MalformedShape {
                    element: element.tag().to_string(),
                    reason: format!("needs at least 2 coordinates, found {}", coords.len()),
                });
            }
        };
        Ok(Self { coords, bounds })
    }

    pub fn coords(&self) -> &[f64] {
        &self.coords
    }
}

impl Primitive for PolylineShape {
    fn kind(&self) -> ShapeKind {
        ShapeKind::Polyline
    }

    fn native_bounds(&self) -> Bounds {
        self.bounds
    }

    fn commit(&mut self, element: &mut Element, old: &Bounds, next: &Bounds) {
        let rescale = Rescale::between(old, next);
        for pair in self.coords.chunks_exact_mut(2) {
            let p = rescale.apply(dvec2(pair[0], pair[1]));
            pair[0] = p.x;
            pair[1] = p.y;
        }
        self.bounds = points_to_bounds(&self.coords).unwrap_or(*next);

        if element.point_list().is_some() {
            let list = self.coords.chunks_exact(2).map(|p| Point::new(p[0], p[1])).collect();
            element.set_point_list(list);
        } else {
            element.set_attr("points", format_points(&self.coords));
        }
    }

    fn contains(&self, px: f64, py: f64) -> bool {
        is_point_in_polygon(px, py, &self.coords).unwrap_or(false)
    }
}

// ============================================================================
// Path
// ============================================================================

#[derive(Debug, Clone)]
pub struct PathShape {
    segments: Vec<PathSegment>,
    bounds: Bounds,
    /// Polygon used for hit tests, built on first use
    polygon: OnceCell<Vec<f64>>,
}

impl PathShape {
    pub fn read(element: &Element) -> Result<Self, ShapeError> {
        let d = element.attr("d").ok_or_else(|| ShapeError::MissingAttribute {
            element: element.tag().to_string(),
            attribute: "d".to_string(),
        })?;
        let segments = parse_path(d)?;
        let mut min_max = MinMaxHandler::new();
        walk(&segments, &mut min_max);
        let bounds = min_max.bounds().ok_or_else(|| ShapeError::MalformedShape {
            element: element.tag().to_string(),
            reason: "path data has no coordinates".to_string(),
        })?;
        Ok(Self {
            segments,
            bounds,
            polygon: OnceCell::new(),
        })
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Whether the hit-test polygon has been built since the last commit
    pub fn has_cached_polygon(&self) -> bool {
        self.polygon.get().is_some()
    }

    fn polygon(&self) -> &[f64] {
        self.polygon.get_or_init(|| {
            let mut points = PointsHandler::new();
            walk(&self.segments, &mut points);
            points.into_points()
        })
    }
}

impl PartialEq for PathShape {
    fn eq(&self, other: &Self) -> bool {
        self.segments == other.segments && self.bounds == other.bounds
    }
}

impl Primitive for PathShape {
    fn kind(&self) -> ShapeKind {
        ShapeKind::Path
    }

    fn native_bounds(&self) -> Bounds {
        self.bounds
    }

    fn commit(&mut self, element: &mut Element, old: &Bounds, next: &Bounds) {
        let rescale = Rescale::between(old, next);
        let mut edit = EditHandler::new(rescale.to, rescale.from, rescale.scale);
        walk(&self.segments, &mut edit);
        element.set_attr("d", edit.d());

        self.segments = edit.segments().to_vec();
        let mut min_max = MinMaxHandler::new();
        walk(&self.segments, &mut min_max);
        self.bounds = min_max.bounds().unwrap_or(*next);
        self.polygon = OnceCell::new();
    }

    fn contains(&self, px: f64, py: f64) -> bool {
        is_point_in_polygon(px, py, self.polygon()).unwrap_or(false)
    }
}

// ============================================================================
// Primitive Enum
// ============================================================================

/// One primitive of any kind
#[enum_dispatch(Primitive)]
#[derive(Debug, Clone, PartialEq)]
pub enum PrimitiveShape {
    Rect(RectShape),
    Circle(CircleShape),
    Ellipse(EllipseShape),
    Line(LineShape),
    Polyline(PolylineShape),
    Path(PathShape),
}

impl PrimitiveShape {
    /// Read the primitive an element describes.
    pub fn read(element: &Element) -> Result<Self, ShapeError> {
        Ok(match element.tag() {
            "rect" | "image" => RectShape::read(element)?.into(),
            "circle" => CircleShape::read(element)?.into(),
            "ellipse" => EllipseShape::read(element)?.into(),
            "line" => LineShape::read(element)?.into(),
            "polyline" | "polygon" => PolylineShape::read(element)?.into(),
            "path" => PathShape::read(element)?.into(),
            other => {
                return Err(ShapeError::NotAShape { tag: other.to_string() });
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rescale_maps_corners() {
        let r = Rescale::between(&Bounds::new(10.0, 10.0, 10.0, 20.0), &Bounds::new(0.0, 0.0, 20.0, 10.0));
        assert_eq!(r.apply(dvec2(10.0, 10.0)), dvec2(0.0, 0.0));
        assert_eq!(r.apply(dvec2(20.0, 30.0)), dvec2(20.0, 10.0));
    }

    #[test]
    fn rescale_collapses_zero_extent() {
        let r = Rescale::between(&Bounds::new(5.0, 0.0, 0.0, 10.0), &Bounds::new(8.0, 0.0, 4.0, 10.0));
        assert_eq!(r.apply(dvec2(5.0, 3.0)), dvec2(8.0, 3.0));
    }

    #[test]
    fn unknown_tag_is_not_a_shape() {
        let err = PrimitiveShape::read(&Element::new("text")).unwrap_err();
        assert!(matches!(err, ShapeError::NotAShape { tag } if tag == "text"));
    }

    #[test]
    fn image_reads_as_rect() {
        let el = Element::new("image")
            .with_attr("x", "1")
            .with_attr("y", "2")
            .with_attr("width", "3")
            .with_attr("height", "4");
        let shape = PrimitiveShape::read(&el).unwrap();
        assert_eq!(shape.kind(), ShapeKind::Rect);
        assert_eq!(shape.native_bounds(), Bounds::new(1.0, 2.0, 3.0, 4.0));
    }

    #[test]
    fn polyline_needs_two_coordinates() {
        let el = Element::new("polyline").with_attr("points", "5");
        assert!(matches!(PolylineShape::read(&el), Err(ShapeError::MalformedShape { .. })));
        let el = Element::new("polygon");
        assert!(matches!(PolylineShape::read(&el), Err(ShapeError::MalformedShape { .. })));
    }

    #[test]
    fn polyline_prefers_point_list() {
        let el = Element::new("polyline")
            .with_attr("points", "0 0 1 1")
            .with_point_list(vec![Point::new(10.0, 10.0), Point::new(30.0, 20.0)]);
        let shape = PolylineShape::read(&el).unwrap();
        assert_eq!(shape.native_bounds(), Bounds::new(10.0, 10.0, 20.0, 10.0));
    }

    #[test]
    fn line_commit_keeps_direction() {
        // runs from bottom-left to top-right
        let mut el = Element::new("line")
            .with_attr("x1", "0")
            .with_attr("y1", "10")
            .with_attr("x2", "10")
            .with_attr("y2", "0");
        let mut line = LineShape::read(&el).unwrap();
        let old = line.native_bounds();
        line.commit(&mut el, &old, &Bounds::new(100.0, 100.0, 20.0, 40.0));
        assert_eq!(line.endpoints(), (Point::new(100.0, 140.0), Point::new(120.0, 100.0)));
        assert_eq!(el.attr("y1"), Some("140"));
        assert_eq!(el.attr("y2"), Some("100"));
    }

    #[test]
    fn path_polygon_is_lazy_and_reset_on_commit() {
        let mut el = Element::new("path").with_attr("d", "M0 0 L10 0 L10 10 L0 10 Z");
        let mut path = PathShape::read(&el).unwrap();
        assert!(!path.has_cached_polygon());
        assert!(path.contains(5.0, 5.0));
        assert!(path.has_cached_polygon());

        let old = path.native_bounds();
        path.commit(&mut el, &old, &Bounds::new(0.0, 0.0, 20.0, 20.0));
        assert!(!path.has_cached_polygon());
        assert_eq!(el.attr("d"), Some("M0 0 L20 0 L20 20 L0 20 Z"));
        assert!(path.contains(15.0, 15.0));
    }
}
