//! Geometry kernel: stateless predicates and constructions on points, lines,
//! polygons and ellipses.
//!
//! Coordinates are SVG user units with y growing downward. Submodules:
//! - `matrix`: determinants, inversion and point/box transforms
//! - `clip`: Cohen-Sutherland line clipping

pub mod clip;
pub mod matrix;

pub use clip::{OutCode, clip_line_on_rect, compute_out_code, is_rect_over_line};
pub use matrix::{get_determinant, invert_matrix, transform_point, transformed_bounding_box};

use crate::defaults;
use crate::errors::GeometryError;
use crate::types::Point;
use glam::DVec2;

/// Arithmetic mean of two points.
pub fn midpoint(p1: Point, p2: Point) -> Point {
    Point::from((p1.as_dvec2() + p2.as_dvec2()) / 2.0)
}

/// Euclidean distance between two points.
pub fn distance(p1: Point, p2: Point) -> f64 {
    p1.as_dvec2().distance(p2.as_dvec2())
}

/// Where `between` sits along `p1 -> p2`, as `|p1 between| / |p1 p2|`.
///
/// Returns 0 for a degenerate segment.
pub fn relative_position(p1: Point, p2: Point, between: Point) -> f64 {
    let full = distance(p1, p2);
    if full == 0.0 { 0.0 } else { distance(p1, between) / full }
}

/// Whether `(px, py)` lies on the segment `(x1, y1) -> (x2, y2)`, give or take `offset`.
///
/// Near-vertical and near-horizontal segments (within `offset`) are tested as
/// axis-aligned strips so the slope never blows up. Everything else must lie
/// inside the segment's bounding box and within `offset` of the line
/// `y = s * x + b`, measured vertically.
pub fn is_point_in_line(px: f64, py: f64, x1: f64, y1: f64, x2: f64, y2: f64, offset: f64) -> bool {
    let offset = if offset == 0.0 || offset.is_nan() { defaults::LINE_OFFSET } else { offset.abs() };

    let (min_x, max_x) = (x1.min(x2), x1.max(x2));
    let (min_y, max_y) = (y1.min(y2), y1.max(y2));

    // vertical
    if (x1 - x2).abs() <= offset
        && (px - x1).abs() <= offset
        && py - max_y <= offset
        && min_y - py <= offset
    {
        return true;
    }

    // horizontal
    if (y1 - y2).abs() <= offset
        && (py - y1).abs() <= offset
        && px - max_x <= offset
        && min_x - px <= offset
    {
        return true;
    }

    if px > max_x || px < min_x || py > max_y || py < min_y {
        return false;
    }

    let s = (y1 - y2) / (x1 - x2);
    (py - (s * px + y1 - s * x1)).abs() < offset
}

/// Strict inside test for an axis-aligned ellipse.
///
/// All of `cx, cy, rx, ry` must be set; NaN marks an unset value.
pub fn is_point_in_ellipse(px: f64, py: f64, cx: f64, cy: f64, rx: f64, ry: f64) -> Result<bool, GeometryError> {
    if cx.is_nan() || cy.is_nan() || rx.is_nan() || ry.is_nan() {
        return Err(GeometryError::invalid(
            "ellipse test needs a centre (cx, cy) and both radii (rx, ry)",
        ));
    }
    let tx = (px - cx) / rx;
    let ty = (py - cy) / ry;
    Ok(tx * tx + ty * ty < 1.0)
}

/// Crossing-number test against a polygon given as flat `x, y` pairs.
///
/// The polygon is closed implicitly. A point exactly on an edge counts as inside.
pub fn is_point_in_polygon(px: f64, py: f64, vertices: &[f64]) -> Result<bool, GeometryError> {
    if vertices.len() < 2 {
        return Err(GeometryError::invalid("polygon test needs at least one vertex"));
    }
    if vertices.len() % 2 != 0 {
        return Err(GeometryError::invalid(format!(
            "polygon coordinates come in x, y pairs, got {} values",
            vertices.len()
        )));
    }

    let mut ring: Vec<f64> = vertices.to_vec();
    let last = ring.len() - 1;
    if ring[0] != ring[last - 1] || ring[1] != ring[last] {
        ring.push(vertices[0]);
        ring.push(vertices[1]);
    }

    let mut crossings = 0usize;
    for edge in ring.windows(4).step_by(2) {
        let (x1, y1, x2, y2) = (edge[0], edge[1], edge[2], edge[3]);
        let d = (py - y1) * (x2 - x1) - (px - x1) * (y2 - y1);

        if (y1 >= py) != (y2 >= py) {
            let to_the_right = if y2 - y1 >= 0.0 { d >= 0.0 } else { d <= 0.0 };
            if to_the_right {
                crossings += 1;
            }
        }

        if d == 0.0
            && x1.min(x2) <= px
            && px <= x1.max(x2)
            && y1.min(y2) <= py
            && py <= y1.max(y2)
        {
            return Ok(true);
        }
    }

    Ok(crossings % 2 == 1)
}

/// Foot of the perpendicular from `point` onto the line through `p1, p2`.
///
/// `None` when the line is degenerate or, with `segment_only`, when the foot
/// falls outside the segment.
pub fn get_intersection_point_on_line(p1: Point, p2: Point, point: Point, segment_only: bool) -> Option<Point> {
    let (a, b, p) = (p1.as_dvec2(), p2.as_dvec2(), point.as_dvec2());
    let dir = b - a;
    let denominator = dir.length_squared();
    if denominator == 0.0 {
        return None;
    }
    let u = (p - a).dot(dir) / denominator;
    if segment_only && !(0.0..=1.0).contains(&u) {
        return None;
    }
    Some(Point::from(a + dir * u))
}

/// Distance from `point` to the line through `p1, p2` (or the segment, with `segment_only`).
pub fn distance_to_line(p1: Point, p2: Point, point: Point, segment_only: bool) -> Option<f64> {
    get_intersection_point_on_line(p1, p2, point, segment_only).map(|foot| distance(point, foot))
}

/// Vector from `p1` to `p2`.
pub fn vector(p1: Point, p2: Point) -> Point {
    p2 - p1
}

/// Unit vector in the direction of `v`; the zero vector maps to itself.
pub fn identity_vector(v: Point) -> Point {
    let v = v.as_dvec2();
    let length = v.length();
    let length = if length == 0.0 { 1.0 } else { length };
    Point::from(v / length)
}

/// Unit vector from `p1` towards `p2`.
pub fn identity_vector_between(p1: Point, p2: Point) -> Point {
    identity_vector(vector(p1, p2))
}

/// `v` rotated by 90 degrees: `(x, y) -> (y, -x)`.
pub fn orthogonal_identity_vector(v: Point) -> Point {
    Point::new(v.y, -v.x)
}

/// Orthogonal of the unit vector from `p1` towards `p2`.
pub fn orthogonal_identity_vector_between(p1: Point, p2: Point) -> Point {
    orthogonal_identity_vector(identity_vector_between(p1, p2))
}

/// Linear interpolation with `relative` clamped to `[0, 1]`.
///
/// The clamped extremes return the input points unchanged.
pub fn point_between(p1: Point, p2: Point, relative: f64) -> Point {
    let relative = if relative.is_nan() { 0.0 } else { relative.clamp(0.0, 1.0) };
    if relative == 0.0 {
        return p1;
    }
    if relative == 1.0 {
        return p2;
    }
    Point::from(p1.as_dvec2().lerp(p2.as_dvec2(), relative))
}

/// Sign of the cross product `(p2 - p1) x (point - p1)`; positive is left.
pub fn is_left_of_line(p1: Point, p2: Point, point: Point) -> bool {
    let dir: DVec2 = (p2 - p1).into();
    let rel: DVec2 = (point - p1).into();
    dir.perp_dot(rel) > 0.0
}

/// Direction of `p1 -> p2` in degrees, `[0, 360)`.
///
/// Straight right is 0 and straight up the screen (decreasing y) is 90.
/// Coincident points give 0.
pub fn get_angle(p1: Point, p2: Point) -> f64 {
    if p1 == p2 {
        return 0.0;
    }
    let dy = (p1.y - p2.y).abs();
    let angle = (dy / distance(p1, p2)).asin().to_degrees();

    if p2.x >= p1.x && p2.y <= p1.y {
        angle
    } else if p2.x < p1.x && p2.y <= p1.y {
        180.0 - angle
    } else if p2.x < p1.x && p2.y > p1.y {
        180.0 + angle
    } else {
        360.0 - angle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn midpoint_is_mean() {
        assert_eq!(midpoint(Point::new(0.0, 0.0), Point::new(4.0, -6.0)), Point::new(2.0, -3.0));
    }

    #[test]
    fn point_on_diagonal_is_in_line() {
        assert!(is_point_in_line(5.0, 5.0, 0.0, 0.0, 10.0, 10.0, 1.0));
        assert!(!is_point_in_line(5.0, 8.0, 0.0, 0.0, 10.0, 10.0, 1.0));
    }

    #[test]
    fn line_test_handles_vertical_and_horizontal() {
        // vertical segment, slope would be infinite
        assert!(is_point_in_line(10.5, 50.0, 10.0, 0.0, 10.0, 100.0, 1.0));
        assert!(!is_point_in_line(12.0, 50.0, 10.0, 0.0, 10.0, 100.0, 1.0));
        // just past the end, within tolerance
        assert!(is_point_in_line(10.0, 100.8, 10.0, 0.0, 10.0, 100.0, 1.0));
        // horizontal
        assert!(is_point_in_line(50.0, 0.5, 0.0, 0.0, 100.0, 0.0, 1.0));
        assert!(!is_point_in_line(50.0, 3.0, 0.0, 0.0, 100.0, 0.0, 1.0));
    }

    #[test]
    fn line_test_rejects_outside_bounding_box() {
        assert!(!is_point_in_line(20.0, 20.0, 0.0, 0.0, 10.0, 10.0, 1.0));
    }

    #[test]
    fn zero_offset_falls_back_to_default() {
        assert!(is_point_in_line(5.0, 5.5, 0.0, 0.0, 10.0, 10.0, 0.0));
    }

    #[test]
    fn ellipse_inside_outside_boundary() {
        assert_eq!(is_point_in_ellipse(0.0, 0.0, 0.0, 0.0, 10.0, 5.0), Ok(true));
        assert_eq!(is_point_in_ellipse(9.0, 0.0, 0.0, 0.0, 10.0, 5.0), Ok(true));
        assert_eq!(is_point_in_ellipse(0.0, 6.0, 0.0, 0.0, 10.0, 5.0), Ok(false));
        // boundary is outside (strict)
        assert_eq!(is_point_in_ellipse(10.0, 0.0, 0.0, 0.0, 10.0, 5.0), Ok(false));
        assert_eq!(is_point_in_ellipse(0.0, 5.0, 0.0, 0.0, 10.0, 5.0), Ok(false));
    }

    #[test]
    fn ellipse_requires_all_parameters() {
        let err = is_point_in_ellipse(0.0, 0.0, 0.0, 0.0, f64::NAN, 5.0).unwrap_err();
        assert!(matches!(err, GeometryError::InvalidArgument { .. }));
    }

    #[test]
    fn polygon_inside_and_outside() {
        let square = [0.0, 0.0, 10.0, 0.0, 10.0, 10.0, 0.0, 10.0];
        assert_eq!(is_point_in_polygon(5.0, 5.0, &square), Ok(true));
        assert_eq!(is_point_in_polygon(15.0, 5.0, &square), Ok(false));
        assert_eq!(is_point_in_polygon(-1.0, 5.0, &square), Ok(false));
    }

    #[test]
    fn polygon_point_on_edge_is_inside() {
        let triangle = [0.0, 0.0, 10.0, 0.0, 5.0, 10.0];
        assert_eq!(is_point_in_polygon(5.0, 0.0, &triangle), Ok(true));
        assert_eq!(is_point_in_polygon(0.0, 0.0, &triangle), Ok(true));
        // midpoint of the closing edge (5,10) -> (0,0)
        assert_eq!(is_point_in_polygon(2.5, 5.0, &triangle), Ok(true));
    }

    #[test]
    fn polygon_answer_ignores_start_vertex() {
        let concave = [0.0, 0.0, 10.0, 0.0, 10.0, 10.0, 5.0, 4.0, 0.0, 10.0];
        let probes = [(5.0, 2.0), (5.0, 8.0), (1.0, 8.0), (9.0, 8.0), (11.0, 1.0), (5.0, 4.0)];
        let n = concave.len() / 2;
        for rotation in 0..n {
            let mut rotated = Vec::with_capacity(concave.len());
            for i in 0..n {
                let v = (i + rotation) % n;
                rotated.push(concave[2 * v]);
                rotated.push(concave[2 * v + 1]);
            }
            for (px, py) in probes {
                assert_eq!(
                    is_point_in_polygon(px, py, &rotated),
                    is_point_in_polygon(px, py, &concave),
                    "probe ({px}, {py}) rotation {rotation}"
                );
            }
        }
        assert_eq!(is_point_in_polygon(5.0, 8.0, &concave), Ok(false));
        assert_eq!(is_point_in_polygon(1.0, 8.0, &concave), Ok(true));
    }

    #[test]
    fn polygon_already_closed_is_not_doubled() {
        let closed = [0.0, 0.0, 10.0, 0.0, 10.0, 10.0, 0.0, 10.0, 0.0, 0.0];
        assert_eq!(is_point_in_polygon(5.0, 5.0, &closed), Ok(true));
    }

    #[test]
    fn polygon_rejects_missing_vertices() {
        assert!(is_point_in_polygon(0.0, 0.0, &[]).is_err());
        assert!(is_point_in_polygon(0.0, 0.0, &[1.0, 2.0, 3.0]).is_err());
    }

    #[test]
    fn projection_onto_line() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(10.0, 0.0);
        assert_eq!(get_intersection_point_on_line(a, b, Point::new(3.0, 4.0), true), Some(Point::new(3.0, 0.0)));
        assert_eq!(distance_to_line(a, b, Point::new(3.0, 4.0), true), Some(4.0));
        // beyond the end
        assert_eq!(distance_to_line(a, b, Point::new(13.0, 4.0), true), None);
        assert_eq!(distance_to_line(a, b, Point::new(13.0, 4.0), false), Some(4.0));
        // degenerate line
        assert_eq!(get_intersection_point_on_line(a, a, Point::new(1.0, 1.0), false), None);
    }

    #[test]
    fn identity_vectors() {
        let v = identity_vector_between(Point::new(0.0, 0.0), Point::new(3.0, 4.0));
        assert!(close(v.x, 0.6) && close(v.y, 0.8));
        assert_eq!(identity_vector(Point::ORIGIN), Point::ORIGIN);
        assert_eq!(orthogonal_identity_vector(Point::new(1.0, 0.0)), Point::new(0.0, -1.0));
        let o = orthogonal_identity_vector_between(Point::new(0.0, 0.0), Point::new(0.0, 5.0));
        assert!(close(o.x, 1.0) && close(o.y, 0.0));
    }

    #[test]
    fn point_between_clamps() {
        let a = Point::new(0.1, 0.2);
        let b = Point::new(10.3, 20.7);
        assert_eq!(point_between(a, b, -3.0), a);
        assert_eq!(point_between(a, b, 0.0), a);
        assert_eq!(point_between(a, b, 1.0), b);
        assert_eq!(point_between(a, b, 7.0), b);
        let mid = point_between(Point::ORIGIN, Point::new(10.0, 20.0), 0.5);
        assert_eq!(mid, Point::new(5.0, 10.0));
    }

    #[test]
    fn left_of_line() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(10.0, 0.0);
        assert!(is_left_of_line(a, b, Point::new(5.0, 3.0)));
        assert!(!is_left_of_line(a, b, Point::new(5.0, -3.0)));
        assert!(!is_left_of_line(a, b, Point::new(5.0, 0.0)));
    }

    #[test]
    fn angles() {
        let o = Point::ORIGIN;
        assert_eq!(get_angle(o, o), 0.0);
        assert_eq!(get_angle(o, Point::new(10.0, 0.0)), 0.0);
        assert!(close(get_angle(o, Point::new(0.0, -10.0)), 90.0));
        assert!(close(get_angle(o, Point::new(-10.0, 0.0)), 180.0));
        assert!(close(get_angle(o, Point::new(0.0, 10.0)), 270.0));
        assert!(close(get_angle(o, Point::new(10.0, -10.0)), 45.0));
        assert!(close(get_angle(o, Point::new(10.0, 10.0)), 315.0));
        let a = get_angle(o, Point::new(10.0, 0.0001));
        assert!((0.0..360.0).contains(&a));
    }

    #[test]
    fn relative_position_along_segment() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(10.0, 0.0);
        assert!(close(relative_position(a, b, Point::new(2.5, 0.0)), 0.25));
        assert_eq!(relative_position(a, a, b), 0.0);
    }
}
