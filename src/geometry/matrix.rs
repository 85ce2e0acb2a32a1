//! Affine matrix helpers: mapping local shape coordinates onto the canvas

use crate::errors::GeometryError;
use crate::types::{AffineMatrix, Bounds, Point};

/// Determinant of the 3x3 affine matrix `[[a c e] [b d f] [0 0 1]]`.
///
/// Cofactor expansion along the last row, which only leaves `a*d - c*b`.
pub fn get_determinant(m: &AffineMatrix) -> f64 {
    m.a * m.d - m.c * m.b
}

/// Closed-form inverse (adjugate over determinant).
pub fn invert_matrix(m: &AffineMatrix) -> Result<AffineMatrix, GeometryError> {
    let det = get_determinant(m);
    if det == 0.0 || !det.is_finite() {
        return Err(GeometryError::invalid(format!("matrix {m:?} is not invertible")));
    }
    Ok(AffineMatrix {
        a: m.d / det,
        b: -m.b / det,
        c: -m.c / det,
        d: m.a / det,
        e: (m.c * m.f - m.e * m.d) / det,
        f: (m.e * m.b - m.a * m.f) / det,
    })
}

/// Apply `[a c e; b d f]` to `(x, y, 1)`.
pub fn transform_point(point: Point, m: &AffineMatrix) -> Point {
    Point::new(
        m.a * point.x + m.c * point.y + m.e,
        m.b * point.x + m.d * point.y + m.f,
    )
}

/// Axis-aligned box around all four transformed corners of `local`.
///
/// Rotation and skew can make this larger than the transformed upper-left plus size.
pub fn transformed_bounding_box(local: &Bounds, m: &AffineMatrix) -> Bounds {
    let ul = local.upper_left();
    let lr = local.lower_right();
    let corners = [
        ul,
        Point::new(ul.x, lr.y),
        Point::new(lr.x, ul.y),
        lr,
    ]
    .map(|corner| transform_point(corner, m));

    // four corners, never empty
    Bounds::enclosing(corners).unwrap_or(*local)
}
