//! Value types shared by the kernel, the shape adapters and the tree model.
//!
//! - `Point` is a plain value; every kernel function returns fresh points.
//! - `Bounds` can't hold a negative extent: it is stored as two normalized corners.
//! - `AffineMatrix` mirrors SVG's `matrix(a b c d e f)`.

use std::fmt;
use std::ops::{Add, Sub};

use glam::{DAffine2, DMat2, DVec2, dvec2};
use serde::{Deserialize, Serialize};

/// Error type for invalid numeric values
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumericError {
    /// Value is NaN
    NaN,
    /// Value is infinite
    Infinite,
    /// Value is negative when a width or height was expected
    Negative,
}

impl fmt::Display for NumericError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumericError::NaN => write!(f, "value is NaN"),
            NumericError::Infinite => write!(f, "value is infinite"),
            NumericError::Negative => write!(f, "value is negative"),
        }
    }
}

impl std::error::Error for NumericError {}

fn check_finite(val: f64) -> Result<f64, NumericError> {
    if val.is_nan() {
        Err(NumericError::NaN)
    } else if val.is_infinite() {
        Err(NumericError::Infinite)
    } else {
        Ok(val)
    }
}

fn check_extent(val: f64) -> Result<f64, NumericError> {
    let val = check_finite(val)?;
    if val < 0.0 { Err(NumericError::Negative) } else { Ok(val) }
}

/// A 2D point (also used for vectors, as the editor does)
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }

    #[inline]
    pub fn as_dvec2(self) -> DVec2 {
        dvec2(self.x, self.y)
    }
}

impl From<DVec2> for Point {
    fn from(v: DVec2) -> Self {
        Point { x: v.x, y: v.y }
    }
}

impl From<Point> for DVec2 {
    fn from(p: Point) -> Self {
        p.as_dvec2()
    }
}

impl Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Axis-aligned rectangle, upper-left and lower-right corners.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Bounds {
    upper_left: Point,
    lower_right: Point,
}

impl Bounds {
    /// Build from two arbitrary corners; the result is always normalized.
    pub fn from_corners(a: Point, b: Point) -> Self {
        Bounds {
            upper_left: Point::new(a.x.min(b.x), a.y.min(b.y)),
            lower_right: Point::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    /// Create from position and size, rejecting NaN, infinities and negative sizes.
    pub fn try_new(x: f64, y: f64, width: f64, height: f64) -> Result<Self, NumericError> {
        let x = check_finite(x)?;
        let y = check_finite(y)?;
        let width = check_extent(width)?;
        let height = check_extent(height)?;
        Ok(Bounds {
            upper_left: Point::new(x, y),
            lower_right: Point::new(x + width, y + height),
        })
    }

    /// Unchecked variant for literal values; negative sizes are normalized away.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Bounds::from_corners(Point::new(x, y), Point::new(x + width, y + height))
    }

    pub fn x(&self) -> f64 {
        self.upper_left.x
    }

    pub fn y(&self) -> f64 {
        self.upper_left.y
    }

    pub fn upper_left(&self) -> Point {
        self.upper_left
    }

    pub fn lower_right(&self) -> Point {
        self.lower_right
    }

    pub fn width(&self) -> f64 {
        self.lower_right.x - self.upper_left.x
    }

    pub fn height(&self) -> f64 {
        self.lower_right.y - self.upper_left.y
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.upper_left.x + self.lower_right.x) / 2.0,
            (self.upper_left.y + self.lower_right.y) / 2.0,
        )
    }

    /// Inclusive containment test, widened outwards by `offset` on every side.
    pub fn is_included(&self, x: f64, y: f64, offset: f64) -> bool {
        let offset = offset.abs();
        self.upper_left.x - offset <= x
            && x <= self.lower_right.x + offset
            && self.upper_left.y - offset <= y
            && y <= self.lower_right.y + offset
    }

    /// Whether `other` lies completely inside these bounds.
    pub fn contains_bounds(&self, other: &Bounds) -> bool {
        self.is_included(other.upper_left.x, other.upper_left.y, 0.0)
            && self.is_included(other.lower_right.x, other.lower_right.y, 0.0)
    }

    pub fn translate(&self, dx: f64, dy: f64) -> Bounds {
        let delta = Point::new(dx, dy);
        Bounds {
            upper_left: self.upper_left + delta,
            lower_right: self.lower_right + delta,
        }
    }

    /// Same size, moved so its upper-left corner sits at `p`.
    pub fn with_upper_left(&self, p: Point) -> Bounds {
        self.translate(p.x - self.upper_left.x, p.y - self.upper_left.y)
    }

    /// Smallest bounds covering both.
    pub fn include(&self, other: &Bounds) -> Bounds {
        Bounds {
            upper_left: Point::new(
                self.upper_left.x.min(other.upper_left.x),
                self.upper_left.y.min(other.upper_left.y),
            ),
            lower_right: Point::new(
                self.lower_right.x.max(other.lower_right.x),
                self.lower_right.y.max(other.lower_right.y),
            ),
        }
    }

    /// Bounding box of a point cloud; `None` for an empty one.
    pub fn enclosing(points: impl IntoIterator<Item = Point>) -> Option<Bounds> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let initial = Bounds::from_corners(first, first);
        Some(iter.fold(initial, |acc, p| acc.include(&Bounds::from_corners(p, p))))
    }
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}x{}", self.upper_left, self.width(), self.height())
    }
}

/// 2D affine transform `[[a c e] [b d f] [0 0 1]]`
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AffineMatrix {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Default for AffineMatrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl AffineMatrix {
    pub const IDENTITY: AffineMatrix = AffineMatrix { a: 1.0, b: 0.0, c: 0.0, d: 1.0, e: 0.0, f: 0.0 };

    pub const fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        AffineMatrix { a, b, c, d, e, f }
    }

    pub fn translation(tx: f64, ty: f64) -> Self {
        AffineMatrix { e: tx, f: ty, ..Self::IDENTITY }
    }

    pub fn scale(sx: f64, sy: f64) -> Self {
        AffineMatrix { a: sx, d: sy, ..Self::IDENTITY }
    }

    /// Rotation by `degrees`, clockwise on screen (y grows downward), as SVG's `rotate()`
    pub fn rotation(degrees: f64) -> Self {
        let (sin, cos) = degrees.to_radians().sin_cos();
        AffineMatrix::new(cos, sin, -sin, cos, 0.0, 0.0)
    }

    /// `self * other`: apply `other` first, then `self`.
    pub fn multiply(&self, other: &AffineMatrix) -> AffineMatrix {
        AffineMatrix {
            a: self.a * other.a + self.c * other.b,
            b: self.b * other.a + self.d * other.b,
            c: self.a * other.c + self.c * other.d,
            d: self.b * other.c + self.d * other.d,
            e: self.a * other.e + self.c * other.f + self.e,
            f: self.b * other.e + self.d * other.f + self.f,
        }
    }

    /// Component-wise comparison with an absolute tolerance.
    pub fn approx_eq(&self, other: &AffineMatrix, epsilon: f64) -> bool {
        [
            self.a - other.a,
            self.b - other.b,
            self.c - other.c,
            self.d - other.d,
            self.e - other.e,
            self.f - other.f,
        ]
        .iter()
        .all(|delta| delta.abs() <= epsilon)
    }
}

impl From<AffineMatrix> for DAffine2 {
    fn from(m: AffineMatrix) -> Self {
        DAffine2 {
            matrix2: DMat2::from_cols(dvec2(m.a, m.b), dvec2(m.c, m.d)),
            translation: dvec2(m.e, m.f),
        }
    }
}

impl From<DAffine2> for AffineMatrix {
    fn from(m: DAffine2) -> Self {
        AffineMatrix {
            a: m.matrix2.x_axis.x,
            b: m.matrix2.x_axis.y,
            c: m.matrix2.y_axis.x,
            d: m.matrix2.y_axis.y,
            e: m.translation.x,
            f: m.translation.y,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Bounds tests ====================

    #[test]
    fn bounds_from_corners_normalizes() {
        let b = Bounds::from_corners(Point::new(10.0, 40.0), Point::new(2.0, 5.0));
        assert_eq!(b.upper_left(), Point::new(2.0, 5.0));
        assert_eq!(b.lower_right(), Point::new(10.0, 40.0));
        assert_eq!(b.width(), 8.0);
        assert_eq!(b.height(), 35.0);
    }

    #[test]
    fn bounds_try_new_rejects_bad_values() {
        assert_eq!(Bounds::try_new(0.0, 0.0, -1.0, 1.0), Err(NumericError::Negative));
        assert_eq!(Bounds::try_new(f64::NAN, 0.0, 1.0, 1.0), Err(NumericError::NaN));
        assert_eq!(Bounds::try_new(0.0, 0.0, 1.0, f64::INFINITY), Err(NumericError::Infinite));
        assert!(Bounds::try_new(-5.0, -5.0, 0.0, 0.0).is_ok());
    }

    #[test]
    fn bounds_new_never_goes_negative() {
        let b = Bounds::new(10.0, 10.0, -4.0, -6.0);
        assert_eq!(b.x(), 6.0);
        assert_eq!(b.y(), 4.0);
        assert_eq!(b.width(), 4.0);
        assert_eq!(b.height(), 6.0);
    }

    #[test]
    fn bounds_is_included_is_inclusive() {
        let b = Bounds::new(0.0, 0.0, 10.0, 10.0);
        assert!(b.is_included(0.0, 0.0, 0.0));
        assert!(b.is_included(10.0, 10.0, 0.0));
        assert!(!b.is_included(10.5, 5.0, 0.0));
        assert!(b.is_included(10.5, 5.0, 1.0));
        assert!(b.is_included(-0.5, -0.5, -1.0));
    }

    #[test]
    fn bounds_include_and_enclosing() {
        let a = Bounds::new(0.0, 0.0, 1.0, 1.0);
        let b = Bounds::new(5.0, -2.0, 1.0, 1.0);
        assert_eq!(a.include(&b), Bounds::new(0.0, -2.0, 6.0, 3.0));

        let cloud = [Point::new(3.0, 1.0), Point::new(-1.0, 4.0), Point::new(2.0, 2.0)];
        assert_eq!(Bounds::enclosing(cloud), Some(Bounds::new(-1.0, 1.0, 4.0, 3.0)));
        assert_eq!(Bounds::enclosing(std::iter::empty()), None);
    }

    #[test]
    fn bounds_translate_and_center() {
        let b = Bounds::new(0.0, 0.0, 4.0, 6.0).translate(1.0, 1.0);
        assert_eq!(b.center(), Point::new(3.0, 4.0));
        assert_eq!(b.with_upper_left(Point::ORIGIN), Bounds::new(0.0, 0.0, 4.0, 6.0));
        assert!(Bounds::new(0.0, 0.0, 10.0, 10.0).contains_bounds(&b));
    }

    // ==================== AffineMatrix tests ====================

    #[test]
    fn matrix_multiply_composes_right_to_left() {
        let t = AffineMatrix::translation(10.0, 0.0);
        let s = AffineMatrix::scale(2.0, 2.0);
        // scale first, then translate
        let m = t.multiply(&s);
        assert_eq!(m, AffineMatrix::new(2.0, 0.0, 0.0, 2.0, 10.0, 0.0));
    }

    #[test]
    fn matrix_glam_round_trip() {
        let m = AffineMatrix::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0);
        let g: DAffine2 = m.into();
        assert_eq!(g.transform_point2(dvec2(1.0, 1.0)), dvec2(1.0 + 3.0 + 5.0, 2.0 + 4.0 + 6.0));
        assert_eq!(AffineMatrix::from(g), m);
    }

    #[test]
    fn matrix_rotation_quarter_turn() {
        let g: DAffine2 = AffineMatrix::rotation(90.0).into();
        let p = g.transform_point2(dvec2(1.0, 0.0));
        assert!((p.x - 0.0).abs() < 1e-12);
        assert!((p.y - 1.0).abs() < 1e-12);
    }
}
