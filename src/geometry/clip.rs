//! Cohen-Sutherland clipping of a segment against an axis-aligned rectangle

use crate::defaults::CLIP_ITERATION_LIMIT;
use crate::log::warn;
use crate::types::Point;

/// Region code of a point relative to the clip rectangle (4-bit mask).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct OutCode(u8);

impl OutCode {
    pub const INSIDE: OutCode = OutCode(0);
    pub const LEFT: OutCode = OutCode(1);
    pub const RIGHT: OutCode = OutCode(2);
    pub const BOTTOM: OutCode = OutCode(4);
    pub const TOP: OutCode = OutCode(8);

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn is_inside(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, other: OutCode) -> bool {
        self.0 & other.0 != 0
    }

    fn union(self, other: OutCode) -> OutCode {
        OutCode(self.0 | other.0)
    }

    fn shares_side_with(self, other: OutCode) -> bool {
        self.0 & other.0 != 0
    }
}

/// Classify `(x, y)` against `[xmin, xmax] x [ymin, ymax]`.
pub fn compute_out_code(x: f64, y: f64, xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> OutCode {
    let mut code = OutCode::INSIDE;
    if x < xmin {
        code = code.union(OutCode::LEFT);
    } else if x > xmax {
        code = code.union(OutCode::RIGHT);
    }
    if y < ymin {
        code = code.union(OutCode::BOTTOM);
    } else if y > ymax {
        code = code.union(OutCode::TOP);
    }
    code
}

/// The part of segment `(x1, y1) -> (x2, y2)` inside the rectangle, as `(a, b)`.
///
/// `None` when the segment misses the rectangle. Corners given in either order
/// are normalized. Gives up (and rejects) after `CLIP_ITERATION_LIMIT` rounds.
#[allow(clippy::too_many_arguments)]
pub fn clip_line_on_rect(
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    xmin: f64,
    ymin: f64,
    xmax: f64,
    ymax: f64,
) -> Option<(Point, Point)> {
    let (xmin, xmax) = if xmin > xmax { (xmax, xmin) } else { (xmin, xmax) };
    let (ymin, ymax) = if ymin > ymax { (ymax, ymin) } else { (ymin, ymax) };

    let (mut x0, mut y0, mut x1, mut y1) = (x1, y1, x2, y2);
    let mut code0 = compute_out_code(x0, y0, xmin, ymin, xmax, ymax);
    let mut code1 = compute_out_code(x1, y1, xmin, ymin, xmax, ymax);

    for _ in 0..CLIP_ITERATION_LIMIT {
        if code0.union(code1).is_inside() {
            return Some((Point::new(x0, y0), Point::new(x1, y1)));
        }
        if code0.shares_side_with(code1) {
            return None;
        }

        let outside = if code0.is_inside() { code1 } else { code0 };
        let (x, y) = if outside.contains(OutCode::TOP) {
            (x0 + (x1 - x0) * (ymax - y0) / (y1 - y0), ymax)
        } else if outside.contains(OutCode::BOTTOM) {
            (x0 + (x1 - x0) * (ymin - y0) / (y1 - y0), ymin)
        } else if outside.contains(OutCode::RIGHT) {
            (xmax, y0 + (y1 - y0) * (xmax - x0) / (x1 - x0))
        } else {
            (xmin, y0 + (y1 - y0) * (xmin - x0) / (x1 - x0))
        };

        if outside == code0 {
            x0 = x;
            y0 = y;
            code0 = compute_out_code(x0, y0, xmin, ymin, xmax, ymax);
        } else {
            x1 = x;
            y1 = y;
            code1 = compute_out_code(x1, y1, xmin, ymin, xmax, ymax);
        }
    }

    warn!(limit = CLIP_ITERATION_LIMIT, "line clipping did not converge, treating as outside");
    None
}

/// Whether the segment touches the rectangle at all.
#[allow(clippy::too_many_arguments)]
pub fn is_rect_over_line(
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    xmin: f64,
    ymin: f64,
    xmax: f64,
    ymax: f64,
) -> bool {
    clip_line_on_rect(x1, y1, x2, y2, xmin, ymin, xmax, ymax).is_some()
}
