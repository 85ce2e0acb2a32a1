//! Path data parsing and the handlers that consume parsed paths.
//!
//! Parsing turns a `d` attribute into [`PathSegment`]s. Implicit repetitions
//! are expanded (`M 0 0 10 10` becomes a move and a line) so every segment
//! carries exactly one command's worth of numbers.
//!
//! [`walk`] resolves each segment against the current point and hands both the
//! raw segment and its absolute points to a [`PathHandler`]:
//! - [`MinMaxHandler`] collects the bounds of a path
//! - [`PointsHandler`] collects a polygon approximation for hit-testing
//! - [`EditHandler`] rewrites the path for new bounds

use std::fmt;

use glam::{DVec2, dvec2};
use pest::Parser;

use super::{Rule, SvgParser};
use crate::errors::{ShapeError, SourceContext};
use crate::types::Bounds;

/// One path command with its parameters, as written (relative or absolute)
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathCommand {
    MoveTo { x: f64, y: f64 },
    LineTo { x: f64, y: f64 },
    HorizontalTo { x: f64 },
    VerticalTo { y: f64 },
    CubicTo { x1: f64, y1: f64, x2: f64, y2: f64, x: f64, y: f64 },
    SmoothCubicTo { x2: f64, y2: f64, x: f64, y: f64 },
    QuadTo { x1: f64, y1: f64, x: f64, y: f64 },
    SmoothQuadTo { x: f64, y: f64 },
    ArcTo { rx: f64, ry: f64, rotation: f64, large_arc: bool, sweep: bool, x: f64, y: f64 },
    Close,
}

impl PathCommand {
    fn letter(&self) -> char {
        match self {
            PathCommand::MoveTo { .. } => 'M',
            PathCommand::LineTo { .. } => 'L',
            PathCommand::HorizontalTo { .. } => 'H',
            PathCommand::VerticalTo { .. } => 'V',
            PathCommand::CubicTo { .. } => 'C',
            PathCommand::SmoothCubicTo { .. } => 'S',
            PathCommand::QuadTo { .. } => 'Q',
            PathCommand::SmoothQuadTo { .. } => 'T',
            PathCommand::ArcTo { .. } => 'A',
            PathCommand::Close => 'Z',
        }
    }

    fn numbers(&self) -> Vec<f64> {
        let flag = |b: bool| if b { 1.0 } else { 0.0 };
        match *self {
            PathCommand::MoveTo { x, y } | PathCommand::LineTo { x, y } | PathCommand::SmoothQuadTo { x, y } => vec![x, y],
            PathCommand::HorizontalTo { x } => vec![x],
            PathCommand::VerticalTo { y } => vec![y],
            PathCommand::CubicTo { x1, y1, x2, y2, x, y } => vec![x1, y1, x2, y2, x, y],
            PathCommand::SmoothCubicTo { x2, y2, x, y } => vec![x2, y2, x, y],
            PathCommand::QuadTo { x1, y1, x, y } => vec![x1, y1, x, y],
            PathCommand::ArcTo { rx, ry, rotation, large_arc, sweep, x, y } => {
                vec![rx, ry, rotation, flag(large_arc), flag(sweep), x, y]
            }
            PathCommand::Close => Vec::new(),
        }
    }

    /// Apply `fx` to x coordinates and `fy` to y coordinates. Radii scale with
    /// `rx`/`ry`; rotation and flags stay as they are.
    fn map(&self, fx: impl Fn(f64) -> f64, fy: impl Fn(f64) -> f64, rx: impl Fn(f64) -> f64, ry: impl Fn(f64) -> f64) -> PathCommand {
        match *self {
            PathCommand::MoveTo { x, y } => PathCommand::MoveTo { x: fx(x), y: fy(y) },
            PathCommand::LineTo { x, y } => PathCommand::LineTo { x: fx(x), y: fy(y) },
            PathCommand::HorizontalTo { x } => PathCommand::HorizontalTo { x: fx(x) },
            PathCommand::VerticalTo { y } => PathCommand::VerticalTo { y: fy(y) },
            PathCommand::CubicTo { x1, y1, x2, y2, x, y } => PathCommand::CubicTo {
                x1: fx(x1),
                y1: fy(y1),
                x2: fx(x2),
                y2: fy(y2),
                x: fx(x),
                y: fy(y),
            },
            PathCommand::SmoothCubicTo { x2, y2, x, y } => PathCommand::SmoothCubicTo {
                x2: fx(x2),
                y2: fy(y2),
                x: fx(x),
                y: fy(y),
            },
            PathCommand::QuadTo { x1, y1, x, y } => PathCommand::QuadTo { x1: fx(x1), y1: fy(y1), x: fx(x), y: fy(y) },
            PathCommand::SmoothQuadTo { x, y } => PathCommand::SmoothQuadTo { x: fx(x), y: fy(y) },
            PathCommand::ArcTo { rx: r_x, ry: r_y, rotation, large_arc, sweep, x, y } => PathCommand::ArcTo {
                rx: rx(r_x),
                ry: ry(r_y),
                rotation,
                large_arc,
                sweep,
                x: fx(x),
                y: fy(y),
            },
            PathCommand::Close => PathCommand::Close,
        }
    }
}

/// A command plus the case it was written in
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathSegment {
    pub command: PathCommand,
    pub relative: bool,
}

impl PathSegment {
    pub fn absolute(command: PathCommand) -> Self {
        Self { command, relative: false }
    }

    pub fn relative(command: PathCommand) -> Self {
        Self { command, relative: true }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = self.command.letter();
        let letter = if self.relative { letter.to_ascii_lowercase() } else { letter };
        write!(f, "{letter}")?;
        let numbers = self.command.numbers();
        for (i, n) in numbers.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{n}")?;
        }
        Ok(())
    }
}

/// Render segments back to `d` syntax.
pub fn format_path(segments: &[PathSegment]) -> String {
    segments.iter().map(ToString::to_string).collect::<Vec<_>>().join(" ")
}

fn arity(letter: char) -> usize {
    match letter.to_ascii_uppercase() {
        'Z' => 0,
        'H' | 'V' => 1,
        'M' | 'L' | 'T' => 2,
        'S' | 'Q' => 4,
        'C' => 6,
        'A' => 7,
        _ => usize::MAX,
    }
}

fn build_command(letter: char, n: &[f64], first: bool) -> PathCommand {
    match letter.to_ascii_uppercase() {
        'M' if first => PathCommand::MoveTo { x: n[0], y: n[1] },
        'M' | 'L' => PathCommand::LineTo { x: n[0], y: n[1] },
        'H' => PathCommand::HorizontalTo { x: n[0] },
        'V' => PathCommand::VerticalTo { y: n[0] },
        'C' => PathCommand::CubicTo { x1: n[0], y1: n[1], x2: n[2], y2: n[3], x: n[4], y: n[5] },
        'S' => PathCommand::SmoothCubicTo { x2: n[0], y2: n[1], x: n[2], y: n[3] },
        'Q' => PathCommand::QuadTo { x1: n[0], y1: n[1], x: n[2], y: n[3] },
        'T' => PathCommand::SmoothQuadTo { x: n[0], y: n[1] },
        'A' => PathCommand::ArcTo {
            rx: n[0],
            ry: n[1],
            rotation: n[2],
            large_arc: n[3] != 0.0,
            sweep: n[4] != 0.0,
            x: n[5],
            y: n[6],
        },
        _ => PathCommand::Close,
    }
}

/// Parse a `d` attribute.
pub fn parse_path(d: &str) -> Result<Vec<PathSegment>, ShapeError> {
    let ctx = SourceContext::new("d", d);
    let syntax = |message: String, span: miette::SourceSpan| ShapeError::PathSyntax {
        message,
        src: ctx.named_source(),
        span,
    };

    let mut pairs = SvgParser::parse(Rule::path_data, d)
        .map_err(|e| syntax("unexpected character in path data".to_string(), ctx.span_of(&e)))?;
    let Some(data) = pairs.next() else {
        return Ok(Vec::new());
    };

    let mut segments = Vec::new();
    for pair in data.into_inner() {
        if !matches!(pair.as_rule(), Rule::command | Rule::arc) {
            continue;
        }
        let span = pair.as_span();
        let span: miette::SourceSpan = (span.start(), span.end() - span.start()).into();
        let mut inner = pair.into_inner();
        let Some(letter) = inner.next().and_then(|token| token.as_str().chars().next()) else {
            continue;
        };
        let values = inner
            .map(|token| token.as_str().parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| syntax(e.to_string(), span))?;

        let arity = arity(letter);
        let relative = letter.is_ascii_lowercase();
        if arity == 0 {
            if !values.is_empty() {
                return Err(syntax(format!("`{letter}` takes no coordinates"), span));
            }
            segments.push(PathSegment { command: PathCommand::Close, relative });
            continue;
        }
        if values.is_empty() || values.len() % arity != 0 {
            return Err(syntax(
                format!("`{letter}` takes coordinates in groups of {arity}, got {}", values.len()),
                span,
            ));
        }
        for (i, chunk) in values.chunks(arity).enumerate() {
            segments.push(PathSegment {
                command: build_command(letter, chunk, i == 0),
                relative,
            });
        }
    }

    let starts_with_move = segments
        .first()
        .is_none_or(|first| matches!(first.command, PathCommand::MoveTo { .. }));
    if !starts_with_move {
        return Err(syntax("path data must start with a moveto".to_string(), (0, 1).into()));
    }
    // a leading `m` has no current point to be relative to
    if let Some(first) = segments.first_mut() {
        first.relative = false;
    }

    Ok(segments)
}

/// Receives every parsed segment together with its absolute points
pub trait PathHandler {
    /// `points` holds the segment's control points followed by its end point,
    /// all absolute. A close segment's only point is the subpath start.
    fn segment(&mut self, segment: &PathSegment, from: DVec2, points: &[DVec2]);
}

/// Feed `segments` to `handler`, tracking the current point.
pub fn walk(segments: &[PathSegment], handler: &mut impl PathHandler) {
    let mut current = DVec2::ZERO;
    let mut subpath_start = DVec2::ZERO;

    for segment in segments {
        let base = if segment.relative { current } else { DVec2::ZERO };
        let at = |x: f64, y: f64| base + dvec2(x, y);

        let points: Vec<DVec2> = match segment.command {
            PathCommand::MoveTo { x, y } | PathCommand::LineTo { x, y } | PathCommand::SmoothQuadTo { x, y } => {
                vec![at(x, y)]
            }
            PathCommand::HorizontalTo { x } => {
                let x = if segment.relative { current.x + x } else { x };
                vec![dvec2(x, current.y)]
            }
            PathCommand::VerticalTo { y } => {
                let y = if segment.relative { current.y + y } else { y };
                vec![dvec2(current.x, y)]
            }
            PathCommand::CubicTo { x1, y1, x2, y2, x, y } => vec![at(x1, y1), at(x2, y2), at(x, y)],
            PathCommand::SmoothCubicTo { x2, y2, x, y } | PathCommand::QuadTo { x1: x2, y1: y2, x, y } => {
                vec![at(x2, y2), at(x, y)]
            }
            PathCommand::ArcTo { x, y, .. } => vec![at(x, y)],
            PathCommand::Close => vec![subpath_start],
        };

        handler.segment(segment, current, &points);

        if let Some(end) = points.last() {
            current = *end;
        }
        if matches!(segment.command, PathCommand::MoveTo { .. }) {
            subpath_start = current;
        }
    }
}

/// Running min/max over every absolute coordinate, control points included
#[derive(Debug, Default)]
pub struct MinMaxHandler {
    min: Option<DVec2>,
    max: Option<DVec2>,
}

impl MinMaxHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` if no coordinates were seen.
    pub fn bounds(&self) -> Option<Bounds> {
        match (self.min, self.max) {
            (Some(min), Some(max)) => Some(Bounds::from_corners(min.into(), max.into())),
            _ => None,
        }
    }
}

impl PathHandler for MinMaxHandler {
    fn segment(&mut self, _segment: &PathSegment, _from: DVec2, points: &[DVec2]) {
        for p in points {
            self.min = Some(self.min.map_or(*p, |m| m.min(*p)));
            self.max = Some(self.max.map_or(*p, |m| m.max(*p)));
        }
    }
}

/// End points of all drawing segments as a flat polygon
#[derive(Debug, Default)]
pub struct PointsHandler {
    points: Vec<f64>,
}

impl PointsHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_points(self) -> Vec<f64> {
        self.points
    }
}

impl PathHandler for PointsHandler {
    fn segment(&mut self, segment: &PathSegment, _from: DVec2, points: &[DVec2]) {
        if segment.command == PathCommand::Close {
            return;
        }
        if let Some(end) = points.last() {
            self.points.push(end.x);
            self.points.push(end.y);
        }
    }
}

/// Rewrites a path for new bounds, keeping each segment's relative/absolute form
#[derive(Debug)]
pub struct EditHandler {
    new_origin: DVec2,
    old_origin: DVec2,
    scale: DVec2,
    segments: Vec<PathSegment>,
}

impl EditHandler {
    /// `scale` is new size over old size per axis (0 where the old size was 0).
    pub fn new(new_origin: DVec2, old_origin: DVec2, scale: DVec2) -> Self {
        Self {
            new_origin,
            old_origin,
            scale,
            segments: Vec::new(),
        }
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// The rewritten `d` attribute
    pub fn d(&self) -> String {
        format_path(&self.segments)
    }
}

impl PathHandler for EditHandler {
    fn segment(&mut self, segment: &PathSegment, _from: DVec2, _points: &[DVec2]) {
        let (sx, sy) = (self.scale.x, self.scale.y);
        let (ox, oy) = (self.old_origin.x, self.old_origin.y);
        let (nx, ny) = (self.new_origin.x, self.new_origin.y);
        let command = if segment.relative {
            segment.command.map(|x| x * sx, |y| y * sy, |r| r * sx, |r| r * sy)
        } else {
            segment
                .command
                .map(|x| (x - ox) * sx + nx, |y| (y - oy) * sy + ny, |r| r * sx, |r| r * sy)
        };
        self.segments.push(PathSegment {
            command,
            relative: segment.relative,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds_of(d: &str) -> Bounds {
        let segments = parse_path(d).unwrap();
        let mut handler = MinMaxHandler::new();
        walk(&segments, &mut handler);
        handler.bounds().unwrap()
    }

    #[test]
    fn parse_simple_path() {
        let result = SvgParser::parse(Rule::path_data, "M0,0 L10,10 Z");
        assert!(result.is_ok(), "Failed to parse: {:?}", result.err());
    }

    #[test]
    fn parse_compact_path() {
        let segments = parse_path("M10-5l5.5.5h-3z").unwrap();
        assert_eq!(
            segments,
            vec![
                PathSegment::absolute(PathCommand::MoveTo { x: 10.0, y: -5.0 }),
                PathSegment::relative(PathCommand::LineTo { x: 5.5, y: 0.5 }),
                PathSegment::relative(PathCommand::HorizontalTo { x: -3.0 }),
                PathSegment::relative(PathCommand::Close),
            ]
        );
    }

    #[test]
    fn implicit_lineto_after_moveto() {
        let segments = parse_path("M 0 0 10 10 20 0").unwrap();
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[1].command, PathCommand::LineTo { x: 10.0, y: 10.0 });
        assert_eq!(segments[2].command, PathCommand::LineTo { x: 20.0, y: 0.0 });
    }

    #[test]
    fn compact_arc_flags() {
        // `011 50 0` reads as flags 0 and 1 followed by 1, 50 and a stray 0
        let err = parse_path("M0 0 a25 25 0 011 50 0").unwrap_err();
        assert!(matches!(err, ShapeError::PathSyntax { .. }));

        let segments = parse_path("M0 0 a25 25 0 0150 0").unwrap();
        assert_eq!(
            segments[1].command,
            PathCommand::ArcTo { rx: 25.0, ry: 25.0, rotation: 0.0, large_arc: false, sweep: true, x: 50.0, y: 0.0 }
        );
    }

    #[test]
    fn rejects_bad_arity() {
        let err = parse_path("M0 0 C1 2 3 4").unwrap_err();
        match err {
            ShapeError::PathSyntax { message, span, .. } => {
                assert!(message.contains("groups of 6"), "{message}");
                assert_eq!(span.offset(), 5);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn rejects_garbage() {
        let err = parse_path("M0 0 X5").unwrap_err();
        match err {
            ShapeError::PathSyntax { span, .. } => assert_eq!(span.offset(), 5),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn rejects_missing_moveto() {
        assert!(parse_path("L 10 10").is_err());
        assert_eq!(parse_path("").unwrap(), Vec::new());
    }

    #[test]
    fn min_max_of_absolute_path() {
        assert_eq!(bounds_of("M10 20 L30 5 L15 40 Z"), Bounds::new(10.0, 5.0, 20.0, 35.0));
    }

    #[test]
    fn min_max_resolves_relative_commands() {
        // square of side 10 at (5, 5)
        assert_eq!(bounds_of("m5 5 h10 v10 h-10 z"), Bounds::new(5.0, 5.0, 10.0, 10.0));
    }

    #[test]
    fn leading_relative_moveto_is_absolute() {
        let segments = parse_path("m5 5 10 0 h10").unwrap();
        assert_eq!(segments[0], PathSegment::absolute(PathCommand::MoveTo { x: 5.0, y: 5.0 }));
        assert_eq!(segments[1], PathSegment::relative(PathCommand::LineTo { x: 10.0, y: 0.0 }));

        // bounds (5,5 10x10) -> (100,100 20x40)
        let segments = parse_path("m5 5 h10 v10 h-10 z").unwrap();
        let mut edit = EditHandler::new(dvec2(100.0, 100.0), dvec2(5.0, 5.0), dvec2(2.0, 4.0));
        walk(&segments, &mut edit);
        assert_eq!(edit.d(), "M100 100 h20 v40 h-20 z");
    }

    #[test]
    fn min_max_includes_control_points() {
        assert_eq!(bounds_of("M0 0 C0 -10 10 -10 10 0"), Bounds::new(0.0, -10.0, 10.0, 10.0));
    }

    #[test]
    fn close_returns_to_subpath_start() {
        let segments = parse_path("M0 0 L10 0 L10 10 Z l5 5").unwrap();
        let mut handler = PointsHandler::new();
        walk(&segments, &mut handler);
        // after Z the current point is back at (0, 0), so l5 5 ends at (5, 5)
        assert_eq!(handler.into_points(), vec![0.0, 0.0, 10.0, 0.0, 10.0, 10.0, 5.0, 5.0]);
    }

    #[test]
    fn edit_handler_scales_absolute_and_relative() {
        let segments = parse_path("M10 10 L20 10 l0 10 Z").unwrap();
        // bounds (10,10 10x10) -> (0,0 20x5)
        let mut edit = EditHandler::new(dvec2(0.0, 0.0), dvec2(10.0, 10.0), dvec2(2.0, 0.5));
        walk(&segments, &mut edit);
        assert_eq!(edit.d(), "M0 0 L20 0 l0 5 Z");
    }

    #[test]
    fn edit_handler_scales_arc_radii() {
        let segments = parse_path("M0 0 A5 5 30 1 0 10 0").unwrap();
        let mut edit = EditHandler::new(dvec2(0.0, 0.0), dvec2(0.0, 0.0), dvec2(2.0, 3.0));
        walk(&segments, &mut edit);
        assert_eq!(edit.d(), "M0 0 A10 15 30 1 0 20 0");
    }

    #[test]
    fn formatted_path_parses_back() {
        let d = "M0 0 C1 2 3 4 5 6 s1 1 2 2 Q0 1 2 3 t4 4 a1 2 0 1 1 5 5 z";
        let segments = parse_path(d).unwrap();
        assert_eq!(format_path(&segments), d);
        assert_eq!(parse_path(&format_path(&segments)).unwrap(), segments);
    }
}
