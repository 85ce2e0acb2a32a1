//! Default tolerances and naming conventions (editor units are SVG user units)

/// Perpendicular tolerance used by `is_point_in_line` when none is given.
pub const LINE_OFFSET: f64 = 1.0;

/// Tolerance around an edge's path when hit-testing connectors.
pub const OFFSET_EDGE_BOUNDS: f64 = 5.0;

/// Fail-safe for Cohen-Sutherland clipping on degenerate floating-point input.
pub const CLIP_ITERATION_LIMIT: usize = 5000;

/// Prefix assumed for properties that don't name one.
pub const PROPERTY_PREFIX: &str = "oryx";

/// Prefix of generated resource ids.
pub const RESOURCE_ID_PREFIX: &str = "oryx_";

/// Class that marks a shape's main `<g>` container.
pub const MAIN_GROUP_CLASS: &str = "me";

/// Namespace prefix of the editor's extension attributes (`oryx:resize`, ...).
pub const EXTENSION_NAMESPACE: &str = "oryx";
