//! Error types with diagnostics using miette
//!
//! Structural problems (missing geometry, malformed shape data, bad tree
//! operations) are errors. Cosmetic problems such as a date that can't be
//! formatted are absorbed where they happen and never show up here.

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use crate::types::NumericError;

/// Source context for attribute values that failed to parse
#[derive(Debug, Clone)]
pub struct SourceContext {
    /// Name of the source (attribute name, e.g. `d` or `points`)
    pub name: String,
    /// The attribute value
    pub source: String,
}

impl SourceContext {
    /// Create a new source context
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }

    /// Create a NamedSource for miette
    pub fn named_source(&self) -> NamedSource<String> {
        NamedSource::new(&self.name, self.source.clone())
    }

    /// Span of a pest error inside this source
    pub fn span_of<R: pest::RuleType>(&self, err: &pest::error::Error<R>) -> SourceSpan {
        match err.location {
            pest::error::InputLocation::Pos(pos) => {
                let len = usize::from(pos < self.source.len());
                (pos, len).into()
            }
            pest::error::InputLocation::Span((start, end)) => (start, end - start).into(),
        }
    }
}

// ============================================================================
// Geometry Errors
// ============================================================================

/// Violated preconditions of the geometry kernel (caller bugs)
#[derive(Error, Diagnostic, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("invalid argument: {message}")]
    #[diagnostic(code(shapecore::geometry::invalid_argument))]
    InvalidArgument { message: String },
}

impl GeometryError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        GeometryError::InvalidArgument { message: message.into() }
    }
}

// ============================================================================
// Shape Errors
// ============================================================================

/// Errors raised while reading a native shape description
#[derive(Error, Diagnostic, Debug)]
pub enum ShapeError {
    #[error("missing attribute `{attribute}` in element <{element}>")]
    #[diagnostic(
        code(shapecore::shape::missing_attribute),
        help("the shape can't be placed without it; skip the shape or fix the stencil template")
    )]
    MissingAttribute { element: String, attribute: String },

    #[error("malformed <{element}>: {reason}")]
    #[diagnostic(code(shapecore::shape::malformed))]
    MalformedShape { element: String, reason: String },

    #[error("invalid number in `{attribute}`")]
    #[diagnostic(code(shapecore::shape::invalid_number))]
    InvalidNumber {
        attribute: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("expected a number here")]
        span: SourceSpan,
    },

    #[error("invalid path data: {message}")]
    #[diagnostic(code(shapecore::shape::path_syntax))]
    PathSyntax {
        message: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("here")]
        span: SourceSpan,
    },

    #[error("<{tag}> is not a shape element")]
    #[diagnostic(
        code(shapecore::shape::not_a_shape),
        help("supported elements: rect, image, circle, ellipse, line, polyline, polygon, path")
    )]
    NotAShape { tag: String },

    #[error("invalid bounds: {0}")]
    #[diagnostic(code(shapecore::shape::invalid_bounds))]
    InvalidBounds(#[from] NumericError),
}

// ============================================================================
// Model Errors
// ============================================================================

/// Errors from shape-tree operations and stencil lookups
#[derive(Error, Diagnostic, Debug)]
pub enum ModelError {
    #[error("unknown node {id}")]
    #[diagnostic(code(shapecore::model::unknown_node))]
    UnknownNode { id: String },

    #[error("unknown stencil: {id}")]
    #[diagnostic(
        code(shapecore::model::unknown_stencil),
        help("stencils are looked up by full id (`namespace#Id`) or by id alone")
    )]
    UnknownStencil { id: String },

    #[error("resource id already in use: {resource_id}")]
    #[diagnostic(code(shapecore::model::duplicate_resource_id))]
    DuplicateResourceId { resource_id: String },

    #[error("moving {child} under {parent} would make it its own ancestor")]
    #[diagnostic(code(shapecore::model::cycle))]
    WouldCreateCycle { child: String, parent: String },

    #[error("the canvas root can't be moved or removed")]
    #[diagnostic(code(shapecore::model::root_is_fixed))]
    RootIsFixed,

    #[error("invalid stencil set: {0}")]
    #[diagnostic(code(shapecore::model::stencil_set))]
    StencilSet(#[from] serde_json::Error),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Shape(#[from] ShapeError),
}
