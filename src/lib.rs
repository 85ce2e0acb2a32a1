//! Geometry and shape-tree core of a BPMN diagram editor.
//!
//! Three layers, leaves first:
//!
//! - [`geometry`]: point, line, polygon and ellipse predicates, affine matrices
//!   and Cohen-Sutherland clipping
//! - [`shape`]: [`ShapeGeometry`] adapters that give every SVG primitive the same
//!   bounds interface and hit-test through the kernel
//! - [`model`]: the [`ShapeTree`] of diagram shapes with typed properties, dirty
//!   tracking, change notification and the flat and JSON serialization formats
//!
//! ```
//! use shapecore::{Bounds, Element, ShapeGeometry};
//!
//! let rect = Element::new("rect")
//!     .with_attr("x", "10")
//!     .with_attr("y", "10")
//!     .with_attr("width", "100")
//!     .with_attr("height", "50");
//! let mut shape = ShapeGeometry::from_element(rect)?;
//! shape.set_bounds(Bounds::new(20.0, 10.0, 100.0, 50.0));
//! shape.update();
//! assert_eq!(shape.element().attr("x"), Some("20"));
//! # Ok::<(), shapecore::ShapeError>(())
//! ```

pub mod defaults;
pub mod errors;
pub mod geometry;
pub mod log;
pub mod model;
pub mod shape;
pub mod svg;
pub mod types;

pub use errors::{GeometryError, ModelError, ShapeError};
pub use model::events::{ListenerId, PropertyChanged, PropertyListener};
pub use model::json::ShapeJson;
pub use model::property::PropertyValue;
pub use model::serialize::SerializedProperty;
pub use model::stencil::{Stencil, StencilSet};
pub use model::{Docker, NodeId, ShapeRole, ShapeTree};
pub use shape::{ShapeGeometry, ShapeKind};
pub use svg::Element;
pub use types::{AffineMatrix, Bounds, NumericError, Point};
