//! Native shape descriptions and the attribute grammar they are written in
//!
//! An [`Element`] is the editor-independent stand-in for one SVG element of a
//! stencil template: a tag, an ordered attribute map and a link to the
//! containing group. The shape adapters read their geometry from it and write
//! updated geometry back into it.

pub mod path;

use std::rc::Rc;

use indexmap::IndexMap;
use pest::Parser;
use pest_derive::Parser;

use crate::defaults;
use crate::errors::{ShapeError, SourceContext};
use crate::types::Point;

#[derive(Parser)]
#[grammar = "svg.pest"]
pub struct SvgParser;

/// One SVG element of a stencil template
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    tag: String,
    attributes: IndexMap<String, String>,
    /// Structured point list (`SVGPointList`), preferred over the `points` attribute
    point_list: Option<Vec<Point>>,
    parent: Option<Rc<Element>>,
    revision: u64,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_point_list(mut self, points: Vec<Point>) -> Self {
        self.point_list = Some(points);
        self
    }

    pub fn with_parent(mut self, parent: Rc<Element>) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn attributes(&self) -> &IndexMap<String, String> {
        &self.attributes
    }

    pub fn parent(&self) -> Option<&Element> {
        self.parent.as_deref()
    }

    pub fn point_list(&self) -> Option<&[Point]> {
        self.point_list.as_deref()
    }

    /// Attribute value; empty values count as absent.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str).filter(|v| !v.is_empty())
    }

    /// Extension attribute, with or without the `oryx:` namespace prefix.
    pub fn extension_attr(&self, name: &str) -> Option<&str> {
        let qualified = format!("{}:{name}", defaults::EXTENSION_NAMESPACE);
        self.attr(&qualified).or_else(|| self.attr(name))
    }

    /// Set an attribute; returns `false` (and leaves the revision alone) if nothing changed.
    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) -> bool {
        let value = value.into();
        if self.attributes.get(name) == Some(&value) {
            return false;
        }
        self.attributes.insert(name.to_string(), value);
        self.revision += 1;
        true
    }

    pub fn set_point_list(&mut self, points: Vec<Point>) -> bool {
        if self.point_list.as_ref() == Some(&points) {
            return false;
        }
        self.point_list = Some(points);
        self.revision += 1;
        true
    }

    /// Number of effective writes so far.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Token match against the `class` attribute.
    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
    }

    /// A mandatory numeric attribute.
    pub fn required_number(&self, name: &str) -> Result<f64, ShapeError> {
        let raw = self.attr(name).ok_or_else(|| ShapeError::MissingAttribute {
            element: self.tag.clone(),
            attribute: name.to_string(),
        })?;
        parse_length(name, raw)
    }
}

/// Read a length attribute the way `parseFloat` would, ignoring any unit.
pub fn parse_length(attribute: &str, raw: &str) -> Result<f64, ShapeError> {
    let ctx = SourceContext::new(attribute, raw);
    let mut pairs = SvgParser::parse(Rule::length, raw).map_err(|e| ShapeError::InvalidNumber {
        attribute: attribute.to_string(),
        span: ctx.span_of(&e),
        src: ctx.named_source(),
    })?;
    let number = pairs
        .next()
        .and_then(|length| length.into_inner().find(|p| p.as_rule() == Rule::number));
    number
        .and_then(|n| n.as_str().parse::<f64>().ok())
        .ok_or_else(|| ShapeError::InvalidNumber {
            attribute: attribute.to_string(),
            span: (0, raw.len()).into(),
            src: ctx.named_source(),
        })
}

/// Flat `x, y, x, y, ...` list from a `points` attribute.
pub fn parse_points(attribute: &str, raw: &str) -> Result<Vec<f64>, ShapeError> {
    let ctx = SourceContext::new(attribute, raw);
    let mut pairs = SvgParser::parse(Rule::point_list, raw).map_err(|e| ShapeError::InvalidNumber {
        attribute: attribute.to_string(),
        span: ctx.span_of(&e),
        src: ctx.named_source(),
    })?;
    let Some(list) = pairs.next() else {
        return Ok(Vec::new());
    };
    list.into_inner()
        .filter(|p| p.as_rule() == Rule::number)
        .map(|n| {
            let span = n.as_span();
            n.as_str().parse::<f64>().map_err(|_| ShapeError::InvalidNumber {
                attribute: attribute.to_string(),
                span: (span.start(), span.end() - span.start()).into(),
                src: ctx.named_source(),
            })
        })
        .collect()
}

/// Write a flat coordinate list back in `points` attribute syntax.
pub fn format_points(coords: &[f64]) -> String {
    coords
        .chunks(2)
        .map(|pair| match pair {
            [x, y] => format!("{x} {y}"),
            [x] => format!("{x}"),
            _ => String::new(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}
