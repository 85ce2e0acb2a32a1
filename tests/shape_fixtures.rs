//! Data-driven shape geometry tests
//!
//! Each `tests/shapes/*.json` fixture describes one SVG element, the bounds
//! it should report, points that must and must not hit, and optionally a
//! resize with the attributes it should produce.

use datatest_stable::Utf8Path;
use indexmap::IndexMap;
use serde::Deserialize;
use shapecore::{Bounds, Element, ShapeGeometry};

#[derive(Debug, Deserialize)]
struct Fixture {
    tag: String,
    attrs: IndexMap<String, String>,
    bounds: [f64; 4],
    #[serde(default)]
    hits: Vec<[f64; 2]>,
    #[serde(default)]
    misses: Vec<[f64; 2]>,
    #[serde(default)]
    resize: Option<Resize>,
}

#[derive(Debug, Deserialize)]
struct Resize {
    to: [f64; 4],
    attrs: IndexMap<String, String>,
    #[serde(default)]
    hits: Vec<[f64; 2]>,
    #[serde(default)]
    misses: Vec<[f64; 2]>,
}

fn bounds([x, y, w, h]: [f64; 4]) -> Bounds {
    Bounds::new(x, y, w, h)
}

fn check_points(shape: &ShapeGeometry, hits: &[[f64; 2]], misses: &[[f64; 2]], stage: &str) -> Result<(), String> {
    for [x, y] in hits {
        if !shape.is_point_included(*x, *y) {
            return Err(format!("{stage}: expected ({x}, {y}) to hit"));
        }
    }
    for [x, y] in misses {
        if shape.is_point_included(*x, *y) {
            return Err(format!("{stage}: expected ({x}, {y}) to miss"));
        }
    }
    Ok(())
}

fn shape_fixture(path: &Utf8Path) -> datatest_stable::Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let source = std::fs::read_to_string(path)?;
    let fixture: Fixture = serde_json::from_str(&source)?;

    let element = fixture
        .attrs
        .iter()
        .fold(Element::new(fixture.tag.as_str()), |el, (name, value)| el.with_attr(name, value));
    let mut shape = ShapeGeometry::from_element(element).map_err(|e| format!("{path}: {e}"))?;

    if shape.bounds() != bounds(fixture.bounds) {
        return Err(format!("{path}: read bounds {}, expected {}", shape.bounds(), bounds(fixture.bounds)).into());
    }
    check_points(&shape, &fixture.hits, &fixture.misses, "as read").map_err(|e| format!("{path}: {e}"))?;

    let Some(resize) = fixture.resize else {
        return Ok(());
    };
    shape.set_bounds(bounds(resize.to));
    shape.update();
    for (name, expected) in &resize.attrs {
        let actual = shape.element().attr(name);
        if actual != Some(expected.as_str()) {
            return Err(format!("{path}: after resize {name} is {actual:?}, expected {expected:?}").into());
        }
    }
    check_points(&shape, &resize.hits, &resize.misses, "after resize").map_err(|e| format!("{path}: {e}"))?;
    Ok(())
}

datatest_stable::harness! {
    { test = shape_fixture, root = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/shapes"), pattern = r"\.json$" },
}
