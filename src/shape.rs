//! Shape — the discriminated union of drawable board records.
//!
//! DESIGN
//! ======
//! Every shape is one of a closed set of kinds, tagged by `kind` on the wire.
//! Three families share field layouts: box-like shapes (position + extent),
//! line-like shapes (two endpoints), and freehand strokes (a point polyline
//! with a server-derived bounding box). Partial updates arrive as flat
//! key/value maps and are merged field-by-field; keys not present in the map
//! leave the stored value untouched.
//!
//! VALIDATION
//! ==========
//! Unknown kinds and missing required fields fail serde decode before any
//! state is touched. `validate` enforces the numeric invariants serde cannot
//! express (finite coordinates, positive stroke width, non-empty polylines).
//! A shape that fails validation is never stored or broadcast.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Flat key-value payload for partial shape updates.
pub type Data = HashMap<String, serde_json::Value>;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ShapeError {
    #[error("field {0} must be a finite number")]
    NonFinite(&'static str),
    #[error("field {0} must not be negative")]
    Negative(&'static str),
    #[error("stroke_width must be greater than zero")]
    StrokeWidth,
    #[error("font_size must be greater than zero")]
    FontSize,
    #[error("freehand shape requires at least one point")]
    EmptyPoints,
    #[error("field {0} has the wrong type")]
    WrongType(String),
}

/// A point on a freehand polyline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Axis-aligned bounding box, derived from freehand points on the server.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    /// Tight bounds around a point set. Empty input collapses to the origin.
    #[must_use]
    pub fn around(points: &[Point]) -> Self {
        let Some(first) = points.first() else {
            return Self::default();
        };
        let mut min_x = first.x;
        let mut min_y = first.y;
        let mut max_x = first.x;
        let mut max_y = first.y;
        for p in &points[1..] {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Self { x: min_x, y: min_y, width: max_x - min_x, height: max_y - min_y }
    }
}

/// Position + extent family: rect, ellipse, diamond, circle, triangle,
/// cylinder, cloud, callout, starburst.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxShape {
    pub id: Uuid,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<String>,
    /// Degrees, normalized to `[0, 360)`.
    #[serde(default)]
    pub rotation: f64,
    pub stroke: String,
    pub stroke_width: f64,
}

/// Box-like shape carrying editable text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextShape {
    pub id: Uuid,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<String>,
    #[serde(default)]
    pub rotation: f64,
    pub stroke: String,
    pub stroke_width: f64,
    pub content: String,
    pub font_size: f64,
    pub font_family: String,
    pub color: String,
}

/// Two-endpoint family: line, arrow, double-arrow, orthogonal-connector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineShape {
    pub id: Uuid,
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub stroke: String,
    pub stroke_width: f64,
}

/// Freehand stroke: ordered point polyline plus derived bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreehandShape {
    pub id: Uuid,
    pub points: Vec<Point>,
    /// Recomputed server-side; a client-supplied value is overwritten.
    #[serde(default)]
    pub bounds: Bounds,
    pub stroke: String,
    pub stroke_width: f64,
}

/// The discriminated union stored in a board's shape list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Shape {
    Rect(BoxShape),
    Ellipse(BoxShape),
    Diamond(BoxShape),
    Circle(BoxShape),
    Triangle(BoxShape),
    Cylinder(BoxShape),
    Cloud(BoxShape),
    Callout(BoxShape),
    Starburst(BoxShape),
    Text(TextShape),
    Line(LineShape),
    Arrow(LineShape),
    DoubleArrow(LineShape),
    OrthogonalConnector(LineShape),
    Freehand(FreehandShape),
}

// =============================================================================
// ACCESSORS
// =============================================================================

impl Shape {
    /// Record identity within a board.
    #[must_use]
    pub fn id(&self) -> Uuid {
        match self {
            Self::Rect(s)
            | Self::Ellipse(s)
            | Self::Diamond(s)
            | Self::Circle(s)
            | Self::Triangle(s)
            | Self::Cylinder(s)
            | Self::Cloud(s)
            | Self::Callout(s)
            | Self::Starburst(s) => s.id,
            Self::Text(s) => s.id,
            Self::Line(s) | Self::Arrow(s) | Self::DoubleArrow(s) | Self::OrthogonalConnector(s) => s.id,
            Self::Freehand(s) => s.id,
        }
    }

    /// The wire discriminator for this variant.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Rect(_) => "rect",
            Self::Ellipse(_) => "ellipse",
            Self::Diamond(_) => "diamond",
            Self::Circle(_) => "circle",
            Self::Triangle(_) => "triangle",
            Self::Cylinder(_) => "cylinder",
            Self::Cloud(_) => "cloud",
            Self::Callout(_) => "callout",
            Self::Starburst(_) => "starburst",
            Self::Text(_) => "text",
            Self::Line(_) => "line",
            Self::Arrow(_) => "arrow",
            Self::DoubleArrow(_) => "double-arrow",
            Self::OrthogonalConnector(_) => "orthogonal-connector",
            Self::Freehand(_) => "freehand",
        }
    }
}

// =============================================================================
// VALIDATION
// =============================================================================

fn finite(value: f64, field: &'static str) -> Result<(), ShapeError> {
    if value.is_finite() { Ok(()) } else { Err(ShapeError::NonFinite(field)) }
}

fn non_negative(value: f64, field: &'static str) -> Result<(), ShapeError> {
    finite(value, field)?;
    if value >= 0.0 { Ok(()) } else { Err(ShapeError::Negative(field)) }
}

fn stroke_width(value: f64) -> Result<(), ShapeError> {
    finite(value, "stroke_width")?;
    if value > 0.0 { Ok(()) } else { Err(ShapeError::StrokeWidth) }
}

impl BoxShape {
    fn validate(&self) -> Result<(), ShapeError> {
        finite(self.x, "x")?;
        finite(self.y, "y")?;
        non_negative(self.width, "width")?;
        non_negative(self.height, "height")?;
        finite(self.rotation, "rotation")?;
        stroke_width(self.stroke_width)
    }
}

impl TextShape {
    fn validate(&self) -> Result<(), ShapeError> {
        finite(self.x, "x")?;
        finite(self.y, "y")?;
        non_negative(self.width, "width")?;
        non_negative(self.height, "height")?;
        finite(self.rotation, "rotation")?;
        stroke_width(self.stroke_width)?;
        finite(self.font_size, "font_size")?;
        if self.font_size > 0.0 { Ok(()) } else { Err(ShapeError::FontSize) }
    }
}

impl LineShape {
    fn validate(&self) -> Result<(), ShapeError> {
        finite(self.x1, "x1")?;
        finite(self.y1, "y1")?;
        finite(self.x2, "x2")?;
        finite(self.y2, "y2")?;
        stroke_width(self.stroke_width)
    }
}

impl FreehandShape {
    fn validate(&self) -> Result<(), ShapeError> {
        if self.points.is_empty() {
            return Err(ShapeError::EmptyPoints);
        }
        for p in &self.points {
            finite(p.x, "points.x")?;
            finite(p.y, "points.y")?;
        }
        stroke_width(self.stroke_width)
    }
}

impl Shape {
    /// Check the numeric invariants serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), ShapeError> {
        match self {
            Self::Rect(s)
            | Self::Ellipse(s)
            | Self::Diamond(s)
            | Self::Circle(s)
            | Self::Triangle(s)
            | Self::Cylinder(s)
            | Self::Cloud(s)
            | Self::Callout(s)
            | Self::Starburst(s) => s.validate(),
            Self::Text(s) => s.validate(),
            Self::Line(s) | Self::Arrow(s) | Self::DoubleArrow(s) | Self::OrthogonalConnector(s) => s.validate(),
            Self::Freehand(s) => s.validate(),
        }
    }

    /// Canonicalize derived fields: wrap rotation into `[0, 360)` and
    /// recompute freehand bounds from the point list.
    pub fn normalize(&mut self) {
        match self {
            Self::Rect(s)
            | Self::Ellipse(s)
            | Self::Diamond(s)
            | Self::Circle(s)
            | Self::Triangle(s)
            | Self::Cylinder(s)
            | Self::Cloud(s)
            | Self::Callout(s)
            | Self::Starburst(s) => s.rotation = s.rotation.rem_euclid(360.0),
            Self::Text(s) => s.rotation = s.rotation.rem_euclid(360.0),
            Self::Line(_) | Self::Arrow(_) | Self::DoubleArrow(_) | Self::OrthogonalConnector(_) => {}
            Self::Freehand(s) => s.bounds = Bounds::around(&s.points),
        }
    }
}

// =============================================================================
// PARTIAL UPDATES
// =============================================================================

fn get_f64(props: &Data, key: &str) -> Option<f64> {
    props.get(key).and_then(serde_json::Value::as_f64)
}

fn get_string(props: &Data, key: &str) -> Option<String> {
    props
        .get(key)
        .and_then(serde_json::Value::as_str)
        .map(str::to_owned)
}

impl BoxShape {
    fn apply(&mut self, props: &Data) {
        if let Some(v) = get_f64(props, "x") {
            self.x = v;
        }
        if let Some(v) = get_f64(props, "y") {
            self.y = v;
        }
        if let Some(v) = get_f64(props, "width") {
            self.width = v;
        }
        if let Some(v) = get_f64(props, "height") {
            self.height = v;
        }
        if let Some(v) = get_f64(props, "rotation") {
            self.rotation = v;
        }
        match props.get("fill") {
            Some(serde_json::Value::String(v)) => self.fill = Some(v.clone()),
            Some(serde_json::Value::Null) => self.fill = None,
            _ => {}
        }
        if let Some(v) = get_string(props, "stroke") {
            self.stroke = v;
        }
        if let Some(v) = get_f64(props, "stroke_width") {
            self.stroke_width = v;
        }
    }
}

impl TextShape {
    fn apply(&mut self, props: &Data) {
        if let Some(v) = get_f64(props, "x") {
            self.x = v;
        }
        if let Some(v) = get_f64(props, "y") {
            self.y = v;
        }
        if let Some(v) = get_f64(props, "width") {
            self.width = v;
        }
        if let Some(v) = get_f64(props, "height") {
            self.height = v;
        }
        if let Some(v) = get_f64(props, "rotation") {
            self.rotation = v;
        }
        match props.get("fill") {
            Some(serde_json::Value::String(v)) => self.fill = Some(v.clone()),
            Some(serde_json::Value::Null) => self.fill = None,
            _ => {}
        }
        if let Some(v) = get_string(props, "stroke") {
            self.stroke = v;
        }
        if let Some(v) = get_f64(props, "stroke_width") {
            self.stroke_width = v;
        }
        if let Some(v) = get_string(props, "content") {
            self.content = v;
        }
        if let Some(v) = get_f64(props, "font_size") {
            self.font_size = v;
        }
        if let Some(v) = get_string(props, "font_family") {
            self.font_family = v;
        }
        if let Some(v) = get_string(props, "color") {
            self.color = v;
        }
    }
}

impl LineShape {
    fn apply(&mut self, props: &Data) {
        if let Some(v) = get_f64(props, "x1") {
            self.x1 = v;
        }
        if let Some(v) = get_f64(props, "y1") {
            self.y1 = v;
        }
        if let Some(v) = get_f64(props, "x2") {
            self.x2 = v;
        }
        if let Some(v) = get_f64(props, "y2") {
            self.y2 = v;
        }
        if let Some(v) = get_string(props, "stroke") {
            self.stroke = v;
        }
        if let Some(v) = get_f64(props, "stroke_width") {
            self.stroke_width = v;
        }
    }
}

impl FreehandShape {
    fn apply(&mut self, props: &Data) {
        if let Some(value) = props.get("points") {
            if let Ok(points) = serde_json::from_value::<Vec<Point>>(value.clone()) {
                if !points.is_empty() {
                    self.points = points;
                }
            }
        }
        if let Some(v) = get_string(props, "stroke") {
            self.stroke = v;
        }
        if let Some(v) = get_f64(props, "stroke_width") {
            self.stroke_width = v;
        }
    }
}

impl Shape {
    /// Merge a partial field map into this shape. Keys absent from `props`
    /// keep their current value; keys that do not apply to the variant are
    /// ignored. `id` and `kind` are immutable and never merged. Derived
    /// fields are re-normalized after the merge.
    pub fn apply_props(&mut self, props: &Data) {
        match self {
            Self::Rect(s)
            | Self::Ellipse(s)
            | Self::Diamond(s)
            | Self::Circle(s)
            | Self::Triangle(s)
            | Self::Cylinder(s)
            | Self::Cloud(s)
            | Self::Callout(s)
            | Self::Starburst(s) => s.apply(props),
            Self::Text(s) => s.apply(props),
            Self::Line(s) | Self::Arrow(s) | Self::DoubleArrow(s) | Self::OrthogonalConnector(s) => s.apply(props),
            Self::Freehand(s) => s.apply(props),
        }
        self.normalize();
    }
}

/// Validate a partial update map without a target shape.
///
/// Each recognized key must carry a usable value; unknown keys are ignored so
/// newer clients stay compatible. Updates addressed to shapes this server
/// never materialized are broadcast as-is, so the map itself is the only
/// thing that can be checked.
///
/// # Errors
///
/// Returns `WrongType` or a numeric invariant error for the first bad key.
pub fn validate_props(props: &Data) -> Result<(), ShapeError> {
    const NUMERIC: &[&str] = &["x", "y", "x1", "y1", "x2", "y2", "rotation"];
    const NON_NEGATIVE: &[&str] = &["width", "height"];
    const POSITIVE: &[&str] = &["stroke_width", "font_size"];
    const STRINGS: &[&str] = &["stroke", "content", "font_family", "color"];

    for key in NUMERIC {
        if let Some(value) = props.get(*key) {
            let v = value.as_f64().ok_or_else(|| ShapeError::WrongType((*key).to_owned()))?;
            finite(v, "props")?;
        }
    }
    for key in NON_NEGATIVE {
        if let Some(value) = props.get(*key) {
            let v = value.as_f64().ok_or_else(|| ShapeError::WrongType((*key).to_owned()))?;
            non_negative(v, "props")?;
        }
    }
    for key in POSITIVE {
        if let Some(value) = props.get(*key) {
            let v = value.as_f64().ok_or_else(|| ShapeError::WrongType((*key).to_owned()))?;
            finite(v, "props")?;
            if v <= 0.0 {
                return Err(ShapeError::WrongType((*key).to_owned()));
            }
        }
    }
    for key in STRINGS {
        if let Some(value) = props.get(*key) {
            if !value.is_string() {
                return Err(ShapeError::WrongType((*key).to_owned()));
            }
        }
    }
    if let Some(value) = props.get("fill") {
        if !value.is_string() && !value.is_null() {
            return Err(ShapeError::WrongType("fill".to_owned()));
        }
    }
    if let Some(value) = props.get("points") {
        let points: Vec<Point> =
            serde_json::from_value(value.clone()).map_err(|_| ShapeError::WrongType("points".to_owned()))?;
        if points.is_empty() {
            return Err(ShapeError::EmptyPoints);
        }
        for p in &points {
            finite(p.x, "points.x")?;
            finite(p.y, "points.y")?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "shape_test.rs"]
mod tests;
