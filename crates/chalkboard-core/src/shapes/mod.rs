//! Shape definitions for the whiteboard.

mod ellipse;
mod line;
mod rectangle;
mod text;

pub use ellipse::{Circle, Oval};
pub use line::Line;
pub use rectangle::Rectangle;
pub use text::Text;

use kurbo::{Point, Rect};
use peniko::Color;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Serializable RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const fn black() -> Self {
        Self::new(0, 0, 0)
    }

    pub const fn white() -> Self {
        Self::new(255, 255, 255)
    }

    /// Build from a packed `0xRRGGBB` integer. The high byte is ignored.
    pub const fn from_packed(value: u32) -> Self {
        Self {
            r: ((value >> 16) & 0xff) as u8,
            g: ((value >> 8) & 0xff) as u8,
            b: (value & 0xff) as u8,
        }
    }

    /// Pack into `0xRRGGBB`.
    pub const fn to_packed(self) -> u32 {
        ((self.r as u32) << 16) | ((self.g as u32) << 8) | self.b as u32
    }
}

impl Default for Rgb {
    fn default() -> Self {
        Self::black()
    }
}

impl From<Color> for Rgb {
    fn from(color: Color) -> Self {
        let rgba = color.to_rgba8();
        Self {
            r: rgba.r,
            g: rgba.g,
            b: rgba.b,
        }
    }
}

impl From<Rgb> for Color {
    fn from(color: Rgb) -> Self {
        Color::from_rgba8(color.r, color.g, color.b, 255)
    }
}

/// The closed set of shape kinds a client can draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    Line,
    Circle,
    Oval,
    Rectangle,
    Text,
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShapeKind::Line => "line",
            ShapeKind::Circle => "circle",
            ShapeKind::Oval => "oval",
            ShapeKind::Rectangle => "rectangle",
            ShapeKind::Text => "text",
        };
        f.write_str(name)
    }
}

/// Geometry validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeError {
    #[error("{0} has a non-finite coordinate")]
    NonFinite(ShapeKind),
    #[error("{0} has a negative extent")]
    NegativeExtent(ShapeKind),
    #[error("text shape has no content")]
    EmptyText,
}

/// Common behavior of every geometry type.
pub trait Geometry {
    /// Which kind of shape this is.
    fn kind(&self) -> ShapeKind;

    /// Axis-aligned bounding box in canvas coordinates.
    fn bounds(&self) -> Rect;

    /// Reject geometry that no client could render.
    fn validate(&self) -> Result<(), ShapeError>;
}

/// A drawable shape, tagged by kind on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Shape {
    Line(Line),
    Circle(Circle),
    Oval(Oval),
    Rectangle(Rectangle),
    Text(Text),
}

impl Shape {
    pub fn kind(&self) -> ShapeKind {
        match self {
            Shape::Line(s) => s.kind(),
            Shape::Circle(s) => s.kind(),
            Shape::Oval(s) => s.kind(),
            Shape::Rectangle(s) => s.kind(),
            Shape::Text(s) => s.kind(),
        }
    }

    pub fn bounds(&self) -> Rect {
        match self {
            Shape::Line(s) => s.bounds(),
            Shape::Circle(s) => s.bounds(),
            Shape::Oval(s) => s.bounds(),
            Shape::Rectangle(s) => s.bounds(),
            Shape::Text(s) => s.bounds(),
        }
    }

    pub fn validate(&self) -> Result<(), ShapeError> {
        match self {
            Shape::Line(s) => s.validate(),
            Shape::Circle(s) => s.validate(),
            Shape::Oval(s) => s.validate(),
            Shape::Rectangle(s) => s.validate(),
            Shape::Text(s) => s.validate(),
        }
    }

    /// Text payload, present only for text shapes.
    pub fn text(&self) -> Option<&str> {
        match self {
            Shape::Text(t) => Some(&t.content),
            _ => None,
        }
    }
}

/// A shape committed to the drawing log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeRecord {
    /// Position in the drawing log, assigned at append time.
    pub seq: u64,
    pub shape: Shape,
    pub color: Rgb,
}

impl ShapeRecord {
    pub fn kind(&self) -> ShapeKind {
        self.shape.kind()
    }
}

fn finite(point: Point) -> bool {
    point.x.is_finite() && point.y.is_finite()
}

/// Shared check for shapes defined by an origin and two extents.
fn validate_box(kind: ShapeKind, origin: Point, width: f64, height: f64) -> Result<(), ShapeError> {
    if !finite(origin) || !width.is_finite() || !height.is_finite() {
        return Err(ShapeError::NonFinite(kind));
    }
    if width < 0.0 || height < 0.0 {
        return Err(ShapeError::NegativeExtent(kind));
    }
    Ok(())
}
