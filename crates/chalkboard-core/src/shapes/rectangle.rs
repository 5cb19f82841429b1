//! Rectangle shape.

use super::{validate_box, Geometry, ShapeError, ShapeKind};
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rectangle {
    /// Top-left corner.
    pub origin: Point,
    pub width: f64,
    pub height: f64,
}

impl Rectangle {
    pub fn new(origin: Point, width: f64, height: f64) -> Self {
        Self {
            origin,
            width,
            height,
        }
    }

    /// Rectangle spanning two opposite corners in any order.
    pub fn from_corners(a: Point, b: Point) -> Self {
        let rect = Rect::from_points(a, b);
        Self::new(Point::new(rect.x0, rect.y0), rect.width(), rect.height())
    }
}

impl Geometry for Rectangle {
    fn kind(&self) -> ShapeKind {
        ShapeKind::Rectangle
    }

    fn bounds(&self) -> Rect {
        Rect::from_origin_size(self.origin, (self.width, self.height))
    }

    fn validate(&self) -> Result<(), ShapeError> {
        validate_box(ShapeKind::Rectangle, self.origin, self.width, self.height)
    }
}
