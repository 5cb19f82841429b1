//! Circle and oval shapes.
//!
//! Both are stored by the top-left corner of their bounding box, which is
//! how clients report them after a drag.

use super::{validate_box, Geometry, ShapeError, ShapeKind};
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};

/// A circle inscribed in a `diameter`-sized square.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    /// Top-left corner of the bounding square.
    pub origin: Point,
    pub diameter: f64,
}

impl Circle {
    pub fn new(origin: Point, diameter: f64) -> Self {
        Self { origin, diameter }
    }

    /// Center point.
    pub fn center(&self) -> Point {
        let r = self.diameter / 2.0;
        Point::new(self.origin.x + r, self.origin.y + r)
    }
}

impl Geometry for Circle {
    fn kind(&self) -> ShapeKind {
        ShapeKind::Circle
    }

    fn bounds(&self) -> Rect {
        Rect::from_origin_size(self.origin, (self.diameter, self.diameter))
    }

    fn validate(&self) -> Result<(), ShapeError> {
        validate_box(ShapeKind::Circle, self.origin, self.diameter, self.diameter)
    }
}

/// An axis-aligned ellipse inscribed in a `width` x `height` box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Oval {
    /// Top-left corner of the bounding box.
    pub origin: Point,
    pub width: f64,
    pub height: f64,
}

impl Oval {
    pub fn new(origin: Point, width: f64, height: f64) -> Self {
        Self {
            origin,
            width,
            height,
        }
    }

    pub fn center(&self) -> Point {
        Point::new(
            self.origin.x + self.width / 2.0,
            self.origin.y + self.height / 2.0,
        )
    }
}

impl Geometry for Oval {
    fn kind(&self) -> ShapeKind {
        ShapeKind::Oval
    }

    fn bounds(&self) -> Rect {
        Rect::from_origin_size(self.origin, (self.width, self.height))
    }

    fn validate(&self) -> Result<(), ShapeError> {
        validate_box(ShapeKind::Oval, self.origin, self.width, self.height)
    }
}
