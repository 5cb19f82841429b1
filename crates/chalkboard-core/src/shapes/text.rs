//! Text shape.

use super::{finite, Geometry, ShapeError, ShapeKind};
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};

/// Approximate glyph advance used for bounds, matching the 20px default font.
const APPROX_CHAR_WIDTH: f64 = 11.0;
const APPROX_LINE_HEIGHT: f64 = 20.0;

/// A run of text anchored at its baseline start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Text {
    pub content: String,
    /// Baseline start position.
    pub position: Point,
}

impl Text {
    pub fn new(content: impl Into<String>, position: Point) -> Self {
        Self {
            content: content.into(),
            position,
        }
    }
}

impl Geometry for Text {
    fn kind(&self) -> ShapeKind {
        ShapeKind::Text
    }

    /// Estimated from character count; the canvas owns real font metrics.
    fn bounds(&self) -> Rect {
        let width = self.content.chars().count() as f64 * APPROX_CHAR_WIDTH;
        Rect::new(
            self.position.x,
            self.position.y - APPROX_LINE_HEIGHT,
            self.position.x + width,
            self.position.y,
        )
    }

    fn validate(&self) -> Result<(), ShapeError> {
        if !finite(self.position) {
            return Err(ShapeError::NonFinite(ShapeKind::Text));
        }
        if self.content.trim().is_empty() {
            return Err(ShapeError::EmptyText);
        }
        Ok(())
    }
}
