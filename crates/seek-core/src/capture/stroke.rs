//! Captured freehand strokes.

use super::style::PenStyle;
use kurbo::{Line, Point, Rect};
use serde::{Deserialize, Serialize};

/// One pointer-engaged-to-released gesture. Immutable once captured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    points: Vec<Point>,
    style: PenStyle,
}

impl Stroke {
    /// Points in capture order.
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Pen style in effect when the stroke began.
    pub fn style(&self) -> PenStyle {
        self.style
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Consecutive point pairs as line segments.
    pub fn segments(&self) -> impl Iterator<Item = Line> + '_ {
        self.points.windows(2).map(|w| Line::new(w[0], w[1]))
    }

    /// Bounding box of the points, ignoring pen width.
    pub fn bounds(&self) -> Rect {
        let Some(first) = self.points.first() else {
            return Rect::ZERO;
        };
        self.points
            .iter()
            .skip(1)
            .fold(Rect::from_points(*first, *first), |rect, p| rect.union_pt(*p))
    }
}

/// A stroke still being drawn.
#[derive(Debug, Clone)]
pub(crate) struct StrokeBuilder {
    points: Vec<Point>,
    style: PenStyle,
}

impl StrokeBuilder {
    pub(crate) fn new(start: Point, style: PenStyle) -> Self {
        Self {
            points: vec![start],
            style,
        }
    }

    pub(crate) fn push(&mut self, point: Point) {
        self.points.push(point);
    }

    pub(crate) fn last(&self) -> Point {
        // Always non-empty: constructed with the start point.
        self.points[self.points.len() - 1]
    }

    pub(crate) fn style(&self) -> PenStyle {
        self.style
    }

    pub(crate) fn finish(self) -> Stroke {
        Stroke {
            points: self.points,
            style: self.style,
        }
    }
}
