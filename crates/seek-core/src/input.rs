//! Pointer events for mouse/touch/pen input on a drawing surface.

use kurbo::Point;
use serde::{Deserialize, Serialize};

/// Identifier of a pointer (mouse = 0, one per active touch).
pub type PointerId = u64;

/// Pointer id used for the mouse.
pub const MOUSE_POINTER: PointerId = 0;

/// Pointer event type for unified mouse/touch handling.
///
/// Positions are in surface pixels with the origin at the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PointerEvent {
    /// Pointer engaged (button pressed or finger down).
    Down {
        #[serde(default)]
        pointer: PointerId,
        x: f64,
        y: f64,
    },
    /// Pointer moved.
    Move {
        #[serde(default)]
        pointer: PointerId,
        x: f64,
        y: f64,
    },
    /// Pointer released.
    Up {
        #[serde(default)]
        pointer: PointerId,
    },
    /// Pointer left the surface.
    Leave {
        #[serde(default)]
        pointer: PointerId,
    },
}

impl PointerEvent {
    pub fn down(x: f64, y: f64) -> Self {
        PointerEvent::Down { pointer: MOUSE_POINTER, x, y }
    }

    pub fn moved(x: f64, y: f64) -> Self {
        PointerEvent::Move { pointer: MOUSE_POINTER, x, y }
    }

    pub fn up() -> Self {
        PointerEvent::Up { pointer: MOUSE_POINTER }
    }

    pub fn leave() -> Self {
        PointerEvent::Leave { pointer: MOUSE_POINTER }
    }

    /// The pointer that produced this event.
    pub fn pointer(&self) -> PointerId {
        match *self {
            PointerEvent::Down { pointer, .. }
            | PointerEvent::Move { pointer, .. }
            | PointerEvent::Up { pointer }
            | PointerEvent::Leave { pointer } => pointer,
        }
    }

    /// Position carried by the event, if any.
    pub fn position(&self) -> Option<Point> {
        match *self {
            PointerEvent::Down { x, y, .. } | PointerEvent::Move { x, y, .. } => Some(Point::new(x, y)),
            PointerEvent::Up { .. } | PointerEvent::Leave { .. } => None,
        }
    }
}

/// A recorded pointer event with a millisecond offset from the start of the recording.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimedPointerEvent {
    #[serde(default)]
    pub at_ms: u64,
    #[serde(flatten)]
    pub event: PointerEvent,
}
