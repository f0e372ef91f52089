//! Freehand stroke capture.
//!
//! [`CaptureEngine`] turns pointer gestures into ink on a [`DrawingSurface`] and exports the
//! surface as a PNG [`RasterizedArtifact`] on demand. All operations are synchronous and are
//! silently ignored until a surface is attached, except [`CaptureEngine::snapshot`], which
//! reports [`CaptureError::EngineNotReady`].

mod artifact;
mod stroke;
mod style;
mod surface;

pub use artifact::{PNG_CONTENT_TYPE, RasterizedArtifact};
pub use stroke::Stroke;
pub use style::{PaletteColor, PenStyle, Rgb, StrokeWidth};
pub use surface::{DrawingSurface, RasterSurface};

use crate::input::{MOUSE_POINTER, PointerEvent, PointerId};
use kurbo::{Line, Point, Rect};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use stroke::StrokeBuilder;
use thiserror::Error;

/// Default surface size, matching the student response canvas.
pub const DEFAULT_SURFACE_WIDTH: u32 = 600;
pub const DEFAULT_SURFACE_HEIGHT: u32 = 500;

/// Default cap on rendered `extend` calls per second.
pub const DEFAULT_MAX_EXTEND_RATE_HZ: u32 = 100;

/// Capture errors.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Drawing surface is not attached")]
    EngineNotReady,
    #[error("PNG encoding failed: {0}")]
    Encode(String),
    #[error("Invalid data URI: {0}")]
    InvalidDataUri(String),
}

/// Result type for capture operations.
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Capture engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    pub width: u32,
    pub height: u32,
    /// Opaque background; `None` leaves the surface transparent.
    pub background: Option<Rgb>,
    /// Maximum rendered extends per second; 0 disables throttling.
    pub max_extend_rate_hz: u32,
    /// Pen style for the first stroke.
    pub pen: PenStyle,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_SURFACE_WIDTH,
            height: DEFAULT_SURFACE_HEIGHT,
            background: None,
            max_extend_rate_hz: DEFAULT_MAX_EXTEND_RATE_HZ,
            pen: PenStyle::default(),
        }
    }
}

impl CaptureConfig {
    /// Build a software surface with this configuration's size and background.
    pub fn raster_surface(&self) -> RasterSurface {
        match self.background {
            Some(bg) => RasterSurface::with_background(self.width, self.height, bg),
            None => RasterSurface::new(self.width, self.height),
        }
    }

    fn min_extend_interval(&self) -> Option<Duration> {
        (self.max_extend_rate_hz > 0)
            .then(|| Duration::from_secs_f64(1.0 / self.max_extend_rate_hz as f64))
    }
}

/// Proof that the user confirmed a destructive clear.
///
/// The engine never prompts; callers obtain confirmation through their own UI and then build
/// this token.
#[derive(Debug, Clone, Copy)]
pub struct ClearConfirmation {
    _private: (),
}

impl ClearConfirmation {
    pub fn confirmed() -> Self {
        Self { _private: () }
    }
}

/// A stroke in progress.
#[derive(Debug)]
struct ActiveStroke {
    pointer: PointerId,
    builder: StrokeBuilder,
    /// Latest coalesced position not yet rendered.
    pending: Option<Point>,
    last_render: Instant,
}

/// Engine-owned drawing state. Only mutated through engine methods.
#[derive(Debug, Default)]
struct CaptureState {
    pen: PenStyle,
    dirty: bool,
    active: Option<ActiveStroke>,
    strokes: Vec<Stroke>,
}

/// Converts pointer gestures into ink on a drawing surface.
pub struct CaptureEngine<S: DrawingSurface = RasterSurface> {
    surface: Option<S>,
    state: CaptureState,
    min_interval: Option<Duration>,
}

impl CaptureEngine<RasterSurface> {
    /// Engine with an attached software surface built from `config`.
    pub fn with_raster(config: &CaptureConfig) -> Self {
        let mut engine = Self::new(config);
        engine.attach(config.raster_surface());
        engine
    }
}

impl<S: DrawingSurface> CaptureEngine<S> {
    /// Create an engine with no surface attached.
    pub fn new(config: &CaptureConfig) -> Self {
        Self {
            surface: None,
            state: CaptureState {
                pen: config.pen,
                ..CaptureState::default()
            },
            min_interval: config.min_extend_interval(),
        }
    }

    /// Attach a surface, starting a fresh drawing session. Pen style is kept.
    pub fn attach(&mut self, surface: S) {
        self.state.dirty = !surface.is_blank();
        self.state.active = None;
        self.state.strokes.clear();
        self.surface = Some(surface);
    }

    /// Detach and return the surface. Any stroke in progress is dropped.
    pub fn detach(&mut self) -> Option<S> {
        self.state.active = None;
        self.surface.take()
    }

    pub fn is_ready(&self) -> bool {
        self.surface.is_some()
    }

    pub fn surface(&self) -> Option<&S> {
        self.surface.as_ref()
    }

    /// Whether any ink has been drawn since the session started or was cleared.
    pub fn is_dirty(&self) -> bool {
        self.state.dirty
    }

    /// Whether a stroke is in progress.
    pub fn is_drawing(&self) -> bool {
        self.state.active.is_some()
    }

    /// Completed strokes of this session, oldest first.
    pub fn strokes(&self) -> &[Stroke] {
        &self.state.strokes
    }

    pub fn pen(&self) -> PenStyle {
        self.state.pen
    }

    /// Start a stroke at `position`. Returns false if ignored.
    pub fn begin(&mut self, position: Point) -> bool {
        self.begin_at(position, Instant::now())
    }

    /// Start a stroke with an explicit event time.
    pub fn begin_at(&mut self, position: Point, now: Instant) -> bool {
        self.begin_for(MOUSE_POINTER, position, now)
    }

    fn begin_for(&mut self, pointer: PointerId, position: Point, now: Instant) -> bool {
        let Some(surface) = self.surface.as_mut() else {
            return false;
        };
        if !position.is_finite() {
            log::debug!("Ignoring stroke start from pointer {pointer} at non-finite {position:?}");
            return false;
        }
        if self.state.active.is_some() {
            log::debug!("Ignoring stroke start from pointer {pointer}: stroke already in progress");
            return false;
        }

        let pen = self.state.pen;
        let side = pen.width.px();
        let dot = Rect::from_center_size(position, (side, side));
        surface.fill_rect(dot, pen.color);

        self.state.dirty = true;
        self.state.active = Some(ActiveStroke {
            pointer,
            builder: StrokeBuilder::new(position, pen),
            pending: None,
            last_render: now,
        });
        true
    }

    /// Continue the current stroke to `position`.
    ///
    /// Returns true if a segment was rendered, false if the call was ignored or coalesced.
    pub fn extend(&mut self, position: Point) -> bool {
        self.extend_at(position, Instant::now())
    }

    /// Continue the current stroke with an explicit event time.
    pub fn extend_at(&mut self, position: Point, now: Instant) -> bool {
        let Some(surface) = self.surface.as_mut() else {
            return false;
        };
        let Some(active) = self.state.active.as_mut() else {
            return false;
        };
        if !position.is_finite() {
            log::debug!("Ignoring non-finite pointer position {position:?}");
            return false;
        }

        if let Some(interval) = self.min_interval {
            if now.saturating_duration_since(active.last_render) < interval {
                active.pending = Some(position);
                return false;
            }
        }

        render_segment(surface, active, position);
        active.last_render = now;
        true
    }

    /// Finish the current stroke, rendering any coalesced final position.
    pub fn end(&mut self) {
        let Some(mut active) = self.state.active.take() else {
            return;
        };
        if let (Some(pending), Some(surface)) = (active.pending, self.surface.as_mut()) {
            render_segment(surface, &mut active, pending);
        }
        self.state.strokes.push(active.builder.finish());
    }

    /// Terminate the current stroke when the pointer leaves the surface. Ink drawn so far stays.
    pub fn cancel(&mut self) {
        self.end();
    }

    /// Set the color for subsequent strokes.
    pub fn set_color(&mut self, color: Rgb) {
        self.state.pen.color = color;
    }

    /// Set the width for subsequent strokes, snapped to the nearest allowed width.
    pub fn set_width(&mut self, px: f64) {
        self.state.pen.width = StrokeWidth::nearest(px);
    }

    /// Pick a toolbar color together with its default width.
    pub fn select_palette(&mut self, color: PaletteColor) {
        self.state.pen = PenStyle {
            color: color.rgb(),
            width: color.default_width(),
        };
    }

    /// Erase all ink and reset the dirty flag. Pen style is kept.
    pub fn clear(&mut self, _confirmation: ClearConfirmation) {
        let Some(surface) = self.surface.as_mut() else {
            return;
        };
        surface.clear();
        self.state.dirty = false;
        self.state.active = None;
        self.state.strokes.clear();
    }

    /// Encode the surface as a PNG artifact. A blank snapshot means no ink was drawn.
    pub fn snapshot(&self) -> CaptureResult<RasterizedArtifact> {
        let surface = self.surface.as_ref().ok_or(CaptureError::EngineNotReady)?;
        let bytes = surface.encode_png()?;
        Ok(RasterizedArtifact::png(bytes, surface.width(), surface.height()))
    }

    /// Route a pointer event. Only the pointer that began a stroke can extend or end it.
    pub fn handle_pointer_event(&mut self, event: PointerEvent) {
        self.handle_pointer_event_at(event, Instant::now());
    }

    pub fn handle_pointer_event_at(&mut self, event: PointerEvent, now: Instant) {
        let owns_stroke = self
            .state
            .active
            .as_ref()
            .is_some_and(|a| a.pointer == event.pointer());
        match event {
            PointerEvent::Down { pointer, x, y } => {
                self.begin_for(pointer, Point::new(x, y), now);
            }
            PointerEvent::Move { x, y, .. } if owns_stroke => {
                self.extend_at(Point::new(x, y), now);
            }
            PointerEvent::Up { .. } if owns_stroke => self.end(),
            PointerEvent::Leave { .. } if owns_stroke => self.cancel(),
            _ => {}
        }
    }
}

fn render_segment<S: DrawingSurface>(surface: &mut S, active: &mut ActiveStroke, to: Point) {
    let pen = active.builder.style();
    surface.stroke_line(Line::new(active.builder.last(), to), pen.width.px(), pen.color);
    active.builder.push(to);
    active.pending = None;
}
