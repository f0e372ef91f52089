//! Replaying recorded pointer input into a capture engine.

use anyhow::{Context, Result};
use kurbo::Rect;
use seek_core::capture::{CaptureConfig, CaptureEngine};
use seek_core::input::TimedPointerEvent;
use std::io::Read;
use std::path::Path;
use std::time::{Duration, Instant};

/// Load a JSON array of timed pointer events from a file, or stdin for `-`.
pub fn load_script(path: &Path) -> Result<Vec<TimedPointerEvent>> {
    let text = if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("reading pointer script from stdin")?;
        text
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("reading pointer script {}", path.display()))?
    };
    serde_json::from_str(&text).context("parsing pointer script")
}

/// Replay `events` on a fresh software surface.
///
/// A stroke still engaged after the last event is ended so its final position is drawn.
pub fn replay(events: &[TimedPointerEvent], config: &CaptureConfig) -> CaptureEngine {
    let mut engine = CaptureEngine::with_raster(config);
    let start = Instant::now();
    for timed in events {
        let at = start + Duration::from_millis(timed.at_ms);
        engine.handle_pointer_event_at(timed.event, at);
    }
    if engine.is_drawing() {
        engine.end();
    }
    engine
}

/// Union of the bounds of every stroke, if anything was drawn.
pub fn ink_bounds(engine: &CaptureEngine) -> Option<Rect> {
    engine
        .strokes()
        .iter()
        .map(|stroke| stroke.bounds())
        .reduce(|a, b| a.union(b))
}
