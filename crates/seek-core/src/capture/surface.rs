//! Drawing surfaces the capture engine renders into.

use super::style::Rgb;
use super::{CaptureError, CaptureResult};
use kurbo::{Line, Point, Rect};

/// A 2D raster target for ink.
///
/// The engine only ever draws opaque ink, so implementations take plain RGB colors.
pub trait DrawingSurface {
    fn width(&self) -> u32;

    fn height(&self) -> u32;

    /// Fill an axis-aligned rectangle.
    fn fill_rect(&mut self, rect: Rect, color: Rgb);

    /// Stroke a line segment with round caps.
    fn stroke_line(&mut self, line: Line, width: f64, color: Rgb);

    /// Erase everything back to the background.
    fn clear(&mut self);

    /// Encode the current contents as PNG bytes.
    fn encode_png(&self) -> CaptureResult<Vec<u8>>;

    /// Whether nothing but background is present.
    fn is_blank(&self) -> bool;
}

/// Software RGBA8 surface.
#[derive(Debug, Clone)]
pub struct RasterSurface {
    width: u32,
    height: u32,
    background: [u8; 4],
    data: Vec<u8>,
}

impl RasterSurface {
    /// Create a transparent surface. Zero dimensions are bumped to one pixel.
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_background_rgba(width, height, [0, 0, 0, 0])
    }

    /// Create a surface filled with an opaque background color.
    pub fn with_background(width: u32, height: u32, background: Rgb) -> Self {
        Self::with_background_rgba(width, height, [background.r, background.g, background.b, 255])
    }

    fn with_background_rgba(width: u32, height: u32, background: [u8; 4]) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let mut surface = Self {
            width,
            height,
            background,
            data: vec![0; width as usize * height as usize * 4],
        };
        surface.clear();
        surface
    }

    /// Raw RGBA pixel data, row-major.
    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    /// RGBA value of a single pixel.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = self.index(x, y);
        Some([self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]])
    }

    fn index(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * 4
    }

    /// Source-over blend of an opaque color at the given coverage.
    fn blend(&mut self, x: u32, y: u32, color: Rgb, coverage: f32) {
        if coverage <= 0.0 {
            return;
        }
        let i = self.index(x, y);
        let a = coverage.min(1.0);
        let dst_a = self.data[i + 3] as f32 / 255.0;
        let out_a = a + dst_a * (1.0 - a);
        let mix = |src: u8, dst: u8| -> u8 {
            let c = (src as f32 * a + dst as f32 * dst_a * (1.0 - a)) / out_a;
            c.round().clamp(0.0, 255.0) as u8
        };
        self.data[i] = mix(color.r, self.data[i]);
        self.data[i + 1] = mix(color.g, self.data[i + 1]);
        self.data[i + 2] = mix(color.b, self.data[i + 2]);
        self.data[i + 3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
    }

    /// Pixel range covered by `rect`, clipped to the surface.
    fn clip(&self, rect: Rect) -> Option<(u32, u32, u32, u32)> {
        let x0 = rect.x0.floor().max(0.0);
        let y0 = rect.y0.floor().max(0.0);
        let x1 = rect.x1.ceil().min(self.width as f64);
        let y1 = rect.y1.ceil().min(self.height as f64);
        if x0 >= x1 || y0 >= y1 {
            return None;
        }
        Some((x0 as u32, y0 as u32, x1 as u32, y1 as u32))
    }
}

/// Distance from `point` to the segment `line`.
fn distance_to_segment(point: Point, line: Line) -> f64 {
    let seg = line.p1 - line.p0;
    let rel = point - line.p0;
    let len_sq = seg.hypot2();
    if len_sq < f64::EPSILON {
        return rel.hypot();
    }
    let t = (rel.dot(seg) / len_sq).clamp(0.0, 1.0);
    (point - (line.p0 + seg * t)).hypot()
}

impl DrawingSurface for RasterSurface {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn fill_rect(&mut self, rect: Rect, color: Rgb) {
        let rect = rect.abs();
        let Some((x0, y0, x1, y1)) = self.clip(rect) else {
            return;
        };
        for y in y0..y1 {
            for x in x0..x1 {
                let center = Point::new(x as f64 + 0.5, y as f64 + 0.5);
                if rect.contains(center) {
                    self.blend(x, y, color, 1.0);
                }
            }
        }
    }

    fn stroke_line(&mut self, line: Line, width: f64, color: Rgb) {
        let half = (width / 2.0).max(0.5);
        let bounds = Rect::from_points(line.p0, line.p1).inflate(half + 1.0, half + 1.0);
        let Some((x0, y0, x1, y1)) = self.clip(bounds) else {
            return;
        };
        for y in y0..y1 {
            for x in x0..x1 {
                let center = Point::new(x as f64 + 0.5, y as f64 + 0.5);
                let coverage = (half + 0.5 - distance_to_segment(center, line)).clamp(0.0, 1.0);
                self.blend(x, y, color, coverage as f32);
            }
        }
    }

    fn clear(&mut self) {
        for px in self.data.chunks_exact_mut(4) {
            px.copy_from_slice(&self.background);
        }
    }

    fn encode_png(&self) -> CaptureResult<Vec<u8>> {
        let mut out = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut out, self.width, self.height);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder
                .write_header()
                .map_err(|e| CaptureError::Encode(e.to_string()))?;
            writer
                .write_image_data(&self.data)
                .map_err(|e| CaptureError::Encode(e.to_string()))?;
            writer
                .finish()
                .map_err(|e| CaptureError::Encode(e.to_string()))?;
        }
        Ok(out)
    }

    fn is_blank(&self) -> bool {
        self.data.chunks_exact(4).all(|px| px == self.background)
    }
}
