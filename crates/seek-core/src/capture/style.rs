//! Pen colors and widths.

use serde::{Deserialize, Serialize};

/// An opaque RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse a `#rrggbb` hex string.
    pub fn from_hex(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.len() != 7 || !s.starts_with('#') {
            return None;
        }
        let r = u8::from_str_radix(&s[1..3], 16).ok()?;
        let g = u8::from_str_radix(&s[3..5], 16).ok()?;
        let b = u8::from_str_radix(&s[5..7], 16).ok()?;
        Some(Self::new(r, g, b))
    }

    /// Format as a lowercase `#rrggbb` string.
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl Default for Rgb {
    fn default() -> Self {
        Self::BLACK
    }
}

/// Allowed pen widths, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum StrokeWidth {
    #[default]
    Fine,
    Medium,
    Bold,
    /// Wide pen used together with the white "eraser" color.
    Eraser,
}

impl StrokeWidth {
    pub const ALL: [StrokeWidth; 4] = [
        StrokeWidth::Fine,
        StrokeWidth::Medium,
        StrokeWidth::Bold,
        StrokeWidth::Eraser,
    ];

    /// Width in pixels.
    pub fn px(self) -> f64 {
        match self {
            StrokeWidth::Fine => 2.0,
            StrokeWidth::Medium => 4.0,
            StrokeWidth::Bold => 8.0,
            StrokeWidth::Eraser => 14.0,
        }
    }

    /// The allowed width closest to `px`. Ties resolve to the thinner pen.
    pub fn nearest(px: f64) -> Self {
        let mut best = StrokeWidth::Fine;
        let mut best_dist = f64::MAX;
        for width in Self::ALL {
            let dist = (width.px() - px).abs();
            if dist < best_dist {
                best = width;
                best_dist = dist;
            }
        }
        best
    }
}

/// Named colors offered by the drawing toolbar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaletteColor {
    Black,
    White,
    Red,
    Green,
    Blue,
    Yellow,
    Orange,
}

impl PaletteColor {
    pub const ALL: [PaletteColor; 7] = [
        PaletteColor::Black,
        PaletteColor::White,
        PaletteColor::Red,
        PaletteColor::Green,
        PaletteColor::Blue,
        PaletteColor::Yellow,
        PaletteColor::Orange,
    ];

    pub fn rgb(self) -> Rgb {
        match self {
            PaletteColor::Black => Rgb::BLACK,
            PaletteColor::White => Rgb::WHITE,
            PaletteColor::Red => Rgb::new(255, 0, 0),
            PaletteColor::Green => Rgb::new(0, 128, 0),
            PaletteColor::Blue => Rgb::new(0, 0, 255),
            PaletteColor::Yellow => Rgb::new(255, 255, 0),
            PaletteColor::Orange => Rgb::new(255, 165, 0),
        }
    }

    /// Width applied when this color is picked. White paints over ink, so it gets the wide pen.
    pub fn default_width(self) -> StrokeWidth {
        match self {
            PaletteColor::White => StrokeWidth::Eraser,
            _ => StrokeWidth::Fine,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PaletteColor::Black => "black",
            PaletteColor::White => "white",
            PaletteColor::Red => "red",
            PaletteColor::Green => "green",
            PaletteColor::Blue => "blue",
            PaletteColor::Yellow => "yellow",
            PaletteColor::Orange => "orange",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name().eq_ignore_ascii_case(name))
    }
}

/// Pen style applied to new strokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PenStyle {
    pub color: Rgb,
    pub width: StrokeWidth,
}
