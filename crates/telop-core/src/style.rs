use serde::{Deserialize, Serialize};

use crate::color::Color;

/// Stroke join style. Decorative only; the PRTL wire format does not carry
/// it, so imported strokes always come back as [`LineJoin::Round`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineJoin {
    Round,
    Miter,
    Bevel,
}

impl Default for LineJoin {
    fn default() -> Self {
        LineJoin::Round
    }
}

/// One outline layer around a glyph run.
///
/// `width` is the outline diameter as stored on the wire (`Fragment/size`);
/// importers recover the visual radius as `width / 2`. When a character
/// carries more than one stroke, the sequence is ordered outermost first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stroke {
    pub enabled: bool,
    pub color: Color,
    pub width: f64,
    /// 0–100. Carried in the model but not representable through the wire
    /// color tables, so it does not survive a round trip.
    pub opacity: f64,
    #[serde(default)]
    pub join: LineJoin,
}

impl Stroke {
    pub fn new(color: Color, width: f64) -> Self {
        Self {
            enabled: true,
            color,
            width,
            opacity: 100.0,
            join: LineJoin::Round,
        }
    }
}

/// Drop-shadow settings for a glyph run.
///
/// The encoder never emits a shadow shader; these fields only drive the
/// shadow fragment's `offset`/`angle` and its off flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shadow {
    pub enabled: bool,
    pub color: Color,
    /// Degrees.
    pub angle: f64,
    /// Pixels.
    pub distance: f64,
    /// Pixels.
    pub blur: f64,
}

impl Default for Shadow {
    fn default() -> Self {
        Self {
            enabled: false,
            color: Color::BLACK,
            angle: -45.0,
            distance: 10.0,
            blur: 5.0,
        }
    }
}

/// Style of a single character.
///
/// The model allows every character its own style, but the PRTL encoder
/// samples the first character's style as the uniform style for the whole
/// run (a single `CharacterAttributes` entry per object).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharStyle {
    #[serde(rename = "char")]
    pub ch: char,
    pub font_family: String,
    /// Pixels.
    pub font_size: f64,
    pub color: Color,
    #[serde(default)]
    pub strokes: Vec<Stroke>,
    #[serde(default)]
    pub shadow: Shadow,
}

impl CharStyle {
    pub fn new(ch: char, font_family: &str, font_size: f64) -> Self {
        Self {
            ch,
            font_family: font_family.to_string(),
            font_size,
            color: Color::WHITE,
            strokes: Vec::new(),
            shadow: Shadow::default(),
        }
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn with_stroke(mut self, stroke: Stroke) -> Self {
        self.strokes.push(stroke);
        self
    }
}
