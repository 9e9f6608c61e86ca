use std::fmt;

use serde::{Deserialize, Serialize};

use crate::style::CharStyle;

/// Raster dimensions of the target sequence, in pixels. Both sides must be
/// positive; enforcing that is the caller's contract, not the codec's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const FULL_HD: Resolution = Resolution {
        width: 1920,
        height: 1080,
    };

    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::FULL_HD
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Kind of a scene object. Only text layers are modeled today; the variant
/// exists so documents with future kinds keep a stable serialized tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Text,
}

/// One on-screen text layer.
///
/// `x`/`y` position the object's anchor with the origin at the top-left of
/// the frame. `chars` holds one entry per character of the rendered string;
/// an object with no characters is never emitted by the encoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextObject {
    /// Opaque, caller-assigned, stable across edits.
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: ObjectKind,
    /// Display label; not semantically load-bearing.
    pub name: String,
    pub x: f64,
    pub y: f64,
    /// Degrees, clockwise.
    pub rotation: f64,
    /// 0–100.
    pub opacity: f64,
    pub chars: Vec<CharStyle>,
}

impl TextObject {
    pub fn new(id: u64, name: &str) -> Self {
        Self {
            id,
            kind: ObjectKind::Text,
            name: name.to_string(),
            x: 0.0,
            y: 0.0,
            rotation: 0.0,
            opacity: 100.0,
            chars: Vec::new(),
        }
    }

    /// Builds an object whose characters all share one style template.
    pub fn with_text(id: u64, name: &str, text: &str, template: &CharStyle) -> Self {
        let mut obj = Self::new(id, name);
        obj.chars = text
            .chars()
            .map(|ch| CharStyle {
                ch,
                ..template.clone()
            })
            .collect();
        obj
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    /// The rendered string, joined from the per-character entries.
    pub fn text(&self) -> String {
        self.chars.iter().map(|c| c.ch).collect()
    }

    /// The style the encoder samples for the whole run.
    pub fn run_style(&self) -> Option<&CharStyle> {
        self.chars.first()
    }
}

/// Root of the editor model: a resolution plus an ordered list of layers.
///
/// A scene has no persistence of its own; the PRTL byte stream is the
/// persisted form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextScene {
    pub resolution: Resolution,
    pub objects: Vec<TextObject>,
}

impl TextScene {
    pub fn new(resolution: Resolution) -> Self {
        Self {
            resolution,
            objects: Vec::new(),
        }
    }

    pub fn add_object(&mut self, object: TextObject) {
        self.objects.push(object);
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Distinct font families used across all characters, in first-seen
    /// order.
    pub fn distinct_fonts(&self) -> Vec<&str> {
        let mut fonts: Vec<&str> = Vec::new();
        for obj in &self.objects {
            for ch in &obj.chars {
                if !fonts.contains(&ch.font_family.as_str()) {
                    fonts.push(&ch.font_family);
                }
            }
        }
        fonts
    }
}
