//! # Telop Core
//!
//! Shared text-scene model for the telop (caption) editor: scenes, text
//! layers, per-character styling, strokes, and colors. This is the value
//! type the PRTL codec serializes and reconstructs.
//!
//! The model itself does no I/O and knows nothing about the wire format.

pub mod color;
pub mod scene;
pub mod style;

pub use color::Color;
pub use scene::{ObjectKind, Resolution, TextObject, TextScene};
pub use style::{CharStyle, LineJoin, Shadow, Stroke};
