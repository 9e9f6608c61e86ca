//! PRTL legacy-title codec.
//!
//! PRTL is the XML dialect Premiere Pro uses for legacy titles, framed as
//! UTF-16LE bytes with a BOM. The document is relational: Styles reference
//! Shaders through fixed "painter numbers", TextChains reference Styles and
//! TextDescriptions by numeric ID, and a MergeGroups table carries opacity
//! per 1-based object ID.
//!
//! ## Painter numbers
//! `10`–`13` address up to four stroke layers (innermost = 10), `15` is the
//! main text fill, and `-1` is the shader-list key importers resolve the
//! fill color through. `1000`–`1015` is a placeholder block that is always
//! present and always zero.
//!
//! ## ColorSpec convention
//! Each shader stores its RGB redundantly across five `ColorSpec` slots.
//! Stroke shaders keep the real color in index 4; the main-fill shader
//! keeps it in index 0 (index 4 holds the host's near-white filler). This
//! asymmetry looks like a bug but is the host format's convention — both
//! sides of the codec depend on it, so do not normalize it.
//!
//! Encoding and decoding are not exact inverses: the writer emits richer
//! style structure than the reader recovers (the reader keeps main fill,
//! first-level strokes, font, and position). That loss is by design.

use std::collections::HashMap;

use thiserror::Error;

use telop_core::{
    CharStyle, Color, LineJoin, ObjectKind, Resolution, Shadow, Stroke, TextObject, TextScene,
};

use crate::xml::{self, Element, XmlBuilder};

// ── Reference allocation ──────────────────────────────────────────────

/// First reference handed out in each of the document's ID spaces.
const REF_BASE: u32 = 4096;
/// Reference stride between consecutive objects' shader blocks.
const SHADER_STRIDE: u32 = 20;
/// Shader slot holding an object's main fill.
const FILL_SLOT: u32 = 15;

/// Shader references wired into the default style emitted for empty scenes.
const DEFAULT_STYLE_SHADERS: [u32; 4] = [4099, 4100, 4101, 4102];

const DEFAULT_FONT: &str = "Yu Gothic UI";
const DEFAULT_FONT_SIZE: f64 = 48.0;

/// Index-4 filler the host writes into main-fill shaders.
const NEAR_WHITE: Color = Color {
    r: 250,
    g: 250,
    b: 250,
};

/// Painter numbers wired into `ShaderList` and `painterMix`.
mod painter {
    /// First of the four stroke painters; innermost stroke layer.
    pub const STROKE_BASE: i64 = 10;
    pub const STROKE_MAX: i64 = 13;
    /// Main text fill (as referenced from the fill fragment's painterMix).
    pub const FILL: i64 = 15;
    /// Shader-list key importers resolve the fill color through.
    pub const FILL_LOOKUP: i64 = -1;
    pub const PLACEHOLDER_FIRST: i64 = 1000;
    pub const PLACEHOLDER_LAST: i64 = 1015;
}

/// Fixed `annotation` codes marking fragment roles; any other value marks a
/// stroke layer.
mod annotation {
    pub const SHADOW: i64 = 65537;
    pub const FILL: i64 = 65538;
}

/// Style references derived purely from object order, so re-encoding the
/// same scene is byte identical.
fn style_ref(object_index: usize) -> u32 {
    REF_BASE + object_index as u32
}

fn text_desc_ref(font_index: usize) -> u32 {
    REF_BASE + font_index as u32
}

/// `slot` is `painter_number - 10` for strokes and [`FILL_SLOT`] for the
/// main fill; keying by painter number keeps the emitted Shader table and
/// the ShaderList painter map consistent.
fn shader_ref(object_index: usize, slot: u32) -> u32 {
    REF_BASE + object_index as u32 * SHADER_STRIDE + slot
}

// ── Errors and diagnostics ────────────────────────────────────────────

/// Fatal decode failures. Anything survivable degrades to a
/// [`DecodeWarning`] instead.
#[derive(Error, Debug)]
pub enum PrtlError {
    /// The byte stream cannot be framed as UTF-16LE.
    #[error("byte stream is not UTF-16LE: {0}")]
    Framing(String),

    /// The decoded text is not well-formed XML.
    #[error("malformed PRTL markup: {0}")]
    Xml(String),

    /// A structurally required element is absent.
    #[error("required element <{0}> is missing")]
    MissingElement(&'static str),
}

/// Non-fatal reference-resolution failures encountered during decode.
///
/// Each one is logged and substituted with a documented default so a single
/// bad object cannot sink the rest of the document.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeWarning {
    #[error("TextDescription {0} is not defined; font defaulted")]
    DanglingTextDescription(i64),

    #[error("Style {0} is not defined; plain white fill assumed")]
    DanglingStyle(i64),

    #[error("Shader {0} (painter {1}) is not defined; color defaulted")]
    DanglingShader(i64, i64),

    #[error("no shader mapped to painter {0}; color defaulted")]
    UnmappedPainter(i64),

    #[error("TextChain {0} is not defined; object skipped")]
    DanglingTextChain(i64),
}

// ── Byte framing ──────────────────────────────────────────────────────

/// UTF-16LE with a BOM; one little-endian word per code unit. The Encoding
/// Standard does not permit UTF-16 as an output encoding, so the framing is
/// done by hand rather than through encoding_rs.
fn encode_utf16le(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(2 + text.len() * 2);
    out.extend_from_slice(&[0xFF, 0xFE]);
    for unit in text.encode_utf16() {
        out.extend_from_slice(&unit.to_le_bytes());
    }
    out
}

/// Strips an optional LE BOM and decodes the rest pairwise.
fn decode_utf16le(bytes: &[u8]) -> Result<String, PrtlError> {
    let body = bytes.strip_prefix(&[0xFF, 0xFE]).unwrap_or(bytes);
    if body.len() % 2 != 0 {
        return Err(PrtlError::Framing(format!(
            "odd byte length {}",
            bytes.len()
        )));
    }
    let (text, had_errors) = encoding_rs::UTF_16LE.decode_without_bom_handling(body);
    if had_errors {
        log::debug!("unpaired surrogates replaced while decoding PRTL bytes");
    }
    Ok(text.into_owned())
}

// ── Writer ────────────────────────────────────────────────────────────

/// Serializes a [`TextScene`] into PRTL bytes.
///
/// Pure: no internal state, and two calls over the same scene produce
/// identical output. Objects with no characters (and non-text objects) are
/// skipped; an empty scene still yields the default Style/Shader block the
/// host expects.
#[derive(Debug, Default)]
pub struct PrtlWriter;

impl PrtlWriter {
    pub fn new() -> Self {
        Self
    }

    pub fn write(&self, scene: &TextScene) -> Vec<u8> {
        encode_utf16le(&self.build_document(scene))
    }

    fn build_document(&self, scene: &TextScene) -> String {
        let objects: Vec<&TextObject> = scene
            .objects
            .iter()
            .filter(|o| o.kind == ObjectKind::Text && !o.chars.is_empty())
            .collect();
        if objects.len() < scene.objects.len() {
            log::debug!(
                "skipping {} object(s) with no characters",
                scene.objects.len() - objects.len()
            );
        }
        let fonts = collect_fonts(&objects);

        let mut x = XmlBuilder::new();
        x.decl("1.0", "UTF-16");
        x.open("Adobe_Root");
        write_title_header(&mut x);
        x.open_with("InscriberLayouts", &[("Version", "1.0")]);
        x.open("Layout");
        write_layout_preamble(&mut x, scene.resolution);
        write_text_descriptions(&mut x, &fonts);
        write_styles(&mut x, &objects);
        write_shaders(&mut x, &objects);
        x.open("Textures");
        x.close();
        x.open("Logos");
        x.close();
        write_layers(&mut x, &objects);
        write_vls(&mut x);
        x.close(); // Layout
        x.close(); // InscriberLayouts
        x.close(); // Adobe_Root
        x.finish()
    }
}

/// Distinct font families in first-seen order, each with the size of its
/// first appearance. Never empty: the document's `DefaultTextDescription`
/// pointer must resolve even for a fontless scene.
fn collect_fonts(objects: &[&TextObject]) -> Vec<(String, f64)> {
    let mut fonts: Vec<(String, f64)> = Vec::new();
    for obj in objects {
        for ch in &obj.chars {
            if !fonts.iter().any(|(family, _)| family == &ch.font_family) {
                fonts.push((ch.font_family.clone(), ch.font_size));
            }
        }
    }
    if fonts.is_empty() {
        fonts.push((DEFAULT_FONT.to_string(), DEFAULT_FONT_SIZE));
    }
    fonts
}

/// Formats a number the way the host writes them: integral values without a
/// decimal point.
fn fmt_num(value: f64) -> String {
    if value == value.trunc() && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

fn write_leaves(x: &mut XmlBuilder, leaves: &[(&str, &str)]) {
    for (name, text) in leaves {
        x.leaf(name, text);
    }
}

fn write_title_header(x: &mut XmlBuilder) {
    x.open("Adobe_Title");
    x.leaf("Version", "20080702");
    x.open("Motion_Settings");
    write_leaves(
        x,
        &[
            ("Play_Forward", "true"),
            ("Start_on_Screen", "false"),
            ("Pre_Roll", "0"),
            ("Ease_In", "0"),
            ("End_off_Screen", "false"),
            ("Post_Roll", "0"),
            ("Ease_Out", "0"),
        ],
    );
    x.close();
    x.close();
}

fn write_safe_area(x: &mut XmlBuilder, name: &str, inset: f64) {
    x.open(name);
    x.leaf("left", &fmt_num(inset));
    x.leaf("top", &fmt_num(inset));
    x.leaf("right", &fmt_num(1.0 - inset));
    x.leaf("bottom", &fmt_num(1.0 - inset));
    x.close();
}

fn write_chain_defaults(x: &mut XmlBuilder, name: &str, word_wrap: bool, locked: bool) {
    x.open(name);
    write_leaves(
        x,
        &[
            ("leading", "0"),
            ("boxCanGrow", "false"),
            ("wordWrap", if word_wrap { "true" } else { "false" }),
            ("lockedLinesX", if locked { "true" } else { "false" }),
            ("lockedLinesY", if locked { "true" } else { "false" }),
            ("Alignment", "left"),
            ("tabModeStyle", "Word"),
            ("implicitTabSpacing", "100"),
            ("implicitTabType", "left"),
            ("rtl", "false"),
        ],
    );
    x.open("tabs");
    x.close();
    x.close();
}

fn write_layout_preamble(x: &mut XmlBuilder, resolution: Resolution) {
    x.open_with("LayoutEffectInfo", &[("Version", "2")]);
    write_leaves(
        x,
        &[
            ("EffectType", "0"),
            ("Indic", "false"),
            ("Ligatures", "false"),
            ("HindiDigits", "false"),
        ],
    );
    x.close();

    x.open_with("LayoutDimension", &[("Version", "2")]);
    x.leaf("pXPIXELS", &resolution.width.to_string());
    x.leaf("pYLINES", &resolution.height.to_string());
    x.leaf("pSCREENAR", "1");
    x.leaf("growthDirection", "growRightDown");
    x.close();

    x.open("LayoutAttributes");
    write_safe_area(x, "SafeTitleArea", 0.1);
    write_safe_area(x, "SafeActionArea", 0.05);
    x.close();

    x.open_with("Background", &[("Version", "4")]);
    write_leaves(
        x,
        &[
            ("ShaderReference", "4098"),
            ("On", "false"),
            ("paintingRange", "normalLayout"),
        ],
    );
    x.close();

    x.open("DefaultStyle");
    x.leaf("Reference", &REF_BASE.to_string());
    x.close();
    x.open("DefaultTextDescription");
    x.leaf("Reference", &REF_BASE.to_string());
    x.close();

    let fillets = "37.5 ".repeat(8);
    x.open("GraphicObjectDefaults");
    write_leaves(
        x,
        &[
            ("endCapType", "square"),
            ("joinTypeClosed", "round"),
            ("joinTypeOpen", "round"),
            ("lineWidth", "5"),
            ("miterLimit", "5"),
            ("windBeziers", "false"),
            ("roundCornerFillets", &fillets),
            ("clippedCornerFillets", &fillets),
        ],
    );
    x.close();

    x.open("TextChainDefaults");
    write_chain_defaults(x, "normal", true, false);
    write_chain_defaults(x, "boxNormal", true, true);
    write_chain_defaults(x, "blockNormal", false, true);
    write_chain_defaults(x, "spline", false, false);
    x.close();
}

fn write_text_descriptions(x: &mut XmlBuilder, fonts: &[(String, f64)]) {
    x.open_with("TextDescriptions", &[("Version", "4")]);
    for (index, (family, size)) in fonts.iter().enumerate() {
        let reference = text_desc_ref(index).to_string();
        x.open_with("TextDescription", &[("Reference", &reference)]);
        x.open("TypeSpec");
        // Stored size is roughly 8x the pixel size; the reader divides back.
        x.leaf("size", &fmt_num((size * 8.0).round()));
        write_leaves(
            x,
            &[
                ("txHeight", "75"),
                ("txKern", "0"),
                ("baselineShift", "0"),
                ("leading", "0"),
                ("txSCaps", "75"),
                ("txSCapsOn", "false"),
                ("txSlant", "0"),
                ("txUnderline", "false"),
                ("txWidth", "67.5"),
                ("linked", "false"),
                ("fiBold", "0"),
                ("fiItalic", "0"),
                ("fifullName", family),
                ("fifontFamilyName", family),
                ("fifontStyle", "Regular"),
                ("fifontType", "5"),
                ("ficategory", "1"),
            ],
        );
        x.close();
        x.close();
    }
    x.close();
}

struct Fragment {
    size: f64,
    offset: f64,
    angle: f64,
    extended_shadow: bool,
    fragment_type: u8,
    off: bool,
    annotation: i64,
    painter: i64,
}

fn write_fragment(x: &mut XmlBuilder, frag: &Fragment) {
    x.open("Fragment");
    x.leaf("size", &fmt_num(frag.size));
    x.leaf("offset", &fmt_num(frag.offset));
    x.leaf("angle", &fmt_num(frag.angle));
    x.leaf("ghost", "false");
    x.leaf(
        "isExtendedShadowFragment",
        if frag.extended_shadow { "true" } else { "false" },
    );
    x.leaf("eFragmentType", &frag.fragment_type.to_string());
    x.leaf("fragmentOff", if frag.off { "true" } else { "false" });
    x.leaf("placeHolder", "false");
    x.leaf("annotation", &frag.annotation.to_string());
    x.leaf("placeHolderShaderIndex", "4294967295");
    x.leaf("painterMix", &format!("{} ", frag.painter).repeat(16));
    x.close();
}

fn write_shader_ref(x: &mut XmlBuilder, painter_number: i64, reference: u32) {
    x.open_with("ShaderRef", &[("PainterNumber", &painter_number.to_string())]);
    x.leaf("shaderRef", &reference.to_string());
    x.close();
}

fn write_style_base(x: &mut XmlBuilder, style_id: u32) {
    x.open_with("StyleBase", &[("Version", "4")]);
    x.leaf("type", "50000");
    x.leaf("positionDominance", "0");
    x.leaf("lineGradient", "false");
    x.leaf("styleRef", &style_id.to_string());
    write_leaves(
        x,
        &[
            ("faceDistortX", "0"),
            ("faceDistortY", "0"),
            ("shadow_softness", "30"),
            ("personality", "0"),
            ("linked", "false"),
            ("EmbellishmentSizeRule", "false"),
            ("PainterRampType", "Basic"),
        ],
    );
    x.close();
}

fn write_fill_and_shadow_fragments(x: &mut XmlBuilder, shadow: &Shadow) {
    write_fragment(
        x,
        &Fragment {
            size: 0.0,
            offset: 0.0,
            angle: 0.0,
            extended_shadow: false,
            fragment_type: 0,
            off: false,
            annotation: annotation::FILL,
            painter: painter::FILL,
        },
    );
    // The shadow fragment's off flag is the negation of the model's
    // enabled flag.
    write_fragment(
        x,
        &Fragment {
            size: 0.0,
            offset: shadow.distance,
            angle: shadow.angle,
            extended_shadow: true,
            fragment_type: 0,
            off: !shadow.enabled,
            annotation: annotation::SHADOW,
            painter: 0,
        },
    );
}

fn write_styles(x: &mut XmlBuilder, objects: &[&TextObject]) {
    x.open("Styles");
    if objects.is_empty() {
        write_default_style(x);
    } else {
        for (index, obj) in objects.iter().enumerate() {
            write_object_style(x, obj, index);
        }
    }
    x.close();
}

fn enabled_strokes(run: &CharStyle) -> Vec<&Stroke> {
    // The format has exactly four stroke painters; extra layers are dropped
    // from the outside in.
    run.strokes.iter().filter(|s| s.enabled).take(4).collect()
}

fn write_object_style(x: &mut XmlBuilder, obj: &TextObject, index: usize) {
    let Some(run) = obj.run_style() else { return };
    let strokes = enabled_strokes(run);
    let count = strokes.len();
    let style_id = style_ref(index);

    x.open_with("Style", &[("ID", &style_id.to_string())]);
    write_style_base(x, style_id);

    x.open_with("FragmentList", &[("Version", "5")]);
    // Stroke fragments go widest first: input order is outermost first, so
    // position k from the outside gets annotation count-k and painter
    // 10 + (count - k - 1).
    for (k, stroke) in strokes.iter().enumerate() {
        write_fragment(
            x,
            &Fragment {
                size: stroke.width,
                offset: 0.0,
                angle: 0.0,
                extended_shadow: false,
                fragment_type: 2,
                off: false,
                annotation: (count - k) as i64,
                painter: painter::STROKE_BASE + (count - k - 1) as i64,
            },
        );
    }
    write_fill_and_shadow_fragments(x, &run.shadow);
    x.close();

    x.open_with("ShaderList", &[("Version", "1")]);
    for p in 2..=painter::FILL {
        let slot = p - painter::STROKE_BASE;
        let backed = (painter::STROKE_BASE..=painter::STROKE_MAX).contains(&p)
            && (slot as usize) < count;
        let reference = if backed {
            shader_ref(index, slot as u32)
        } else {
            0
        };
        write_shader_ref(x, p, reference);
    }
    write_shader_ref(x, painter::FILL_LOOKUP, shader_ref(index, FILL_SLOT));
    for p in painter::PLACEHOLDER_FIRST..=painter::PLACEHOLDER_LAST {
        write_shader_ref(x, p, 0);
    }
    x.close();

    x.close();
}

/// The host expects the DefaultStyle pointer to resolve even when the scene
/// has no objects; this style (and its shaders) fill that role.
fn write_default_style(x: &mut XmlBuilder) {
    let style_id = REF_BASE;
    x.open_with("Style", &[("ID", &style_id.to_string())]);
    write_style_base(x, style_id);

    x.open_with("FragmentList", &[("Version", "5")]);
    write_fragment(
        x,
        &Fragment {
            size: 60.0,
            offset: 0.0,
            angle: 0.0,
            extended_shadow: false,
            fragment_type: 2,
            off: false,
            annotation: 2,
            painter: 12,
        },
    );
    write_fragment(
        x,
        &Fragment {
            size: 30.0,
            offset: 0.0,
            angle: 0.0,
            extended_shadow: false,
            fragment_type: 2,
            off: false,
            annotation: 1,
            painter: 13,
        },
    );
    write_fill_and_shadow_fragments(x, &Shadow::default());
    x.close();

    x.open_with("ShaderList", &[("Version", "1")]);
    write_shader_ref(x, 12, DEFAULT_STYLE_SHADERS[0]);
    write_shader_ref(x, 13, DEFAULT_STYLE_SHADERS[1]);
    write_shader_ref(x, painter::FILL, DEFAULT_STYLE_SHADERS[2]);
    write_shader_ref(x, painter::FILL_LOOKUP, DEFAULT_STYLE_SHADERS[3]);
    x.close();

    x.close();
}

/// `spec_zero` lands in ColorSpec 0 and `spec_four` in ColorSpec 4; slots
/// 1–3 are always zero. See the module notes on the asymmetric convention.
fn write_shader(x: &mut XmlBuilder, reference: u32, spec_zero: Color, spec_four: Color) {
    x.open_with("Shader", &[("Version", "4")]);
    x.leaf("cReference", &reference.to_string());
    write_leaves(
        x,
        &[
            ("textureRef", "0"),
            ("colorOption", "4"),
            ("shaderOn", "true"),
            ("glintSize", "10"),
            ("glintOffset", "0"),
            ("rampPosTop", "75"),
            ("rampPosBottom", "25"),
            ("rampAngle", "0"),
            ("bevelBalance", "0"),
            ("rampCycle", "0"),
            ("classicStyle", "0"),
            ("rampType", "0"),
        ],
    );
    for index in 0..5u8 {
        let color = match index {
            0 => spec_zero,
            4 => spec_four,
            _ => Color::BLACK,
        };
        x.open_with("ColorSpec", &[("index", &index.to_string())]);
        x.leaf("red", &color.r.to_string());
        x.leaf("green", &color.g.to_string());
        x.leaf("blue", &color.b.to_string());
        x.leaf("xpar", "0");
        x.close();
    }
    write_leaves(
        x,
        &[
            ("glintAngle", "0"),
            ("bevelSize", "0"),
            ("bevelDirection", "0"),
            ("bevelPipe", "false"),
            ("bevelAngle", "0"),
            ("bevelShape", "1"),
            ("bevelShining", "0"),
            ("bevelLight", "false"),
            ("bevelMerge", "true"),
            ("sheenOn", "false"),
        ],
    );
    x.close();
}

fn write_shaders(x: &mut XmlBuilder, objects: &[&TextObject]) {
    x.open("Shaders");
    if objects.is_empty() {
        // Back the default style so its references do not dangle.
        write_shader(x, DEFAULT_STYLE_SHADERS[0], Color::BLACK, Color::BLACK);
        write_shader(x, DEFAULT_STYLE_SHADERS[1], Color::BLACK, Color::BLACK);
        write_shader(x, DEFAULT_STYLE_SHADERS[2], Color::WHITE, NEAR_WHITE);
        write_shader(x, DEFAULT_STYLE_SHADERS[3], Color::WHITE, NEAR_WHITE);
    }
    for (index, obj) in objects.iter().enumerate() {
        let Some(run) = obj.run_style() else { continue };
        let strokes = enabled_strokes(run);
        let count = strokes.len();
        for (k, stroke) in strokes.iter().enumerate() {
            // Slot matches the painter assigned to this layer's fragment.
            let slot = (count - k - 1) as u32;
            write_shader(x, shader_ref(index, slot), Color::BLACK, stroke.color);
        }
        write_shader(x, shader_ref(index, FILL_SLOT), run.color, NEAR_WHITE);
    }
    x.close();
}

fn write_text_chain(x: &mut XmlBuilder, obj: &TextObject, index: usize) {
    let Some(run) = obj.run_style() else { return };
    let text = obj.text();
    let unit_count = text.encode_utf16().count();
    // No explicit box size in the model; estimate from the run.
    let est_width = unit_count as f64 * run.font_size * 0.8;
    let est_height = run.font_size * 1.5;

    x.open("TextChain");

    x.open_with("ChainProperty", &[("Version", "9")]);
    x.leaf("wordWrap", "false");
    x.open("Position");
    x.leaf("x", &fmt_num(obj.x));
    x.leaf("y", &fmt_num(obj.y));
    x.close();
    x.open("Size");
    x.leaf("x", &fmt_num(est_width));
    x.leaf("y", &fmt_num(est_height));
    x.close();
    write_leaves(
        x,
        &[
            ("leading", "0"),
            ("lockedLinesX", "true"),
            ("lockedLinesY", "true"),
            ("boxCanGrow", "false"),
            ("tabModeStyle", "Word"),
            ("implicitTabSpacing", "100"),
            ("implicitTabType", "left"),
        ],
    );
    x.close();

    x.open("ChainTabs");
    x.open("TabList");
    x.close();
    x.close();

    let object_id = (index + 1).to_string();
    let persistent_id = (index + 3).to_string();
    x.open_with(
        "TextLine",
        &[
            ("Version", "2"),
            ("objectID", &object_id),
            ("persistentID", &persistent_id),
        ],
    );
    x.open_with("BaseProperties", &[("Version", "5")]);
    x.leaf("txBase", &fmt_num(run.font_size * 1.2));
    x.leaf("XPos", &fmt_num(obj.x));
    x.leaf("angle", &fmt_num(obj.rotation));
    x.leaf("verticalText", "false");
    x.leaf("objectLeading", "0");
    x.close();
    x.leaf("EnclosingObjectType", "block");
    x.leaf("Alignment", "left");
    x.leaf("RTL", "false");
    x.leaf("TRString", &text);
    x.open("RunLengthEncodedCharacterAttributes");
    // One run for the whole string: per-character styling collapses to the
    // first character's style.
    x.empty_with(
        "CharacterAttributes",
        &[
            ("RunCount", &unit_count.to_string()),
            ("StyleRef", &style_ref(index).to_string()),
            ("TextRef", &text_desc_ref(0).to_string()),
            ("TXKerning", "0"),
            ("TXPostKerning", "0"),
            ("BaselineShifting", "0"),
        ],
    );
    x.close();
    x.leaf("tagName", "");
    x.close(); // TextLine

    x.close(); // TextChain
}

fn write_layers(x: &mut XmlBuilder, objects: &[&TextObject]) {
    x.open("Layers");
    x.open("Layer");
    x.open("DrawPage");
    x.close();
    x.open("TextPage");
    for (index, obj) in objects.iter().enumerate() {
        write_text_chain(x, obj, index);
    }
    x.close();
    x.open("MergeGroups");
    for (index, obj) in objects.iter().enumerate() {
        let group_id = (index + 1).to_string();
        x.open_with("Group", &[("groupID", &group_id)]);
        x.leaf("punchThru", "false");
        x.leaf("opacity", &fmt_num(obj.opacity / 100.0));
        x.empty_with("ObjectID", &[("value", &group_id)]);
        x.close();
    }
    x.close();
    x.close(); // Layer
    x.close(); // Layers
}

fn write_vls(x: &mut XmlBuilder) {
    x.open("VLS");
    x.open_with("FileReference", &[("Version", "1")]);
    x.leaf("fileString", "");
    x.leaf("seClass", "2");
    x.leaf("seCode", "1000");
    x.close();
    x.close();
}

// ── Reader ────────────────────────────────────────────────────────────

/// A font table entry. The stored size is ~8x the pixel size; recovery by
/// division is an approximation, not an exact inverse.
struct TextDesc {
    family: String,
    size: f64,
}

/// One stroke layer recovered from a style's fragment list.
struct StrokeLayer {
    /// Radius: the fragment size is a diameter.
    width: f64,
    painter: Option<i64>,
}

#[derive(Default)]
struct StyleInfo {
    strokes: Vec<StrokeLayer>,
    shader_refs: HashMap<i64, i64>,
}

/// ColorSpec slots of one shader. Which slot is authoritative depends on
/// what references the shader: strokes prefer slot 4, the main fill slot 0.
#[derive(Default)]
struct ShaderInfo {
    slots: [Option<Color>; 5],
}

impl ShaderInfo {
    fn stroke_color(&self) -> Option<Color> {
        self.slots[4].or(self.slots[0])
    }

    fn fill_color(&self) -> Option<Color> {
        self.slots[0].or(self.slots[4])
    }
}

struct Tables {
    text_descs: HashMap<i64, TextDesc>,
    styles: HashMap<i64, StyleInfo>,
    shaders: HashMap<i64, ShaderInfo>,
}

/// A `TextChain` as found in the document, before reconstruction.
struct ChainDecl {
    reference: Option<i64>,
    text: String,
    style_ref: Option<i64>,
    desc_ref: Option<i64>,
    x: f64,
    y: f64,
    angle: f64,
    object_id: Option<i64>,
}

/// An `Object` declaration from a host-resaved document.
struct ObjectDecl {
    x: f64,
    y: f64,
    rotation: f64,
    opacity: f64,
    text_ref: Option<i64>,
    style_ref: Option<i64>,
}

/// Reconstructs a [`TextScene`] from PRTL bytes.
///
/// All references are resolved through the document's explicit
/// Reference/ID attributes; no allocation base is assumed, since files
/// resaved by the host renumber freely. Unresolvable references degrade to
/// defaults and are reported through [`PrtlReader::warnings`].
#[derive(Debug, Default)]
pub struct PrtlReader {
    warnings: Vec<DecodeWarning>,
}

impl PrtlReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Diagnostics accumulated by the last [`read`](Self::read) call.
    pub fn warnings(&self) -> &[DecodeWarning] {
        &self.warnings
    }

    pub fn read(&mut self, bytes: &[u8]) -> Result<TextScene, PrtlError> {
        self.warnings.clear();

        let text = decode_utf16le(bytes)?;
        let root = xml::parse(&text).map_err(PrtlError::Xml)?;
        let layout = if root.name == "Layout" {
            &root
        } else {
            root.find("Layout")
                .ok_or(PrtlError::MissingElement("Layout"))?
        };

        let resolution = read_resolution(layout);
        let tables = Tables {
            text_descs: read_text_descriptions(layout),
            styles: read_styles(layout),
            shaders: read_shaders(layout),
        };
        let chains = read_text_chains(layout);
        let object_decls = read_object_decls(layout);
        let group_opacity = read_merge_groups(layout);

        let mut scene = TextScene::new(resolution);
        if !object_decls.is_empty() {
            // Host-resaved document: the Object table drives layout and the
            // chains are resolved through TextRef.
            let by_ref: HashMap<i64, &ChainDecl> = chains
                .iter()
                .filter_map(|c| c.reference.map(|r| (r, c)))
                .collect();
            for (index, decl) in object_decls.iter().enumerate() {
                let chain = decl.text_ref.and_then(|r| by_ref.get(&r).copied());
                let Some(chain) = chain else {
                    self.warn(DecodeWarning::DanglingTextChain(
                        decl.text_ref.unwrap_or_default(),
                    ));
                    continue;
                };
                let style = decl.style_ref.or(chain.style_ref);
                if let Some(obj) = self.build_object(
                    index,
                    decl.x,
                    decl.y,
                    decl.rotation,
                    decl.opacity,
                    style,
                    chain,
                    &tables,
                ) {
                    scene.objects.push(obj);
                }
            }
        } else {
            // Generator-shaped document: one object per chain, opacity via
            // the merge-group table.
            for (index, chain) in chains.iter().enumerate() {
                let object_id = chain.object_id.unwrap_or(index as i64 + 1);
                let opacity = group_opacity.get(&object_id).copied().unwrap_or(100.0);
                if let Some(obj) = self.build_object(
                    index,
                    chain.x,
                    chain.y,
                    chain.angle,
                    opacity,
                    chain.style_ref,
                    chain,
                    &tables,
                ) {
                    scene.objects.push(obj);
                }
            }
        }

        log::info!(
            "decoded {} text object(s) at {} ({} warning(s))",
            scene.objects.len(),
            scene.resolution,
            self.warnings.len()
        );
        Ok(scene)
    }

    fn warn(&mut self, warning: DecodeWarning) {
        log::warn!("{warning}");
        self.warnings.push(warning);
    }

    #[allow(clippy::too_many_arguments)]
    fn build_object(
        &mut self,
        index: usize,
        x: f64,
        y: f64,
        rotation: f64,
        opacity: f64,
        style_ref: Option<i64>,
        chain: &ChainDecl,
        tables: &Tables,
    ) -> Option<TextObject> {
        if chain.text.is_empty() {
            log::debug!("skipping text chain {index} with no content");
            return None;
        }

        let (family, size) = match chain.desc_ref {
            Some(r) => match tables.text_descs.get(&r) {
                Some(desc) => (desc.family.clone(), desc.size),
                None => {
                    self.warn(DecodeWarning::DanglingTextDescription(r));
                    (DEFAULT_FONT.to_string(), DEFAULT_FONT_SIZE)
                }
            },
            None => (DEFAULT_FONT.to_string(), DEFAULT_FONT_SIZE),
        };

        let style = match style_ref {
            Some(r) => {
                let found = tables.styles.get(&r);
                if found.is_none() {
                    self.warn(DecodeWarning::DanglingStyle(r));
                }
                found
            }
            None => None,
        };

        let color = style
            .map(|s| self.resolve_color(s, painter::FILL_LOOKUP, tables, Color::WHITE))
            .unwrap_or(Color::WHITE);

        let strokes: Vec<Stroke> = match style {
            Some(s) => s
                .strokes
                .iter()
                .map(|layer| {
                    let stroke_color = match layer.painter {
                        Some(p) => self.resolve_color(s, p, tables, Color::BLACK),
                        None => {
                            self.warn(DecodeWarning::UnmappedPainter(painter::STROKE_BASE));
                            Color::BLACK
                        }
                    };
                    Stroke {
                        enabled: true,
                        color: stroke_color,
                        width: layer.width,
                        opacity: 100.0,
                        join: LineJoin::Round,
                    }
                })
                .collect(),
            None => Vec::new(),
        };

        let chars: Vec<CharStyle> = chain
            .text
            .chars()
            .map(|ch| CharStyle {
                ch,
                font_family: family.clone(),
                font_size: size,
                color,
                strokes: strokes.clone(),
                shadow: Shadow::default(),
            })
            .collect();

        let mut obj = TextObject::new(index as u64 + 1, &format!("Imported {}", index + 1));
        obj.x = x;
        obj.y = y;
        obj.rotation = rotation;
        obj.opacity = opacity;
        obj.chars = chars;
        Some(obj)
    }

    /// Looks a painter number up through a style's shader map. Stroke
    /// painters read ColorSpec 4 first; the fill lookup (-1) reads
    /// ColorSpec 0 first.
    fn resolve_color(
        &mut self,
        style: &StyleInfo,
        painter_number: i64,
        tables: &Tables,
        fallback: Color,
    ) -> Color {
        let Some(&shader_id) = style.shader_refs.get(&painter_number) else {
            self.warn(DecodeWarning::UnmappedPainter(painter_number));
            return fallback;
        };
        let Some(shader) = tables.shaders.get(&shader_id) else {
            self.warn(DecodeWarning::DanglingShader(shader_id, painter_number));
            return fallback;
        };
        let resolved = if painter_number == painter::FILL_LOOKUP {
            shader.fill_color()
        } else {
            shader.stroke_color()
        };
        resolved.unwrap_or(fallback)
    }
}

fn attr_i64(el: &Element, name: &str) -> Option<i64> {
    el.attr(name).and_then(|v| v.trim().parse().ok())
}

fn text_f64(el: &Element, name: &str) -> Option<f64> {
    el.find(name).and_then(|e| e.text.trim().parse().ok())
}

fn text_i64(el: &Element, name: &str) -> Option<i64> {
    el.find(name).and_then(|e| e.text.trim().parse().ok())
}

fn read_resolution(layout: &Element) -> Resolution {
    // Some producers omit the dimension fields; absence is not fatal.
    let width = text_i64(layout, "pXPIXELS")
        .and_then(|v| u32::try_from(v).ok())
        .filter(|&v| v > 0)
        .unwrap_or(Resolution::FULL_HD.width);
    let height = text_i64(layout, "pYLINES")
        .and_then(|v| u32::try_from(v).ok())
        .filter(|&v| v > 0)
        .unwrap_or(Resolution::FULL_HD.height);
    Resolution::new(width, height)
}

fn read_text_descriptions(layout: &Element) -> HashMap<i64, TextDesc> {
    let mut map = HashMap::new();
    for td in layout.find_all("TextDescription") {
        let Some(reference) = attr_i64(td, "Reference") else {
            continue;
        };
        let family = td
            .find("fifontFamilyName")
            .map(|e| e.text.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_FONT.to_string());
        let size = text_f64(td, "size")
            .map(|v| v / 8.0)
            .unwrap_or(DEFAULT_FONT_SIZE);
        map.insert(reference, TextDesc { family, size });
    }
    map
}

fn read_styles(layout: &Element) -> HashMap<i64, StyleInfo> {
    let mut map = HashMap::new();
    for style in layout.find_all("Style") {
        let Some(id) = attr_i64(style, "ID") else {
            continue;
        };
        let mut info = StyleInfo::default();

        for shader_ref in style.find_all("ShaderRef") {
            let painter_number = attr_i64(shader_ref, "PainterNumber");
            let reference = text_i64(shader_ref, "shaderRef");
            if let (Some(p), Some(r)) = (painter_number, reference) {
                if r != 0 {
                    info.shader_refs.insert(p, r);
                }
            }
        }

        for frag in style.find_all("Fragment") {
            let ann = text_i64(frag, "annotation");
            let fragment_type = text_i64(frag, "eFragmentType").unwrap_or(-1);
            let off = frag
                .find("fragmentOff")
                .map(|e| e.text.trim() == "true")
                .unwrap_or(false);
            let size = text_f64(frag, "size").unwrap_or(0.0);
            let painter = frag
                .find("painterMix")
                .and_then(|e| e.text.split_whitespace().next().map(str::to_string))
                .and_then(|t| t.parse::<i64>().ok());

            let is_stroke = matches!(
                ann,
                Some(a) if a != annotation::SHADOW && a != annotation::FILL
            ) && fragment_type == 2
                && !off;
            if is_stroke {
                info.strokes.push(StrokeLayer {
                    width: size / 2.0,
                    painter,
                });
            }
        }

        map.insert(id, info);
    }
    map
}

fn read_shaders(layout: &Element) -> HashMap<i64, ShaderInfo> {
    let mut map = HashMap::new();
    for shader in layout.find_all("Shader") {
        let Some(reference) = text_i64(shader, "cReference") else {
            continue;
        };
        let mut info = ShaderInfo::default();
        for spec in shader.find_all("ColorSpec") {
            let Some(index) = attr_i64(spec, "index").and_then(|i| usize::try_from(i).ok())
            else {
                continue;
            };
            if index >= info.slots.len() {
                continue;
            }
            let channel = |name| {
                spec.find(name)
                    .and_then(|e: &Element| e.text.trim().parse::<u8>().ok())
                    .unwrap_or(255)
            };
            info.slots[index] = Some(Color::new(
                channel("red"),
                channel("green"),
                channel("blue"),
            ));
        }
        map.insert(reference, info);
    }
    map
}

fn read_text_chains(layout: &Element) -> Vec<ChainDecl> {
    let mut chains = Vec::new();
    for tc in layout.find_all("TextChain") {
        let char_attrs = tc.find("CharacterAttributes");
        let text = tc
            .find("Text")
            .or_else(|| tc.find("TRString"))
            .map(|e| e.text.clone())
            .unwrap_or_default();
        let style_ref = tc
            .find("TextStyleReference")
            .and_then(|e| attr_i64(e, "Reference"))
            .or_else(|| char_attrs.and_then(|e| attr_i64(e, "StyleRef")));
        let desc_ref = tc
            .find("TextDescriptionReference")
            .and_then(|e| attr_i64(e, "Reference"))
            .or_else(|| char_attrs.and_then(|e| attr_i64(e, "TextRef")));
        let position = tc.find("Position");
        let x = position
            .and_then(|p| p.child("x"))
            .and_then(|e| e.text.trim().parse().ok())
            .unwrap_or(0.0);
        let y = position
            .and_then(|p| p.child("y"))
            .and_then(|e| e.text.trim().parse().ok())
            .unwrap_or(0.0);
        chains.push(ChainDecl {
            reference: attr_i64(tc, "Reference"),
            text,
            style_ref,
            desc_ref,
            x,
            y,
            angle: text_f64(tc, "angle").unwrap_or(0.0),
            object_id: tc.find("TextLine").and_then(|e| attr_i64(e, "objectID")),
        });
    }
    chains
}

fn read_object_decls(layout: &Element) -> Vec<ObjectDecl> {
    let mut decls = Vec::new();
    for obj in layout.find_all("Object") {
        let is_text = obj
            .find("BaseClassType")
            .map(|e| e.text.trim() == "TextObject")
            .unwrap_or(false);
        if !is_text {
            continue;
        }
        let position = obj.find("Position");
        let coord = |axis| {
            position
                .and_then(|p: &Element| p.child(axis))
                .and_then(|e| e.text.trim().parse().ok())
                .unwrap_or(0.0)
        };
        decls.push(ObjectDecl {
            x: coord("x"),
            y: coord("y"),
            rotation: text_f64(obj, "Rotation").unwrap_or(0.0),
            opacity: text_f64(obj, "Opacity").unwrap_or(1.0) * 100.0,
            text_ref: obj.find("TextRef").and_then(|e| attr_i64(e, "Reference")),
            style_ref: obj
                .find("StyleReference")
                .and_then(|e| attr_i64(e, "Reference")),
        });
    }
    decls
}

fn read_merge_groups(layout: &Element) -> HashMap<i64, f64> {
    let mut map = HashMap::new();
    for group in layout.find_all("Group") {
        let object_id = group.find("ObjectID").and_then(|e| attr_i64(e, "value"));
        let opacity = text_f64(group, "opacity");
        if let (Some(id), Some(op)) = (object_id, opacity) {
            map.insert(id, op * 100.0);
        }
    }
    map
}

// ── Top-level operations ──────────────────────────────────────────────

/// Encodes a scene as PRTL bytes (UTF-16LE, BOM included).
pub fn serialize(scene: &TextScene) -> Vec<u8> {
    PrtlWriter::new().write(scene)
}

/// Decodes PRTL bytes into a scene, discarding warnings. Use
/// [`PrtlReader`] directly to observe them.
pub fn deserialize(bytes: &[u8]) -> Result<TextScene, PrtlError> {
    PrtlReader::new().read(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_scene() -> TextScene {
        let style = CharStyle::new(' ', "Arial", 72.0)
            .with_color(Color::WHITE)
            .with_stroke(Stroke::new(Color::BLACK, 8.0));
        let mut scene = TextScene::new(Resolution::FULL_HD);
        scene.add_object(TextObject::with_text(1, "t", "A", &style).at(960.0, 540.0));
        scene
    }

    /// The document text, for structural assertions.
    fn document_text(bytes: &[u8]) -> String {
        decode_utf16le(bytes).unwrap()
    }

    #[test]
    fn test_roundtrip_single_object() {
        let scene = sample_scene();
        let mut reader = PrtlReader::new();
        let decoded = reader.read(&serialize(&scene)).unwrap();

        assert!(reader.warnings().is_empty());
        assert_eq!(decoded.resolution, Resolution::FULL_HD);
        assert_eq!(decoded.objects.len(), 1);

        let obj = &decoded.objects[0];
        assert_eq!(obj.text(), "A");
        assert_eq!(obj.x, 960.0);
        assert_eq!(obj.y, 540.0);
        assert_eq!(obj.rotation, 0.0);
        assert_eq!(obj.opacity, 100.0);

        let run = obj.run_style().unwrap();
        assert_eq!(run.font_family, "Arial");
        assert!((run.font_size - 72.0).abs() < 0.5);
        assert_eq!(run.color, Color::WHITE);
        assert_eq!(run.strokes.len(), 1);
        // Wire size is a diameter; the reader recovers the radius.
        assert!((run.strokes[0].width - 4.0).abs() < 1e-9);
        assert_eq!(run.strokes[0].color, Color::BLACK);
    }

    #[test]
    fn test_roundtrip_nontrivial_colors() {
        let style = CharStyle::new(' ', "Meiryo", 50.0)
            .with_color(Color::new(0x33, 0x66, 0x99))
            .with_stroke(Stroke::new(Color::new(0x11, 0x22, 0x33), 6.0));
        let mut scene = TextScene::new(Resolution::FULL_HD);
        scene.add_object(TextObject::with_text(1, "t", "xy", &style));

        let decoded = deserialize(&serialize(&scene)).unwrap();
        let run = decoded.objects[0].run_style().unwrap();
        assert_eq!(run.color, Color::new(0x33, 0x66, 0x99));
        assert_eq!(run.strokes[0].color, Color::new(0x11, 0x22, 0x33));
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let scene = sample_scene();
        assert_eq!(serialize(&scene), serialize(&scene));
    }

    #[test]
    fn test_bom_and_framing() {
        let bytes = serialize(&sample_scene());
        assert_eq!(&bytes[..2], &[0xFF, 0xFE]);
        assert_eq!(bytes.len() % 2, 0);
    }

    #[test]
    fn test_decode_with_or_without_bom() {
        let bytes = serialize(&sample_scene());
        let with_bom = deserialize(&bytes).unwrap();
        let without_bom = deserialize(&bytes[2..]).unwrap();
        assert_eq!(with_bom, without_bom);
    }

    #[test]
    fn test_font_deduplication() {
        let style = CharStyle::new(' ', "Meiryo", 40.0);
        let mut scene = TextScene::new(Resolution::FULL_HD);
        for id in 0..3 {
            scene.add_object(TextObject::with_text(id, "t", "ab", &style));
        }
        let text = document_text(&serialize(&scene));
        assert_eq!(text.matches("<TextDescription ").count(), 1);
    }

    #[test]
    fn test_empty_scene() {
        let scene = TextScene::new(Resolution::FULL_HD);
        let bytes = serialize(&scene);
        let text = document_text(&bytes);
        assert!(text.contains("<Style ID=\"4096\">"));
        assert!(text.contains("<Shader Version=\"4\">"));
        assert!(!text.contains("<TextChain>"));

        let decoded = deserialize(&bytes).unwrap();
        assert!(decoded.objects.is_empty());
        assert_eq!(decoded.resolution, Resolution::FULL_HD);
    }

    #[test]
    fn test_objects_without_characters_are_skipped() {
        let style = CharStyle::new(' ', "Arial", 48.0);
        let mut scene = TextScene::new(Resolution::FULL_HD);
        scene.add_object(TextObject::with_text(1, "kept", "ok", &style));
        scene.add_object(TextObject::new(2, "empty"));
        let decoded = deserialize(&serialize(&scene)).unwrap();
        assert_eq!(decoded.objects.len(), 1);
        assert_eq!(decoded.objects[0].text(), "ok");
    }

    #[test]
    fn test_stroke_order_and_widths() {
        // Outermost first in the model: 12, 8, 4.
        let style = CharStyle::new(' ', "Arial", 50.0)
            .with_stroke(Stroke::new(Color::new(1, 0, 0), 12.0))
            .with_stroke(Stroke::new(Color::new(0, 1, 0), 8.0))
            .with_stroke(Stroke::new(Color::new(0, 0, 1), 4.0));
        let mut scene = TextScene::new(Resolution::FULL_HD);
        scene.add_object(TextObject::with_text(1, "t", "Z", &style));

        let bytes = serialize(&scene);
        let text = document_text(&bytes);
        // Widest fragment first among the stroke fragments.
        let outer = text.find("<size>12</size>").unwrap();
        let mid = text.find("<size>8</size>").unwrap();
        let inner = text.find("<size>4</size>").unwrap();
        assert!(outer < mid && mid < inner);

        let decoded = deserialize(&bytes).unwrap();
        let run = decoded.objects[0].run_style().unwrap();
        assert_eq!(run.strokes.len(), 3);
        let mut widths: Vec<f64> = run.strokes.iter().map(|s| s.width).collect();
        widths.sort_by(|a, b| b.partial_cmp(a).unwrap());
        assert_eq!(widths, vec![6.0, 4.0, 2.0]);
    }

    #[test]
    fn test_stroke_colors_survive_multilayer() {
        let style = CharStyle::new(' ', "Arial", 50.0)
            .with_stroke(Stroke::new(Color::new(200, 0, 0), 12.0))
            .with_stroke(Stroke::new(Color::new(0, 200, 0), 8.0));
        let mut scene = TextScene::new(Resolution::FULL_HD);
        scene.add_object(TextObject::with_text(1, "t", "Z", &style));

        let decoded = deserialize(&serialize(&scene)).unwrap();
        let run = decoded.objects[0].run_style().unwrap();
        // Each recovered layer's color must match its own width's layer.
        let by_width: HashMap<String, Color> = run
            .strokes
            .iter()
            .map(|s| (format!("{}", s.width), s.color))
            .collect();
        assert_eq!(by_width["6"], Color::new(200, 0, 0));
        assert_eq!(by_width["4"], Color::new(0, 200, 0));
    }

    #[test]
    fn test_disabled_strokes_are_not_emitted() {
        let mut disabled = Stroke::new(Color::BLACK, 20.0);
        disabled.enabled = false;
        let style = CharStyle::new(' ', "Arial", 50.0)
            .with_stroke(disabled)
            .with_stroke(Stroke::new(Color::BLACK, 6.0));
        let mut scene = TextScene::new(Resolution::FULL_HD);
        scene.add_object(TextObject::with_text(1, "t", "Z", &style));

        let decoded = deserialize(&serialize(&scene)).unwrap();
        let run = decoded.objects[0].run_style().unwrap();
        assert_eq!(run.strokes.len(), 1);
        assert!((run.strokes[0].width - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_text_escaping_roundtrip() {
        let style = CharStyle::new(' ', "Arial", 48.0);
        let mut scene = TextScene::new(Resolution::FULL_HD);
        scene.add_object(TextObject::with_text(1, "t", "a & <b> \"c\" 'd'", &style));
        let decoded = deserialize(&serialize(&scene)).unwrap();
        assert_eq!(decoded.objects[0].text(), "a & <b> \"c\" 'd'");
    }

    #[test]
    fn test_multibyte_text_roundtrip() {
        let style = CharStyle::new(' ', "Yu Gothic UI", 48.0);
        let mut scene = TextScene::new(Resolution::new(1280, 720));
        scene.add_object(TextObject::with_text(1, "t", "こんにちは", &style));
        let decoded = deserialize(&serialize(&scene)).unwrap();
        assert_eq!(decoded.objects[0].text(), "こんにちは");
        assert_eq!(decoded.resolution, Resolution::new(1280, 720));
    }

    #[test]
    fn test_opacity_and_rotation_roundtrip() {
        let style = CharStyle::new(' ', "Arial", 48.0);
        let mut scene = TextScene::new(Resolution::FULL_HD);
        let mut obj = TextObject::with_text(1, "t", "hi", &style).at(10.0, 20.0);
        obj.opacity = 50.0;
        obj.rotation = 12.5;
        scene.add_object(obj);

        let decoded = deserialize(&serialize(&scene)).unwrap();
        let obj = &decoded.objects[0];
        assert!((obj.opacity - 50.0).abs() < 1e-9);
        assert!((obj.rotation - 12.5).abs() < 1e-9);
        assert_eq!((obj.x, obj.y), (10.0, 20.0));
    }

    #[test]
    fn test_framing_errors() {
        assert!(matches!(
            deserialize(&[0xFF, 0xFE, 0x41]),
            Err(PrtlError::Framing(_))
        ));
    }

    #[test]
    fn test_malformed_xml_is_format_error() {
        let bytes = encode_utf16le("<Layout><open>");
        assert!(matches!(deserialize(&bytes), Err(PrtlError::Xml(_))));
    }

    #[test]
    fn test_missing_layout_is_format_error() {
        let bytes = encode_utf16le("<Adobe_Root><Adobe_Title></Adobe_Title></Adobe_Root>");
        assert!(matches!(
            deserialize(&bytes),
            Err(PrtlError::MissingElement("Layout"))
        ));
    }

    #[test]
    fn test_missing_resolution_defaults() {
        let bytes = encode_utf16le("<Layout></Layout>");
        let decoded = deserialize(&bytes).unwrap();
        assert_eq!(decoded.resolution, Resolution::FULL_HD);
        assert!(decoded.objects.is_empty());
    }

    #[test]
    fn test_dangling_references_degrade_with_warnings() {
        let doc = r#"<Layout>
            <LayoutDimension><pXPIXELS>1280</pXPIXELS><pYLINES>720</pYLINES></LayoutDimension>
            <Styles><Style ID="9000">
                <FragmentList Version="5">
                    <Fragment><size>0</size><eFragmentType>0</eFragmentType>
                        <fragmentOff>false</fragmentOff><annotation>65538</annotation>
                        <painterMix>15 </painterMix></Fragment>
                </FragmentList>
                <ShaderList Version="1">
                    <ShaderRef PainterNumber="-1"><shaderRef>8888</shaderRef></ShaderRef>
                </ShaderList>
            </Style></Styles>
            <Layers><Layer><TextPage><TextChain>
                <ChainProperty Version="9"><Position><x>10</x><y>20</y></Position></ChainProperty>
                <TextLine Version="2" objectID="1">
                    <TRString>Hi</TRString>
                    <RunLengthEncodedCharacterAttributes>
                        <CharacterAttributes RunCount="2" StyleRef="9000" TextRef="7777" />
                    </RunLengthEncodedCharacterAttributes>
                </TextLine>
            </TextChain></TextPage></Layer></Layers>
        </Layout>"#;
        let mut reader = PrtlReader::new();
        let scene = reader.read(&encode_utf16le(doc)).unwrap();

        assert_eq!(scene.resolution, Resolution::new(1280, 720));
        assert_eq!(scene.objects.len(), 1);
        let run = scene.objects[0].run_style().unwrap();
        assert_eq!(run.font_family, "Yu Gothic UI");
        assert_eq!(run.font_size, 48.0);
        assert_eq!(run.color, Color::WHITE);
        assert!(reader
            .warnings()
            .contains(&DecodeWarning::DanglingTextDescription(7777)));
        assert!(reader
            .warnings()
            .contains(&DecodeWarning::DanglingShader(8888, -1)));
    }

    #[test]
    fn test_host_resaved_document() {
        let doc = r#"<Layout>
            <TextDescriptions Version="4">
                <TextDescription Reference="4096"><TypeSpec>
                    <size>512</size><fifontFamilyName>Meiryo</fifontFamilyName>
                </TypeSpec></TextDescription>
            </TextDescriptions>
            <Styles><Style ID="4200">
                <FragmentList Version="5">
                    <Fragment><size>16</size><eFragmentType>2</eFragmentType>
                        <fragmentOff>false</fragmentOff><annotation>1</annotation>
                        <painterMix>10 10 10 </painterMix></Fragment>
                    <Fragment><size>0</size><eFragmentType>0</eFragmentType>
                        <fragmentOff>false</fragmentOff><annotation>65538</annotation>
                        <painterMix>15 </painterMix></Fragment>
                </FragmentList>
                <ShaderList Version="1">
                    <ShaderRef PainterNumber="10"><shaderRef>5000</shaderRef></ShaderRef>
                    <ShaderRef PainterNumber="-1"><shaderRef>5001</shaderRef></ShaderRef>
                </ShaderList>
            </Style></Styles>
            <Shaders>
                <Shader><cReference>5000</cReference>
                    <ColorSpec index="4"><red>255</red><green>0</green><blue>0</blue></ColorSpec>
                </Shader>
                <Shader><cReference>5001</cReference>
                    <ColorSpec index="0"><red>0</red><green>255</green><blue>0</blue></ColorSpec>
                </Shader>
            </Shaders>
            <Objects><Object>
                <BaseClassType>TextObject</BaseClassType>
                <Position><x>100</x><y>200</y></Position>
                <Rotation>15</Rotation>
                <Opacity>0.5</Opacity>
                <TextRef Reference="6000" />
                <StyleReference Reference="4200" />
            </Object></Objects>
            <Layers><Layer><TextPage>
                <TextChain Reference="6000">
                    <Text>こんにちは</Text>
                    <TextDescriptionReference Reference="4096" />
                    <TextStyleReference Reference="4200" />
                </TextChain>
            </TextPage></Layer></Layers>
        </Layout>"#;
        let mut reader = PrtlReader::new();
        let scene = reader.read(&encode_utf16le(doc)).unwrap();

        assert!(reader.warnings().is_empty());
        assert_eq!(scene.objects.len(), 1);
        let obj = &scene.objects[0];
        assert_eq!(obj.text(), "こんにちは");
        assert_eq!((obj.x, obj.y), (100.0, 200.0));
        assert_eq!(obj.rotation, 15.0);
        assert!((obj.opacity - 50.0).abs() < 1e-9);

        let run = obj.run_style().unwrap();
        assert_eq!(run.font_family, "Meiryo");
        assert_eq!(run.font_size, 64.0);
        assert_eq!(run.color, Color::new(0, 255, 0));
        assert_eq!(run.strokes.len(), 1);
        assert_eq!(run.strokes[0].color, Color::new(255, 0, 0));
        assert!((run.strokes[0].width - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_colorspec_asymmetry_is_preserved_on_encode() {
        // The main-fill shader must carry the real color in ColorSpec 0 and
        // the host's near-white filler in ColorSpec 4; stroke shaders are
        // the other way around. This looks wrong on purpose.
        let style = CharStyle::new(' ', "Arial", 48.0)
            .with_color(Color::new(9, 8, 7))
            .with_stroke(Stroke::new(Color::new(1, 2, 3), 6.0));
        let mut scene = TextScene::new(Resolution::FULL_HD);
        scene.add_object(TextObject::with_text(1, "t", "A", &style));

        let text = document_text(&serialize(&scene));
        let stroke_shader = "<ColorSpec index=\"4\"><red>1</red><green>2</green><blue>3</blue>";
        let fill_shader = "<ColorSpec index=\"0\"><red>9</red><green>8</green><blue>7</blue>";
        let filler = "<ColorSpec index=\"4\"><red>250</red><green>250</green><blue>250</blue>";
        assert!(text.contains(stroke_shader));
        assert!(text.contains(fill_shader));
        assert!(text.contains(filler));
    }

    #[test]
    fn test_reference_allocation_is_positional() {
        assert_eq!(style_ref(0), 4096);
        assert_eq!(style_ref(3), 4099);
        assert_eq!(shader_ref(0, 0), 4096);
        assert_eq!(shader_ref(0, FILL_SLOT), 4111);
        assert_eq!(shader_ref(2, 1), 4137);
    }
}
