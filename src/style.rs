//! Request schema and style validation.
//!
//! A [`GenerateRequest`] is what arrives from outside: loosely typed, field
//! names as the HTTP API spells them, numbers and booleans possibly sent as
//! strings. [`GenerateRequest::validate`] turns it into a [`StyleConfig`], the
//! canonical typed structure the renderer consumes and the cache fingerprints.
//!
//! All validation happens here, before any pixel buffer exists. Conditional
//! rules:
//!
//! | Field(s) | Required when |
//! |---|---|
//! | `colorDark` | `gradient` is false |
//! | `grdType`, `color01`, `color02` | `gradient` is true |
//! | `eye_color01`, `eye_color02` | `eye_color` is true |
//! | `frameColor` | the frame style supports `color` |
//!
//! Other frame fields fall back to defaults. Fields the chosen frame style does
//! not support are dropped unparsed with a warning, so the canonical style
//! only holds what is actually drawn and equivalent requests fingerprint
//! alike.

use crate::color::{ColorError, GradientKind, Rgb8, parse_color};
use crate::imaging::eyes::EyeStyleId;
use crate::imaging::frame::{FrameFeature, FramePosition, FrameStyle};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Canvas widths a request may ask for.
pub const ALLOWED_SIZES: [u32; 3] = [200, 500, 1000];

pub const DEFAULT_FRAME_TEXT: &str = "SCAN ME";
pub const DEFAULT_FRAME_TEXT_SIZE: u32 = 16;
pub const DEFAULT_FRAME_FONT: &str = "Arial";
pub const MAX_FRAME_TEXT_CHARS: usize = 50;
const FRAME_TEXT_SIZE_RANGE: std::ops::RangeInclusive<u32> = 8..=96;
const MAX_BORDER_WIDTH: u32 = 64;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StyleError {
    #[error("{field}: {source}")]
    InvalidColor {
        field: &'static str,
        #[source]
        source: ColorError,
    },
    #[error("The {0} field is required")]
    MissingField(&'static str),
    #[error("Invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
    #[error("Unknown frame style: {0}")]
    UnknownFrameStyle(String),
}

/// What the encoded content represents. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Url,
    Text,
    Email,
    Phone,
    Sms,
    Vcard,
}

impl Category {
    pub fn name(self) -> &'static str {
        match self {
            Category::Url => "url",
            Category::Text => "text",
            Category::Email => "email",
            Category::Phone => "phone",
            Category::Sms => "sms",
            Category::Vcard => "vcard",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Png,
    Svg,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Svg => "svg",
        }
    }

    /// Only vector output can substitute named eye glyphs.
    pub fn supports_vector_glyphs(self) -> bool {
        matches!(self, OutputFormat::Svg)
    }
}

// =============================================================================
// Loose wire values
// =============================================================================

/// A number that may arrive as JSON number or numeric string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LooseNumber {
    Int(i64),
    Float(f64),
    Str(String),
}

impl LooseNumber {
    fn to_u32(&self, field: &'static str) -> Result<u32, StyleError> {
        let invalid = |reason: String| StyleError::InvalidField { field, reason };
        let value = match self {
            LooseNumber::Int(i) => *i,
            LooseNumber::Float(f) if f.fract() == 0.0 => *f as i64,
            LooseNumber::Float(f) => return Err(invalid(format!("{f} is not an integer"))),
            LooseNumber::Str(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| invalid(format!("{s:?} is not an integer")))?,
        };
        u32::try_from(value).map_err(|_| invalid(format!("{value} is out of range")))
    }
}

/// A boolean that may arrive as `true`/`false`, `1`/`0`, or their string forms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LooseBool {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl LooseBool {
    fn to_bool(&self, field: &'static str) -> Result<bool, StyleError> {
        match self {
            LooseBool::Bool(b) => Ok(*b),
            LooseBool::Int(0) => Ok(false),
            LooseBool::Int(1) => Ok(true),
            LooseBool::Str(s) => match s.trim() {
                "true" | "1" => Ok(true),
                "false" | "0" | "" => Ok(false),
                other => Err(StyleError::InvalidField {
                    field,
                    reason: format!("{other:?} is not a boolean"),
                }),
            },
            LooseBool::Int(i) => Err(StyleError::InvalidField {
                field,
                reason: format!("{i} is not a boolean"),
            }),
        }
    }
}

/// Frame selector: `"none"`, `"frameN"`, `"N"` or an integer (0 = none).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FrameRef {
    Index(i64),
    Name(String),
}

impl FrameRef {
    fn resolve(&self) -> Result<Option<FrameStyle>, StyleError> {
        let unknown = || StyleError::UnknownFrameStyle(self.to_string());
        let index = match self {
            FrameRef::Index(i) => *i,
            FrameRef::Name(name) => {
                let name = name.trim();
                if name.is_empty() || name == "none" {
                    return Ok(None);
                }
                name.strip_prefix("frame")
                    .unwrap_or(name)
                    .parse::<i64>()
                    .map_err(|_| unknown())?
            }
        };
        if index == 0 {
            return Ok(None);
        }
        u8::try_from(index)
            .ok()
            .and_then(FrameStyle::from_index)
            .map(Some)
            .ok_or_else(unknown)
    }
}

impl std::fmt::Display for FrameRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameRef::Index(i) => write!(f, "{i}"),
            FrameRef::Name(s) => write!(f, "{s}"),
        }
    }
}

// =============================================================================
// Request
// =============================================================================

/// A generation request as received at the boundary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerateRequest {
    #[serde(rename = "qrCategory")]
    pub category: Option<String>,
    pub text: Option<String>,
    pub size: Option<LooseNumber>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    #[serde(rename = "qrFormat", default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    #[serde(rename = "colorDark", default, skip_serializing_if = "Option::is_none")]
    pub color_dark: Option<String>,
    #[serde(rename = "backgroundColor")]
    pub background_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gradient: Option<LooseBool>,
    #[serde(rename = "grdType", default, skip_serializing_if = "Option::is_none")]
    pub gradient_kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color01: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color02: Option<String>,
    #[serde(rename = "transparentBkg", default, skip_serializing_if = "Option::is_none")]
    pub transparent_background: Option<LooseBool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eye_color: Option<LooseBool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eye_color01: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eye_color02: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eye_outer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eye_inner: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame: Option<FrameRef>,
    #[serde(rename = "frameColor", default, skip_serializing_if = "Option::is_none")]
    pub frame_color: Option<String>,
    #[serde(rename = "frameText", default, skip_serializing_if = "Option::is_none")]
    pub frame_text: Option<String>,
    #[serde(rename = "frameBackgroundColor", default, skip_serializing_if = "Option::is_none")]
    pub frame_background_color: Option<String>,
    #[serde(rename = "frameBorderWidth", default, skip_serializing_if = "Option::is_none")]
    pub frame_border_width: Option<LooseNumber>,
    #[serde(rename = "frameTextSize", default, skip_serializing_if = "Option::is_none")]
    pub frame_text_size: Option<LooseNumber>,
    #[serde(rename = "frameTextFont", default, skip_serializing_if = "Option::is_none")]
    pub frame_text_font: Option<String>,
    #[serde(rename = "framePosition", default, skip_serializing_if = "Option::is_none")]
    pub frame_position: Option<String>,
}

/// Treat empty strings the same as absent fields, like the API always has.
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn required<'a>(value: &'a Option<String>, field: &'static str) -> Result<&'a str, StyleError> {
    present(value).ok_or(StyleError::MissingField(field))
}

fn color_field(value: &str, field: &'static str) -> Result<Rgb8, StyleError> {
    parse_color(value).map_err(|source| StyleError::InvalidColor { field, source })
}

fn flag(value: &Option<LooseBool>, field: &'static str) -> Result<bool, StyleError> {
    value.as_ref().map_or(Ok(false), |v| v.to_bool(field))
}

impl GenerateRequest {
    /// The content string to encode (may be empty only if validation fails).
    pub fn content(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    /// Validate every field and build the canonical [`StyleConfig`].
    pub fn validate(&self) -> Result<StyleConfig, StyleError> {
        let category = match required(&self.category, "qrCategory")? {
            "url" => Category::Url,
            "text" => Category::Text,
            "email" => Category::Email,
            "phone" => Category::Phone,
            "sms" => Category::Sms,
            "vcard" => Category::Vcard,
            other => {
                return Err(StyleError::InvalidField {
                    field: "qrCategory",
                    reason: format!("{other:?} is not one of url, text, email, phone, sms, vcard"),
                });
            }
        };

        if self.text.as_deref().is_none_or(str::is_empty) {
            return Err(StyleError::MissingField("text"));
        }

        let size = self
            .size
            .as_ref()
            .ok_or(StyleError::MissingField("size"))?
            .to_u32("size")?;
        if !ALLOWED_SIZES.contains(&size) {
            return Err(StyleError::InvalidField {
                field: "size",
                reason: format!("{size} is not one of {ALLOWED_SIZES:?}"),
            });
        }

        let format = match present(&self.format) {
            None | Some("png") => OutputFormat::Png,
            Some("svg") => OutputFormat::Svg,
            Some(other) => {
                return Err(StyleError::InvalidField {
                    field: "qrFormat",
                    reason: format!("{other:?} is not png or svg"),
                });
            }
        };

        let background_color = color_field(
            required(&self.background_color, "backgroundColor")?,
            "backgroundColor",
        )?;

        let gradient = if flag(&self.gradient, "gradient")? {
            let kind_name = required(&self.gradient_kind, "grdType")?;
            let kind = GradientKind::from_name(kind_name).ok_or_else(|| StyleError::InvalidField {
                field: "grdType",
                reason: format!("{kind_name:?} is not a gradient type"),
            })?;
            Some(GradientSpec {
                kind,
                start: color_field(required(&self.color01, "color01")?, "color01")?,
                end: color_field(required(&self.color02, "color02")?, "color02")?,
            })
        } else {
            None
        };

        // A gradient replaces the flat fill, so colorDark is not consulted.
        let dark_color = match (&gradient, present(&self.color_dark)) {
            (Some(_), _) => Rgb8::BLACK,
            (None, Some(c)) => color_field(c, "colorDark")?,
            (None, None) => return Err(StyleError::MissingField("colorDark")),
        };

        let eye = if flag(&self.eye_color, "eye_color")? {
            Some(EyeSpec {
                outer_style: eye_style(&self.eye_outer, "eye_outer", "eyeOuter")?,
                inner_style: eye_style(&self.eye_inner, "eye_inner", "eyeInner")?,
                outer_color: color_field(required(&self.eye_color01, "eye_color01")?, "eye_color01")?,
                inner_color: color_field(required(&self.eye_color02, "eye_color02")?, "eye_color02")?,
            })
        } else {
            None
        };

        let frame = match &self.frame {
            Some(frame_ref) => match frame_ref.resolve()? {
                Some(style) => Some(self.frame_spec(style)?),
                None => None,
            },
            None => None,
        };

        Ok(StyleConfig {
            category,
            size,
            dark_color,
            background_color,
            transparent_background: flag(&self.transparent_background, "transparentBkg")?,
            gradient,
            eye,
            logo: present(&self.logo).map(str::to_string),
            frame,
            format,
        })
    }

    /// Frame fields settled against `style`: supported fields are validated,
    /// unsupported ones are dropped unparsed. Text defaults to
    /// [`DEFAULT_FRAME_TEXT`] only for styles with a text band.
    fn frame_spec(&self, style: FrameStyle) -> Result<FrameSpec, StyleError> {
        let color = if style.supports(FrameFeature::Color) {
            Some(color_field(required(&self.frame_color, "frameColor")?, "frameColor")?)
        } else {
            drop_unsupported(style, FrameFeature::Color, present(&self.frame_color).is_some());
            None
        };

        let background_color = match present(&self.frame_background_color) {
            Some(c) if style.supports(FrameFeature::BackgroundColor) => {
                Some(color_field(c, "frameBackgroundColor")?)
            }
            requested => {
                drop_unsupported(style, FrameFeature::BackgroundColor, requested.is_some());
                None
            }
        };

        let border_width = match &self.frame_border_width {
            Some(n) if style.supports(FrameFeature::BorderWidth) => {
                let width = n.to_u32("frameBorderWidth")?;
                if width > MAX_BORDER_WIDTH {
                    return Err(StyleError::InvalidField {
                        field: "frameBorderWidth",
                        reason: format!("{width} exceeds {MAX_BORDER_WIDTH}"),
                    });
                }
                Some(width)
            }
            requested => {
                drop_unsupported(style, FrameFeature::BorderWidth, requested.is_some());
                None
            }
        };

        if !style.supports(FrameFeature::Text) {
            drop_unsupported(style, FrameFeature::Text, self.frame_text.is_some());
            return Ok(FrameSpec {
                style,
                color,
                background_color,
                border_width,
                text: None,
                text_size: DEFAULT_FRAME_TEXT_SIZE,
                text_font: DEFAULT_FRAME_FONT.to_string(),
                position: FramePosition::Bottom,
            });
        }

        let text = self
            .frame_text
            .clone()
            .unwrap_or_else(|| DEFAULT_FRAME_TEXT.to_string());
        if text.chars().count() > MAX_FRAME_TEXT_CHARS {
            return Err(StyleError::InvalidField {
                field: "frameText",
                reason: format!("longer than {MAX_FRAME_TEXT_CHARS} characters"),
            });
        }

        let text_size = self
            .frame_text_size
            .as_ref()
            .map(|n| n.to_u32("frameTextSize"))
            .transpose()?
            .unwrap_or(DEFAULT_FRAME_TEXT_SIZE);
        if !FRAME_TEXT_SIZE_RANGE.contains(&text_size) {
            return Err(StyleError::InvalidField {
                field: "frameTextSize",
                reason: format!("{text_size} is outside {FRAME_TEXT_SIZE_RANGE:?}"),
            });
        }

        let position = match present(&self.frame_position) {
            None => FramePosition::Bottom,
            Some(p) => FramePosition::from_name(p).ok_or_else(|| StyleError::InvalidField {
                field: "framePosition",
                reason: format!("{p:?} is not top, bottom, left or right"),
            })?,
        };

        Ok(FrameSpec {
            style,
            color,
            background_color,
            border_width,
            text: Some(text),
            text_size,
            text_font: present(&self.frame_text_font)
                .unwrap_or(DEFAULT_FRAME_FONT)
                .to_string(),
            position,
        })
    }
}

fn drop_unsupported(style: FrameStyle, feature: FrameFeature, requested: bool) {
    if requested {
        log::warn!("{style} does not support {}; ignoring it", feature.field());
    }
}

fn eye_style(
    value: &Option<String>,
    field: &'static str,
    prefix: &str,
) -> Result<EyeStyleId, StyleError> {
    let Some(name) = present(value) else {
        return Ok(EyeStyleId::default());
    };
    name.strip_prefix(prefix)
        .filter(|digits| digits.len() == 1)
        .and_then(|digit| digit.parse::<u8>().ok())
        .and_then(EyeStyleId::new)
        .ok_or_else(|| StyleError::InvalidField {
            field,
            reason: format!("{name:?} must be in format {prefix}[0-9]"),
        })
}

// =============================================================================
// Canonical style
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradientSpec {
    pub kind: GradientKind,
    pub start: Rgb8,
    pub end: Rgb8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EyeSpec {
    pub outer_style: EyeStyleId,
    pub inner_style: EyeStyleId,
    pub outer_color: Rgb8,
    pub inner_color: Rgb8,
}

/// Frame fields the style supports. Validation leaves unsupported fields
/// `None` and the text-band fields at their defaults for styles without text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSpec {
    pub style: FrameStyle,
    pub color: Option<Rgb8>,
    pub background_color: Option<Rgb8>,
    pub border_width: Option<u32>,
    pub text: Option<String>,
    pub text_size: u32,
    pub text_font: String,
    pub position: FramePosition,
}

/// Validated, canonical styling configuration.
///
/// `None` for `gradient`, `eye`, `logo` or `frame` means that feature is off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleConfig {
    pub category: Category,
    pub size: u32,
    pub dark_color: Rgb8,
    pub background_color: Rgb8,
    pub transparent_background: bool,
    pub gradient: Option<GradientSpec>,
    pub eye: Option<EyeSpec>,
    pub logo: Option<String>,
    pub frame: Option<FrameSpec>,
    pub format: OutputFormat,
}

impl StyleConfig {
    /// Plain black-on-white PNG at the given size.
    pub fn plain(size: u32) -> Self {
        Self {
            category: Category::Text,
            size,
            dark_color: Rgb8::BLACK,
            background_color: Rgb8::WHITE,
            transparent_background: false,
            gradient: None,
            eye: None,
            logo: None,
            frame: None,
            format: OutputFormat::Png,
        }
    }

    /// Background fill, or `None` when the background is transparent. Both
    /// output formats carry alpha.
    pub fn background_fill(&self) -> Option<Rgb8> {
        (!self.transparent_background).then_some(self.background_color)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::basic_request;

    fn request_from_json(json: &str) -> GenerateRequest {
        serde_json::from_str(json).unwrap()
    }

    // =========================================================================
    // Basic fields
    // =========================================================================

    #[test]
    fn minimal_request_validates() {
        let style = basic_request().validate().unwrap();
        assert_eq!(style.category, Category::Url);
        assert_eq!(style.size, 500);
        assert_eq!(style.dark_color, Rgb8::BLACK);
        assert_eq!(style.background_color, Rgb8::WHITE);
        assert_eq!(style.format, OutputFormat::Png);
        assert!(style.gradient.is_none());
        assert!(style.eye.is_none());
        assert!(style.frame.is_none());
        assert!(!style.transparent_background);
    }

    #[test]
    fn parses_api_field_names_with_loose_types() {
        let req = request_from_json(
            r##"{
                "qrCategory": "url",
                "text": "https://example.com",
                "size": "1000",
                "colorDark": "rgb(10, 20, 30)",
                "backgroundColor": "#FFFFFF",
                "transparentBkg": "1",
                "qrFormat": "svg"
            }"##,
        );
        let style = req.validate().unwrap();
        assert_eq!(style.size, 1000);
        assert_eq!(style.dark_color, Rgb8::new(10, 20, 30));
        assert!(style.transparent_background);
        assert_eq!(style.format, OutputFormat::Svg);
        assert_eq!(style.background_fill(), None);
    }

    #[test]
    fn malformed_color_is_invalid_color_format() {
        let mut req = basic_request();
        req.color_dark = Some("notacolor".into());
        assert!(matches!(
            req.validate(),
            Err(StyleError::InvalidColor {
                field: "colorDark",
                ..
            })
        ));
    }

    #[test]
    fn rejects_size_outside_allowed_set() {
        let mut req = basic_request();
        req.size = Some(LooseNumber::Int(333));
        assert!(matches!(
            req.validate(),
            Err(StyleError::InvalidField { field: "size", .. })
        ));
    }

    #[test]
    fn rejects_unknown_category_and_format() {
        let mut req = basic_request();
        req.category = Some("fax".into());
        assert!(matches!(
            req.validate(),
            Err(StyleError::InvalidField {
                field: "qrCategory",
                ..
            })
        ));

        let mut req = basic_request();
        req.format = Some("gif".into());
        assert!(matches!(
            req.validate(),
            Err(StyleError::InvalidField {
                field: "qrFormat",
                ..
            })
        ));
    }

    #[test]
    fn missing_text_and_background_are_reported() {
        let mut req = basic_request();
        req.text = Some(String::new());
        assert_eq!(req.validate(), Err(StyleError::MissingField("text")));

        let mut req = basic_request();
        req.background_color = None;
        assert_eq!(
            req.validate(),
            Err(StyleError::MissingField("backgroundColor"))
        );
    }

    // =========================================================================
    // Conditional fields
    // =========================================================================

    #[test]
    fn gradient_requires_both_colors_and_kind() {
        let mut req = basic_request();
        req.gradient = Some(LooseBool::Bool(true));
        req.gradient_kind = Some("linear".into());
        req.color01 = Some("#ff0000".into());
        assert_eq!(req.validate(), Err(StyleError::MissingField("color02")));

        req.color02 = Some("#0000ff".into());
        let style = req.validate().unwrap();
        assert_eq!(
            style.gradient,
            Some(GradientSpec {
                kind: GradientKind::Linear,
                start: Rgb8::new(255, 0, 0),
                end: Rgb8::new(0, 0, 255),
            })
        );
    }

    #[test]
    fn gradient_colors_ignored_when_disabled() {
        let mut req = basic_request();
        req.color01 = Some("garbage".into());
        req.gradient = Some(LooseBool::Str("false".into()));
        assert!(req.validate().unwrap().gradient.is_none());
    }

    #[test]
    fn dark_color_is_not_part_of_a_gradient_style() {
        let mut req = basic_request();
        req.gradient = Some(LooseBool::Bool(true));
        req.gradient_kind = Some("linear".into());
        req.color01 = Some("#ff0000".into());
        req.color02 = Some("#0000ff".into());
        let without = {
            let mut r = req.clone();
            r.color_dark = None;
            r.validate().unwrap()
        };
        req.color_dark = Some("#123456".into());
        assert_eq!(req.validate().unwrap(), without);
    }

    #[test]
    fn dark_color_optional_only_with_gradient() {
        let mut req = basic_request();
        req.color_dark = None;
        assert_eq!(req.validate(), Err(StyleError::MissingField("colorDark")));

        req.gradient = Some(LooseBool::Int(1));
        req.gradient_kind = Some("radial".into());
        req.color01 = Some("#000000".into());
        req.color02 = Some("#ffffff".into());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn eye_styling_requires_colors_and_parses_style_ids() {
        let mut req = basic_request();
        req.eye_color = Some(LooseBool::Bool(true));
        assert_eq!(req.validate(), Err(StyleError::MissingField("eye_color01")));

        req.eye_color01 = Some("#5e0bf0".into());
        req.eye_color02 = Some("#f30505".into());
        req.eye_outer = Some("eyeOuter3".into());
        let eye = req.validate().unwrap().eye.unwrap();
        assert_eq!(eye.outer_style, EyeStyleId::new(3).unwrap());
        assert_eq!(eye.inner_style, EyeStyleId::default());

        req.eye_inner = Some("eyeInner12".into());
        assert!(matches!(
            req.validate(),
            Err(StyleError::InvalidField {
                field: "eye_inner",
                ..
            })
        ));
    }

    // =========================================================================
    // Frames
    // =========================================================================

    #[test]
    fn frame_selector_forms() {
        for (json, expected) in [
            (r#""none""#, None),
            ("0", None),
            (r#""frame2""#, FrameStyle::from_index(2)),
            ("2", FrameStyle::from_index(2)),
            (r#""15""#, FrameStyle::from_index(15)),
        ] {
            let frame: FrameRef = serde_json::from_str(json).unwrap();
            assert_eq!(frame.resolve().unwrap(), expected, "{json}");
        }
        for json in [r#""frame16""#, "-1", r#""fancy""#, "99"] {
            let frame: FrameRef = serde_json::from_str(json).unwrap();
            assert!(matches!(
                frame.resolve(),
                Err(StyleError::UnknownFrameStyle(_))
            ));
        }
    }

    #[test]
    fn frame_color_required_when_supported() {
        let mut req = basic_request();
        req.frame = Some(FrameRef::Name("frame1".into()));
        assert_eq!(req.validate(), Err(StyleError::MissingField("frameColor")));

        req.frame_color = Some("#000000".into());
        let frame = req.validate().unwrap().frame.unwrap();
        assert_eq!(frame.text_size, DEFAULT_FRAME_TEXT_SIZE);
        assert_eq!(frame.text_font, DEFAULT_FRAME_FONT);
        assert_eq!(frame.position, FramePosition::Bottom);
        assert_eq!(frame.text.as_deref(), Some(DEFAULT_FRAME_TEXT));
    }

    #[test]
    fn unsupported_frame_fields_are_dropped() {
        let mut req = basic_request();
        req.frame = Some(FrameRef::Name("frame1".into()));
        req.frame_color = Some("#112233".into());
        let plain = req.validate().unwrap();

        req.frame_background_color = Some("#abcdef".into());
        let with_background = req.validate().unwrap();
        assert_eq!(with_background.frame.as_ref().unwrap().background_color, None);
        assert_eq!(with_background, plain);

        req.frame_text = Some(DEFAULT_FRAME_TEXT.into());
        assert_eq!(req.validate().unwrap(), plain);
    }

    #[test]
    fn bad_values_on_unsupported_frame_fields_are_not_errors() {
        let mut req = basic_request();
        req.frame = Some(FrameRef::Name("frame2".into()));
        req.frame_color = Some("#000000".into());
        req.frame_border_width = Some(LooseNumber::Int(100));
        assert_eq!(req.validate().unwrap().frame.unwrap().border_width, None);

        let mut req = basic_request();
        req.frame = Some(FrameRef::Name("frame1".into()));
        req.frame_color = Some("#000000".into());
        req.frame_background_color = Some("notacolor".into());
        assert!(req.validate().is_ok());

        // frame3 has no text band, so its text fields are never parsed.
        let mut req = basic_request();
        req.frame = Some(FrameRef::Index(3));
        req.frame_color = Some("#000000".into());
        req.frame_text = Some("x".repeat(MAX_FRAME_TEXT_CHARS + 1));
        req.frame_position = Some("middle".into());
        req.frame_text_size = Some(LooseNumber::Int(500));
        let frame = req.validate().unwrap().frame.unwrap();
        assert_eq!(frame.text, None);
        assert_eq!(frame.position, FramePosition::Bottom);
        assert_eq!(frame.text_size, DEFAULT_FRAME_TEXT_SIZE);
    }

    #[test]
    fn supported_frame_fields_are_still_validated() {
        let mut req = basic_request();
        req.frame = Some(FrameRef::Name("frame1".into()));
        req.frame_color = Some("#000000".into());
        req.frame_border_width = Some(LooseNumber::Int(100));
        assert!(matches!(
            req.validate(),
            Err(StyleError::InvalidField {
                field: "frameBorderWidth",
                ..
            })
        ));

        let mut req = basic_request();
        req.frame = Some(FrameRef::Name("frame2".into()));
        req.frame_color = Some("#000000".into());
        req.frame_background_color = Some("notacolor".into());
        assert!(matches!(
            req.validate(),
            Err(StyleError::InvalidColor {
                field: "frameBackgroundColor",
                ..
            })
        ));
    }

    #[test]
    fn frame_text_length_is_capped() {
        let mut req = basic_request();
        req.frame = Some(FrameRef::Index(1));
        req.frame_color = Some("#000000".into());
        req.frame_text = Some("x".repeat(MAX_FRAME_TEXT_CHARS + 1));
        assert!(matches!(
            req.validate(),
            Err(StyleError::InvalidField {
                field: "frameText",
                ..
            })
        ));
    }

    #[test]
    fn frame_position_and_sizes_parse() {
        let mut req = basic_request();
        req.frame = Some(FrameRef::Index(4));
        req.frame_color = Some("#000000".into());
        req.frame_position = Some("left".into());
        req.frame_border_width = Some(LooseNumber::Str("6".into()));
        req.frame_text_size = Some(LooseNumber::Int(24));
        let frame = req.validate().unwrap().frame.unwrap();
        assert_eq!(frame.position, FramePosition::Left);
        assert_eq!(frame.border_width, Some(6));
        assert_eq!(frame.text_size, 24);

        req.frame_position = Some("middle".into());
        assert!(req.validate().is_err());
    }
}
