//! Frame compositor and the frame-style feature table.
//!
//! Every named style (`frame1`–`frame15`) supports a fixed subset of
//! [`FrameFeature`]s. A [`FrameSpec`] is resolved against that table before
//! any pixel work: requested fields the style does not support are dropped
//! with a warning and replaced by defaults, never rejected.
//!
//! Compositing grows the canvas by the border on all sides plus a text band
//! on the configured edge (only for styles that support text), fills the
//! frame and band, pastes the QR canvas unscaled, then draws the text
//! centered in the band.

use super::calculations::{FrameLayout, PixelRect, centered_offset, frame_layout, text_band};
use super::canvas::{RenderedImage, Scene, Shape};
use super::font;
use crate::color::Rgb8;
use crate::style::{DEFAULT_FRAME_TEXT, FrameSpec};
use image::{RgbaImage, imageops};
use serde::{Deserialize, Serialize};
use std::fmt;

pub use super::calculations::FramePosition;

pub const DEFAULT_FRAME_COLOR: Rgb8 = Rgb8::BLACK;
pub const DEFAULT_FRAME_BACKGROUND: Rgb8 = Rgb8::WHITE;
pub const DEFAULT_BORDER_WIDTH: u32 = 2;

/// A frame field a style may or may not honor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameFeature {
    Color,
    Text,
    BackgroundColor,
    BorderWidth,
}

impl FrameFeature {
    /// Request field name carrying this feature.
    pub fn field(self) -> &'static str {
        match self {
            FrameFeature::Color => "frameColor",
            FrameFeature::Text => "frameText",
            FrameFeature::BackgroundColor => "frameBackgroundColor",
            FrameFeature::BorderWidth => "frameBorderWidth",
        }
    }
}

use FrameFeature::{BackgroundColor as Bg, BorderWidth as Border, Color, Text};

/// Named frame styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum FrameStyle {
    Frame1,
    Frame2,
    Frame3,
    Frame4,
    Frame5,
    Frame6,
    Frame7,
    Frame8,
    Frame9,
    Frame10,
    Frame11,
    Frame12,
    Frame13,
    Frame14,
    Frame15,
}

impl FrameStyle {
    pub const ALL: [FrameStyle; 15] = [
        FrameStyle::Frame1,
        FrameStyle::Frame2,
        FrameStyle::Frame3,
        FrameStyle::Frame4,
        FrameStyle::Frame5,
        FrameStyle::Frame6,
        FrameStyle::Frame7,
        FrameStyle::Frame8,
        FrameStyle::Frame9,
        FrameStyle::Frame10,
        FrameStyle::Frame11,
        FrameStyle::Frame12,
        FrameStyle::Frame13,
        FrameStyle::Frame14,
        FrameStyle::Frame15,
    ];

    /// Style for `frameN`, `N` in 1..=15.
    pub fn from_index(index: u8) -> Option<Self> {
        index
            .checked_sub(1)
            .and_then(|i| Self::ALL.get(i as usize))
            .copied()
    }

    pub fn index(self) -> u8 {
        self as u8 + 1
    }

    pub fn features(self) -> &'static [FrameFeature] {
        match self {
            FrameStyle::Frame1 => &[Color, Text, Border],
            FrameStyle::Frame2 => &[Color, Text, Bg],
            FrameStyle::Frame3 => &[Color, Border],
            FrameStyle::Frame4 => &[Color, Text, Bg, Border],
            FrameStyle::Frame5 => &[Color, Text],
            FrameStyle::Frame6 => &[Color, Bg, Border],
            FrameStyle::Frame7 => &[Text, Bg],
            FrameStyle::Frame8 => &[Color],
            FrameStyle::Frame9 => &[Color, Text, Border],
            FrameStyle::Frame10 => &[Color, Text, Bg, Border],
            FrameStyle::Frame11 => &[Color, Bg],
            FrameStyle::Frame12 => &[Text, Border],
            FrameStyle::Frame13 => &[Color, Text, Bg],
            FrameStyle::Frame14 => &[Color, Border],
            FrameStyle::Frame15 => &[Color, Text, Bg, Border],
        }
    }

    pub fn supports(self, feature: FrameFeature) -> bool {
        self.features().contains(&feature)
    }
}

impl fmt::Display for FrameStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame{}", self.index())
    }
}

impl TryFrom<u8> for FrameStyle {
    type Error = String;

    fn try_from(index: u8) -> Result<Self, Self::Error> {
        Self::from_index(index).ok_or_else(|| format!("frame style {index} out of range"))
    }
}

impl From<FrameStyle> for u8 {
    fn from(style: FrameStyle) -> u8 {
        style.index()
    }
}

/// A frame spec with every field settled against its style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFrame {
    pub style: FrameStyle,
    pub color: Rgb8,
    pub background_color: Rgb8,
    pub border_width: u32,
    /// Text to draw; `None` when the style has no text band.
    pub text: Option<String>,
    pub text_size: u32,
    pub text_font: String,
    pub position: FramePosition,
    /// Requested features the style does not support.
    pub ignored: Vec<FrameFeature>,
}

impl ResolvedFrame {
    /// Text band thickness, zero for styles without text.
    pub fn band(&self) -> u32 {
        if self.style.supports(Text) {
            text_band(self.text_size)
        } else {
            0
        }
    }

    pub fn layout(&self, content: (u32, u32)) -> FrameLayout {
        frame_layout(content, self.border_width, self.band(), self.position)
    }
}

/// Settle `spec` against its style's feature set.
pub fn resolve(spec: &FrameSpec) -> ResolvedFrame {
    let style = spec.style;
    let mut ignored = Vec::new();
    let mut keep = |feature: FrameFeature, requested: bool| {
        let supported = style.supports(feature);
        if requested && !supported {
            log::warn!(
                "{style} does not support {}; ignoring it",
                feature.field()
            );
            ignored.push(feature);
        }
        supported
    };

    let color = spec
        .color
        .filter(|_| keep(Color, true))
        .unwrap_or(DEFAULT_FRAME_COLOR);
    let background_color = spec
        .background_color
        .filter(|_| keep(Bg, true))
        .unwrap_or(DEFAULT_FRAME_BACKGROUND);
    let border_width = spec
        .border_width
        .filter(|_| keep(Border, true))
        .unwrap_or(DEFAULT_BORDER_WIDTH);
    let text = keep(Text, spec.text.is_some()).then(|| {
        spec.text
            .clone()
            .unwrap_or_else(|| DEFAULT_FRAME_TEXT.to_string())
    });

    ResolvedFrame {
        style,
        color,
        background_color,
        border_width,
        text,
        text_size: spec.text_size,
        text_font: spec.text_font.clone(),
        position: spec.position,
        ignored,
    }
}

/// Wrap `image` in the frame described by `spec`.
pub fn add_frame(image: RenderedImage, spec: &FrameSpec) -> RenderedImage {
    let frame = resolve(spec);
    let layout = frame.layout((image.width(), image.height()));

    let mut raster = RgbaImage::from_pixel(layout.width, layout.height, frame.color.to_rgba().into());
    if let Some(band) = layout.band {
        fill_rect(&mut raster, band, frame.background_color);
    }
    imageops::replace(
        &mut raster,
        &image.raster,
        layout.content.x as i64,
        layout.content.y as i64,
    );
    if let (Some(band), Some(text)) = (layout.band, frame.text.as_deref())
        && !text.trim().is_empty()
    {
        draw_text(&mut raster, band, text, &frame);
    }

    let scene = image.scene.map(|inner| frame_scene(inner, &frame, &layout));
    log::debug!(
        "{} framed {}x{} -> {}x{}",
        frame.style,
        image.raster.width(),
        image.raster.height(),
        layout.width,
        layout.height
    );
    RenderedImage { raster, scene }
}

fn fill_rect(raster: &mut RgbaImage, rect: PixelRect, color: Rgb8) {
    let rgba = color.to_rgba().into();
    for y in rect.y..rect.y + rect.height {
        for x in rect.x..rect.x + rect.width {
            raster.put_pixel(x, y, rgba);
        }
    }
}

/// Bitmap text centered in `band`, rotated to read along vertical bands.
fn draw_text(raster: &mut RgbaImage, band: PixelRect, text: &str, frame: &ResolvedFrame) {
    let vertical = frame.position.is_vertical();
    let (along, across) = if vertical {
        (band.height, band.width)
    } else {
        (band.width, band.height)
    };
    let scale = font::fit_scale(text, frame.text_size, along, across);
    let mut glyphs = font::rasterize(text, scale, frame.color.to_rgba().into());
    glyphs = match frame.position {
        FramePosition::Left => imageops::rotate270(&glyphs),
        FramePosition::Right => imageops::rotate90(&glyphs),
        FramePosition::Top | FramePosition::Bottom => glyphs,
    };
    let (w, h) = (glyphs.width().min(band.width), glyphs.height().min(band.height));
    let glyphs = imageops::crop_imm(
        &glyphs,
        centered_offset(glyphs.width(), w),
        centered_offset(glyphs.height(), h),
        w,
        h,
    )
    .to_image();
    let x = band.x + centered_offset(band.width, w);
    let y = band.y + centered_offset(band.height, h);
    imageops::overlay(raster, &glyphs, x as i64, y as i64);
}

fn frame_scene(inner: Scene, frame: &ResolvedFrame, layout: &FrameLayout) -> Scene {
    let mut scene = Scene::new(layout.width, layout.height);
    let c = layout.content;
    // Frame color everywhere except the content hole, so a transparent QR
    // background stays transparent.
    scene.push(Shape::Path {
        d: format!(
            "M0,0H{w}V{h}H0Z M{x},{y}h{cw}v{ch}h-{cw}z",
            w = layout.width,
            h = layout.height,
            x = c.x,
            y = c.y,
            cw = c.width,
            ch = c.height,
        ),
        fill: frame.color,
        even_odd: true,
    });
    if let Some(band) = layout.band {
        scene.push(Shape::Rect {
            x: band.x as f64,
            y: band.y as f64,
            width: band.width as f64,
            height: band.height as f64,
            fill: frame.background_color,
        });
    }
    scene.push(Shape::Group {
        dx: c.x as f64,
        dy: c.y as f64,
        shapes: inner.shapes,
    });
    if let (Some(band), Some(text)) = (layout.band, frame.text.as_deref())
        && !text.trim().is_empty()
    {
        let rotate = match frame.position {
            FramePosition::Left => -90.0,
            FramePosition::Right => 90.0,
            FramePosition::Top | FramePosition::Bottom => 0.0,
        };
        scene.push(Shape::Text {
            x: band.x as f64 + band.width as f64 / 2.0,
            y: band.y as f64 + band.height as f64 / 2.0,
            size: frame.text_size as f64,
            font: frame.text_font.clone(),
            fill: frame.color,
            rotate,
            content: text.to_string(),
        });
    }
    log::trace!("frame scene has {} shapes", scene.shape_count());
    scene
}
