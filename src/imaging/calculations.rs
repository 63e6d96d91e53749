//! Pure geometry for the compositing stages.
//!
//! All functions here are pure and testable without any pixels.

/// Largest logo width as a fraction of the canvas width.
///
/// Keeps enough of the symbol intact for level-H error correction to recover
/// the covered modules. Oversized logos are scaled down to fit, never
/// rejected.
pub const LOGO_MAX_FRACTION: f64 = 0.2;

/// Height of the frame's text band relative to the text size.
pub const TEXT_BAND_FACTOR: f64 = 1.4;

/// Pixel span `[start, end)` covered by module `index` of `modules`.
///
/// Starts are floored and ends ceiled, so adjacent modules always touch or
/// overlap by one pixel and never leave a gap, whatever the scale.
///
/// ```
/// # use styled_qr::imaging::calculations::module_span;
/// // 3 modules over 10 pixels: scale 3.33
/// assert_eq!(module_span(0, 3, 10), (0, 4));
/// assert_eq!(module_span(1, 3, 10), (3, 7));
/// assert_eq!(module_span(2, 3, 10), (6, 10));
/// ```
pub fn module_span(index: usize, modules: usize, pixels: u32) -> (u32, u32) {
    if modules == 0 {
        return (0, 0);
    }
    let scale = pixels as f64 / modules as f64;
    let start = (index as f64 * scale).floor() as u32;
    let end = ((index + 1) as f64 * scale).ceil() as u32;
    (start.min(pixels), end.min(pixels))
}

/// For every pixel along one axis, the module that paints it.
///
/// Modules are painted in index order, so where two spans overlap the later
/// module owns the pixel.
pub fn pixel_owners(modules: usize, pixels: u32) -> Vec<usize> {
    let mut owners = vec![0; pixels as usize];
    for index in 0..modules {
        let (start, end) = module_span(index, modules, pixels);
        for owner in &mut owners[start as usize..end as usize] {
            *owner = index;
        }
    }
    owners
}

/// Fit a logo inside the safe box of a `canvas_width`-wide canvas.
///
/// The box is a square whose side is 20% of the canvas width. Logos already
/// inside the box keep their size; larger ones are scaled down preserving
/// aspect ratio, rounding down so the cap is never exceeded.
pub fn logo_fit(logo: (u32, u32), canvas_width: u32) -> (u32, u32) {
    let (w, h) = logo;
    let max = ((canvas_width as f64 * LOGO_MAX_FRACTION).floor() as u32).max(1);
    if w == 0 || h == 0 {
        return (0, 0);
    }
    if w <= max && h <= max {
        return (w, h);
    }
    let shrink = |short: u32, long: u32| ((short as u64 * max as u64 / long as u64) as u32).max(1);
    if w >= h {
        (max, shrink(h, w))
    } else {
        (shrink(w, h), max)
    }
}

/// Offset that centers `inner` within `outer`.
pub fn centered_offset(outer: u32, inner: u32) -> u32 {
    outer.saturating_sub(inner) / 2
}

/// Height of the frame's text band for a given text size.
pub fn text_band(text_size: u32) -> u32 {
    (text_size as f64 * TEXT_BAND_FACTOR).round() as u32
}

/// Edge of the QR canvas that carries the frame's text band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FramePosition {
    Top,
    Bottom,
    Left,
    Right,
}

impl FramePosition {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "top" => Some(FramePosition::Top),
            "bottom" => Some(FramePosition::Bottom),
            "left" => Some(FramePosition::Left),
            "right" => Some(FramePosition::Right),
            _ => None,
        }
    }

    pub fn is_vertical(self) -> bool {
        matches!(self, FramePosition::Left | FramePosition::Right)
    }
}

/// Axis-aligned pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Geometry of a framed canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    pub width: u32,
    pub height: u32,
    /// Where the unscaled QR canvas is pasted.
    pub content: PixelRect,
    /// Text band, if one was allocated.
    pub band: Option<PixelRect>,
}

/// Lay out a frame around a `content` canvas.
///
/// The canvas grows by `border` on every side and by `band` pixels on the
/// `edge` side. The band spans the content's full length along that edge.
pub fn frame_layout(content: (u32, u32), border: u32, band: u32, edge: FramePosition) -> FrameLayout {
    let (w, h) = content;
    let (extra_w, extra_h) = match edge {
        FramePosition::Top | FramePosition::Bottom => (0, band),
        FramePosition::Left | FramePosition::Right => (band, 0),
    };
    let width = w + 2 * border + extra_w;
    let height = h + 2 * border + extra_h;

    let (content_x, content_y) = match edge {
        FramePosition::Top => (border, border + band),
        FramePosition::Left => (border + band, border),
        FramePosition::Bottom | FramePosition::Right => (border, border),
    };
    let band_rect = (band > 0).then(|| match edge {
        FramePosition::Top => PixelRect { x: border, y: border, width: w, height: band },
        FramePosition::Bottom => PixelRect { x: border, y: border + h, width: w, height: band },
        FramePosition::Left => PixelRect { x: border, y: border, width: band, height: h },
        FramePosition::Right => PixelRect { x: border + w, y: border, width: band, height: h },
    });

    FrameLayout {
        width,
        height,
        content: PixelRect {
            x: content_x,
            y: content_y,
            width: w,
            height: h,
        },
        band: band_rect,
    }
}
