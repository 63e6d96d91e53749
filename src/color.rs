//! Color parsing and gradient interpolation.
//!
//! Everything here is pure and deterministic: the same inputs always produce
//! the same color, which the render cache depends on (two renders of one
//! fingerprint must be byte-identical).
//!
//! ## Accepted color strings
//!
//! | Form | Example |
//! |---|---|
//! | 6-digit hex, any case | `#5e0bf0`, `#5E0BF0` |
//! | `rgb()` triple, channels 0–255 | `rgb(94, 11, 240)` |
//!
//! Shorthand hex (`#fff`), named colors and alpha forms are rejected.
//!
//! ## Gradient geometry
//!
//! [`gradient_ratio`] maps a module coordinate to a position in `[0, 1]`
//! along the gradient's axis. Coordinates are symbol-relative (quiet zone
//! excluded), so the first symbol column of a linear gradient is exactly
//! color A and the last exactly color B.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ColorError {
    #[error("Invalid color format: {0:?} (expected #RRGGBB or rgb(r,g,b))")]
    InvalidFormat(String),
}

/// An opaque 8-bit RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Rgb8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb8 {
    pub const BLACK: Rgb8 = Rgb8::new(0, 0, 0);
    pub const WHITE: Rgb8 = Rgb8::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Opaque RGBA channels for the raster canvas.
    pub fn to_rgba(self) -> [u8; 4] {
        [self.r, self.g, self.b, 255]
    }

    /// Lowercase `#rrggbb`, the form written into SVG output.
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl fmt::Display for Rgb8 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Parse a color string into an [`Rgb8`].
///
/// Surrounding whitespace is tolerated; anything else outside the two
/// accepted forms fails with [`ColorError::InvalidFormat`].
pub fn parse_color(input: &str) -> Result<Rgb8, ColorError> {
    let s = input.trim();
    let invalid = || ColorError::InvalidFormat(input.to_string());

    if let Some(hex) = s.strip_prefix('#') {
        if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
        return Ok(Rgb8::new(channel(0)?, channel(2)?, channel(4)?));
    }

    let inner = s
        .strip_prefix("rgb(")
        .and_then(|rest| rest.strip_suffix(')'))
        .ok_or_else(invalid)?;
    let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
    if parts.len() != 3 {
        return Err(invalid());
    }
    let mut channels = [0u8; 3];
    for (slot, part) in channels.iter_mut().zip(&parts) {
        if part.is_empty() || part.len() > 3 || !part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        *slot = part.parse::<u8>().map_err(|_| invalid())?;
    }
    Ok(Rgb8::new(channels[0], channels[1], channels[2]))
}

/// Linear per-channel interpolation: `round(a + (b - a) * ratio)`.
///
/// `ratio` is clamped to `[0, 1]` first; NaN is treated as 0.
pub fn interpolate(a: Rgb8, b: Rgb8, ratio: f64) -> Rgb8 {
    let t = if ratio.is_nan() { 0.0 } else { ratio.clamp(0.0, 1.0) };
    let mix = |x: u8, y: u8| {
        let v = x as f64 + (y as f64 - x as f64) * t;
        v.round().clamp(0.0, 255.0) as u8
    };
    Rgb8::new(mix(a.r, b.r), mix(a.g, b.g), mix(a.b, b.b))
}

/// Gradient geometry.
///
/// Serialized names follow the request schema (`grdType`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GradientKind {
    /// Left to right.
    #[serde(rename = "linear")]
    Linear,
    /// Top to bottom.
    #[serde(rename = "upDown")]
    Vertical,
    /// Top-left corner to bottom-right corner.
    #[serde(rename = "diagonal1")]
    DiagonalNwSe,
    /// The SW-NE diagonal; color A sits at the top-right corner and color B
    /// at the bottom-left.
    #[serde(rename = "diagonal2")]
    DiagonalSwNe,
    /// Center outwards.
    #[serde(rename = "radial")]
    Radial,
}

impl GradientKind {
    pub const ALL: [GradientKind; 5] = [
        GradientKind::Linear,
        GradientKind::Vertical,
        GradientKind::DiagonalNwSe,
        GradientKind::DiagonalSwNe,
        GradientKind::Radial,
    ];

    pub fn name(self) -> &'static str {
        match self {
            GradientKind::Linear => "linear",
            GradientKind::Vertical => "upDown",
            GradientKind::DiagonalNwSe => "diagonal1",
            GradientKind::DiagonalSwNe => "diagonal2",
            GradientKind::Radial => "radial",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }
}

/// Position of module `(row, col)` along the gradient, in `[0, 1]`.
///
/// `n` is the symbol width in modules. A 1×1 grid has no extent, so every
/// coordinate maps to 0.
pub fn gradient_ratio(kind: GradientKind, row: usize, col: usize, n: usize) -> f64 {
    if n <= 1 {
        return 0.0;
    }
    let last = (n - 1) as f64;
    let (r, c) = (row.min(n - 1) as f64, col.min(n - 1) as f64);
    let ratio = match kind {
        GradientKind::Linear => c / last,
        GradientKind::Vertical => r / last,
        GradientKind::DiagonalNwSe => (r + c) / (2.0 * last),
        GradientKind::DiagonalSwNe => (r + (last - c)) / (2.0 * last),
        GradientKind::Radial => {
            let center = last / 2.0;
            let max_distance = (2.0 * center * center).sqrt();
            let distance = ((r - center).powi(2) + (c - center).powi(2)).sqrt();
            distance / max_distance
        }
    };
    ratio.clamp(0.0, 1.0)
}
