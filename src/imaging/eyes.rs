//! Named eye glyphs for vector output.
//!
//! Each of the ten outer (`eyeOuter0`–`eyeOuter9`) and inner
//! (`eyeInner0`–`eyeInner9`) styles is a rounded rectangle with its own
//! per-corner radii, expressed as a fraction of the glyph side. The outer
//! glyph is a ring (7×7 block minus the 5×5 separator), the inner glyph a
//! solid 3×3 square. Geometry never changes: only the corner shapes do.
//!
//! Raster output cannot substitute glyphs and falls back to flat eye colors.

use serde::{Deserialize, Serialize};

/// Per-corner radii (top-left, top-right, bottom-right, bottom-left) as a
/// fraction of the side. 0.5 on every corner is a circle.
const CORNER_TABLE: [[f64; 4]; 10] = [
    [0.0, 0.0, 0.0, 0.0],
    [0.15, 0.15, 0.15, 0.15],
    [0.3, 0.3, 0.3, 0.3],
    [0.5, 0.5, 0.5, 0.5],
    [0.5, 0.0, 0.5, 0.0],
    [0.0, 0.5, 0.0, 0.5],
    [0.5, 0.5, 0.0, 0.5],
    [0.5, 0.5, 0.5, 0.0],
    [0.3, 0.0, 0.0, 0.0],
    [0.0, 0.0, 0.3, 0.0],
];

/// Eye style identifier, 0–9.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct EyeStyleId(u8);

impl EyeStyleId {
    pub const COUNT: u8 = CORNER_TABLE.len() as u8;

    pub fn new(id: u8) -> Option<Self> {
        (id < Self::COUNT).then_some(Self(id))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    fn corners(self) -> [f64; 4] {
        CORNER_TABLE[self.0 as usize]
    }
}

impl TryFrom<u8> for EyeStyleId {
    type Error = String;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        Self::new(id).ok_or_else(|| format!("eye style {id} out of range"))
    }
}

impl From<EyeStyleId> for u8 {
    fn from(id: EyeStyleId) -> u8 {
        id.0
    }
}

/// Trim a float for path data: at most three decimals, no trailing zeros.
pub(crate) fn num(v: f64) -> String {
    let s = format!("{:.3}", v);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" { "0".to_string() } else { s.to_string() }
}

/// Closed path for a rounded rectangle with per-corner radii.
fn rounded_rect(x: f64, y: f64, side: f64, corners: [f64; 4]) -> String {
    let [tl, tr, br, bl] = corners.map(|f| f.clamp(0.0, 0.5) * side);
    let arc = |r: f64, ex: f64, ey: f64| {
        if r > 0.0 {
            format!("A{r},{r} 0 0 1 {},{}", num(ex), num(ey), r = num(r))
        } else {
            format!("L{},{}", num(ex), num(ey))
        }
    };
    let (x2, y2) = (x + side, y + side);
    [
        format!("M{},{}", num(x + tl), num(y)),
        format!("L{},{}", num(x2 - tr), num(y)),
        arc(tr, x2, y + tr),
        format!("L{},{}", num(x2), num(y2 - br)),
        arc(br, x2 - br, y2),
        format!("L{},{}", num(x + bl), num(y2)),
        arc(bl, x, y2 - bl),
        format!("L{},{}", num(x), num(y + tl)),
        arc(tl, x + tl, y),
        "Z".to_string(),
    ]
    .concat()
}

/// Outer ring glyph for a 7×7 block at `(x, y)` with module side `module`.
///
/// Returns path data meant to be filled with the even-odd rule.
pub fn outer_glyph_path(style: EyeStyleId, x: f64, y: f64, module: f64) -> String {
    let corners = style.corners();
    let outer = rounded_rect(x, y, 7.0 * module, corners);
    let hole = rounded_rect(x + module, y + module, 5.0 * module, corners);
    format!("{outer}{hole}")
}

/// Inner core glyph for a 7×7 block at `(x, y)`.
pub fn inner_glyph_path(style: EyeStyleId, x: f64, y: f64, module: f64) -> String {
    rounded_rect(x + 2.0 * module, y + 2.0 * module, 3.0 * module, style.corners())
}
