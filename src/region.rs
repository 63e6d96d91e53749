//! Module region classification.
//!
//! Every cell of a [`ModuleMatrix`](crate::matrix::ModuleMatrix) belongs to
//! exactly one region:
//!
//! ```text
//!   QuietZone margin
//!   ┌──────────────────────────┐
//!   │ ┌───────┐       ┌───────┐│
//!   │ │ outer │       │ outer ││   finder patterns: 7×7 blocks at three
//!   │ │ ┌───┐ │       │ ┌───┐ ││   symbol corners; the centered 3×3 is
//!   │ │ │in │ │  Data │ │in │ ││   InnerEye, the rest of the block is
//!   │ │ └───┘ │       │ └───┘ ││   OuterEye
//!   │ └───────┘       └───────┘│
//!   │ ┌───────┐                │
//!   │ │ outer │                │
//!   │ └───────┘                │
//!   └──────────────────────────┘
//! ```
//!
//! Geometry is identical at all three corners; eye styles only swap the glyph
//! drawn over a block, never the block's extent.

/// Side of a finder-pattern block, in modules.
pub const EYE_SIZE: usize = 7;
/// Side of the finder pattern's core, in modules.
pub const EYE_CORE_SIZE: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    OuterEye,
    InnerEye,
    Data,
    QuietZone,
}

/// The three finder-pattern corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EyeCorner {
    TopLeft,
    TopRight,
    BottomLeft,
}

impl EyeCorner {
    pub const ALL: [EyeCorner; 3] = [EyeCorner::TopLeft, EyeCorner::TopRight, EyeCorner::BottomLeft];

    /// Grid coordinate `(row, col)` of the block's top-left module.
    ///
    /// `size` is the full grid width and `quiet_zone` its margin.
    pub fn origin(self, size: usize, quiet_zone: usize) -> (usize, usize) {
        let far = size.saturating_sub(quiet_zone + EYE_SIZE);
        match self {
            EyeCorner::TopLeft => (quiet_zone, quiet_zone),
            EyeCorner::TopRight => (quiet_zone, far),
            EyeCorner::BottomLeft => (far, quiet_zone),
        }
    }
}

/// Classify grid cell `(row, col)` of a `size`-wide grid with the given margin.
pub fn classify(row: usize, col: usize, size: usize, quiet_zone: usize) -> Region {
    let symbol_end = size.saturating_sub(quiet_zone);
    if row < quiet_zone || col < quiet_zone || row >= symbol_end || col >= symbol_end {
        return Region::QuietZone;
    }
    for corner in EyeCorner::ALL {
        let (r0, c0) = corner.origin(size, quiet_zone);
        if (r0..r0 + EYE_SIZE).contains(&row) && (c0..c0 + EYE_SIZE).contains(&col) {
            let core = (EYE_SIZE - EYE_CORE_SIZE) / 2;
            let (dr, dc) = (row - r0, col - c0);
            let in_core = (core..core + EYE_CORE_SIZE).contains(&dr)
                && (core..core + EYE_CORE_SIZE).contains(&dc);
            return if in_core {
                Region::InnerEye
            } else {
                Region::OuterEye
            };
        }
    }
    Region::Data
}
