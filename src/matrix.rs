//! QR module matrices and the symbol encoder seam.
//!
//! Symbol encoding (version selection, Reed–Solomon coding, masking) is not
//! this crate's business: the [`SymbolEncoder`] trait is the narrow contract,
//! and [`QrcodeEncoder`] satisfies it with the `qrcode` crate. Tests plug in
//! hand-built matrices instead.
//!
//! A [`ModuleMatrix`] covers the whole drawable grid, quiet zone included:
//! `size = symbol_width + 2 * quiet_zone`. Quiet-zone cells are always light.

use qrcode::{Color, EcLevel, QrCode};
use thiserror::Error;

/// Quiet zone recommended by ISO/IEC 18004 for QR symbols.
pub const DEFAULT_QUIET_ZONE: usize = 4;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("QR encoding failed: {0}")]
    Symbol(String),
    #[error("Invalid module matrix: {0}")]
    InvalidMatrix(String),
}

/// Error-correction level requested from the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcLevelRequest {
    Low,
    Medium,
    Quartile,
    High,
}

/// Square grid of dark/light modules with a declared quiet-zone width.
///
/// Immutable once built. Coordinates are `(row, col)` in `[0, size)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleMatrix {
    size: usize,
    quiet_zone: usize,
    dark: Vec<bool>,
}

impl ModuleMatrix {
    /// Wrap a symbol (no quiet zone) in a light quiet-zone margin.
    ///
    /// `symbol` must be row-major and `symbol_width²` long.
    pub fn from_symbol(
        symbol: &[bool],
        symbol_width: usize,
        quiet_zone: usize,
    ) -> Result<Self, EncodeError> {
        if symbol_width == 0 || symbol.len() != symbol_width * symbol_width {
            return Err(EncodeError::InvalidMatrix(format!(
                "expected {w}x{w} modules, got {}",
                symbol.len(),
                w = symbol_width
            )));
        }
        let size = symbol_width + 2 * quiet_zone;
        let mut dark = vec![false; size * size];
        for row in 0..symbol_width {
            for col in 0..symbol_width {
                dark[(row + quiet_zone) * size + col + quiet_zone] = symbol[row * symbol_width + col];
            }
        }
        Ok(Self {
            size,
            quiet_zone,
            dark,
        })
    }

    /// Total grid width in modules, quiet zone included.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn quiet_zone(&self) -> usize {
        self.quiet_zone
    }

    /// Width of the symbol proper (the grid minus both quiet-zone margins).
    pub fn symbol_width(&self) -> usize {
        self.size - 2 * self.quiet_zone
    }

    /// Whether the module at `(row, col)` is dark. Out-of-range reads are light.
    pub fn is_dark(&self, row: usize, col: usize) -> bool {
        row < self.size && col < self.size && self.dark[row * self.size + col]
    }
}

/// External QR symbol encoder.
pub trait SymbolEncoder: Send + Sync {
    fn encode(&self, content: &str, level: EcLevelRequest) -> Result<ModuleMatrix, EncodeError>;
}

/// Encoder backed by the `qrcode` crate.
#[derive(Debug, Clone, Copy)]
pub struct QrcodeEncoder {
    pub quiet_zone: usize,
}

impl Default for QrcodeEncoder {
    fn default() -> Self {
        Self {
            quiet_zone: DEFAULT_QUIET_ZONE,
        }
    }
}

impl SymbolEncoder for QrcodeEncoder {
    fn encode(&self, content: &str, level: EcLevelRequest) -> Result<ModuleMatrix, EncodeError> {
        let ec = match level {
            EcLevelRequest::Low => EcLevel::L,
            EcLevelRequest::Medium => EcLevel::M,
            EcLevelRequest::Quartile => EcLevel::Q,
            EcLevelRequest::High => EcLevel::H,
        };
        let code = QrCode::with_error_correction_level(content.as_bytes(), ec)
            .map_err(|e| EncodeError::Symbol(e.to_string()))?;
        let symbol: Vec<bool> = code
            .to_colors()
            .into_iter()
            .map(|c| c == Color::Dark)
            .collect();
        ModuleMatrix::from_symbol(&symbol, code.width(), self.quiet_zone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_symbol_adds_light_quiet_zone() {
        let symbol = vec![true; 9];
        let m = ModuleMatrix::from_symbol(&symbol, 3, 2).unwrap();
        assert_eq!(m.size(), 7);
        assert_eq!(m.symbol_width(), 3);
        assert!(!m.is_dark(0, 0));
        assert!(!m.is_dark(1, 3));
        assert!(m.is_dark(2, 2));
        assert!(m.is_dark(4, 4));
        assert!(!m.is_dark(5, 4));
    }

    #[test]
    fn from_symbol_rejects_wrong_length() {
        assert!(matches!(
            ModuleMatrix::from_symbol(&[true; 8], 3, 0),
            Err(EncodeError::InvalidMatrix(_))
        ));
        assert!(ModuleMatrix::from_symbol(&[], 0, 4).is_err());
    }

    #[test]
    fn out_of_range_is_light() {
        let m = ModuleMatrix::from_symbol(&[true], 1, 0).unwrap();
        assert!(m.is_dark(0, 0));
        assert!(!m.is_dark(1, 0));
        assert!(!m.is_dark(0, 9));
    }

    #[test]
    fn qrcode_encoder_produces_finder_patterns() {
        let m = QrcodeEncoder::default()
            .encode("https://example.com", EcLevelRequest::High)
            .unwrap();
        let q = m.quiet_zone();
        assert_eq!(q, DEFAULT_QUIET_ZONE);
        assert_eq!((m.symbol_width() - 17) % 4, 0);
        // Finder pattern: dark outer ring, light separator ring, dark core.
        assert!(m.is_dark(q, q));
        assert!(m.is_dark(q + 6, q + 6));
        assert!(!m.is_dark(q + 1, q + 1));
        assert!(m.is_dark(q + 3, q + 3));
        let far = q + m.symbol_width() - 1;
        assert!(m.is_dark(q, far));
        assert!(m.is_dark(far, q));
    }
}
