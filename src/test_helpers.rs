//! Shared test utilities for the styled-qr test suite.
//!
//! Provides a valid baseline request, hand-built module matrices, and
//! recording mocks for the encoder and logo collaborators.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let mut req = basic_request();
//! req.gradient = Some(LooseBool::Bool(true));
//! let style = req.validate().unwrap();
//! let img = render(&finder_matrix(), &style);
//! ```

use image::{DynamicImage, Rgba, RgbaImage};
use std::sync::Mutex;
use std::time::Duration;

use crate::imaging::{LogoError, LogoSource};
use crate::matrix::{EcLevelRequest, EncodeError, ModuleMatrix, SymbolEncoder};
use crate::style::{GenerateRequest, LooseNumber};

// =========================================================================
// Requests
// =========================================================================

/// Minimal valid request: black on white URL code at 500 px.
pub fn basic_request() -> GenerateRequest {
    GenerateRequest {
        category: Some("url".into()),
        text: Some("https://example.com".into()),
        size: Some(LooseNumber::Int(500)),
        color_dark: Some("#000000".into()),
        background_color: Some("#ffffff".into()),
        ..GenerateRequest::default()
    }
}

// =========================================================================
// Matrices
// =========================================================================

/// 21×21 symbol with only the three finder patterns dark, 4-module quiet
/// zone.
pub fn finder_matrix() -> ModuleMatrix {
    let w = 21;
    let mut symbol = vec![false; w * w];
    for (r0, c0) in [(0, 0), (0, w - 7), (w - 7, 0)] {
        for r in 0..7 {
            for c in 0..7 {
                let ring = r == 0 || r == 6 || c == 0 || c == 6;
                let core = (2..5).contains(&r) && (2..5).contains(&c);
                symbol[(r0 + r) * w + c0 + c] = ring || core;
            }
        }
    }
    ModuleMatrix::from_symbol(&symbol, w, 4).unwrap()
}

/// Symbol with every module dark.
pub fn solid_matrix(symbol_width: usize, quiet_zone: usize) -> ModuleMatrix {
    let symbol = vec![true; symbol_width * symbol_width];
    ModuleMatrix::from_symbol(&symbol, symbol_width, quiet_zone).unwrap()
}

// =========================================================================
// Mocks
// =========================================================================

/// Encoder that returns [`finder_matrix`] and records every call.
/// Uses Mutex (not RefCell) so it is Sync and works with rayon's par_iter.
#[derive(Default)]
pub struct MockEncoder {
    pub calls: Mutex<Vec<(String, EcLevelRequest)>>,
    pub fail: bool,
}

impl MockEncoder {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn get_calls(&self) -> Vec<(String, EcLevelRequest)> {
        self.calls.lock().unwrap().clone()
    }
}

impl SymbolEncoder for MockEncoder {
    fn encode(&self, content: &str, level: EcLevelRequest) -> Result<ModuleMatrix, EncodeError> {
        self.calls.lock().unwrap().push((content.to_string(), level));
        if self.fail {
            return Err(EncodeError::Symbol("data too long".into()));
        }
        Ok(finder_matrix())
    }
}

/// Logo source that serves a solid square, optionally after a delay, or
/// fails. Records every requested location.
pub struct MockLogoSource {
    pub calls: Mutex<Vec<String>>,
    pub size: u32,
    pub delay: Duration,
    pub fail: bool,
}

impl MockLogoSource {
    pub fn serving(size: u32) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            size,
            delay: Duration::ZERO,
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::serving(0)
        }
    }

    pub fn slow(size: u32, delay: Duration) -> Self {
        Self {
            delay,
            ..Self::serving(size)
        }
    }

    pub fn get_calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl LogoSource for MockLogoSource {
    fn fetch(&self, location: &str) -> Result<DynamicImage, LogoError> {
        self.calls.lock().unwrap().push(location.to_string());
        std::thread::sleep(self.delay);
        if self.fail {
            return Err(LogoError::Fetch {
                location: location.to_string(),
                reason: "connection refused".into(),
            });
        }
        Ok(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            self.size,
            self.size,
            Rgba([255, 0, 0, 255]),
        )))
    }
}
