//! Logo compositor.
//!
//! A logo is loaded through a [`LogoSource`] (remote URL, local path, or
//! `data:` URI), scaled down into the centered safe box (see
//! [`logo_fit`]) and alpha-blended over the QR canvas. Logos are never
//! upscaled. Vector scenes get the scaled logo embedded as a PNG data URI.

use super::calculations::{centered_offset, logo_fit};
use super::canvas::{RenderedImage, Shape};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use image::codecs::png::PngEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, ImageEncoder};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LogoError {
    #[error("Failed to fetch logo {location}: {reason}")]
    Fetch { location: String, reason: String },
    #[error("Logo {location} is not a readable image: {reason}")]
    Decode { location: String, reason: String },
    #[error("Failed to embed logo: {0}")]
    Embed(String),
}

/// Where logos come from.
pub trait LogoSource: Send + Sync {
    fn fetch(&self, location: &str) -> Result<DynamicImage, LogoError>;
}

/// Loads `http(s)://` URLs, `data:` URIs and local file paths.
pub struct DefaultLogoSource {
    client: reqwest::blocking::Client,
}

impl DefaultLogoSource {
    pub fn new(timeout: Duration) -> Result<Self, LogoError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LogoError::Fetch {
                location: "<client>".to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self { client })
    }

    fn fetch_remote(&self, url: &str) -> Result<Vec<u8>, LogoError> {
        let fail = |e: reqwest::Error| LogoError::Fetch {
            location: url.to_string(),
            reason: e.to_string(),
        };
        let response = self
            .client
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(fail)?;
        Ok(response.bytes().map_err(fail)?.to_vec())
    }
}

impl LogoSource for DefaultLogoSource {
    fn fetch(&self, location: &str) -> Result<DynamicImage, LogoError> {
        let bytes = if location.starts_with("http://") || location.starts_with("https://") {
            self.fetch_remote(location)?
        } else if let Some(uri) = location.strip_prefix("data:") {
            decode_data_uri(uri).map_err(|reason| LogoError::Fetch {
                location: "data URI".to_string(),
                reason,
            })?
        } else {
            let path = location.strip_prefix("file://").unwrap_or(location);
            std::fs::read(Path::new(path)).map_err(|e| LogoError::Fetch {
                location: location.to_string(),
                reason: e.to_string(),
            })?
        };
        log::debug!("loaded logo {} ({} bytes)", short(location), bytes.len());
        image::load_from_memory(&bytes).map_err(|e| LogoError::Decode {
            location: short(location),
            reason: e.to_string(),
        })
    }
}

/// Payload of a `data:` URI, minus the scheme. Only base64 payloads.
fn decode_data_uri(uri: &str) -> Result<Vec<u8>, String> {
    let (meta, payload) = uri
        .split_once(',')
        .ok_or_else(|| "missing ',' separator".to_string())?;
    if !meta.ends_with(";base64") {
        return Err("only base64 data URIs are supported".to_string());
    }
    STANDARD.decode(payload.trim()).map_err(|e| e.to_string())
}

/// Location as shown in logs; data URIs are elided.
fn short(location: &str) -> String {
    if location.starts_with("data:") {
        "data URI".to_string()
    } else {
        location.to_string()
    }
}

/// Scale `logo` into the safe box and blend it over the center of `image`.
pub fn overlay(image: &mut RenderedImage, logo: &DynamicImage) -> Result<(), LogoError> {
    let (w, h) = logo_fit(logo.dimensions(), image.width());
    if w == 0 || h == 0 {
        log::warn!("logo has no pixels; skipping");
        return Ok(());
    }
    let scaled = if (w, h) == logo.dimensions() {
        logo.to_rgba8()
    } else {
        logo.resize_exact(w, h, FilterType::Lanczos3).to_rgba8()
    };
    let x = centered_offset(image.width(), w);
    let y = centered_offset(image.height(), h);
    imageops::overlay(&mut image.raster, &scaled, x as i64, y as i64);

    if let Some(scene) = image.scene.as_mut() {
        let mut png = Vec::new();
        PngEncoder::new(&mut png)
            .write_image(scaled.as_raw(), w, h, image::ExtendedColorType::Rgba8)
            .map_err(|e| LogoError::Embed(e.to_string()))?;
        scene.push(Shape::Image {
            x: x as f64,
            y: y as f64,
            width: w as f64,
            height: h as f64,
            href: format!("data:image/png;base64,{}", STANDARD.encode(png)),
        });
    }
    log::debug!("logo overlaid at {x},{y} as {w}x{h}");
    Ok(())
}
