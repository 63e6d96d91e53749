//! # Styled QR
//!
//! Renders styled QR codes: flat or gradient module fills, colored and
//! shaped finder eyes, a centered logo, and decorative frames with a caption,
//! as PNG or SVG. Identical requests are served from a content-addressed
//! cache, and clients are rate limited.
//!
//! # Architecture: One Request, One Pipeline
//!
//! Every request runs the same sequence of stages, each a plain function over
//! an owned canvas:
//!
//! ```text
//! GenerateRequest ─validate→ StyleConfig ─fingerprint→ cache
//!                                                       │ miss
//! encode (level H) → render modules → overlay logo → add frame → encode PNG/SVG
//! ```
//!
//! - **Validation first**: every field is checked before a pixel buffer is
//!   allocated, so bad input never costs rendering work.
//! - **Owned canvas**: each compositing stage takes the [`imaging::RenderedImage`]
//!   by value or exclusive reference and hands it on. No shared pixel state.
//! - **Collaborators behind traits**: the symbol encoder, logo source, image
//!   codec and history store are trait objects, so tests swap in recording
//!   mocks.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`color`] | Hex color parsing, interpolation, gradient ratios |
//! | [`matrix`] | Module matrix and the QR symbol encoder seam |
//! | [`region`] | Finder-eye / data / quiet-zone classification |
//! | [`style`] | Wire request, validation, canonical `StyleConfig` |
//! | [`imaging`] | Module renderer, logo and frame compositors, PNG/SVG codec |
//! | [`cache`] | Fingerprints, coalescing render cache, on-disk manifest |
//! | [`ratelimit`] | Per-client sliding-window limiter |
//! | [`history`] | Generation records (JSON Lines) |
//! | [`bounded`] | Deadline runner for logo fetch and image encoding |
//! | [`service`] | Pipeline orchestration, boundary results, bulk generation |
//! | [`config`] | `config.toml` loading, validation and merging |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Highest Error Correction, Capped Logo
//!
//! Symbols are always encoded at level H, and the logo is scaled into a
//! centered box no wider than 20% of the canvas. Level H tolerates roughly 30%
//! module damage, so the logo can never push a code past what the decoder
//! recovers. Oversized logos are downscaled, never rejected.
//!
//! ## One Scene, Two Formats
//!
//! The renderer always fills a raster and, for SVG requests, also records a
//! vector scene (one path per fill color, eye glyphs, embedded logo, frame
//! shapes and `<text>`). The codec picks whichever the format needs. SVG
//! markup is produced with [Maud](https://maud.lambda.xyz/), so every
//! interpolated value is escaped.
//!
//! ## Content-Addressed Cache With Coalescing
//!
//! The cache key is a SHA-256 over the canonical JSON of the validated style
//! plus the content. Concurrent identical requests wait on the first one's
//! render instead of repeating it, and failures are never cached. See
//! [`cache`] for the protocol.
//!
//! ## Lenient Frames
//!
//! Each frame style supports a fixed subset of frame options. Options a style
//! does not support are dropped with a warning rather than rejected; only an
//! unknown frame style fails the request.

pub mod bounded;
pub mod cache;
pub mod color;
pub mod config;
pub mod history;
pub mod imaging;
pub mod matrix;
pub mod output;
pub mod ratelimit;
pub mod region;
pub mod service;
pub mod style;

#[cfg(test)]
pub(crate) mod test_helpers;
