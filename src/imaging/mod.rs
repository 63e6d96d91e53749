//! Compositing pipeline: module matrix → finished image bytes.
//!
//! | Stage | Function | Output |
//! |---|---|---|
//! | **Render** | [`render`] | RGBA canvas (+ vector scene for SVG) |
//! | **Logo** | [`logo::overlay`] | logo blended into the centered safe box |
//! | **Frame** | [`add_frame`] | canvas grown by border and text band |
//! | **Encode** | [`ImageCodec::encode`] | PNG or SVG bytes |
//!
//! The module is split into:
//! - **Calculations**: pure geometry (module spans, logo fit, frame layout)
//! - **Canvas**: the [`RenderedImage`] handed from stage to stage
//! - **Eyes / Font**: static glyph tables for eye styles and frame text
//! - **Render / Logo / Frame**: the compositing stages
//! - **Codec**: [`ImageCodec`] trait + [`RustCodec`]

pub mod calculations;
pub mod canvas;
pub mod codec;
pub mod eyes;
pub mod font;
pub mod frame;
pub mod logo;
pub mod render;

pub use canvas::{RenderedImage, Scene, Shape};
pub use codec::{CodecError, ImageCodec, RustCodec};
pub use frame::{FrameFeature, FramePosition, FrameStyle, add_frame};
pub use logo::{DefaultLogoSource, LogoError, LogoSource};
pub use render::render;
