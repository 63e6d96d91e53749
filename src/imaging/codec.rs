//! Output codecs: finished canvas → file bytes.
//!
//! | Format | Source | Encoder |
//! |---|---|---|
//! | PNG | raster | `image::codecs::png::PngEncoder`, RGB when fully opaque, RGBA otherwise |
//! | SVG | scene | maud markup, one element per [`Shape`] |
//!
//! The [`ImageCodec`] trait is the seam the service encodes through, so tests
//! can substitute a recording or failing codec.

use super::canvas::{RenderedImage, Scene, Shape};
use super::eyes::num;
use crate::style::OutputFormat;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder};
use maud::{Markup, html};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("PNG encoding failed: {0}")]
    Png(String),
    #[error("SVG output needs a vector scene, but none was rendered")]
    MissingScene,
}

pub trait ImageCodec: Send + Sync {
    fn encode(&self, image: &RenderedImage, format: OutputFormat) -> Result<Vec<u8>, CodecError>;
}

/// Pure Rust codec: `image` for PNG, maud for SVG.
#[derive(Debug, Clone, Copy, Default)]
pub struct RustCodec;

impl ImageCodec for RustCodec {
    fn encode(&self, image: &RenderedImage, format: OutputFormat) -> Result<Vec<u8>, CodecError> {
        match format {
            OutputFormat::Png => encode_png(image),
            OutputFormat::Svg => image
                .scene
                .as_ref()
                .map(|scene| svg_document(scene).into_bytes())
                .ok_or(CodecError::MissingScene),
        }
    }
}

fn encode_png(image: &RenderedImage) -> Result<Vec<u8>, CodecError> {
    let (w, h) = (image.width(), image.height());
    let mut out = Vec::new();
    let encoder = PngEncoder::new(&mut out);
    let result = if image.is_opaque() {
        let rgb = DynamicImage::ImageRgba8(image.raster.clone()).to_rgb8();
        encoder.write_image(rgb.as_raw(), w, h, ExtendedColorType::Rgb8)
    } else {
        encoder.write_image(image.raster.as_raw(), w, h, ExtendedColorType::Rgba8)
    };
    result.map_err(|e| CodecError::Png(e.to_string()))?;
    Ok(out)
}

/// Standalone SVG document for `scene`.
pub fn svg_document(scene: &Scene) -> String {
    let markup = html! {
        svg xmlns="http://www.w3.org/2000/svg"
            version="1.1"
            width=(scene.width)
            height=(scene.height)
            viewBox={ "0 0 " (scene.width) " " (scene.height) } {
            @for s in &scene.shapes {
                (shape(s))
            }
        }
    };
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{}\n",
        markup.into_string()
    )
}

fn shape(s: &Shape) -> Markup {
    match s {
        Shape::Rect {
            x,
            y,
            width,
            height,
            fill,
        } => html! {
            rect x=(num(*x)) y=(num(*y)) width=(num(*width)) height=(num(*height)) fill=(fill.to_hex()) {}
        },
        Shape::Path { d, fill, even_odd } => html! {
            path d=(d) fill=(fill.to_hex()) fill-rule=[even_odd.then_some("evenodd")] {}
        },
        Shape::Image {
            x,
            y,
            width,
            height,
            href,
        } => html! {
            image x=(num(*x)) y=(num(*y)) width=(num(*width)) height=(num(*height)) href=(href) {}
        },
        Shape::Text {
            x,
            y,
            size,
            font,
            fill,
            rotate,
            content,
        } => {
            let transform = (*rotate != 0.0)
                .then(|| format!("rotate({} {} {})", num(*rotate), num(*x), num(*y)));
            html! {
                text x=(num(*x)) y=(num(*y))
                    font-size=(num(*size))
                    font-family=(font)
                    fill=(fill.to_hex())
                    text-anchor="middle"
                    dominant-baseline="central"
                    transform=[transform] { (content) }
            }
        }
        Shape::Group { dx, dy, shapes } => html! {
            g transform={ "translate(" (num(*dx)) " " (num(*dy)) ")" } {
                @for inner in shapes {
                    (shape(inner))
                }
            }
        },
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::color::Rgb8;
    use image::{ColorType, Rgba, RgbaImage};
    use std::sync::Mutex;

    /// Codec that records formats and returns fixed bytes, or fails.
    /// Uses Mutex so it is Sync and works across rayon workers.
    #[derive(Default)]
    pub struct MockCodec {
        pub calls: Mutex<Vec<OutputFormat>>,
        pub fail: bool,
    }

    impl MockCodec {
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub fn get_calls(&self) -> Vec<OutputFormat> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ImageCodec for MockCodec {
        fn encode(&self, image: &RenderedImage, format: OutputFormat) -> Result<Vec<u8>, CodecError> {
            self.calls.lock().unwrap().push(format);
            if self.fail {
                return Err(CodecError::Png("mock failure".to_string()));
            }
            Ok(format!("{}:{}x{}", format.extension(), image.width(), image.height()).into_bytes())
        }
    }

    fn solid(size: u32, rgba: [u8; 4]) -> RenderedImage {
        RenderedImage {
            raster: RgbaImage::from_pixel(size, size, Rgba(rgba)),
            scene: None,
        }
    }

    // =========================================================================
    // PNG
    // =========================================================================

    #[test]
    fn opaque_png_is_rgb() {
        let bytes = RustCodec.encode(&solid(20, [1, 2, 3, 255]), OutputFormat::Png).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.color(), ColorType::Rgb8);
        assert_eq!((decoded.width(), decoded.height()), (20, 20));
        assert_eq!(decoded.to_rgba8().get_pixel(5, 5), &Rgba([1, 2, 3, 255]));
    }

    #[test]
    fn transparent_png_keeps_alpha() {
        let mut img = solid(20, [255, 255, 255, 255]);
        img.raster.put_pixel(0, 0, Rgba([0, 0, 0, 0]));
        let bytes = RustCodec.encode(&img, OutputFormat::Png).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.color(), ColorType::Rgba8);
        assert_eq!(decoded.to_rgba8().get_pixel(0, 0)[3], 0);
    }

    #[test]
    fn png_encoding_is_deterministic() {
        let img = solid(50, [9, 8, 7, 255]);
        assert_eq!(
            RustCodec.encode(&img, OutputFormat::Png).unwrap(),
            RustCodec.encode(&img, OutputFormat::Png).unwrap()
        );
    }

    // =========================================================================
    // SVG
    // =========================================================================

    #[test]
    fn svg_without_scene_is_an_error() {
        assert_eq!(
            RustCodec.encode(&solid(10, [0, 0, 0, 255]), OutputFormat::Svg),
            Err(CodecError::MissingScene)
        );
    }

    #[test]
    fn svg_document_structure() {
        let mut scene = Scene::new(120, 140);
        scene.push(Shape::Rect {
            x: 0.0,
            y: 0.0,
            width: 120.0,
            height: 140.0,
            fill: Rgb8::WHITE,
        });
        scene.push(Shape::Group {
            dx: 2.0,
            dy: 2.5,
            shapes: vec![Shape::Path {
                d: "M0,0h1v1h-1z".into(),
                fill: Rgb8::new(255, 0, 0),
                even_odd: true,
            }],
        });
        scene.push(Shape::Text {
            x: 60.0,
            y: 130.0,
            size: 16.0,
            font: "Arial".into(),
            fill: Rgb8::BLACK,
            rotate: 0.0,
            content: "Fish & <Chips>".into(),
        });
        let svg = svg_document(&scene);
        assert!(svg.starts_with("<?xml version=\"1.0\""));
        assert!(svg.contains(r#"viewBox="0 0 120 140""#));
        assert!(svg.contains(r##"<rect x="0" y="0" width="120" height="140" fill="#ffffff"></rect>"##));
        assert!(svg.contains(r#"<g transform="translate(2 2.5)">"#));
        assert!(svg.contains(r#"fill-rule="evenodd""#));
        assert!(svg.contains(r#"font-family="Arial""#));
        assert!(svg.contains("Fish &amp; &lt;Chips&gt;"));
        assert!(!svg.contains("rotate("));
    }

    #[test]
    fn rotated_text_gets_transform() {
        let mut scene = Scene::new(10, 10);
        scene.push(Shape::Text {
            x: 5.0,
            y: 5.0,
            size: 8.0,
            font: "Arial".into(),
            fill: Rgb8::BLACK,
            rotate: -90.0,
            content: "HI".into(),
        });
        assert!(svg_document(&scene).contains(r#"transform="rotate(-90 5 5)""#));
    }

    #[test]
    fn codec_encodes_scene_for_svg() {
        let mut img = solid(10, [0, 0, 0, 255]);
        img.scene = Some(Scene::new(10, 10));
        let bytes = RustCodec.encode(&img, OutputFormat::Svg).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("<svg"));
        assert!(text.trim_end().ends_with("</svg>"));
    }
}
