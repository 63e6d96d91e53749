//! The image passed between compositing stages.
//!
//! A [`RenderedImage`] always carries an RGBA raster. When the requested
//! output is SVG it additionally carries a vector [`Scene`] built in lockstep,
//! in the same pixel coordinate space, so the SVG codec never has to trace
//! pixels back into shapes. Each stage takes the image by `&mut` (or by value
//! when it must grow the canvas) and hands it on; nothing else holds it.

use crate::color::Rgb8;
use image::RgbaImage;

/// One vector primitive. Coordinates are in output pixels.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Rect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        fill: Rgb8,
    },
    Path {
        d: String,
        fill: Rgb8,
        even_odd: bool,
    },
    /// Embedded bitmap, `href` is a `data:` URI.
    Image {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        href: String,
    },
    /// Text centered on `(x, y)`, rotated by `rotate` degrees around it.
    Text {
        x: f64,
        y: f64,
        size: f64,
        font: String,
        fill: Rgb8,
        rotate: f64,
        content: String,
    },
    Group {
        dx: f64,
        dy: f64,
        shapes: Vec<Shape>,
    },
}

/// Vector counterpart of the raster, in paint order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Scene {
    pub width: u32,
    pub height: u32,
    pub shapes: Vec<Shape>,
}

impl Scene {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            shapes: Vec::new(),
        }
    }

    pub fn push(&mut self, shape: Shape) {
        self.shapes.push(shape);
    }

    /// Total number of primitives, groups flattened.
    pub fn shape_count(&self) -> usize {
        fn count(shapes: &[Shape]) -> usize {
            shapes
                .iter()
                .map(|s| match s {
                    Shape::Group { shapes, .. } => count(shapes),
                    _ => 1,
                })
                .sum()
        }
        count(&self.shapes)
    }
}

/// A canvas in flight through the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedImage {
    pub raster: RgbaImage,
    pub scene: Option<Scene>,
}

impl RenderedImage {
    pub fn width(&self) -> u32 {
        self.raster.width()
    }

    pub fn height(&self) -> u32 {
        self.raster.height()
    }

    /// True when every pixel is fully opaque.
    pub fn is_opaque(&self) -> bool {
        self.raster.pixels().all(|p| p[3] == 255)
    }
}
