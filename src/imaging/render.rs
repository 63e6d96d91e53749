//! Module renderer: logical module grid → colored canvas.
//!
//! Rendering happens in two passes:
//!
//! 1. **Color grid**: one fill decision per module (background, flat dark,
//!    gradient, or eye color), computed row-parallel with rayon. Each module's
//!    color depends only on its own coordinates.
//! 2. **Pixels**: every output pixel looks up the module that owns it (see
//!    [`pixel_owners`]) and copies that module's color, again row-parallel.
//!
//! When the target format is SVG a [`Scene`] is built from the same color
//! grid: modules grouped into one path per fill color, plus named eye glyphs
//! when eye styling is enabled. Module squares use the raster's integer
//! spans, so neighbouring colors meet without anti-aliased seams.

use super::calculations::{module_span, pixel_owners};
use super::canvas::{RenderedImage, Scene, Shape};
use super::eyes::{inner_glyph_path, outer_glyph_path};
use crate::color::{Rgb8, gradient_ratio, interpolate};
use crate::matrix::ModuleMatrix;
use crate::region::{EyeCorner, Region, classify};
use crate::style::StyleConfig;
use image::RgbaImage;
use rayon::prelude::*;
use std::collections::BTreeMap;

const TRANSPARENT: [u8; 4] = [0, 0, 0, 0];

/// Fill for the module at `(row, col)`; `None` means background.
fn module_fill(matrix: &ModuleMatrix, style: &StyleConfig, row: usize, col: usize) -> Option<Rgb8> {
    let (size, quiet) = (matrix.size(), matrix.quiet_zone());
    let region = classify(row, col, size, quiet);
    if region == Region::QuietZone || !matrix.is_dark(row, col) {
        return None;
    }
    let color = match (region, &style.eye, &style.gradient) {
        (Region::OuterEye, Some(eye), _) => eye.outer_color,
        (Region::InnerEye, Some(eye), _) => eye.inner_color,
        (_, _, Some(gradient)) => {
            let ratio = gradient_ratio(
                gradient.kind,
                row - quiet,
                col - quiet,
                matrix.symbol_width(),
            );
            interpolate(gradient.start, gradient.end, ratio)
        }
        _ => style.dark_color,
    };
    Some(color)
}

/// Render `matrix` into a `style.size`-square canvas.
pub fn render(matrix: &ModuleMatrix, style: &StyleConfig) -> RenderedImage {
    let n = matrix.size();
    let px = style.size;
    let background = style.background_fill();
    let bg = background.map_or(TRANSPARENT, Rgb8::to_rgba);

    let colors: Vec<Option<Rgb8>> = (0..n)
        .into_par_iter()
        .flat_map_iter(|row| (0..n).map(move |col| module_fill(matrix, style, row, col)))
        .collect();

    let owners = pixel_owners(n, px);
    let mut raster = RgbaImage::new(px, px);
    let stride = px as usize * 4;
    let buf: &mut [u8] = &mut raster;
    buf.par_chunks_mut(stride)
        .enumerate()
        .for_each(|(y, line)| {
            let row = owners[y];
            for (x, pixel) in line.chunks_exact_mut(4).enumerate() {
                let rgba = colors[row * n + owners[x]].map_or(bg, Rgb8::to_rgba);
                pixel.copy_from_slice(&rgba);
            }
        });

    let scene = style
        .format
        .supports_vector_glyphs()
        .then(|| build_scene(matrix, style, &colors, background));

    log::debug!(
        "rendered {n}x{n} modules onto {px}x{px} px ({})",
        style.format.extension()
    );
    RenderedImage { raster, scene }
}

fn build_scene(
    matrix: &ModuleMatrix,
    style: &StyleConfig,
    colors: &[Option<Rgb8>],
    background: Option<Rgb8>,
) -> Scene {
    let n = matrix.size();
    let px = style.size;
    let scale = px as f64 / n as f64;
    let mut scene = Scene::new(px, px);

    if let Some(fill) = background {
        scene.push(Shape::Rect {
            x: 0.0,
            y: 0.0,
            width: px as f64,
            height: px as f64,
            fill,
        });
    }

    let glyph_eyes = style.eye.as_ref();
    let spans: Vec<(u32, u32)> = (0..n).map(|i| module_span(i, n, px)).collect();
    let mut paths: BTreeMap<Rgb8, String> = BTreeMap::new();
    for row in 0..n {
        for col in 0..n {
            let Some(fill) = colors[row * n + col] else {
                continue;
            };
            if glyph_eyes.is_some()
                && matches!(
                    classify(row, col, n, matrix.quiet_zone()),
                    Region::OuterEye | Region::InnerEye
                )
            {
                continue;
            }
            let ((x0, x1), (y0, y1)) = (spans[col], spans[row]);
            let d = paths.entry(fill).or_default();
            d.push_str(&format!(
                "M{x0},{y0}h{w}v{h}h-{w}z",
                w = x1 - x0,
                h = y1 - y0
            ));
        }
    }
    for (fill, d) in paths {
        scene.push(Shape::Path {
            d,
            fill,
            even_odd: false,
        });
    }

    if let Some(eye) = glyph_eyes {
        for corner in EyeCorner::ALL {
            let (r0, c0) = corner.origin(n, matrix.quiet_zone());
            let (x, y) = (c0 as f64 * scale, r0 as f64 * scale);
            scene.push(Shape::Path {
                d: outer_glyph_path(eye.outer_style, x, y, scale),
                fill: eye.outer_color,
                even_odd: true,
            });
            scene.push(Shape::Path {
                d: inner_glyph_path(eye.inner_style, x, y, scale),
                fill: eye.inner_color,
                even_odd: false,
            });
        }
    }
    scene
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::GradientKind;
    use crate::imaging::eyes::EyeStyleId;
    use crate::style::{EyeSpec, GradientSpec, OutputFormat};
    use crate::test_helpers::{finder_matrix, solid_matrix};
    use image::Rgba;

    /// Center pixel of module `(row, col)`.
    fn module_pixel(img: &RenderedImage, matrix: &ModuleMatrix, row: usize, col: usize) -> Rgba<u8> {
        let (x0, x1) = module_span(col, matrix.size(), img.width());
        let (y0, y1) = module_span(row, matrix.size(), img.height());
        *img.raster.get_pixel((x0 + x1) / 2, (y0 + y1) / 2)
    }

    #[test]
    fn canvas_matches_requested_size() {
        let matrix = finder_matrix();
        for size in [200, 500, 1000] {
            let img = render(&matrix, &StyleConfig::plain(size));
            assert_eq!((img.width(), img.height()), (size, size));
            assert!(img.scene.is_none());
            assert!(img.is_opaque());
        }
    }

    #[test]
    fn quiet_zone_and_light_modules_are_background() {
        let matrix = finder_matrix();
        let mut style = StyleConfig::plain(500);
        style.background_color = Rgb8::new(250, 240, 230);
        let img = render(&matrix, &style);
        let bg = Rgba([250, 240, 230, 255]);
        assert_eq!(*img.raster.get_pixel(0, 0), bg);
        assert_eq!(*img.raster.get_pixel(499, 499), bg);
        let q = matrix.quiet_zone();
        assert_eq!(module_pixel(&img, &matrix, q + 1, q + 1), bg);
        assert_eq!(module_pixel(&img, &matrix, q, q), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn transparent_background_has_zero_alpha() {
        let matrix = finder_matrix();
        let mut style = StyleConfig::plain(200);
        style.transparent_background = true;
        let img = render(&matrix, &style);
        assert_eq!(img.raster.get_pixel(0, 0)[3], 0);
        let q = matrix.quiet_zone();
        assert_eq!(module_pixel(&img, &matrix, q, q)[3], 255);
    }

    #[test]
    fn linear_gradient_runs_from_first_to_last_column() {
        let matrix = solid_matrix(21, 4);
        let mut style = StyleConfig::plain(500);
        style.gradient = Some(GradientSpec {
            kind: GradientKind::Linear,
            start: Rgb8::new(255, 0, 0),
            end: Rgb8::new(0, 0, 255),
        });
        let img = render(&matrix, &style);
        let q = matrix.quiet_zone();
        let last = q + matrix.symbol_width() - 1;
        for row in [q + 8, q + 12] {
            assert_eq!(module_pixel(&img, &matrix, row, q), Rgba([255, 0, 0, 255]));
            assert_eq!(module_pixel(&img, &matrix, row, last), Rgba([0, 0, 255, 255]));
        }
        let mid = module_pixel(&img, &matrix, q + 10, q + 10);
        assert_eq!(mid, Rgba([128, 0, 128, 255]));
    }

    fn gradient_style(kind: GradientKind) -> StyleConfig {
        let mut style = StyleConfig::plain(500);
        style.gradient = Some(GradientSpec {
            kind,
            start: Rgb8::new(255, 0, 0),
            end: Rgb8::new(0, 0, 255),
        });
        style
    }

    #[test]
    fn every_gradient_kind_hits_its_endpoints() {
        let matrix = solid_matrix(21, 4);
        let q = matrix.quiet_zone();
        let last = q + matrix.symbol_width() - 1;
        let center = q + matrix.symbol_width() / 2;
        let red = Rgba([255, 0, 0, 255]);
        let blue = Rgba([0, 0, 255, 255]);
        for (kind, start, end) in [
            (GradientKind::Linear, (q + 5, q), (q + 5, last)),
            (GradientKind::Vertical, (q, q + 5), (last, q + 5)),
            (GradientKind::DiagonalNwSe, (q, q), (last, last)),
            (GradientKind::DiagonalSwNe, (q, last), (last, q)),
            (GradientKind::Radial, (center, center), (q, q)),
        ] {
            let img = render(&matrix, &gradient_style(kind));
            assert_eq!(module_pixel(&img, &matrix, start.0, start.1), red, "{kind:?} start");
            assert_eq!(module_pixel(&img, &matrix, end.0, end.1), blue, "{kind:?} end");
        }
    }

    #[test]
    fn diagonal_gradients_change_monotonically() {
        let matrix = solid_matrix(21, 4);
        let q = matrix.quiet_zone();
        let w = matrix.symbol_width();

        let img = render(&matrix, &gradient_style(GradientKind::DiagonalNwSe));
        let reds: Vec<u8> = (0..w).map(|i| module_pixel(&img, &matrix, q + i, q + i)[0]).collect();
        assert!(reds.windows(2).all(|p| p[0] > p[1]), "{reds:?}");

        // Top-right towards bottom-left.
        let img = render(&matrix, &gradient_style(GradientKind::DiagonalSwNe));
        let reds: Vec<u8> = (0..w)
            .map(|i| module_pixel(&img, &matrix, q + i, q + w - 1 - i)[0])
            .collect();
        assert!(reds.windows(2).all(|p| p[0] > p[1]), "{reds:?}");
        // The other diagonal is a single ratio.
        let mid: Vec<_> = (0..w)
            .map(|i| module_pixel(&img, &matrix, q + i, q + i))
            .collect();
        assert!(mid.windows(2).all(|p| p[0] == p[1]));
    }

    #[test]
    fn eye_colors_override_gradient_in_raster() {
        let matrix = solid_matrix(21, 4);
        let mut style = StyleConfig::plain(500);
        style.gradient = Some(GradientSpec {
            kind: GradientKind::Radial,
            start: Rgb8::BLACK,
            end: Rgb8::WHITE,
        });
        style.eye = Some(EyeSpec {
            outer_style: EyeStyleId::new(3).unwrap(),
            inner_style: EyeStyleId::default(),
            outer_color: Rgb8::new(1, 2, 3),
            inner_color: Rgb8::new(4, 5, 6),
        });
        let img = render(&matrix, &style);
        let q = matrix.quiet_zone();
        let far = q + 14;
        for (r0, c0) in [(q, q), (q, far), (far, q)] {
            assert_eq!(module_pixel(&img, &matrix, r0, c0), Rgba([1, 2, 3, 255]));
            assert_eq!(module_pixel(&img, &matrix, r0 + 3, c0 + 3), Rgba([4, 5, 6, 255]));
        }
        assert!(img.scene.is_none());
    }

    #[test]
    fn svg_scene_substitutes_eye_glyphs() {
        let matrix = finder_matrix();
        let mut style = StyleConfig::plain(500);
        style.format = OutputFormat::Svg;
        style.eye = Some(EyeSpec {
            outer_style: EyeStyleId::new(2).unwrap(),
            inner_style: EyeStyleId::new(3).unwrap(),
            outer_color: Rgb8::new(9, 9, 9),
            inner_color: Rgb8::new(7, 7, 7),
        });
        let img = render(&matrix, &style);
        let scene = img.scene.expect("svg renders a scene");
        let eye_paths: Vec<_> = scene
            .shapes
            .iter()
            .filter(|s| matches!(s, Shape::Path { even_odd: true, .. }))
            .collect();
        assert_eq!(eye_paths.len(), 3);
        // No plain module path uses the eye colors: eyes are glyphs only.
        assert!(!scene.shapes.iter().any(|s| matches!(
            s,
            Shape::Path { fill, even_odd: false, d } if *fill == Rgb8::new(9, 9, 9) && d.contains('h')
        )));
    }

    #[test]
    fn svg_scene_groups_modules_by_color() {
        let matrix = finder_matrix();
        let mut style = StyleConfig::plain(200);
        style.format = OutputFormat::Svg;
        let scene = render(&matrix, &style).scene.unwrap();
        // Background rect + a single black path.
        assert_eq!(scene.shapes.len(), 2);
        assert!(matches!(scene.shapes[0], Shape::Rect { fill: Rgb8::WHITE, .. }));
        assert!(matches!(scene.shapes[1], Shape::Path { fill: Rgb8::BLACK, .. }));
    }

    #[test]
    fn svg_module_squares_snap_to_pixel_spans() {
        let matrix = finder_matrix();
        let mut style = StyleConfig::plain(200);
        style.format = OutputFormat::Svg;
        // 29 modules over 200 px is a fractional scale.
        let scene = render(&matrix, &style).scene.unwrap();
        let Shape::Path { d, .. } = &scene.shapes[1] else {
            panic!("expected module path, got {:?}", scene.shapes[1]);
        };
        assert!(!d.contains('.'), "{d}");
        let q = matrix.quiet_zone();
        let (x0, x1) = module_span(q, matrix.size(), 200);
        assert!(d.starts_with(&format!("M{x0},{x0}h{}v{}", x1 - x0, x1 - x0)), "{d}");
    }

    #[test]
    fn transparent_svg_has_no_background_rect() {
        let matrix = finder_matrix();
        let mut style = StyleConfig::plain(200);
        style.format = OutputFormat::Svg;
        style.transparent_background = true;
        let img = render(&matrix, &style);
        assert_eq!(img.raster.get_pixel(0, 0)[3], 0);
        let scene = img.scene.unwrap();
        assert!(!scene.shapes.iter().any(|s| matches!(s, Shape::Rect { .. })));
        assert!(matches!(scene.shapes[0], Shape::Path { fill: Rgb8::BLACK, .. }));
    }

    #[test]
    fn rendering_is_deterministic() {
        let matrix = solid_matrix(25, 4);
        let mut style = StyleConfig::plain(500);
        style.gradient = Some(GradientSpec {
            kind: GradientKind::DiagonalSwNe,
            start: Rgb8::new(200, 10, 10),
            end: Rgb8::new(10, 10, 200),
        });
        assert_eq!(render(&matrix, &style), render(&matrix, &style));
    }
}
