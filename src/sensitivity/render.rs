use image::{GrayImage, Luma, Pixel, Rgb, Rgba, RgbaImage};
use imageproc::drawing::{Blend, draw_filled_rect_mut};
use imageproc::rect::Rect;

use crate::error::HeatmapError;
use crate::models::{Contour, SENSITIVITY_GRID_SIZE, SensitivityGrid};

/// One pass of an outline stroke
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stroke {
    pub width: f32,
    pub color: Rgba<u8>,
}

/// Wide translucent halo under a narrower line, so outlines read on any background
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutlineStyle {
    pub halo: Stroke,
    pub line: Stroke,
}

impl Default for OutlineStyle {
    fn default() -> Self {
        Self {
            halo: Stroke {
                width: 8.0,
                color: Rgba([0, 0, 0, 102]),
            },
            line: Stroke {
                width: 6.0,
                color: Rgba([255, 255, 255, 255]),
            },
        }
    }
}

/// Grid-to-display mapping shared by both renderers.
/// The grid spans the full width and is centered vertically.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Layout {
    pub scale: f32,
    pub offset: f32,
}

impl Layout {
    pub fn for_size(width: u32, height: u32) -> Self {
        Self {
            scale: width as f32 / SENSITIVITY_GRID_SIZE as f32,
            offset: (height as f32 - width as f32) / 2.0,
        }
    }

    /// Pixel span [start, end) of grid line `index` .. `index + 1`
    fn span(&self, index: usize, offset: f32) -> (i32, i32) {
        let start = (index as f32 * self.scale + offset).round() as i32;
        let end = ((index + 1) as f32 * self.scale + offset).round() as i32;
        (start, end)
    }
}

fn check_size(width: u32, height: u32) -> Result<(), HeatmapError> {
    if width == 0 || height == 0 {
        return Err(HeatmapError::InvalidImage { width, height });
    }
    Ok(())
}

fn rect_between(left: i32, top: i32, right: i32, bottom: i32) -> Option<Rect> {
    (right > left && bottom > top)
        .then(|| Rect::at(left, top).of_size((right - left) as u32, (bottom - top) as u32))
}

/// Paint every cell in `color` with the cell's alpha, plus solid margins
/// above and below the square grid area when the output is taller than wide.
pub fn render_fill(
    grid: &SensitivityGrid,
    color: Rgb<u8>,
    width: u32,
    height: u32,
) -> anyhow::Result<RgbaImage> {
    check_size(width, height)?;
    let layout = Layout::for_size(width, height);
    let mut canvas = Blend(RgbaImage::new(width, height));

    for (row, cells) in grid.rows().iter().enumerate() {
        let (top, bottom) = layout.span(row, layout.offset);
        for (col, &alpha) in cells.iter().enumerate() {
            let (left, right) = layout.span(col, 0.0);
            let Some(rect) = rect_between(left, top, right, bottom) else {
                continue;
            };
            let [r, g, b] = color.0;
            let a = (alpha * 255.0).round() as u8;
            draw_filled_rect_mut(&mut canvas, rect, Rgba([r, g, b, a]));
        }
    }

    if layout.offset > 0.0 {
        let opaque = color.to_rgba();
        let grid_top = layout.offset.round() as i32;
        let grid_bottom = (layout.offset + width as f32).round() as i32;
        if let Some(top_margin) = rect_between(0, 0, width as i32, grid_top) {
            draw_filled_rect_mut(&mut canvas, top_margin, opaque);
        }
        if let Some(bottom_margin) = rect_between(0, grid_bottom, width as i32, height as i32) {
            draw_filled_rect_mut(&mut canvas, bottom_margin, opaque);
        }
    }

    Ok(canvas.0)
}

/// Stroke each contour twice (halo, then line) onto a transparent image
pub fn render_outline(
    contours: &[Contour],
    width: u32,
    height: u32,
    style: &OutlineStyle,
) -> anyhow::Result<RgbaImage> {
    check_size(width, height)?;
    let layout = Layout::for_size(width, height);
    let mut canvas = RgbaImage::new(width, height);

    for contour in contours {
        let points = contour.to_display(layout.scale, layout.offset);
        stroke(&mut canvas, &points, &style.halo);
        stroke(&mut canvas, &points, &style.line);
    }

    Ok(canvas)
}

/// Blend one stroke of `points` into `canvas`.
///
/// The stroke footprint is collected in a mask first so overlapping segments
/// and corners are blended once. Segments get square caps.
fn stroke(canvas: &mut RgbaImage, points: &[(f32, f32)], stroke: &Stroke) {
    let (width, height) = canvas.dimensions();
    let mut mask = GrayImage::new(width, height);
    let half = stroke.width / 2.0;

    for segment in points.windows(2) {
        let ((x0, y0), (x1, y1)) = (segment[0], segment[1]);
        let left = (x0.min(x1) - half).floor() as i32;
        let right = (x0.max(x1) + half).ceil() as i32;
        let top = (y0.min(y1) - half).floor() as i32;
        let bottom = (y0.max(y1) + half).ceil() as i32;
        if let Some(rect) = rect_between(left, top, right, bottom) {
            draw_filled_rect_mut(&mut mask, rect, Luma([255u8]));
        }
    }

    for (x, y, covered) in mask.enumerate_pixels() {
        if covered[0] > 0 {
            canvas.get_pixel_mut(x, y).blend(&stroke.color);
        }
    }
}
