use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, Rgba, RgbaImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;

use crate::error::HeatmapError;

/// Crop the largest centered square and resize it to `size` x `size`
pub fn crop_to_center(image: &DynamicImage, size: u32) -> anyhow::Result<RgbaImage> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 || size == 0 {
        return Err(HeatmapError::InvalidImage { width, height }.into());
    }

    let side = width.min(height);
    let x = (width - side) / 2;
    let y = (height - side) / 2;
    let square = image.crop_imm(x, y, side, side).to_rgba8();

    if side == size {
        return Ok(square);
    }
    Ok(image::imageops::resize(&square, size, size, FilterType::CatmullRom))
}

/// Copy of `image` with an opaque square painted at mask position (col, row).
/// A position whose offset does not fit in pixel coordinates is left unpainted.
pub fn mask_at(
    image: &RgbaImage,
    col: u32,
    row: u32,
    step: u32,
    mask_size: u32,
    color: Rgba<u8>,
) -> RgbaImage {
    let mut masked = image.clone();
    let offset = |index: u32| {
        index
            .checked_mul(step)
            .and_then(|px| i32::try_from(px).ok())
    };
    let (Some(x), Some(y)) = (offset(col), offset(row)) else {
        return masked;
    };
    if mask_size == 0 || x as u32 >= masked.width() || y as u32 >= masked.height() {
        return masked;
    }
    let rect = Rect::at(x, y).of_size(mask_size, mask_size);
    draw_filled_rect_mut(&mut masked, rect, color);
    masked
}
