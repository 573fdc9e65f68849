use image::{
    RgbaImage,
    imageops::{self, FilterType},
};

use super::content_bounds;

/// Normalize a frame into a fixed-size cell.
///
/// Crops to the content bounds, scales uniformly so the crop fits the cell
/// without distortion, and pastes it horizontally centered with the content
/// resting on the bottom edge so feet line up across cells. A frame with no
/// content becomes a fully transparent cell.
///
/// The result is always exactly `cell_w x cell_h`, whatever the input size.
pub fn normalize_frame(image: &RgbaImage, cell_w: u32, cell_h: u32, alpha_threshold: u8) -> RgbaImage {
    let Some(bounds) = content_bounds(image, alpha_threshold) else {
        return RgbaImage::new(cell_w, cell_h);
    };

    let cropped =
        imageops::crop_imm(image, bounds.left, bounds.top, bounds.width, bounds.height).to_image();

    let scale = (f64::from(cell_w) / f64::from(bounds.width))
        .min(f64::from(cell_h) / f64::from(bounds.height));
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "the uniform scale keeps both dimensions within the cell"
    )]
    let (scaled_w, scaled_h) = (
        ((f64::from(bounds.width) * scale) as u32).max(1),
        ((f64::from(bounds.height) * scale) as u32).max(1),
    );

    let resized = imageops::resize(&cropped, scaled_w, scaled_h, FilterType::Lanczos3);

    let mut cell = RgbaImage::new(cell_w, cell_h);
    let x_offset = (cell_w - scaled_w) / 2;
    let y_offset = cell_h - scaled_h;
    imageops::overlay(&mut cell, &resized, i64::from(x_offset), i64::from(y_offset));
    cell
}
