use image::{RgbaImage, imageops};

use super::SheetLayout;
use crate::error::BakeError;

/// Paste normalized frames row-major onto one transparent canvas.
///
/// Expects exactly `layout.cell_count()` frames, each already cell-sized.
/// The canvas is assembled fully in memory; callers persist it once.
pub fn compose_sheet(layout: &SheetLayout, frames: &[RgbaImage]) -> Result<RgbaImage, BakeError> {
    if frames.len() != layout.cell_count() {
        return Err(BakeError::LayoutMismatch {
            expected: layout.cell_count(),
            actual: frames.len(),
        });
    }

    for (index, frame) in frames.iter().enumerate() {
        if frame.dimensions() != (layout.cell_width, layout.cell_height) {
            return Err(BakeError::CellSizeMismatch {
                index,
                expected_width: layout.cell_width,
                expected_height: layout.cell_height,
                actual_width: frame.width(),
                actual_height: frame.height(),
            });
        }
    }

    let mut canvas = RgbaImage::new(layout.canvas_width(), layout.canvas_height());
    for (index, frame) in (0u32..).zip(frames) {
        let (x, y) = layout.cell_origin(index);
        imageops::overlay(&mut canvas, frame, i64::from(x), i64::from(y));
    }

    Ok(canvas)
}
