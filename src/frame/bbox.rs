use image::RgbaImage;

/// Tight rectangle around the visible content of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

impl Bounds {
    /// Exclusive right edge.
    pub fn right(&self) -> u32 {
        self.left + self.width
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> u32 {
        self.top + self.height
    }
}

/// Find the minimal rectangle covering pixels with alpha above `alpha_threshold`.
///
/// Returns `None` when no pixel qualifies. An empty result is a valid outcome
/// (the caller substitutes a blank cell), not an error.
pub fn content_bounds(image: &RgbaImage, alpha_threshold: u8) -> Option<Bounds> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return None;
    }

    let mut min_x = width;
    let mut min_y = height;
    let mut max_x = 0u32;
    let mut max_y = 0u32;

    for (x, y, pixel) in image.enumerate_pixels() {
        if pixel.0[3] > alpha_threshold {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
    }

    if min_x > max_x || min_y > max_y {
        return None;
    }

    Some(Bounds {
        left: min_x,
        top: min_y,
        width: max_x - min_x + 1,
        height: max_y - min_y + 1,
    })
}
