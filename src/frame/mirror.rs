use image::{RgbaImage, imageops};

/// Derive one facing's frames by horizontally flipping another's.
///
/// The upstream pose source cannot tell the two lateral facings apart, so
/// only one of them is rendered and the other is mirrored frame-for-frame.
pub fn mirror_frames(frames: &[RgbaImage]) -> Vec<RgbaImage> {
    frames.iter().map(imageops::flip_horizontal).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_mirror_is_pixel_exact_flip() {
        let mut frame = RgbaImage::new(4, 3);
        frame.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        frame.put_pixel(3, 2, Rgba([0, 255, 0, 255]));
        frame.put_pixel(1, 1, Rgba([0, 0, 255, 128]));

        let mirrored = mirror_frames(std::slice::from_ref(&frame));

        assert_eq!(mirrored.len(), 1);
        let out = &mirrored[0];
        assert_eq!(out.dimensions(), frame.dimensions());
        for (x, y, pixel) in frame.enumerate_pixels() {
            assert_eq!(out.get_pixel(3 - x, y), pixel);
        }
    }

    #[test]
    fn test_mirror_keeps_order_and_length() {
        let frames: Vec<RgbaImage> = (1..=3)
            .map(|i| RgbaImage::from_pixel(2, 2, Rgba([i * 10, 0, 0, 255])))
            .collect();

        let mirrored = mirror_frames(&frames);

        assert_eq!(mirrored.len(), 3);
        for (src, out) in frames.iter().zip(&mirrored) {
            assert_eq!(src.get_pixel(0, 0), out.get_pixel(1, 0));
        }
    }
}
