use std::collections::VecDeque;

use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

/// Background removal strategy for rendered frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StripMode {
    /// Clear every pixel whose channels all exceed `255 - tolerance`.
    #[default]
    Threshold,
    /// Clear only backdrop-colored pixels reachable from the image edges.
    FloodFill,
}

impl StripMode {
    pub fn apply(self, image: &mut RgbaImage, tolerance: u8) {
        match self {
            StripMode::Threshold => strip_background(image, tolerance),
            StripMode::FloodFill => strip_background_flood(image, tolerance),
        }
    }
}

/// Turn near-white pixels transparent.
///
/// A pixel counts as background when all three color channels exceed
/// `255 - tolerance`. Color channels are left untouched, so a second pass
/// finds exactly the same pixels and the operation is idempotent.
pub fn strip_background(image: &mut RgbaImage, tolerance: u8) {
    let cutoff = 255u8.saturating_sub(tolerance);
    for pixel in image.pixels_mut() {
        let [r, g, b, _] = pixel.0;
        if r > cutoff && g > cutoff && b > cutoff {
            pixel.0[3] = 0;
        }
    }
}

/// Flood-fill background removal for frames rendered on a flat backdrop that
/// is not necessarily white.
///
/// The backdrop color is the corner color agreeing with the most corners.
/// Only pixels reachable from the image edges within `tolerance` Euclidean
/// color distance are cleared, so character-interior pixels that happen to
/// resemble the backdrop survive. Foreground pixels bordering cleared ones
/// get their alpha feathered for a softer silhouette edge.
pub fn strip_background_flood(image: &mut RgbaImage, tolerance: u8) {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return;
    }

    let backdrop = dominant_corner_color(image, tolerance);
    let tolerance = f32::from(tolerance);
    let index = |x: u32, y: u32| (y * width + x) as usize;

    let mut is_backdrop = vec![false; (width as usize) * (height as usize)];
    let mut queue: VecDeque<(u32, u32)> = VecDeque::new();

    for x in 0..width {
        for y in [0, height - 1] {
            if !is_backdrop[index(x, y)] && pixel_distance(image.get_pixel(x, y), backdrop) <= tolerance {
                is_backdrop[index(x, y)] = true;
                queue.push_back((x, y));
            }
        }
    }
    for y in 0..height {
        for x in [0, width - 1] {
            if !is_backdrop[index(x, y)] && pixel_distance(image.get_pixel(x, y), backdrop) <= tolerance {
                is_backdrop[index(x, y)] = true;
                queue.push_back((x, y));
            }
        }
    }

    while let Some((x, y)) = queue.pop_front() {
        for (nx, ny) in neighbors(x, y, width, height) {
            if !is_backdrop[index(nx, ny)]
                && pixel_distance(image.get_pixel(nx, ny), backdrop) <= tolerance
            {
                is_backdrop[index(nx, ny)] = true;
                queue.push_back((nx, ny));
            }
        }
    }

    for y in 0..height {
        for x in 0..width {
            if is_backdrop[index(x, y)] {
                image.get_pixel_mut(x, y).0[3] = 0;
            }
        }
    }

    // Feather foreground pixels that touch the cleared backdrop.
    for y in 0..height {
        for x in 0..width {
            if is_backdrop[index(x, y)] {
                continue;
            }
            let cleared_neighbors = neighbors(x, y, width, height)
                .filter(|&(nx, ny)| is_backdrop[index(nx, ny)])
                .count();
            if cleared_neighbors > 0 {
                #[expect(clippy::cast_precision_loss, reason = "at most four neighbors")]
                let factor = (1.0 - 0.15 * cleared_neighbors as f32).max(0.4);
                let pixel = image.get_pixel_mut(x, y);
                #[expect(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    reason = "alpha scaled by a factor in (0, 1] stays within 0..=255"
                )]
                {
                    pixel.0[3] = (f32::from(pixel.0[3]) * factor).round() as u8;
                }
            }
        }
    }
}

fn neighbors(x: u32, y: u32, width: u32, height: u32) -> impl Iterator<Item = (u32, u32)> {
    let left = x.checked_sub(1).map(|nx| (nx, y));
    let right = (x + 1 < width).then_some((x + 1, y));
    let up = y.checked_sub(1).map(|ny| (x, ny));
    let down = (y + 1 < height).then_some((x, y + 1));
    [left, right, up, down].into_iter().flatten()
}

/// The corner color agreeing with the most other corners; ties keep the
/// top-left corner.
fn dominant_corner_color(image: &RgbaImage, tolerance: u8) -> [u8; 3] {
    let (width, height) = image.dimensions();
    let corners = [
        rgb(image.get_pixel(0, 0)),
        rgb(image.get_pixel(width - 1, 0)),
        rgb(image.get_pixel(0, height - 1)),
        rgb(image.get_pixel(width - 1, height - 1)),
    ];

    let mut best = corners[0];
    let mut best_votes = 0usize;
    for candidate in corners {
        let votes = corners
            .iter()
            .filter(|other| rgb_distance(**other, candidate) <= f32::from(tolerance))
            .count();
        if votes > best_votes {
            best_votes = votes;
            best = candidate;
        }
    }
    best
}

fn rgb(pixel: &Rgba<u8>) -> [u8; 3] {
    [pixel.0[0], pixel.0[1], pixel.0[2]]
}

fn pixel_distance(pixel: &Rgba<u8>, color: [u8; 3]) -> f32 {
    rgb_distance(rgb(pixel), color)
}

fn rgb_distance(a: [u8; 3], b: [u8; 3]) -> f32 {
    let dr = f32::from(a[0]) - f32::from(b[0]);
    let dg = f32::from(a[1]) - f32::from(b[1]);
    let db = f32::from(a[2]) - f32::from(b[2]);
    (dr * dr + dg * dg + db * db).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn white() -> Rgba<u8> {
        Rgba([255, 255, 255, 255])
    }

    #[test]
    fn test_threshold_strips_near_white() {
        let mut img = RgbaImage::from_pixel(4, 4, white());
        img.put_pixel(1, 1, Rgba([200, 30, 40, 255]));
        img.put_pixel(2, 2, Rgba([230, 230, 230, 255]));

        strip_background(&mut img, 30);

        assert_eq!(img.get_pixel(0, 0).0[3], 0);
        assert_eq!(img.get_pixel(1, 1).0[3], 255);
        // 230 > 255 - 30, so the off-white pixel is stripped too
        assert_eq!(img.get_pixel(2, 2).0[3], 0);
    }

    #[test]
    fn test_threshold_boundary_channel_kept() {
        // All channels exactly at the cutoff must survive; strictly above goes
        let mut img = RgbaImage::from_pixel(1, 2, Rgba([225, 225, 225, 255]));
        img.put_pixel(0, 1, Rgba([226, 226, 226, 255]));

        strip_background(&mut img, 30);

        assert_eq!(img.get_pixel(0, 0).0[3], 255);
        assert_eq!(img.get_pixel(0, 1).0[3], 0);
    }

    #[test]
    fn test_threshold_idempotent() {
        let mut img = RgbaImage::from_pixel(8, 8, white());
        for y in 2..6 {
            for x in 2..6 {
                img.put_pixel(x, y, Rgba([180, 60, 60, 255]));
            }
        }

        strip_background(&mut img, 30);
        let once = img.clone();
        strip_background(&mut img, 30);

        assert_eq!(once.as_raw(), img.as_raw());
    }

    #[test]
    fn test_threshold_all_background_yields_fully_transparent() {
        let mut img = RgbaImage::from_pixel(5, 5, white());
        strip_background(&mut img, 30);
        assert!(img.pixels().all(|p| p.0[3] == 0));
    }

    #[test]
    fn test_flood_fill_preserves_enclosed_backdrop_color() {
        // White backdrop, red ring, white center. Threshold mode would clear
        // the center; flood fill must keep it because the ring seals it off.
        let mut img = RgbaImage::from_pixel(7, 7, white());
        for y in 1..6 {
            for x in 1..6 {
                img.put_pixel(x, y, Rgba([200, 30, 40, 255]));
            }
        }
        img.put_pixel(3, 3, white());

        strip_background_flood(&mut img, 30);

        assert_eq!(img.get_pixel(0, 0).0[3], 0, "border backdrop cleared");
        assert_eq!(img.get_pixel(3, 3).0[3], 255, "enclosed pixel preserved");
        assert!(img.get_pixel(2, 2).0[3] > 0, "ring survives");
    }

    #[test]
    fn test_flood_fill_feathers_silhouette_edge() {
        let mut img = RgbaImage::from_pixel(5, 5, white());
        img.put_pixel(2, 2, Rgba([10, 10, 10, 255]));

        strip_background_flood(&mut img, 30);

        let edge_alpha = img.get_pixel(2, 2).0[3];
        assert!(edge_alpha < 255, "pixel bordering backdrop is feathered");
        assert!(edge_alpha >= 102, "feathering never drops below the floor");
    }

    #[test]
    fn test_flood_fill_nonwhite_backdrop() {
        let green = Rgba([0, 200, 0, 255]);
        let mut img = RgbaImage::from_pixel(6, 6, green);
        img.put_pixel(3, 3, Rgba([200, 30, 40, 255]));

        strip_background_flood(&mut img, 30);

        assert_eq!(img.get_pixel(0, 0).0[3], 0);
        assert!(img.get_pixel(3, 3).0[3] > 0);
    }
}
