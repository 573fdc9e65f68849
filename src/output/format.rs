use std::fs;
use std::io::Cursor;
use std::path::Path;

use anyhow::Result;
use image::{ImageFormat, RgbaImage};

use crate::cli::CompressionLevel;
use crate::error::BakeError;

/// Save the composed sheet as PNG, optionally recompressed with oxipng.
///
/// Transparency is load-bearing in a spritesheet, so the image is always
/// written as RGBA.
pub fn save_sheet_image(
    sheet: &RgbaImage,
    path: &Path,
    compress: Option<CompressionLevel>,
) -> Result<()> {
    // Encode to PNG in memory
    let mut png_data = Cursor::new(Vec::new());
    sheet
        .write_to(&mut png_data, ImageFormat::Png)
        .map_err(|e| BakeError::ImageSave {
            path: path.to_path_buf(),
            source: e,
        })?;

    let output_data = if let Some(level) = compress {
        let opts = match level {
            CompressionLevel::Level(n) => oxipng::Options::from_preset(n),
            CompressionLevel::Max => oxipng::Options::max_compression(),
        };
        oxipng::optimize_from_memory(&png_data.into_inner(), &opts).map_err(|e| {
            BakeError::PngCompress {
                path: path.to_path_buf(),
                message: e.to_string(),
            }
        })?
    } else {
        png_data.into_inner()
    };

    fs::write(path, output_data).map_err(|e| BakeError::OutputWrite {
        path: path.to_path_buf(),
        source: e,
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_save_round_trips_pixels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sheet.png");

        let mut sheet = RgbaImage::new(8, 8);
        sheet.put_pixel(3, 4, Rgba([10, 20, 30, 200]));

        save_sheet_image(&sheet, &path, None).unwrap();

        let loaded = image::open(&path).unwrap().into_rgba8();
        assert_eq!(loaded.dimensions(), (8, 8));
        assert_eq!(loaded.get_pixel(3, 4), &Rgba([10, 20, 30, 200]));
        assert_eq!(loaded.get_pixel(0, 0).0[3], 0);
    }

    #[test]
    fn test_save_compressed_stays_loadable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sheet.png");

        let sheet = RgbaImage::from_pixel(16, 16, Rgba([90, 60, 30, 255]));
        save_sheet_image(&sheet, &path, Some(CompressionLevel::Level(2))).unwrap();

        let loaded = image::open(&path).unwrap().into_rgba8();
        assert_eq!(loaded.dimensions(), (16, 16));
        assert_eq!(loaded.get_pixel(8, 8), &Rgba([90, 60, 30, 255]));
    }
}
