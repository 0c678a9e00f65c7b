use std::path::Path;

use anyhow::{Context, Result};
use image::DynamicImage;

/// Channel layout of 8-bit pixel data.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    #[default]
    None,
    Red,
    Rg,
    Rgb,
    Rgba,
}

impl PixelFormat {
    pub const fn channels(self) -> u32 {
        match self {
            PixelFormat::None => 0,
            PixelFormat::Red => 1,
            PixelFormat::Rg => 2,
            PixelFormat::Rgb => 3,
            PixelFormat::Rgba => 4,
        }
    }

    /// Bytes needed for a `width` x `height` image in this format.
    pub fn byte_len(self, width: u32, height: u32) -> usize {
        width as usize * height as usize * self.channels() as usize
    }
}

/// Decoded image pixels, tightly packed, rows bottom-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureData {
    width: u32,
    height: u32,
    format: PixelFormat,
    pixels: Vec<u8>,
}

impl TextureData {
    pub fn new(width: u32, height: u32, format: PixelFormat, pixels: Vec<u8>) -> Result<Self> {
        anyhow::ensure!(format != PixelFormat::None, "texture data needs a pixel format");
        let expected = format.byte_len(width, height);
        anyhow::ensure!(
            pixels.len() == expected,
            "{width}x{height} {format:?} texture needs {expected} bytes, got {}",
            pixels.len()
        );
        Ok(Self {
            width,
            height,
            format,
            pixels,
        })
    }

    /// Decodes an image file. Rows are flipped so the first row is the bottom
    /// of the image, matching texture-coordinate origin at the bottom left.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let image = image::open(path)
            .with_context(|| format!("failed to decode texture {}", path.display()))?;
        let data = Self::from_image(image.flipv());
        log::debug!(
            "loaded texture {} ({}x{} {:?})",
            path.display(),
            data.width,
            data.height,
            data.format
        );
        Ok(data)
    }

    /// Converts a decoded image, keeping its channel count. Images with more
    /// than 8 bits per channel are reduced to 8.
    pub fn from_image(image: DynamicImage) -> Self {
        let (width, height) = (image.width(), image.height());
        let (format, pixels) = match image.color().channel_count() {
            1 => (PixelFormat::Red, image.into_luma8().into_raw()),
            2 => (PixelFormat::Rg, image.into_luma_alpha8().into_raw()),
            3 => (PixelFormat::Rgb, image.into_rgb8().into_raw()),
            _ => (PixelFormat::Rgba, image.into_rgba8().into_raw()),
        };
        Self {
            width,
            height,
            format,
            pixels,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.format
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

#[cfg(test)]
mod tests {
    use image::{GrayImage, RgbImage, Rgba, RgbaImage};

    use super::*;

    #[test]
    fn new_rejects_wrong_length() {
        let err = TextureData::new(2, 2, PixelFormat::Rgba, vec![0; 15]).unwrap_err();
        assert!(err.to_string().contains("needs 16 bytes"));
    }

    #[test]
    fn from_file_decodes_png_bottom_row_first() {
        // 2x3 RGB, one distinct value per row, top row first.
        #[rustfmt::skip]
        let rows: [u8; 18] = [
            10, 11, 12,  13, 14, 15,
            20, 21, 22,  23, 24, 25,
            30, 31, 32,  33, 34, 35,
        ];
        let path = std::env::temp_dir().join(format!("jerboa-texture-{}.png", std::process::id()));
        image::save_buffer(&path, &rows, 2, 3, image::ExtendedColorType::Rgb8).unwrap();

        let data = TextureData::from_file(&path);
        std::fs::remove_file(&path).unwrap();
        let data = data.unwrap();

        assert_eq!((data.width(), data.height()), (2, 3));
        assert_eq!(data.pixel_format(), PixelFormat::Rgb);
        assert_eq!(data.pixels()[..6], rows[12..]);
        assert_eq!(data.pixels()[12..], rows[..6]);
    }

    #[test]
    fn from_file_names_the_missing_path() {
        let err = TextureData::from_file("no/such/texture.png").unwrap_err();
        assert!(err.to_string().contains("no/such/texture.png"));
    }

    #[test]
    fn new_rejects_missing_format() {
        assert!(TextureData::new(1, 1, PixelFormat::None, vec![]).is_err());
    }

    #[test]
    fn from_image_keeps_channel_count() {
        let gray = TextureData::from_image(DynamicImage::ImageLuma8(GrayImage::new(3, 2)));
        assert_eq!(gray.pixel_format(), PixelFormat::Red);
        assert_eq!(gray.pixels().len(), 6);

        let rgb = TextureData::from_image(DynamicImage::ImageRgb8(RgbImage::new(3, 2)));
        assert_eq!(rgb.pixel_format(), PixelFormat::Rgb);
        assert_eq!(rgb.pixels().len(), 18);
    }

    #[test]
    fn from_image_preserves_pixels() {
        let mut img = RgbaImage::new(1, 2);
        img.put_pixel(0, 0, Rgba([1, 2, 3, 4]));
        img.put_pixel(0, 1, Rgba([5, 6, 7, 8]));

        let data = TextureData::from_image(DynamicImage::ImageRgba8(img).flipv());
        // Bottom row first after the flip.
        assert_eq!(data.pixels(), &[5, 6, 7, 8, 1, 2, 3, 4]);
    }

    #[test]
    fn from_file_reports_path_on_failure() {
        let err = TextureData::from_file("definitely/not/here.png").unwrap_err();
        assert!(format!("{err:#}").contains("definitely/not/here.png"));
    }
}
