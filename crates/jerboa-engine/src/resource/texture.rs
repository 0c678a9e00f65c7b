use std::path::Path;

use anyhow::{Context, Result};

use super::allocator::GpuResourceAllocator;
use super::config::{TextureConfig, TextureResourceData, TextureUsage};
use super::handle::GpuResource;
use super::texture_data::{PixelFormat, TextureData};
use crate::render::Renderer;

#[derive(Debug)]
pub struct Texture2D {
    resource: GpuResource,
    config: TextureConfig,
}

impl Texture2D {
    /// Allocates storage only. Attachment textures are usually created this
    /// way; sampled textures follow up with [`Texture2D::upload`].
    pub fn new(allocator: &dyn GpuResourceAllocator, config: TextureConfig) -> Result<Self> {
        anyhow::ensure!(
            config.width > 0 && config.height > 0,
            "texture size must be non-zero, got {}x{}",
            config.width,
            config.height
        );
        let resource = allocator
            .create_texture(&config)
            .context("failed to create texture")?;
        Ok(Self { resource, config })
    }

    /// Creates a texture sized and formatted after `data` and uploads it.
    pub fn from_data(
        allocator: &dyn GpuResourceAllocator,
        data: &TextureData,
        usage: TextureUsage,
        generate_mipmaps: bool,
    ) -> Result<Self> {
        let config = TextureConfig::new(data.width(), data.height(), data.pixel_format(), usage)
            .with_mipmaps(generate_mipmaps);
        let mut texture = Self::new(allocator, config)?;
        texture.upload(allocator, data)?;
        Ok(texture)
    }

    pub fn from_file(
        allocator: &dyn GpuResourceAllocator,
        path: impl AsRef<Path>,
        usage: TextureUsage,
    ) -> Result<Self> {
        let data = TextureData::from_file(path)?;
        Self::from_data(allocator, &data, usage, true)
    }

    /// Replaces the pixel contents. The data must match the texture's size
    /// and format.
    pub fn upload(&mut self, allocator: &dyn GpuResourceAllocator, data: &TextureData) -> Result<()> {
        anyhow::ensure!(
            data.width() == self.config.width
                && data.height() == self.config.height
                && data.pixel_format() == self.config.pixel_format,
            "texture upload of {}x{} {:?} into {}x{} {:?} texture",
            data.width(),
            data.height(),
            data.pixel_format(),
            self.config.width,
            self.config.height,
            self.config.pixel_format
        );
        allocator
            .upload_texture_data(
                &self.resource,
                &TextureResourceData {
                    width: data.width(),
                    height: data.height(),
                    pixel_format: data.pixel_format(),
                    generate_mipmaps: self.config.generate_mipmaps,
                    pixels: data.pixels(),
                },
            )
            .context("failed to upload texture data")
    }

    pub fn bind(&self, renderer: &Renderer, slot: u32) {
        renderer.bind_texture(self, slot);
    }

    pub fn width(&self) -> u32 {
        self.config.width
    }

    pub fn height(&self) -> u32 {
        self.config.height
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.config.pixel_format
    }

    pub fn usage(&self) -> TextureUsage {
        self.config.usage
    }

    pub fn config(&self) -> &TextureConfig {
        &self.config
    }

    pub fn resource(&self) -> &GpuResource {
        &self.resource
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::headless::HeadlessDevice;

    fn checker() -> TextureData {
        TextureData::new(2, 1, PixelFormat::Rgba, vec![255, 0, 0, 255, 0, 0, 255, 255]).unwrap()
    }

    #[test]
    fn usage_reports_the_configured_usage() {
        let device = HeadlessDevice::new();
        let texture = Texture2D::from_data(&device.allocator(), &checker(), TextureUsage::Specular, false).unwrap();
        assert_eq!(texture.usage(), TextureUsage::Specular);
        assert_eq!((texture.width(), texture.height()), (2, 1));
    }

    #[test]
    fn from_data_uploads_pixels() {
        let device = HeadlessDevice::new();
        let data = checker();
        let texture = Texture2D::from_data(&device.allocator(), &data, TextureUsage::Diffuse, true).unwrap();
        assert_eq!(
            device.texture_pixels(texture.resource().id()).as_deref(),
            Some(data.pixels())
        );
    }

    #[test]
    fn upload_rejects_mismatched_size() {
        let device = HeadlessDevice::new();
        let allocator = device.allocator();
        let mut texture = Texture2D::new(
            &allocator,
            TextureConfig::new(4, 4, PixelFormat::Rgba, TextureUsage::Diffuse),
        )
        .unwrap();
        assert!(texture.upload(&allocator, &checker()).is_err());
    }

    #[test]
    fn zero_sized_texture_is_rejected() {
        let device = HeadlessDevice::new();
        let config = TextureConfig::new(0, 4, PixelFormat::Rgb, TextureUsage::Diffuse);
        assert!(Texture2D::new(&device.allocator(), config).is_err());
        assert_eq!(device.live_count(), 0);
    }
}
