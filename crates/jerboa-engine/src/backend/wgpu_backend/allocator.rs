use anyhow::{Context, Result};
use image::imageops::FilterType;
use image::{DynamicImage, GrayAlphaImage, GrayImage, RgbaImage};
use wgpu::util::DeviceExt;

use crate::resource::{
    FrameBufferResourceConfig, GpuResource, GpuResourceAllocator, IndexBufferData, PixelFormat,
    ShaderDataGlsl, TextureConfig, TextureResourceData, VertexBufferData,
};

use super::context::validated;
use super::convert;
use super::registry::{
    GpuObject, IndexBufferObject, ShaderObject, TextureObject, VertexArrayObject,
    VertexBufferObject,
};
use super::shader::{self, UniformBlock};
use super::{MAX_UNIFORM_BLOCK, Shared, SharedRef};

pub struct WgpuAllocator {
    pub(super) shared: SharedRef,
}

impl WgpuAllocator {
    /// Runs `build` against the shared state and registers the result.
    fn create(&self, build: impl FnOnce(&mut Shared) -> Result<GpuObject>) -> Result<GpuResource> {
        let creator = self.shared.clone();
        let destroyer = self.shared.clone();
        GpuResource::create(
            move |id| {
                let mut shared = creator.borrow_mut();
                let object = build(&mut shared)?;
                *id = shared.registry.insert(object);
                Ok(())
            },
            move |id| destroyer.borrow_mut().destroy(id),
        )
    }
}

impl GpuResourceAllocator for WgpuAllocator {
    fn create_vertex_buffer(&self, data: &VertexBufferData<'_>) -> Result<GpuResource> {
        for element in data.layout.iter() {
            convert::vertex_formats(element.data_type)?;
        }
        self.create(|shared| {
            let buffer = create_buffer(
                shared.gpu.device(),
                "jerboa vertex buffer",
                data.bytes,
                wgpu::BufferUsages::VERTEX,
            )?;
            Ok(GpuObject::VertexBuffer(VertexBufferObject {
                buffer,
                layout: data.layout.clone(),
            }))
        })
    }

    fn create_index_buffer(&self, data: &IndexBufferData<'_>) -> Result<GpuResource> {
        self.create(|shared| {
            let buffer = create_buffer(
                shared.gpu.device(),
                "jerboa index buffer",
                data.bytes(),
                wgpu::BufferUsages::INDEX,
            )?;
            Ok(GpuObject::IndexBuffer(IndexBufferObject {
                buffer,
                count: data.count(),
            }))
        })
    }

    fn create_vertex_array(&self) -> Result<GpuResource> {
        self.create(|_| Ok(GpuObject::VertexArray(VertexArrayObject::default())))
    }

    fn create_texture(&self, config: &TextureConfig) -> Result<GpuResource> {
        let config = *config;
        let format = convert::texture_format(config.pixel_format, config.usage)?;
        self.create(move |shared| {
            let mip_levels = if config.generate_mipmaps && !config.usage.is_attachment() {
                convert::mip_level_count(config.width, config.height)
            } else {
                1
            };
            let mut usage = wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST;
            if config.usage.is_attachment() {
                usage |= wgpu::TextureUsages::RENDER_ATTACHMENT;
            }

            let device = shared.gpu.device();
            let texture = validated(device, "texture", || {
                device.create_texture(&wgpu::TextureDescriptor {
                    label: Some("jerboa texture"),
                    size: wgpu::Extent3d {
                        width: config.width,
                        height: config.height,
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: mip_levels,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format,
                    usage,
                    view_formats: &[],
                })
            })?;

            let bind_group = (!format.is_depth_stencil_format())
                .then(|| shared.texture_bind_group(&texture, config.pixel_format));

            Ok(GpuObject::Texture(TextureObject {
                texture,
                config,
                mip_levels,
                bind_group,
            }))
        })
    }

    fn create_shader(&self, data: &ShaderDataGlsl) -> Result<GpuResource> {
        self.create(|shared| {
            let compiled = shader::compile(shared.gpu.device(), data)?;
            anyhow::ensure!(
                u64::from(compiled.reflection.uniform_size) <= MAX_UNIFORM_BLOCK,
                "{}: uniform block of {} bytes exceeds the {MAX_UNIFORM_BLOCK} byte limit",
                data.describe(),
                compiled.reflection.uniform_size
            );
            let uniforms = UniformBlock::new(&compiled.reflection);
            Ok(GpuObject::Shader(ShaderObject { compiled, uniforms }))
        })
    }

    fn create_frame_buffer(&self, config: &FrameBufferResourceConfig) -> Result<GpuResource> {
        let config = config.clone();
        self.create(move |shared| {
            let attachments = config
                .color_attachments
                .iter()
                .flatten()
                .chain(config.depth_attachment.iter())
                .chain(config.stencil_attachment.iter());
            for attachment in attachments {
                anyhow::ensure!(
                    shared.registry.texture(attachment.resource).is_some(),
                    "frame buffer attachment {} is not a live texture",
                    attachment.resource
                );
            }
            Ok(GpuObject::FrameBuffer(config))
        })
    }

    fn upload_texture_data(
        &self,
        resource: &GpuResource,
        data: &TextureResourceData<'_>,
    ) -> Result<()> {
        let shared = self.shared.borrow();
        let texture = shared
            .registry
            .texture(resource.id())
            .with_context(|| format!("upload into {}, which is not a live texture", resource.id()))?;
        anyhow::ensure!(
            data.width == texture.config.width && data.height == texture.config.height,
            "upload of {}x{} into {}x{} texture",
            data.width,
            data.height,
            texture.config.width,
            texture.config.height
        );

        let levels = mip_chain(data, texture.mip_levels)?;
        let channels = convert::gpu_channels(data.pixel_format);
        let device = shared.gpu.device();
        validated(device, "texture upload", || {
            for (level, (width, height, pixels)) in levels.iter().enumerate() {
                shared.gpu.queue().write_texture(
                    wgpu::TexelCopyTextureInfo {
                        texture: &texture.texture,
                        mip_level: level as u32,
                        origin: wgpu::Origin3d::ZERO,
                        aspect: wgpu::TextureAspect::All,
                    },
                    pixels,
                    wgpu::TexelCopyBufferLayout {
                        offset: 0,
                        bytes_per_row: Some(width * channels),
                        rows_per_image: Some(*height),
                    },
                    wgpu::Extent3d {
                        width: *width,
                        height: *height,
                        depth_or_array_layers: 1,
                    },
                );
            }
        })?;
        log::debug!(
            "wgpu: uploaded {}x{} texture {} ({} mip levels)",
            data.width,
            data.height,
            resource.id(),
            levels.len()
        );
        Ok(())
    }
}

fn create_buffer(
    device: &wgpu::Device,
    label: &str,
    contents: &[u8],
    usage: wgpu::BufferUsages,
) -> Result<wgpu::Buffer> {
    validated(device, label, || {
        if contents.is_empty() {
            // wgpu rejects zero-sized initialized buffers; keep a minimal one
            // so the resource still gets a valid id.
            return device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: wgpu::COPY_BUFFER_ALIGNMENT,
                usage: usage | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
        }
        device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents,
            usage: usage | wgpu::BufferUsages::COPY_DST,
        })
    })
}

/// Pixels in GPU layout for every mip level, largest first. RGB input is
/// widened to RGBA.
fn mip_chain(data: &TextureResourceData<'_>, levels: u32) -> Result<Vec<(u32, u32, Vec<u8>)>> {
    let expected = data.pixel_format.byte_len(data.width, data.height);
    anyhow::ensure!(
        data.pixels.len() == expected,
        "texture upload needs {expected} bytes, got {}",
        data.pixels.len()
    );

    let base = match data.pixel_format {
        PixelFormat::Rgb => data
            .pixels
            .chunks_exact(3)
            .flat_map(|p| [p[0], p[1], p[2], u8::MAX])
            .collect(),
        _ => data.pixels.to_vec(),
    };

    let mut chain = vec![(data.width, data.height, base)];
    if levels <= 1 {
        return Ok(chain);
    }

    let (width, height) = (data.width, data.height);
    let pixels = chain[0].2.clone();
    let image = match data.pixel_format {
        PixelFormat::Red => GrayImage::from_raw(width, height, pixels).map(DynamicImage::ImageLuma8),
        PixelFormat::Rg => {
            GrayAlphaImage::from_raw(width, height, pixels).map(DynamicImage::ImageLumaA8)
        }
        PixelFormat::Rgb | PixelFormat::Rgba => {
            RgbaImage::from_raw(width, height, pixels).map(DynamicImage::ImageRgba8)
        }
        PixelFormat::None => None,
    }
    .context("pixel data does not form an image")?;

    for level in 1..levels {
        let w = (width >> level).max(1);
        let h = (height >> level).max(1);
        let scaled = image.resize_exact(w, h, FilterType::Triangle);
        chain.push((w, h, scaled.as_bytes().to_vec()));
    }
    Ok(chain)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(width: u32, height: u32, format: PixelFormat, pixels: &[u8]) -> TextureResourceData<'_> {
        TextureResourceData {
            width,
            height,
            pixel_format: format,
            generate_mipmaps: true,
            pixels,
        }
    }

    #[test]
    fn rgb_is_widened_to_rgba() {
        let chain = mip_chain(&data(1, 1, PixelFormat::Rgb, &[10, 20, 30]), 1).unwrap();
        assert_eq!(chain, vec![(1, 1, vec![10, 20, 30, 255])]);
    }

    #[test]
    fn chain_halves_each_level() {
        let pixels = vec![128; 8 * 2 * 4];
        let chain = mip_chain(&data(8, 2, PixelFormat::Rgba, &pixels), 4).unwrap();
        let sizes: Vec<(u32, u32)> = chain.iter().map(|(w, h, _)| (*w, *h)).collect();
        assert_eq!(sizes, vec![(8, 2), (4, 1), (2, 1), (1, 1)]);
        assert!(chain.iter().all(|(w, h, p)| p.len() == (w * h * 4) as usize));
    }

    #[test]
    fn single_channel_levels_stay_single_channel() {
        let pixels = vec![255; 4 * 4];
        let chain = mip_chain(&data(4, 4, PixelFormat::Red, &pixels), 3).unwrap();
        assert_eq!(chain[2], (1, 1, vec![255]));
    }

    #[test]
    fn wrong_length_is_rejected() {
        assert!(mip_chain(&data(2, 2, PixelFormat::Rgba, &[0; 3]), 1).is_err());
    }
}
