use anyhow::{Context, Result};

use super::allocator::GpuResourceAllocator;
use super::config::{
    ColorAttachmentSlot, FrameBufferAttachment, FrameBufferConfig, FrameBufferResourceConfig,
    TextureConfig, TextureUsage,
};
use super::handle::GpuResource;
use super::texture::Texture2D;
use super::texture_data::PixelFormat;

/// Off-screen render target made of attachment textures it owns.
#[derive(Debug)]
pub struct FrameBuffer {
    // Released before the textures it refers to.
    resource: GpuResource,
    color_attachments: [Option<Texture2D>; ColorAttachmentSlot::COUNT],
    depth_attachment: Option<Texture2D>,
    width: u32,
    height: u32,
}

impl FrameBuffer {
    pub fn new(allocator: &dyn GpuResourceAllocator, config: &FrameBufferConfig) -> Result<Self> {
        anyhow::ensure!(
            !config.color_attachments.is_empty() || config.depth || config.stencil,
            "frame buffer needs at least one attachment"
        );

        let mut color_attachments: [Option<Texture2D>; ColorAttachmentSlot::COUNT] = Default::default();
        for &(slot, format) in &config.color_attachments {
            anyhow::ensure!(
                color_attachments[slot.index()].is_none(),
                "color attachment {slot:?} specified twice"
            );
            let texture = Texture2D::new(
                allocator,
                TextureConfig::new(config.width, config.height, format, TextureUsage::ColorAttachment),
            )
            .with_context(|| format!("failed to create color attachment {slot:?}"))?;
            color_attachments[slot.index()] = Some(texture);
        }

        let depth_usage = match (config.depth, config.stencil) {
            (true, true) => Some(TextureUsage::DepthStencilAttachment),
            (true, false) => Some(TextureUsage::DepthAttachment),
            (false, true) => Some(TextureUsage::StencilAttachment),
            (false, false) => None,
        };
        let depth_attachment = depth_usage
            .map(|usage| {
                Texture2D::new(
                    allocator,
                    TextureConfig::new(config.width, config.height, PixelFormat::None, usage),
                )
                .context("failed to create depth/stencil attachment")
            })
            .transpose()?;

        let mut resource_config = FrameBufferResourceConfig::default();
        for (slot, texture) in color_attachments.iter().enumerate() {
            resource_config.color_attachments[slot] = texture.as_ref().map(attachment_of);
        }
        if let Some(texture) = &depth_attachment {
            let attachment = attachment_of(texture);
            if config.depth {
                resource_config.depth_attachment = Some(attachment);
            }
            if config.stencil {
                resource_config.stencil_attachment = Some(attachment);
            }
        }

        let resource = allocator
            .create_frame_buffer(&resource_config)
            .context("failed to create frame buffer")?;

        Ok(Self {
            resource,
            color_attachments,
            depth_attachment,
            width: config.width,
            height: config.height,
        })
    }

    pub fn color_attachment(&self, slot: ColorAttachmentSlot) -> Option<&Texture2D> {
        self.color_attachments[slot.index()].as_ref()
    }

    pub fn depth_attachment(&self) -> Option<&Texture2D> {
        self.depth_attachment.as_ref()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn resource(&self) -> &GpuResource {
        &self.resource
    }
}

fn attachment_of(texture: &Texture2D) -> FrameBufferAttachment {
    FrameBufferAttachment {
        resource: texture.resource().id(),
        usage: texture.usage(),
    }
}
