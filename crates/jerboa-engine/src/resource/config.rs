use super::texture_data::PixelFormat;

/// What a texture is sampled or rendered as.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum TextureUsage {
    #[default]
    None,
    Diffuse,
    Specular,
    Normal,
    ColorAttachment,
    DepthAttachment,
    StencilAttachment,
    DepthStencilAttachment,
}

impl TextureUsage {
    pub fn is_attachment(self) -> bool {
        matches!(
            self,
            TextureUsage::ColorAttachment
                | TextureUsage::DepthAttachment
                | TextureUsage::StencilAttachment
                | TextureUsage::DepthStencilAttachment
        )
    }
}

/// Storage description for a 2D texture; pixels are uploaded separately.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct TextureConfig {
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    pub usage: TextureUsage,
    pub generate_mipmaps: bool,
}

impl TextureConfig {
    pub fn new(width: u32, height: u32, pixel_format: PixelFormat, usage: TextureUsage) -> Self {
        Self {
            width,
            height,
            pixel_format,
            usage,
            generate_mipmaps: false,
        }
    }

    pub fn with_mipmaps(mut self, generate: bool) -> Self {
        self.generate_mipmaps = generate;
        self
    }
}

/// Pixel payload for [`GpuResourceAllocator::upload_texture_data`](super::GpuResourceAllocator::upload_texture_data).
#[derive(Debug, Copy, Clone)]
pub struct TextureResourceData<'a> {
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    pub generate_mipmaps: bool,
    pub pixels: &'a [u8],
}

/// Color attachment points of a framebuffer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ColorAttachmentSlot {
    Slot0,
    Slot1,
    Slot2,
    Slot3,
}

impl ColorAttachmentSlot {
    pub const COUNT: usize = 4;

    pub const ALL: [ColorAttachmentSlot; Self::COUNT] = [
        ColorAttachmentSlot::Slot0,
        ColorAttachmentSlot::Slot1,
        ColorAttachmentSlot::Slot2,
        ColorAttachmentSlot::Slot3,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }
}

/// A texture (by resource id) bound to one framebuffer attachment point.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct FrameBufferAttachment {
    pub resource: u64,
    pub usage: TextureUsage,
}

/// Backend-level framebuffer description: which existing textures to attach
/// where.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameBufferResourceConfig {
    pub color_attachments: [Option<FrameBufferAttachment>; ColorAttachmentSlot::COUNT],
    pub depth_attachment: Option<FrameBufferAttachment>,
    pub stencil_attachment: Option<FrameBufferAttachment>,
}

impl FrameBufferResourceConfig {
    pub fn color_attachment_count(&self) -> usize {
        self.color_attachments.iter().flatten().count()
    }
}

/// Engine-level framebuffer description; [`FrameBuffer`](super::FrameBuffer)
/// creates the attachment textures from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBufferConfig {
    pub width: u32,
    pub height: u32,
    pub color_attachments: Vec<(ColorAttachmentSlot, PixelFormat)>,
    pub depth: bool,
    pub stencil: bool,
}

impl FrameBufferConfig {
    /// One RGBA color target plus depth.
    pub fn color_depth(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            color_attachments: vec![(ColorAttachmentSlot::Slot0, PixelFormat::Rgba)],
            depth: true,
            stencil: false,
        }
    }
}
