//! GPU backend on wgpu.
//!
//! wgpu has no global bind state, so the engine's bind/draw calls are
//! recorded during the frame and turned into render passes at present.
//! Pipelines are built lazily per shader, vertex array and fixed-function
//! state, and cached until one of their inputs is destroyed. The egui pass,
//! if any, is painted over the result just before the surface is presented.

mod allocator;
mod context;
mod convert;
mod frame;
mod pipeline;
mod registry;
mod shader;
mod shader_state;
mod state;
mod ui;
mod ui_painter;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use anyhow::Result;

use crate::event::WindowResizeEvent;
use crate::render::{GraphicsContext, RenderApi, StateSnapshot};
use crate::resource::PixelFormat;
use crate::window::{Window, WinitWindow};

pub use allocator::WgpuAllocator;
pub use context::{GpuInit, WgpuContext};
pub use frame::WgpuRenderBackend;
pub use shader_state::WgpuShaderState;
pub use state::WgpuRenderState;
pub use ui::WgpuUi;

use frame::FrameOp;
use pipeline::PipelineKey;
use registry::Registry;
use ui_painter::{UiFrame, UiPainter};

/// Largest uniform block a shader may declare, in bytes.
pub(super) const MAX_UNIFORM_BLOCK: u64 = 1024;

pub(super) type SharedRef = Rc<RefCell<Shared>>;

/// Device-side state shared by the allocator, render state, renderer and
/// shader state of one context.
pub(super) struct Shared {
    gpu: WgpuContext,
    registry: Registry,
    state: StateSnapshot,
    frame: Vec<FrameOp>,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    layouts: Layouts,
    fallback_texture: wgpu::BindGroup,
    uniforms: UniformArena,
    ui: Option<UiPainter>,
    ui_frame: Option<UiFrame>,
}

struct Layouts {
    uniform: wgpu::BindGroupLayout,
    texture: wgpu::BindGroupLayout,
    pipeline: wgpu::PipelineLayout,
}

/// Per-frame uniform storage. Each draw gets its own slice, addressed by a
/// dynamic offset.
struct UniformArena {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    capacity: u64,
}

impl Shared {
    fn new(gpu: WgpuContext) -> Self {
        let layouts = Layouts::new(gpu.device());
        let uniforms = UniformArena::new(gpu.device(), &layouts.uniform, 64 * MAX_UNIFORM_BLOCK);
        let fallback_texture = white_texture(&gpu, &layouts.texture);

        Self {
            gpu,
            registry: Registry::default(),
            state: StateSnapshot::default(),
            frame: Vec::new(),
            pipelines: HashMap::new(),
            layouts,
            fallback_texture,
            uniforms,
            ui: None,
            ui_frame: None,
        }
    }

    fn destroy(&mut self, id: u64) {
        let owners = self.registry.arrays_using(id);
        if self.registry.remove(id).is_none() {
            log::error!("wgpu: destroy of unknown object {id}");
            return;
        }
        self.pipelines.retain(|key, _| {
            key.shader != id && key.vertex_array != id && !owners.contains(&key.vertex_array)
        });
    }

    fn texture_bind_group(&self, texture: &wgpu::Texture, format: PixelFormat) -> wgpu::BindGroup {
        texture_bind_group(self.gpu.device(), &self.layouts.texture, texture, format)
    }
}

/// Bind group sampling `texture` through a sampler suited to its format.
fn texture_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    texture: &wgpu::Texture,
    format: PixelFormat,
) -> wgpu::BindGroup {
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

    let address_mode = match format {
        PixelFormat::Rgba => wgpu::AddressMode::ClampToEdge,
        _ => wgpu::AddressMode::Repeat,
    };
    let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("jerboa texture sampler"),
        address_mode_u: address_mode,
        address_mode_v: address_mode,
        address_mode_w: address_mode,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        ..Default::default()
    });

    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("jerboa texture bind group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(&sampler),
            },
        ],
    })
}

/// 1x1 white texture bound when a draw has no texture in slot 0.
fn white_texture(gpu: &WgpuContext, layout: &wgpu::BindGroupLayout) -> wgpu::BindGroup {
    let size = wgpu::Extent3d {
        width: 1,
        height: 1,
        depth_or_array_layers: 1,
    };
    let texture = gpu.device().create_texture(&wgpu::TextureDescriptor {
        label: Some("jerboa fallback texture"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    gpu.queue().write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &[u8::MAX; 4],
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4),
            rows_per_image: Some(1),
        },
        size,
    );
    texture_bind_group(gpu.device(), layout, &texture, PixelFormat::Rgba)
}

impl Layouts {
    fn new(device: &wgpu::Device) -> Self {
        let uniform = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("jerboa uniform bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let texture = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("jerboa texture bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("jerboa pipeline layout"),
            bind_group_layouts: &[&uniform, &texture],
            immediate_size: 0,
        });

        Self {
            uniform,
            texture,
            pipeline,
        }
    }
}

impl UniformArena {
    fn new(device: &wgpu::Device, layout: &wgpu::BindGroupLayout, capacity: u64) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("jerboa uniform arena"),
            size: capacity,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("jerboa uniform bind group"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(MAX_UNIFORM_BLOCK),
                }),
            }],
        });
        Self {
            buffer,
            bind_group,
            capacity,
        }
    }

    /// Grows the arena so `size` bytes fit, doubling past the current
    /// capacity.
    fn reserve(&mut self, device: &wgpu::Device, layout: &wgpu::BindGroupLayout, size: u64) {
        if size <= self.capacity {
            return;
        }
        let capacity = size.next_power_of_two();
        log::debug!("wgpu: uniform arena grows to {capacity} bytes");
        *self = Self::new(device, layout, capacity);
    }
}

/// Creates the device for `window` and returns a graphics context on it,
/// together with the egui backend that paints into the same frames.
/// Blocks on adapter and device acquisition.
pub fn create_context(window: &mut WinitWindow, init: GpuInit) -> Result<(GraphicsContext, WgpuUi)> {
    let gpu = pollster::block_on(WgpuContext::new(window.native(), init))?;
    log::info!("wgpu: surface format {:?}", gpu.surface_format());
    let shared: SharedRef = Rc::new(RefCell::new(Shared::new(gpu)));
    let bus = window.event_bus().clone();

    // Registered ahead of the renderer's own resize observer, so the surface
    // is reconfigured before the viewport follows.
    let on_resize = {
        let shared = shared.clone();
        bus.subscribe(move |e: &WindowResizeEvent| {
            shared
                .borrow_mut()
                .gpu
                .resize(winit::dpi::PhysicalSize::new(e.width, e.height));
        })
    };

    let ui = WgpuUi::new(shared.clone(), window.native(), window.tap_platform_events());
    let graphics = GraphicsContext::new(
        RenderApi::Wgpu,
        Box::new(WgpuAllocator {
            shared: shared.clone(),
        }),
        Box::new(WgpuRenderState {
            shared: shared.clone(),
        }),
        Box::new(WgpuRenderBackend::new(shared.clone(), on_resize)),
        Box::new(WgpuShaderState { shared }),
        &bus,
    );
    Ok((graphics, ui))
}
