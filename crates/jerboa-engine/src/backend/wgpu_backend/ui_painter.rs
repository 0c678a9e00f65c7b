//! Paints tessellated egui output over the finished frame.

use std::collections::HashMap;
use std::ops::Range;

use anyhow::Result;
use bytemuck::{Pod, Zeroable};
use egui::epaint::{ImageDelta, Primitive};

use super::Shared;
use super::context::validated;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
struct UiVertex {
    pos: [f32; 2],
    uv: [f32; 2],
    color: [u8; 4],
}

impl UiVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2, 2 => Unorm8x4];

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct UiLocals {
    screen_size: [f32; 2],
    linear_output: u32,
    _pad: u32,
}

/// One UI pass waiting for present. Its texture uploads have already been
/// applied; `free` is released once the pass is painted or replaced.
pub(super) struct UiFrame {
    pub primitives: Vec<egui::ClippedPrimitive>,
    pub pixels_per_point: f32,
    pub free: Vec<egui::TextureId>,
}

#[derive(Debug, Clone, PartialEq)]
struct UiDraw {
    texture: egui::TextureId,
    clip: egui::Rect,
    indices: Range<u32>,
}

/// Every mesh of a pass in one vertex and one index buffer.
#[derive(Debug, Default)]
struct UiBatch {
    vertices: Vec<UiVertex>,
    indices: Vec<u32>,
    draws: Vec<UiDraw>,
}

fn batch(primitives: &[egui::ClippedPrimitive]) -> UiBatch {
    let mut out = UiBatch::default();
    for clipped in primitives {
        let Primitive::Mesh(mesh) = &clipped.primitive else {
            log::trace!("ui: paint callbacks are not supported; skipped");
            continue;
        };
        if mesh.indices.is_empty() {
            continue;
        }
        let base = out.vertices.len() as u32;
        let start = out.indices.len() as u32;
        out.vertices.extend(mesh.vertices.iter().map(|v| UiVertex {
            pos: [v.pos.x, v.pos.y],
            uv: [v.uv.x, v.uv.y],
            color: v.color.to_array(),
        }));
        out.indices.extend(mesh.indices.iter().map(|i| base + i));
        out.draws.push(UiDraw {
            texture: mesh.texture_id,
            clip: clipped.clip_rect,
            indices: start..out.indices.len() as u32,
        });
    }
    out
}

/// Clip rectangle in points to a scissor `[x, y, width, height]` in pixels,
/// clamped to the target. `None` when nothing is left.
fn scissor(clip: egui::Rect, pixels_per_point: f32, target: (u32, u32)) -> Option<[u32; 4]> {
    let (width, height) = (target.0 as f32, target.1 as f32);
    let min_x = (clip.min.x * pixels_per_point).round().clamp(0.0, width);
    let min_y = (clip.min.y * pixels_per_point).round().clamp(0.0, height);
    let max_x = (clip.max.x * pixels_per_point).round().clamp(min_x, width);
    let max_y = (clip.max.y * pixels_per_point).round().clamp(min_y, height);

    let (x, y) = (min_x as u32, min_y as u32);
    let (w, h) = (max_x as u32 - x, max_y as u32 - y);
    (w > 0 && h > 0).then_some([x, y, w, h])
}

struct UiTexture {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
    options: egui::TextureOptions,
}

/// Vertex or index storage that grows to the largest pass seen.
struct GrowingBuffer {
    buffer: wgpu::Buffer,
    label: &'static str,
    usage: wgpu::BufferUsages,
}

impl GrowingBuffer {
    fn new(device: &wgpu::Device, label: &'static str, usage: wgpu::BufferUsages) -> Self {
        let usage = usage | wgpu::BufferUsages::COPY_DST;
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: 4096,
            usage,
            mapped_at_creation: false,
        });
        Self { buffer, label, usage }
    }

    fn write(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, bytes: &[u8]) {
        let required = bytes.len() as u64;
        if required > self.buffer.size() {
            let size = required.next_power_of_two();
            log::debug!("ui: {} grows to {size} bytes", self.label);
            self.buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(self.label),
                size,
                usage: self.usage,
                mapped_at_creation: false,
            });
        }
        queue.write_buffer(&self.buffer, 0, bytes);
    }
}

pub(super) struct UiPainter {
    pipeline: wgpu::RenderPipeline,
    locals: wgpu::Buffer,
    locals_group: wgpu::BindGroup,
    texture_layout: wgpu::BindGroupLayout,
    textures: HashMap<egui::TextureId, UiTexture>,
    vertices: GrowingBuffer,
    indices: GrowingBuffer,
    linear_output: bool,
}

impl UiPainter {
    pub(super) fn new(device: &wgpu::Device, format: wgpu::TextureFormat) -> Result<Self> {
        let shader = validated(device, "ui shader", || {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("jerboa ui shader"),
                source: wgpu::ShaderSource::Wgsl(include_str!("shaders/ui.wgsl").into()),
            })
        })?;

        let locals_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("jerboa ui locals bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(
                        std::mem::size_of::<UiLocals>() as u64,
                    ),
                },
                count: None,
            }],
        });
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("jerboa ui texture bgl"),
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
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("jerboa ui pipeline layout"),
            bind_group_layouts: &[&locals_layout, &texture_layout],
            immediate_size: 0,
        });

        let pipeline = validated(device, "ui pipeline", || {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("jerboa ui pipeline"),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    compilation_options: Default::default(),
                    buffers: &[UiVertex::layout()],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_main"),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: Some(wgpu::BlendState {
                            color: wgpu::BlendComponent {
                                src_factor: wgpu::BlendFactor::One,
                                dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                                operation: wgpu::BlendOperation::Add,
                            },
                            alpha: wgpu::BlendComponent {
                                src_factor: wgpu::BlendFactor::OneMinusDstAlpha,
                                dst_factor: wgpu::BlendFactor::One,
                                operation: wgpu::BlendOperation::Add,
                            },
                        }),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            })
        })?;

        let locals = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("jerboa ui locals"),
            size: std::mem::size_of::<UiLocals>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let locals_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("jerboa ui locals bind group"),
            layout: &locals_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: locals.as_entire_binding(),
            }],
        });

        Ok(Self {
            pipeline,
            locals,
            locals_group,
            texture_layout,
            textures: HashMap::new(),
            vertices: GrowingBuffer::new(device, "jerboa ui vertices", wgpu::BufferUsages::VERTEX),
            indices: GrowingBuffer::new(device, "jerboa ui indices", wgpu::BufferUsages::INDEX),
            linear_output: format.is_srgb(),
        })
    }

    fn set_texture(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        id: egui::TextureId,
        delta: &ImageDelta,
    ) {
        let egui::ImageData::Color(image) = &delta.image;
        let [width, height] = image.size;
        let size = wgpu::Extent3d {
            width: width as u32,
            height: height as u32,
            depth_or_array_layers: 1,
        };

        if delta.pos.is_none() {
            let texture = device.create_texture(&wgpu::TextureDescriptor {
                label: Some("jerboa ui texture"),
                size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            });
            let bind_group = ui_bind_group(device, &self.texture_layout, &texture, delta.options);
            self.textures.insert(
                id,
                UiTexture {
                    texture,
                    bind_group,
                    options: delta.options,
                },
            );
        }

        let Some(entry) = self.textures.get_mut(&id) else {
            log::warn!("ui: partial update of unknown texture {id:?}");
            return;
        };
        if entry.options != delta.options {
            entry.bind_group =
                ui_bind_group(device, &self.texture_layout, &entry.texture, delta.options);
            entry.options = delta.options;
        }

        let [x, y] = delta.pos.unwrap_or([0, 0]);
        let pixels: Vec<u8> = image.pixels.iter().flat_map(|c| c.to_array()).collect();
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &entry.texture,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: x as u32,
                    y: y as u32,
                    z: 0,
                },
                aspect: wgpu::TextureAspect::All,
            },
            &pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * size.width),
                rows_per_image: Some(size.height),
            },
            size,
        );
    }

    fn free(&mut self, ids: &[egui::TextureId]) {
        for id in ids {
            self.textures.remove(id);
        }
    }

    fn paint(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
        target: (u32, u32),
        frame: &UiFrame,
    ) {
        let batch = batch(&frame.primitives);
        if batch.draws.is_empty() {
            return;
        }

        let ppp = frame.pixels_per_point;
        let locals = UiLocals {
            screen_size: [target.0 as f32 / ppp, target.1 as f32 / ppp],
            linear_output: u32::from(self.linear_output),
            _pad: 0,
        };
        queue.write_buffer(&self.locals, 0, bytemuck::bytes_of(&locals));
        self.vertices
            .write(device, queue, bytemuck::cast_slice(&batch.vertices));
        self.indices
            .write(device, queue, bytemuck::cast_slice(&batch.indices));

        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("jerboa ui pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        rpass.set_pipeline(&self.pipeline);
        rpass.set_bind_group(0, &self.locals_group, &[]);
        rpass.set_vertex_buffer(0, self.vertices.buffer.slice(..));
        rpass.set_index_buffer(self.indices.buffer.slice(..), wgpu::IndexFormat::Uint32);

        for draw in &batch.draws {
            let Some([x, y, w, h]) = scissor(draw.clip, ppp, target) else {
                continue;
            };
            let Some(texture) = self.textures.get(&draw.texture) else {
                log::trace!("ui: mesh uses unknown texture {:?}; skipped", draw.texture);
                continue;
            };
            rpass.set_scissor_rect(x, y, w, h);
            rpass.set_bind_group(1, &texture.bind_group, &[]);
            rpass.draw_indexed(draw.indices.clone(), 0, 0..1);
        }
    }
}

fn ui_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    texture: &wgpu::Texture,
    options: egui::TextureOptions,
) -> wgpu::BindGroup {
    let filter = |f: egui::TextureFilter| match f {
        egui::TextureFilter::Nearest => wgpu::FilterMode::Nearest,
        egui::TextureFilter::Linear => wgpu::FilterMode::Linear,
    };
    let address_mode = match options.wrap_mode {
        egui::TextureWrapMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
        egui::TextureWrapMode::Repeat => wgpu::AddressMode::Repeat,
        egui::TextureWrapMode::MirroredRepeat => wgpu::AddressMode::MirrorRepeat,
    };
    let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("jerboa ui sampler"),
        address_mode_u: address_mode,
        address_mode_v: address_mode,
        mag_filter: filter(options.magnification),
        min_filter: filter(options.minification),
        ..Default::default()
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("jerboa ui texture bind group"),
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

impl Shared {
    pub(super) fn ensure_ui_painter(&mut self) -> Result<()> {
        if self.ui.is_none() {
            self.ui = Some(UiPainter::new(self.gpu.device(), self.gpu.surface_format())?);
        }
        Ok(())
    }

    pub(super) fn release_ui_painter(&mut self) {
        self.ui = None;
        self.ui_frame = None;
    }

    /// Uploads the pass's new textures now and keeps its meshes for the next
    /// present. A pass that never got presented is dropped.
    pub(super) fn queue_ui(&mut self, textures: egui::TexturesDelta, frame: UiFrame) {
        let Some(painter) = self.ui.as_mut() else {
            return;
        };
        if let Some(stale) = self.ui_frame.take() {
            painter.free(&stale.free);
        }
        for (id, delta) in &textures.set {
            painter.set_texture(self.gpu.device(), self.gpu.queue(), *id, delta);
        }
        self.ui_frame = Some(UiFrame {
            free: textures.free,
            ..frame
        });
    }

    /// Paints the queued pass over `view`, after the frame's own passes.
    pub(super) fn paint_ui(&mut self, encoder: &mut wgpu::CommandEncoder, view: &wgpu::TextureView) {
        let Some(frame) = self.ui_frame.take() else {
            return;
        };
        let Some(painter) = self.ui.as_mut() else {
            return;
        };
        let size = self.gpu.size();
        painter.paint(
            self.gpu.device(),
            self.gpu.queue(),
            encoder,
            view,
            (size.width, size.height),
            &frame,
        );
        painter.free(&frame.free);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use egui::epaint::Vertex;
    use egui::{Color32, Mesh, Rect, TextureId, pos2};

    fn triangle(texture: TextureId) -> Mesh {
        let vertex = |x: f32, y: f32| Vertex {
            pos: pos2(x, y),
            uv: pos2(0.0, 0.0),
            color: Color32::from_rgba_premultiplied(10, 20, 30, 255),
        };
        Mesh {
            indices: vec![0, 1, 2],
            vertices: vec![vertex(0.0, 0.0), vertex(10.0, 0.0), vertex(0.0, 10.0)],
            texture_id: texture,
        }
    }

    fn clipped(mesh: Mesh) -> egui::ClippedPrimitive {
        egui::ClippedPrimitive {
            clip_rect: Rect::from_min_max(pos2(0.0, 0.0), pos2(50.0, 50.0)),
            primitive: Primitive::Mesh(mesh),
        }
    }

    #[test]
    fn meshes_share_buffers_with_offset_indices() {
        let font = TextureId::Managed(0);
        let user = TextureId::User(7);
        let batch = batch(&[clipped(triangle(font)), clipped(triangle(user))]);

        assert_eq!(batch.vertices.len(), 6);
        assert_eq!(batch.indices, [0, 1, 2, 3, 4, 5]);
        assert_eq!(batch.draws.len(), 2);
        assert_eq!(batch.draws[1].texture, user);
        assert_eq!(batch.draws[1].indices, 3..6);
        assert_eq!(batch.vertices[1].pos, [10.0, 0.0]);
        assert_eq!(batch.vertices[1].color, [10, 20, 30, 255]);
    }

    #[test]
    fn empty_meshes_produce_no_draw() {
        let batch = batch(&[clipped(Mesh::default())]);
        assert!(batch.draws.is_empty());
        assert!(batch.vertices.is_empty());
    }

    #[test]
    fn scissor_scales_by_pixels_per_point() {
        let clip = Rect::from_min_max(pos2(10.0, 20.0), pos2(30.0, 40.0));
        assert_eq!(scissor(clip, 2.0, (800, 600)), Some([20, 40, 40, 40]));
    }

    #[test]
    fn scissor_is_clamped_to_the_target() {
        let clip = Rect::from_min_max(pos2(-5.0, -5.0), pos2(1000.0, 1000.0));
        assert_eq!(scissor(clip, 1.0, (800, 600)), Some([0, 0, 800, 600]));
        assert_eq!(scissor(Rect::EVERYTHING, 1.0, (800, 600)), Some([0, 0, 800, 600]));

        let outside = Rect::from_min_max(pos2(900.0, 0.0), pos2(950.0, 10.0));
        assert_eq!(scissor(outside, 1.0, (800, 600)), None);
    }

    #[test]
    fn vertex_layout_matches_the_struct() {
        assert_eq!(std::mem::size_of::<UiVertex>(), 20);
        assert_eq!(UiVertex::layout().array_stride, 20);
        assert_eq!(std::mem::size_of::<UiLocals>(), 16);
    }
}
