//! Frame recording and submission.

use anyhow::{Result, anyhow};
use glam::Vec4;

use crate::event::EventObserver;
use crate::render::{BufferClearBits, ClearState, RenderBackend};
use crate::resource::INVALID_RESOURCE_ID;

use super::context::SurfaceErrorAction;
use super::pipeline::{self, PipelineKey};
use super::{MAX_UNIFORM_BLOCK, Shared, SharedRef};

/// One recorded call, replayed at present.
#[derive(Debug, Clone, PartialEq)]
pub(super) enum FrameOp {
    Clear(ClearState),
    Draw(DrawCall),
}

/// A draw with everything it read from the bound state captured.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct DrawCall {
    pub key: PipelineKey,
    pub texture: Option<u64>,
    pub index_count: u32,
    pub uniforms: Vec<u8>,
    pub viewport: (u32, u32),
    pub blend_color: Vec4,
    pub stencil_reference: u32,
}

/// Render pass boundaries: a pass starts at each clear, and at the first
/// draw when the frame does not begin with one.
#[derive(Debug, PartialEq)]
struct Pass {
    clear: Option<ClearState>,
    draws: Vec<usize>,
}

fn split_passes(ops: &[FrameOp]) -> Vec<Pass> {
    let mut passes: Vec<Pass> = Vec::new();
    for (index, op) in ops.iter().enumerate() {
        match op {
            FrameOp::Clear(clear) => passes.push(Pass {
                clear: Some(*clear),
                draws: Vec::new(),
            }),
            FrameOp::Draw(_) => match passes.last_mut() {
                Some(pass) => pass.draws.push(index),
                None => passes.push(Pass {
                    clear: None,
                    draws: vec![index],
                }),
            },
        }
    }
    passes
}

/// Concatenates each draw's uniform bytes, padded to `alignment`. Returns the
/// bytes and one offset per op (zero for clears).
fn pack_uniforms(ops: &[FrameOp], alignment: u64) -> (Vec<u8>, Vec<u32>) {
    let mut bytes = Vec::new();
    let mut offsets = Vec::with_capacity(ops.len());
    for op in ops {
        let FrameOp::Draw(draw) = op else {
            offsets.push(0);
            continue;
        };
        offsets.push(bytes.len() as u32);
        bytes.extend_from_slice(&draw.uniforms);
        let padded = (bytes.len() as u64).div_ceil(alignment) * alignment;
        bytes.resize(padded as usize, 0);
    }
    (bytes, offsets)
}

fn wgpu_color(color: Vec4) -> wgpu::Color {
    wgpu::Color {
        r: f64::from(color.x),
        g: f64::from(color.y),
        b: f64::from(color.z),
        a: f64::from(color.w),
    }
}

impl Shared {
    fn record_draw(&mut self, index_count: u32, viewport: (u32, u32)) {
        let Some(vertex_array) = self.registry.bound_vertex_array else {
            log::warn!("wgpu: draw with no vertex array bound; skipped");
            return;
        };
        let Some(shader) = self.registry.bound_shader else {
            log::warn!("wgpu: draw with no shader bound; skipped");
            return;
        };
        let available = self
            .registry
            .vertex_array(vertex_array)
            .and_then(|va| va.index_buffer)
            .and_then(|id| self.registry.index_buffer(id))
            .map_or(0, |b| b.count);
        if available == 0 {
            log::warn!("wgpu: vertex array {vertex_array} has no indices; draw skipped");
            return;
        }
        if index_count > available {
            log::warn!("wgpu: draw of {index_count} indices clamped to {available}");
        }

        let Some(program) = self.registry.shader(shader) else {
            log::warn!("wgpu: bound shader {shader} is gone; draw skipped");
            return;
        };
        let uniforms = program.uniforms.bytes().to_vec();
        let texture = if program.compiled.reflection.uses_texture {
            self.registry.bound_textures.get(&0).copied()
        } else {
            None
        };

        let call = DrawCall {
            key: PipelineKey::new(shader, vertex_array, &self.state),
            texture,
            index_count: index_count.min(available),
            uniforms,
            viewport,
            blend_color: self.state.blend.color,
            stencil_reference: self.state.stencil.parameters.compare_value.max(0) as u32,
        };
        self.frame.push(FrameOp::Draw(call));
    }

    fn prepare_pipelines(&mut self, ops: &[FrameOp]) {
        for op in ops {
            let FrameOp::Draw(draw) = op else { continue };
            if self.pipelines.contains_key(&draw.key) {
                continue;
            }
            match pipeline::build(
                self.gpu.device(),
                &self.layouts.pipeline,
                self.gpu.surface_format(),
                &self.registry,
                &draw.key,
            ) {
                Ok(built) => {
                    self.pipelines.insert(draw.key, built);
                }
                Err(e) => log::error!("wgpu: pipeline creation failed: {e:#}"),
            }
        }
    }

    /// Replays `ops` into render passes on the next surface texture and
    /// presents it.
    fn render_frame(&mut self, ops: Vec<FrameOp>) -> Result<()> {
        if !self.gpu.is_drawable() {
            return Ok(());
        }

        let surface_texture = match self.gpu.acquire() {
            Ok(texture) => texture,
            Err(err) => {
                log::warn!("wgpu: failed to acquire frame: {err}");
                return match self.gpu.handle_surface_error(err) {
                    SurfaceErrorAction::Fatal => Err(anyhow!("surface is out of memory")),
                    action => {
                        log::debug!("wgpu: frame dropped ({action:?})");
                        Ok(())
                    }
                };
            }
        };

        self.prepare_pipelines(&ops);

        let alignment = u64::from(self.gpu.device().limits().min_uniform_buffer_offset_alignment);
        let (uniform_bytes, offsets) = pack_uniforms(&ops, alignment);
        self.uniforms.reserve(
            self.gpu.device(),
            &self.layouts.uniform,
            uniform_bytes.len() as u64 + MAX_UNIFORM_BLOCK,
        );
        if !uniform_bytes.is_empty() {
            self.gpu
                .queue()
                .write_buffer(&self.uniforms.buffer, 0, &uniform_bytes);
        }

        let mut passes = split_passes(&ops);
        if passes.is_empty() {
            passes.push(Pass {
                clear: None,
                draws: Vec::new(),
            });
        }

        let view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .gpu
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("jerboa frame encoder"),
            });

        for pass in &passes {
            self.encode_pass(&mut encoder, &view, pass, &ops, &offsets);
        }
        self.paint_ui(&mut encoder, &view);

        self.gpu.queue().submit(Some(encoder.finish()));
        self.gpu.pre_present_notify();
        surface_texture.present();
        Ok(())
    }

    fn encode_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
        pass: &Pass,
        ops: &[FrameOp],
        offsets: &[u32],
    ) {
        let bits = pass.clear.map_or(BufferClearBits::empty(), |c| c.bits);
        let clear = pass.clear.unwrap_or_default();

        let color_load = if bits.contains(BufferClearBits::COLOR) {
            wgpu::LoadOp::Clear(wgpu_color(clear.color))
        } else {
            wgpu::LoadOp::Load
        };
        let depth_load = if bits.contains(BufferClearBits::DEPTH) {
            wgpu::LoadOp::Clear(clear.depth)
        } else {
            wgpu::LoadOp::Load
        };
        let stencil_load = if bits.contains(BufferClearBits::STENCIL) {
            wgpu::LoadOp::Clear(clear.stencil.max(0) as u32)
        } else {
            wgpu::LoadOp::Load
        };

        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("jerboa pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: color_load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: self.gpu.depth_view(),
                depth_ops: Some(wgpu::Operations {
                    load: depth_load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: Some(wgpu::Operations {
                    load: stencil_load,
                    store: wgpu::StoreOp::Store,
                }),
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        let surface = self.gpu.size();
        for &index in &pass.draws {
            let FrameOp::Draw(draw) = &ops[index] else { continue };
            let Some(pipeline) = self.pipelines.get(&draw.key) else { continue };
            let Some(vertex_array) = self.registry.vertex_array(draw.key.vertex_array) else {
                continue;
            };
            let Some(index_buffer) = vertex_array
                .index_buffer
                .and_then(|id| self.registry.index_buffer(id))
            else {
                continue;
            };

            let width = draw.viewport.0.min(surface.width);
            let height = draw.viewport.1.min(surface.height);
            if width == 0 || height == 0 {
                continue;
            }

            let texture_group = draw
                .texture
                .and_then(|id| self.registry.texture(id))
                .and_then(|t| t.bind_group.as_ref())
                .unwrap_or(&self.fallback_texture);

            rpass.set_viewport(0.0, 0.0, width as f32, height as f32, 0.0, 1.0);
            rpass.set_pipeline(pipeline);
            rpass.set_bind_group(0, &self.uniforms.bind_group, &[offsets[index]]);
            rpass.set_bind_group(1, texture_group, &[]);
            for (slot, id) in vertex_array.vertex_buffers.iter().enumerate() {
                if let Some(buffer) = self.registry.vertex_buffer(*id) {
                    rpass.set_vertex_buffer(slot as u32, buffer.buffer.slice(..));
                }
            }
            rpass.set_index_buffer(index_buffer.buffer.slice(..), wgpu::IndexFormat::Uint32);
            rpass.set_blend_constant(wgpu_color(draw.blend_color));
            rpass.set_stencil_reference(draw.stencil_reference);
            rpass.draw_indexed(0..draw.index_count.min(index_buffer.count), 0, 0..1);
        }
    }
}

/// [`RenderBackend`] over the shared wgpu state. Binds update the registry;
/// clears and draws are recorded and submitted on [`present`](RenderBackend::present).
pub struct WgpuRenderBackend {
    shared: SharedRef,
    viewport: (u32, u32),
    _on_resize: EventObserver,
}

impl WgpuRenderBackend {
    pub(super) fn new(shared: SharedRef, on_resize: EventObserver) -> Self {
        let size = shared.borrow().gpu.size();
        Self {
            shared,
            viewport: (size.width, size.height),
            _on_resize: on_resize,
        }
    }
}

impl RenderBackend for WgpuRenderBackend {
    fn clear(&mut self) {
        let mut shared = self.shared.borrow_mut();
        let clear = shared.state.clear;
        shared.frame.push(FrameOp::Clear(clear));
    }

    fn draw_indexed(&mut self, index_count: u32) {
        self.shared
            .borrow_mut()
            .record_draw(index_count, self.viewport);
    }

    fn bind_vertex_array(&mut self, id: u64) {
        let mut shared = self.shared.borrow_mut();
        if id == INVALID_RESOURCE_ID {
            shared.registry.bound_vertex_array = None;
            return;
        }
        if shared.registry.vertex_array(id).is_none() {
            log::warn!("wgpu: bind of {id}, which is not a live vertex array");
            return;
        }
        shared.registry.bound_vertex_array = Some(id);
    }

    fn bind_shader(&mut self, id: u64) {
        let mut shared = self.shared.borrow_mut();
        if id == INVALID_RESOURCE_ID {
            shared.registry.bound_shader = None;
            return;
        }
        if shared.registry.shader(id).is_none() {
            log::warn!("wgpu: bind of {id}, which is not a live shader");
            return;
        }
        shared.registry.bound_shader = Some(id);
    }

    fn bind_texture(&mut self, slot: u32, id: u64) {
        let mut shared = self.shared.borrow_mut();
        if id == INVALID_RESOURCE_ID {
            shared.registry.bound_textures.remove(&slot);
            return;
        }
        if shared.registry.texture(id).is_none() {
            log::warn!("wgpu: bind of {id}, which is not a live texture");
            return;
        }
        if slot != 0 {
            log::debug!("wgpu: texture {id} bound to slot {slot}; shaders only sample slot 0");
        }
        shared.registry.bound_textures.insert(slot, id);
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        self.viewport = (width, height);
    }

    fn set_vsync(&mut self, enabled: bool) {
        self.shared.borrow_mut().gpu.set_vsync(enabled);
    }

    fn present(&mut self) {
        let mut shared = self.shared.borrow_mut();
        let ops = std::mem::take(&mut shared.frame);
        if let Err(e) = shared.render_frame(ops) {
            log::error!("wgpu: frame failed: {e:#}");
        }
    }
}
