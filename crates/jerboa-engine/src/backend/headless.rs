//! Backend without a GPU.
//!
//! Hands out increasing ids starting at 1, tracks which objects are alive and
//! records every command it receives. Used by tests and for running the frame
//! loop where no adapter is available.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::rc::Rc;

use anyhow::{Context, Result};
use glam::Vec4;

use crate::event::EventBus;
use crate::render::{
    BlendingFactor, BufferClearBits, CompareFunction, FaceCullingMode, FrontFaceWinding,
    GraphicsContext, RenderApi, RenderBackend, RenderStateBackend, ShaderState, StateSnapshot,
    StencilOperations, StencilParameters, UniformValue,
};
use crate::resource::{
    FrameBufferResourceConfig, GpuResource, GpuResourceAllocator, INVALID_RESOURCE_ID,
    IndexBufferData, ShaderDataGlsl, TextureConfig, TextureResourceData, VertexBufferData,
};

/// Commands kept before the oldest are dropped.
pub const MAX_RECORDED_COMMANDS: usize = 4096;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    VertexBuffer,
    IndexBuffer,
    VertexArray,
    Texture,
    Shader,
    FrameBuffer,
}

/// One call received by the device, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Create { id: u64, kind: ObjectKind },
    Destroy { id: u64, kind: ObjectKind },
    UploadTexture { id: u64, bytes: usize, mip_levels: u32 },
    Clear { color: Vec4, bits: BufferClearBits },
    DrawIndexed { index_count: u32 },
    BindVertexArray(u64),
    BindShader(u64),
    BindTexture { slot: u32, id: u64 },
    SetViewport { width: u32, height: u32 },
    SetVSync(bool),
    SetUniform { shader: u64, name: String, value: UniformValue },
    Present,
}

#[derive(Debug)]
struct Object {
    kind: ObjectKind,
    vertex_array: Option<u64>,
    pixels: Option<Vec<u8>>,
}

#[derive(Debug, Default)]
struct DeviceState {
    next_id: u64,
    objects: BTreeMap<u64, Object>,
    commands: VecDeque<Command>,
    pending_failure: Option<String>,

    bound_vertex_array: Option<u64>,
    bound_shader: Option<u64>,
    bound_textures: BTreeMap<u32, u64>,

    pipeline: StateSnapshot,
    uniforms: HashMap<u64, HashMap<String, UniformValue>>,
    viewport: (u32, u32),
    vsync: bool,
    frames_presented: u64,
}

impl DeviceState {
    fn record(&mut self, command: Command) {
        if self.commands.len() == MAX_RECORDED_COMMANDS {
            self.commands.pop_front();
        }
        self.commands.push_back(command);
    }

    fn allocate(&mut self, kind: ObjectKind) -> Result<u64> {
        if let Some(reason) = self.pending_failure.take() {
            anyhow::bail!(reason);
        }
        self.next_id += 1;
        let id = self.next_id;

        let vertex_array = match kind {
            ObjectKind::VertexBuffer | ObjectKind::IndexBuffer => self.bound_vertex_array,
            _ => None,
        };
        if kind == ObjectKind::VertexArray {
            self.bound_vertex_array = Some(id);
        }

        self.objects.insert(
            id,
            Object {
                kind,
                vertex_array,
                pixels: None,
            },
        );
        self.record(Command::Create { id, kind });
        log::debug!("headless: created {kind:?} {id}");
        Ok(id)
    }

    fn destroy(&mut self, id: u64) {
        let Some(object) = self.objects.remove(&id) else {
            log::error!("headless: destroy of unknown object {id}");
            return;
        };
        match object.kind {
            ObjectKind::VertexArray if self.bound_vertex_array == Some(id) => {
                self.bound_vertex_array = None;
            }
            ObjectKind::Shader => {
                self.uniforms.remove(&id);
                if self.bound_shader == Some(id) {
                    self.bound_shader = None;
                }
            }
            ObjectKind::Texture => self.bound_textures.retain(|_, bound| *bound != id),
            _ => {}
        }
        self.record(Command::Destroy {
            id,
            kind: object.kind,
        });
        log::debug!("headless: destroyed {:?} {id}", object.kind);
    }

    fn is_kind(&self, id: u64, kind: ObjectKind) -> bool {
        self.objects.get(&id).is_some_and(|o| o.kind == kind)
    }
}

/// Shared handle to one headless device. Clones see the same state.
#[derive(Clone, Default)]
pub struct HeadlessDevice {
    state: Rc<RefCell<DeviceState>>,
}

impl HeadlessDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a full graphics context backed by this device.
    pub fn create_context(&self, bus: &EventBus) -> GraphicsContext {
        GraphicsContext::new(
            RenderApi::Headless,
            Box::new(self.allocator()),
            Box::new(self.render_state()),
            Box::new(self.render_backend()),
            Box::new(self.shader_state()),
            bus,
        )
    }

    pub fn allocator(&self) -> HeadlessAllocator {
        HeadlessAllocator {
            state: self.state.clone(),
        }
    }

    pub fn render_state(&self) -> HeadlessRenderState {
        HeadlessRenderState {
            state: self.state.clone(),
        }
    }

    pub fn render_backend(&self) -> HeadlessRenderBackend {
        HeadlessRenderBackend {
            state: self.state.clone(),
        }
    }

    pub fn shader_state(&self) -> HeadlessShaderState {
        HeadlessShaderState {
            state: self.state.clone(),
        }
    }

    /// Makes the next `create_*` call fail with `reason`.
    pub fn fail_next_creation(&self, reason: impl Into<String>) {
        self.state.borrow_mut().pending_failure = Some(reason.into());
    }

    /// The most recent commands, oldest first. At most
    /// [`MAX_RECORDED_COMMANDS`] are kept.
    pub fn commands(&self) -> Vec<Command> {
        self.state.borrow().commands.iter().cloned().collect()
    }

    /// Drains the command log.
    pub fn take_commands(&self) -> Vec<Command> {
        self.state.borrow_mut().commands.drain(..).collect()
    }

    pub fn clear_commands(&self) {
        self.state.borrow_mut().commands.clear();
    }

    pub fn live_count(&self) -> usize {
        self.state.borrow().objects.len()
    }

    pub fn kind_of(&self, id: u64) -> Option<ObjectKind> {
        self.state.borrow().objects.get(&id).map(|o| o.kind)
    }

    /// Vertex array a buffer was attached to on creation.
    pub fn vertex_array_of(&self, buffer: u64) -> Option<u64> {
        self.state
            .borrow()
            .objects
            .get(&buffer)
            .and_then(|o| o.vertex_array)
    }

    pub fn texture_pixels(&self, id: u64) -> Option<Vec<u8>> {
        self.state
            .borrow()
            .objects
            .get(&id)
            .and_then(|o| o.pixels.clone())
    }

    pub fn bound_vertex_array(&self) -> Option<u64> {
        self.state.borrow().bound_vertex_array
    }

    pub fn bound_shader(&self) -> Option<u64> {
        self.state.borrow().bound_shader
    }

    pub fn bound_texture(&self, slot: u32) -> Option<u64> {
        self.state.borrow().bound_textures.get(&slot).copied()
    }

    /// Pipeline state as last pushed through [`RenderStateBackend`].
    pub fn pipeline(&self) -> StateSnapshot {
        self.state.borrow().pipeline
    }

    pub fn uniform(&self, shader: u64, name: &str) -> Option<UniformValue> {
        self.state
            .borrow()
            .uniforms
            .get(&shader)
            .and_then(|u| u.get(name))
            .copied()
    }

    pub fn viewport(&self) -> (u32, u32) {
        self.state.borrow().viewport
    }

    pub fn vsync(&self) -> bool {
        self.state.borrow().vsync
    }

    pub fn frames_presented(&self) -> u64 {
        self.state.borrow().frames_presented
    }
}

impl std::fmt::Debug for HeadlessDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("HeadlessDevice")
            .field("live_objects", &state.objects.len())
            .field("commands", &state.commands.len())
            .finish()
    }
}

pub struct HeadlessAllocator {
    state: Rc<RefCell<DeviceState>>,
}

impl HeadlessAllocator {
    fn create(&self, kind: ObjectKind) -> Result<GpuResource> {
        let creator = self.state.clone();
        let destroyer = self.state.clone();
        GpuResource::create(
            move |id| {
                *id = creator.borrow_mut().allocate(kind)?;
                Ok(())
            },
            move |id| destroyer.borrow_mut().destroy(id),
        )
    }
}

impl GpuResourceAllocator for HeadlessAllocator {
    fn create_vertex_buffer(&self, data: &VertexBufferData<'_>) -> Result<GpuResource> {
        if data.layout.is_empty() {
            log::warn!("headless: vertex buffer created without a layout");
        }
        self.create(ObjectKind::VertexBuffer)
    }

    fn create_index_buffer(&self, _data: &IndexBufferData<'_>) -> Result<GpuResource> {
        self.create(ObjectKind::IndexBuffer)
    }

    fn create_vertex_array(&self) -> Result<GpuResource> {
        self.create(ObjectKind::VertexArray)
    }

    fn create_texture(&self, _config: &TextureConfig) -> Result<GpuResource> {
        self.create(ObjectKind::Texture)
    }

    fn create_shader(&self, data: &ShaderDataGlsl) -> Result<GpuResource> {
        anyhow::ensure!(
            !data.vertex.trim().is_empty() && !data.fragment.trim().is_empty(),
            "shader {} has an empty stage",
            data.describe()
        );
        self.create(ObjectKind::Shader)
    }

    fn create_frame_buffer(&self, config: &FrameBufferResourceConfig) -> Result<GpuResource> {
        {
            let state = self.state.borrow();
            let attachments = config
                .color_attachments
                .iter()
                .flatten()
                .chain(config.depth_attachment.iter())
                .chain(config.stencil_attachment.iter());
            for attachment in attachments {
                anyhow::ensure!(
                    state.is_kind(attachment.resource, ObjectKind::Texture),
                    "frame buffer attachment {} is not a live texture",
                    attachment.resource
                );
            }
        }
        self.create(ObjectKind::FrameBuffer)
    }

    fn upload_texture_data(
        &self,
        resource: &GpuResource,
        data: &TextureResourceData<'_>,
    ) -> Result<()> {
        let id = resource.id();
        let mut state = self.state.borrow_mut();
        let object = state
            .objects
            .get_mut(&id)
            .filter(|o| o.kind == ObjectKind::Texture)
            .with_context(|| format!("upload into {id}, which is not a live texture"))?;

        let expected = data.pixel_format.byte_len(data.width, data.height);
        anyhow::ensure!(
            data.pixels.len() == expected,
            "texture upload needs {expected} bytes, got {}",
            data.pixels.len()
        );
        object.pixels = Some(data.pixels.to_vec());

        let mip_levels = if data.generate_mipmaps {
            u32::BITS - data.width.max(data.height).max(1).leading_zeros()
        } else {
            1
        };
        state.record(Command::UploadTexture {
            id,
            bytes: data.pixels.len(),
            mip_levels,
        });
        Ok(())
    }
}

pub struct HeadlessRenderState {
    state: Rc<RefCell<DeviceState>>,
}

impl HeadlessRenderState {
    fn with(&mut self, f: impl FnOnce(&mut StateSnapshot)) {
        f(&mut self.state.borrow_mut().pipeline);
    }
}

impl RenderStateBackend for HeadlessRenderState {
    fn set_clear_color(&mut self, color: Vec4) {
        self.with(|p| p.clear.color = color);
    }

    fn set_clear_depth(&mut self, depth: f32) {
        self.with(|p| p.clear.depth = depth);
    }

    fn set_clear_stencil(&mut self, stencil: i32) {
        self.with(|p| p.clear.stencil = stencil);
    }

    fn set_clear_bits(&mut self, bits: BufferClearBits) {
        self.with(|p| p.clear.bits = bits);
    }

    fn set_stencil_testing_enabled(&mut self, enabled: bool) {
        self.with(|p| p.stencil.enabled = enabled);
    }

    fn set_stencil_parameters(&mut self, parameters: StencilParameters) {
        self.with(|p| p.stencil.parameters = parameters);
    }

    fn set_stencil_operations(&mut self, operations: StencilOperations) {
        self.with(|p| p.stencil.operations = operations);
    }

    fn set_depth_testing_enabled(&mut self, enabled: bool) {
        self.with(|p| p.depth.testing_enabled = enabled);
    }

    fn set_depth_writing_enabled(&mut self, enabled: bool) {
        self.with(|p| p.depth.writing_enabled = enabled);
    }

    fn set_depth_compare_function(&mut self, function: CompareFunction) {
        self.with(|p| p.depth.compare_function = function);
    }

    fn set_face_culling_mode(&mut self, mode: FaceCullingMode) {
        self.with(|p| p.cull.mode = mode);
    }

    fn set_front_face_winding(&mut self, winding: FrontFaceWinding) {
        self.with(|p| p.cull.winding = winding);
    }

    fn set_blending_enabled(&mut self, enabled: bool) {
        self.with(|p| p.blend.enabled = enabled);
    }

    fn set_blending_color(&mut self, color: Vec4) {
        self.with(|p| p.blend.color = color);
    }

    fn set_blending_factor(&mut self, source: BlendingFactor, destination: BlendingFactor) {
        self.with(|p| {
            p.blend.source = source;
            p.blend.destination = destination;
        });
    }
}

pub struct HeadlessRenderBackend {
    state: Rc<RefCell<DeviceState>>,
}

impl RenderBackend for HeadlessRenderBackend {
    fn clear(&mut self) {
        let mut state = self.state.borrow_mut();
        let clear = state.pipeline.clear;
        state.record(Command::Clear {
            color: clear.color,
            bits: clear.bits,
        });
    }

    fn draw_indexed(&mut self, index_count: u32) {
        let mut state = self.state.borrow_mut();
        let bound = state
            .bound_vertex_array
            .filter(|&id| state.is_kind(id, ObjectKind::VertexArray));
        if bound.is_none() {
            log::error!("headless: draw of {index_count} indices with no vertex array bound");
            return;
        }
        state.record(Command::DrawIndexed { index_count });
    }

    fn bind_vertex_array(&mut self, id: u64) {
        let mut state = self.state.borrow_mut();
        state.bound_vertex_array = (id != INVALID_RESOURCE_ID).then_some(id);
        state.record(Command::BindVertexArray(id));
    }

    fn bind_shader(&mut self, id: u64) {
        let mut state = self.state.borrow_mut();
        state.bound_shader = (id != INVALID_RESOURCE_ID).then_some(id);
        state.record(Command::BindShader(id));
    }

    fn bind_texture(&mut self, slot: u32, id: u64) {
        let mut state = self.state.borrow_mut();
        if id == INVALID_RESOURCE_ID {
            state.bound_textures.remove(&slot);
        } else {
            state.bound_textures.insert(slot, id);
        }
        state.record(Command::BindTexture { slot, id });
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        let mut state = self.state.borrow_mut();
        state.viewport = (width, height);
        state.record(Command::SetViewport { width, height });
    }

    fn set_vsync(&mut self, enabled: bool) {
        let mut state = self.state.borrow_mut();
        state.vsync = enabled;
        state.record(Command::SetVSync(enabled));
    }

    fn present(&mut self) {
        let mut state = self.state.borrow_mut();
        state.frames_presented += 1;
        state.record(Command::Present);
    }
}

pub struct HeadlessShaderState {
    state: Rc<RefCell<DeviceState>>,
}

impl ShaderState for HeadlessShaderState {
    fn set_uniform(&mut self, name: &str, value: UniformValue) {
        let mut state = self.state.borrow_mut();
        let Some(shader) = state.bound_shader else {
            log::warn!("headless: uniform {name} set with no shader bound; ignored");
            return;
        };
        state
            .uniforms
            .entry(shader)
            .or_default()
            .insert(name.to_string(), value);
        state.record(Command::SetUniform {
            shader,
            name: name.to_string(),
            value,
        });
    }
}
