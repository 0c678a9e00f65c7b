use bitflags::bitflags;
use glam::Vec4;

bitflags! {
    /// Buffers cleared by [`Renderer::clear`](super::Renderer::clear).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BufferClearBits: u8 {
        const COLOR = 0b0001;
        const DEPTH = 0b0010;
        const STENCIL = 0b0100;
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CompareFunction {
    Never,
    Less,
    Equal,
    LessOrEqual,
    Greater,
    NotEqual,
    GreaterOrEqual,
    Always,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum StencilOperation {
    Keep,
    Zero,
    Replace,
    Increment,
    IncrementWrap,
    Decrement,
    DecrementWrap,
    Invert,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FaceCullingMode {
    None,
    Back,
    Front,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FrontFaceWinding {
    Clockwise,
    CounterClockwise,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BlendingFactor {
    Zero,
    One,
    SourceColor,
    OneMinusSourceColor,
    DestinationColor,
    OneMinusDestinationColor,
    SourceAlpha,
    OneMinusSourceAlpha,
    DestinationAlpha,
    OneMinusDestinationAlpha,
    BlendColor,
    OneMinusBlendColor,
    BlendAlpha,
    OneMinusBlendAlpha,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ClearState {
    pub color: Vec4,
    pub depth: f32,
    pub stencil: i32,
    pub bits: BufferClearBits,
}

impl Default for ClearState {
    fn default() -> Self {
        Self {
            color: Vec4::new(0.0, 0.0, 0.0, 1.0),
            depth: 1.0,
            stencil: 0,
            bits: BufferClearBits::COLOR | BufferClearBits::DEPTH,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct StencilParameters {
    pub compare_function: CompareFunction,
    pub compare_value: i32,
    pub read_mask: u32,
    pub write_mask: u32,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct StencilOperations {
    pub stencil_fail: StencilOperation,
    pub depth_fail: StencilOperation,
    pub pass: StencilOperation,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct StencilState {
    pub enabled: bool,
    pub parameters: StencilParameters,
    pub operations: StencilOperations,
}

impl Default for StencilState {
    fn default() -> Self {
        Self {
            enabled: false,
            parameters: StencilParameters {
                compare_function: CompareFunction::Always,
                compare_value: 0,
                read_mask: 0xFF,
                write_mask: 0xFF,
            },
            operations: StencilOperations {
                stencil_fail: StencilOperation::Keep,
                depth_fail: StencilOperation::Keep,
                pass: StencilOperation::Keep,
            },
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct DepthState {
    pub testing_enabled: bool,
    pub writing_enabled: bool,
    pub compare_function: CompareFunction,
}

impl Default for DepthState {
    fn default() -> Self {
        Self {
            testing_enabled: true,
            writing_enabled: true,
            compare_function: CompareFunction::Less,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct CullState {
    pub mode: FaceCullingMode,
    pub winding: FrontFaceWinding,
}

impl Default for CullState {
    fn default() -> Self {
        Self {
            mode: FaceCullingMode::Back,
            winding: FrontFaceWinding::CounterClockwise,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct BlendState {
    pub enabled: bool,
    pub color: Vec4,
    pub source: BlendingFactor,
    pub destination: BlendingFactor,
}

impl Default for BlendState {
    fn default() -> Self {
        Self {
            enabled: false,
            color: Vec4::ZERO,
            source: BlendingFactor::SourceAlpha,
            destination: BlendingFactor::OneMinusSourceAlpha,
        }
    }
}

/// All five axes together.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct StateSnapshot {
    pub clear: ClearState,
    pub stencil: StencilState,
    pub depth: DepthState,
    pub cull: CullState,
    pub blend: BlendState,
}

/// Receives every state change [`RenderState`] accepts. Calls are
/// infallible; a backend that cannot express a value approximates it.
pub trait RenderStateBackend {
    fn set_clear_color(&mut self, color: Vec4);
    fn set_clear_depth(&mut self, depth: f32);
    fn set_clear_stencil(&mut self, stencil: i32);
    fn set_clear_bits(&mut self, bits: BufferClearBits);

    fn set_stencil_testing_enabled(&mut self, enabled: bool);
    fn set_stencil_parameters(&mut self, parameters: StencilParameters);
    fn set_stencil_operations(&mut self, operations: StencilOperations);

    fn set_depth_testing_enabled(&mut self, enabled: bool);
    fn set_depth_writing_enabled(&mut self, enabled: bool);
    fn set_depth_compare_function(&mut self, function: CompareFunction);

    fn set_face_culling_mode(&mut self, mode: FaceCullingMode);
    fn set_front_face_winding(&mut self, winding: FrontFaceWinding);

    fn set_blending_enabled(&mut self, enabled: bool);
    fn set_blending_color(&mut self, color: Vec4);
    fn set_blending_factor(&mut self, source: BlendingFactor, destination: BlendingFactor);
}

/// Cached pipeline state. Every setter normalizes its input, stores it and
/// forwards it to the backend, so the cache always matches what the backend
/// last received.
pub struct RenderState {
    backend: Box<dyn RenderStateBackend>,
    state: StateSnapshot,
}

impl RenderState {
    /// Wraps `backend` and pushes the default state to it.
    pub fn new(backend: Box<dyn RenderStateBackend>) -> Self {
        let mut state = Self {
            backend,
            state: StateSnapshot::default(),
        };
        state.reset_state_to_default_values();
        state
    }

    pub fn reset_state_to_default_values(&mut self) {
        let clear = ClearState::default();
        self.set_clear_color(clear.color);
        self.set_clear_depth(clear.depth);
        self.set_clear_stencil(clear.stencil);
        self.set_clear_bits(clear.bits);

        let stencil = StencilState::default();
        self.set_stencil_testing_enabled(stencil.enabled);
        let p = stencil.parameters;
        self.set_stencil_parameters(p.compare_function, p.compare_value, p.read_mask, p.write_mask);
        let o = stencil.operations;
        self.set_stencil_operations(o.stencil_fail, o.depth_fail, o.pass);

        let depth = DepthState::default();
        self.set_depth_testing_enabled(depth.testing_enabled);
        self.set_depth_writing_enabled(depth.writing_enabled);
        self.set_depth_compare_function(depth.compare_function);

        let cull = CullState::default();
        self.set_face_culling_mode(cull.mode);
        self.set_front_face_winding(cull.winding);

        let blend = BlendState::default();
        self.set_blending_enabled(blend.enabled);
        self.set_blending_color(blend.color);
        self.set_blending_factor(blend.source, blend.destination);
    }

    // clear

    pub fn set_clear_color(&mut self, color: Vec4) {
        let color = color.clamp(Vec4::ZERO, Vec4::ONE);
        self.state.clear.color = color;
        self.backend.set_clear_color(color);
    }

    pub fn set_clear_depth(&mut self, depth: f32) {
        let depth = depth.clamp(0.0, 1.0);
        self.state.clear.depth = depth;
        self.backend.set_clear_depth(depth);
    }

    pub fn set_clear_stencil(&mut self, stencil: i32) {
        self.state.clear.stencil = stencil;
        self.backend.set_clear_stencil(stencil);
    }

    pub fn set_clear_bits(&mut self, bits: BufferClearBits) {
        self.state.clear.bits = bits;
        self.backend.set_clear_bits(bits);
    }

    pub fn clear_color(&self) -> Vec4 {
        self.state.clear.color
    }

    pub fn clear_depth(&self) -> f32 {
        self.state.clear.depth
    }

    pub fn clear_stencil(&self) -> i32 {
        self.state.clear.stencil
    }

    pub fn clear_bits(&self) -> BufferClearBits {
        self.state.clear.bits
    }

    // stencil

    pub fn set_stencil_testing_enabled(&mut self, enabled: bool) {
        self.state.stencil.enabled = enabled;
        self.backend.set_stencil_testing_enabled(enabled);
    }

    pub fn set_stencil_parameters(
        &mut self,
        compare_function: CompareFunction,
        compare_value: i32,
        read_mask: u32,
        write_mask: u32,
    ) {
        let parameters = StencilParameters {
            compare_function,
            compare_value,
            read_mask,
            write_mask,
        };
        self.state.stencil.parameters = parameters;
        self.backend.set_stencil_parameters(parameters);
    }

    pub fn set_stencil_operations(
        &mut self,
        stencil_fail: StencilOperation,
        depth_fail: StencilOperation,
        pass: StencilOperation,
    ) {
        let operations = StencilOperations {
            stencil_fail,
            depth_fail,
            pass,
        };
        self.state.stencil.operations = operations;
        self.backend.set_stencil_operations(operations);
    }

    pub fn stencil_testing_enabled(&self) -> bool {
        self.state.stencil.enabled
    }

    pub fn stencil_compare_function(&self) -> CompareFunction {
        self.state.stencil.parameters.compare_function
    }

    pub fn stencil_compare_value(&self) -> i32 {
        self.state.stencil.parameters.compare_value
    }

    pub fn stencil_read_mask(&self) -> u32 {
        self.state.stencil.parameters.read_mask
    }

    pub fn stencil_write_mask(&self) -> u32 {
        self.state.stencil.parameters.write_mask
    }

    pub fn stencil_fail_operation(&self) -> StencilOperation {
        self.state.stencil.operations.stencil_fail
    }

    pub fn stencil_depth_fail_operation(&self) -> StencilOperation {
        self.state.stencil.operations.depth_fail
    }

    pub fn stencil_pass_operation(&self) -> StencilOperation {
        self.state.stencil.operations.pass
    }

    // depth

    pub fn set_depth_testing_enabled(&mut self, enabled: bool) {
        self.state.depth.testing_enabled = enabled;
        self.backend.set_depth_testing_enabled(enabled);
    }

    pub fn set_depth_writing_enabled(&mut self, enabled: bool) {
        self.state.depth.writing_enabled = enabled;
        self.backend.set_depth_writing_enabled(enabled);
    }

    pub fn set_depth_compare_function(&mut self, function: CompareFunction) {
        self.state.depth.compare_function = function;
        self.backend.set_depth_compare_function(function);
    }

    pub fn depth_testing_enabled(&self) -> bool {
        self.state.depth.testing_enabled
    }

    pub fn depth_writing_enabled(&self) -> bool {
        self.state.depth.writing_enabled
    }

    pub fn depth_compare_function(&self) -> CompareFunction {
        self.state.depth.compare_function
    }

    // cull

    pub fn set_face_culling_mode(&mut self, mode: FaceCullingMode) {
        self.state.cull.mode = mode;
        self.backend.set_face_culling_mode(mode);
    }

    pub fn set_front_face_winding(&mut self, winding: FrontFaceWinding) {
        self.state.cull.winding = winding;
        self.backend.set_front_face_winding(winding);
    }

    pub fn face_culling_mode(&self) -> FaceCullingMode {
        self.state.cull.mode
    }

    pub fn front_face_winding(&self) -> FrontFaceWinding {
        self.state.cull.winding
    }

    // blend

    pub fn set_blending_enabled(&mut self, enabled: bool) {
        self.state.blend.enabled = enabled;
        self.backend.set_blending_enabled(enabled);
    }

    pub fn set_blending_color(&mut self, color: Vec4) {
        let color = color.clamp(Vec4::ZERO, Vec4::ONE);
        self.state.blend.color = color;
        self.backend.set_blending_color(color);
    }

    pub fn set_blending_factor(&mut self, source: BlendingFactor, destination: BlendingFactor) {
        self.state.blend.source = source;
        self.state.blend.destination = destination;
        self.backend.set_blending_factor(source, destination);
    }

    pub fn blending_enabled(&self) -> bool {
        self.state.blend.enabled
    }

    pub fn blending_color(&self) -> Vec4 {
        self.state.blend.color
    }

    pub fn blending_factor_source(&self) -> BlendingFactor {
        self.state.blend.source
    }

    pub fn blending_factor_destination(&self) -> BlendingFactor {
        self.state.blend.destination
    }

    // grouped views

    /// Every axis at once.
    pub fn snapshot(&self) -> &StateSnapshot {
        &self.state
    }

    pub fn clear_state(&self) -> &ClearState {
        &self.state.clear
    }

    pub fn stencil_state(&self) -> &StencilState {
        &self.state.stencil
    }

    pub fn depth_state(&self) -> &DepthState {
        &self.state.depth
    }

    pub fn cull_state(&self) -> &CullState {
        &self.state.cull
    }

    pub fn blend_state(&self) -> &BlendState {
        &self.state.blend
    }
}

impl std::fmt::Debug for RenderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderState")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    /// Records the name of each backend call.
    #[derive(Clone, Default)]
    struct Recorder(Rc<RefCell<Vec<String>>>);

    impl Recorder {
        fn push(&self, call: impl Into<String>) {
            self.0.borrow_mut().push(call.into());
        }

        fn take(&self) -> Vec<String> {
            std::mem::take(&mut self.0.borrow_mut())
        }
    }

    impl RenderStateBackend for Recorder {
        fn set_clear_color(&mut self, color: Vec4) {
            self.push(format!("clear_color {color}"));
        }
        fn set_clear_depth(&mut self, depth: f32) {
            self.push(format!("clear_depth {depth}"));
        }
        fn set_clear_stencil(&mut self, stencil: i32) {
            self.push(format!("clear_stencil {stencil}"));
        }
        fn set_clear_bits(&mut self, bits: BufferClearBits) {
            self.push(format!("clear_bits {}", bits.bits()));
        }
        fn set_stencil_testing_enabled(&mut self, enabled: bool) {
            self.push(format!("stencil_test {enabled}"));
        }
        fn set_stencil_parameters(&mut self, _: StencilParameters) {
            self.push("stencil_parameters");
        }
        fn set_stencil_operations(&mut self, _: StencilOperations) {
            self.push("stencil_operations");
        }
        fn set_depth_testing_enabled(&mut self, enabled: bool) {
            self.push(format!("depth_test {enabled}"));
        }
        fn set_depth_writing_enabled(&mut self, enabled: bool) {
            self.push(format!("depth_write {enabled}"));
        }
        fn set_depth_compare_function(&mut self, function: CompareFunction) {
            self.push(format!("depth_func {function:?}"));
        }
        fn set_face_culling_mode(&mut self, mode: FaceCullingMode) {
            self.push(format!("cull {mode:?}"));
        }
        fn set_front_face_winding(&mut self, winding: FrontFaceWinding) {
            self.push(format!("winding {winding:?}"));
        }
        fn set_blending_enabled(&mut self, enabled: bool) {
            self.push(format!("blend {enabled}"));
        }
        fn set_blending_color(&mut self, _: Vec4) {
            self.push("blend_color");
        }
        fn set_blending_factor(&mut self, source: BlendingFactor, destination: BlendingFactor) {
            self.push(format!("blend_factor {source:?} {destination:?}"));
        }
    }

    fn state() -> (RenderState, Recorder) {
        let recorder = Recorder::default();
        let state = RenderState::new(Box::new(recorder.clone()));
        (state, recorder)
    }

    #[test]
    fn new_pushes_every_default_once() {
        let (state, recorder) = state();
        assert_eq!(recorder.take().len(), 15);

        assert_eq!(state.clear_color(), Vec4::new(0.0, 0.0, 0.0, 1.0));
        assert_eq!(state.clear_depth(), 1.0);
        assert_eq!(state.clear_bits(), BufferClearBits::COLOR | BufferClearBits::DEPTH);
        assert!(!state.stencil_testing_enabled());
        assert_eq!(state.stencil_compare_function(), CompareFunction::Always);
        assert_eq!(state.stencil_read_mask(), 0xFF);
        assert_eq!(state.stencil_write_mask(), 0xFF);
        assert!(state.depth_testing_enabled());
        assert!(state.depth_writing_enabled());
        assert_eq!(state.depth_compare_function(), CompareFunction::Less);
        assert_eq!(state.face_culling_mode(), FaceCullingMode::Back);
        assert_eq!(state.front_face_winding(), FrontFaceWinding::CounterClockwise);
        assert!(!state.blending_enabled());
        assert_eq!(state.blending_color(), Vec4::ZERO);
        assert_eq!(state.blending_factor_source(), BlendingFactor::SourceAlpha);
        assert_eq!(state.blending_factor_destination(), BlendingFactor::OneMinusSourceAlpha);
    }

    #[test]
    fn colors_and_depth_are_clamped_before_forwarding() {
        let (mut state, recorder) = state();
        recorder.take();

        state.set_clear_color(Vec4::new(2.0, -1.0, 0.5, 1.5));
        state.set_clear_depth(3.0);
        state.set_blending_color(Vec4::splat(-4.0));

        assert_eq!(state.clear_color(), Vec4::new(1.0, 0.0, 0.5, 1.0));
        assert_eq!(state.clear_depth(), 1.0);
        assert_eq!(state.blending_color(), Vec4::ZERO);
        assert_eq!(
            recorder.take(),
            vec!["clear_color [1, 0, 0.5, 1]", "clear_depth 1", "blend_color"]
        );
    }

    #[test]
    fn getters_follow_latest_setter_across_axes() {
        let (mut state, _recorder) = state();

        state.set_depth_compare_function(CompareFunction::GreaterOrEqual);
        state.set_face_culling_mode(FaceCullingMode::None);
        state.set_stencil_parameters(CompareFunction::Equal, 3, 0x0F, 0xF0);
        state.set_depth_compare_function(CompareFunction::Never);
        state.set_stencil_operations(
            StencilOperation::Zero,
            StencilOperation::Replace,
            StencilOperation::Invert,
        );
        state.set_blending_factor(BlendingFactor::One, BlendingFactor::Zero);

        assert_eq!(state.depth_compare_function(), CompareFunction::Never);
        assert_eq!(state.face_culling_mode(), FaceCullingMode::None);
        assert_eq!(state.stencil_compare_function(), CompareFunction::Equal);
        assert_eq!(state.stencil_compare_value(), 3);
        assert_eq!(state.stencil_read_mask(), 0x0F);
        assert_eq!(state.stencil_write_mask(), 0xF0);
        assert_eq!(state.stencil_fail_operation(), StencilOperation::Zero);
        assert_eq!(state.stencil_depth_fail_operation(), StencilOperation::Replace);
        assert_eq!(state.stencil_pass_operation(), StencilOperation::Invert);
        assert_eq!(state.blending_factor_source(), BlendingFactor::One);
    }

    #[test]
    fn reset_reapplies_defaults() {
        let (mut state, recorder) = state();
        state.set_blending_enabled(true);
        state.set_clear_bits(BufferClearBits::STENCIL);
        recorder.take();

        state.reset_state_to_default_values();

        assert!(!state.blending_enabled());
        assert_eq!(state.clear_bits(), BufferClearBits::COLOR | BufferClearBits::DEPTH);
        let calls = recorder.take();
        assert_eq!(calls.len(), 15);
        assert!(calls.contains(&"blend false".to_string()));
    }

    #[test]
    fn empty_clear_bits_are_allowed() {
        let (mut state, _recorder) = state();
        state.set_clear_bits(BufferClearBits::empty());
        assert!(state.clear_bits().is_empty());
    }
}
