//! Render pipelines built from a shader, a vertex array and the
//! fixed-function state at draw time.

use anyhow::{Context, Result};

use crate::render::{
    BlendingFactor, CompareFunction, CullState, DepthState, StateSnapshot, StencilState,
};
use crate::resource::VertexBufferLayout;

use super::context::{DEPTH_FORMAT, validated};
use super::convert;
use super::registry::Registry;

/// Everything a pipeline is specialised on. The stencil reference is set
/// per draw, so its value is not part of the key.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub(super) struct PipelineKey {
    pub shader: u64,
    pub vertex_array: u64,
    pub depth: DepthState,
    pub stencil: StencilState,
    pub cull: CullState,
    pub blend: Option<(BlendingFactor, BlendingFactor)>,
}

impl PipelineKey {
    pub fn new(shader: u64, vertex_array: u64, state: &StateSnapshot) -> Self {
        let depth = if state.depth.testing_enabled {
            state.depth
        } else {
            DepthState {
                testing_enabled: false,
                writing_enabled: false,
                compare_function: CompareFunction::Always,
            }
        };

        let stencil = if state.stencil.enabled {
            let mut stencil = state.stencil;
            stencil.parameters.compare_value = 0;
            stencil
        } else {
            StencilState::default()
        };

        Self {
            shader,
            vertex_array,
            depth,
            stencil,
            cull: state.cull,
            blend: state
                .blend
                .enabled
                .then_some((state.blend.source, state.blend.destination)),
        }
    }
}

/// Attributes for each buffer of a vertex array. Locations count up across
/// buffers in attachment order; matrices take one location per column.
pub(super) fn vertex_attributes(layouts: &[&VertexBufferLayout]) -> Result<Vec<Vec<wgpu::VertexAttribute>>> {
    let mut location = 0;
    let mut out = Vec::with_capacity(layouts.len());
    for layout in layouts {
        let mut attributes = Vec::new();
        for element in layout.iter() {
            let mut offset = u64::from(element.offset);
            for format in convert::vertex_formats(element.data_type)? {
                attributes.push(wgpu::VertexAttribute {
                    format,
                    offset,
                    shader_location: location,
                });
                location += 1;
                offset += format.size();
            }
        }
        out.push(attributes);
    }
    Ok(out)
}

pub(super) fn depth_stencil_state(key: &PipelineKey) -> wgpu::DepthStencilState {
    let stencil = if key.stencil.enabled {
        let face = wgpu::StencilFaceState {
            compare: convert::compare_function(key.stencil.parameters.compare_function),
            fail_op: convert::stencil_operation(key.stencil.operations.stencil_fail),
            depth_fail_op: convert::stencil_operation(key.stencil.operations.depth_fail),
            pass_op: convert::stencil_operation(key.stencil.operations.pass),
        };
        wgpu::StencilState {
            front: face,
            back: face,
            read_mask: key.stencil.parameters.read_mask,
            write_mask: key.stencil.parameters.write_mask,
        }
    } else {
        wgpu::StencilState::default()
    };

    wgpu::DepthStencilState {
        format: DEPTH_FORMAT,
        depth_write_enabled: key.depth.testing_enabled && key.depth.writing_enabled,
        depth_compare: convert::compare_function(key.depth.compare_function),
        stencil,
        bias: wgpu::DepthBiasState::default(),
    }
}

fn blend_state(key: &PipelineKey) -> Option<wgpu::BlendState> {
    key.blend.map(|(source, destination)| {
        let component = wgpu::BlendComponent {
            src_factor: convert::blend_factor(source),
            dst_factor: convert::blend_factor(destination),
            operation: wgpu::BlendOperation::Add,
        };
        wgpu::BlendState {
            color: component,
            alpha: component,
        }
    })
}

pub(super) fn build(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    format: wgpu::TextureFormat,
    registry: &Registry,
    key: &PipelineKey,
) -> Result<wgpu::RenderPipeline> {
    let shader = registry
        .shader(key.shader)
        .with_context(|| format!("shader {} is not live", key.shader))?;
    let vertex_array = registry
        .vertex_array(key.vertex_array)
        .with_context(|| format!("vertex array {} is not live", key.vertex_array))?;

    let layouts = vertex_array
        .vertex_buffers
        .iter()
        .map(|&id| {
            registry
                .vertex_buffer(id)
                .map(|b| &b.layout)
                .with_context(|| format!("vertex buffer {id} is not live"))
        })
        .collect::<Result<Vec<_>>>()?;
    let attributes = vertex_attributes(&layouts)?;
    let buffers: Vec<wgpu::VertexBufferLayout<'_>> = layouts
        .iter()
        .zip(&attributes)
        .map(|(layout, attributes)| wgpu::VertexBufferLayout {
            array_stride: u64::from(layout.stride()),
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes,
        })
        .collect();

    log::debug!(
        "wgpu: building pipeline for shader {} / vertex array {}",
        key.shader,
        key.vertex_array
    );

    validated(device, "render pipeline", || {
        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("jerboa pipeline"),
            layout: Some(layout),
            vertex: wgpu::VertexState {
                module: &shader.compiled.vertex,
                entry_point: Some("main"),
                compilation_options: Default::default(),
                buffers: &buffers,
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader.compiled.fragment,
                entry_point: Some("main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: blend_state(key),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: convert::front_face(key.cull.winding),
                cull_mode: convert::cull_mode(key.cull.mode),
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(depth_stencil_state(key)),
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::FaceCullingMode;
    use crate::resource::ShaderDataType;

    #[test]
    fn locations_continue_across_buffers() {
        let positions: VertexBufferLayout =
            [ShaderDataType::Float3, ShaderDataType::Float2].into_iter().collect();
        let instances: VertexBufferLayout = [ShaderDataType::Mat4].into_iter().collect();

        let attributes = vertex_attributes(&[&positions, &instances]).unwrap();

        let locations: Vec<Vec<u32>> = attributes
            .iter()
            .map(|a| a.iter().map(|v| v.shader_location).collect())
            .collect();
        assert_eq!(locations, vec![vec![0, 1], vec![2, 3, 4, 5]]);
        assert_eq!(attributes[0][1].offset, 12);
        assert_eq!(attributes[1][3].offset, 48);
    }

    #[test]
    fn bool_attribute_fails() {
        let layout: VertexBufferLayout = [ShaderDataType::Bool].into_iter().collect();
        assert!(vertex_attributes(&[&layout]).is_err());
    }

    #[test]
    fn stencil_reference_does_not_split_pipelines() {
        let mut state = StateSnapshot::default();
        state.stencil.enabled = true;
        state.stencil.parameters.compare_value = 1;
        let a = PipelineKey::new(1, 2, &state);
        state.stencil.parameters.compare_value = 7;
        let b = PipelineKey::new(1, 2, &state);
        assert_eq!(a, b);
    }

    #[test]
    fn disabled_depth_test_always_passes_without_writes() {
        let mut state = StateSnapshot::default();
        state.depth.testing_enabled = false;
        let key = PipelineKey::new(1, 2, &state);
        let depth = depth_stencil_state(&key);
        assert_eq!(depth.depth_compare, wgpu::CompareFunction::Always);
        assert!(!depth.depth_write_enabled);
    }

    #[test]
    fn blending_and_culling_enter_the_key() {
        let mut state = StateSnapshot::default();
        let opaque = PipelineKey::new(1, 2, &state);
        assert_eq!(opaque.blend, None);

        state.blend.enabled = true;
        state.cull.mode = FaceCullingMode::None;
        let blended = PipelineKey::new(1, 2, &state);
        assert_eq!(
            blended.blend,
            Some((BlendingFactor::SourceAlpha, BlendingFactor::OneMinusSourceAlpha))
        );
        assert_ne!(opaque, blended);
    }
}
