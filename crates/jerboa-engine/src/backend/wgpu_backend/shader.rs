//! GLSL compilation through naga, plus uniform-block reflection.
//!
//! Shaders see uniforms through one block at `set = 0, binding = 0` and the
//! texture of slot 0 at `set = 1` (texture at binding 0, sampler at 1):
//!
//! ```glsl
//! layout(set = 0, binding = 0) uniform Uniforms { mat4 u_ViewProjection; mat4 u_Model; };
//! layout(set = 1, binding = 0) uniform texture2D u_Texture;
//! layout(set = 1, binding = 1) uniform sampler u_Sampler;
//! ```

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};

use anyhow::{Result, anyhow};
use wgpu::naga;

use crate::render::UniformValue;
use crate::resource::{ShaderDataGlsl, ShaderStage};

use super::context::validated;

pub(super) const UNIFORM_GROUP: u32 = 0;
pub(super) const TEXTURE_GROUP: u32 = 1;

/// Shape of one uniform-block member.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(super) enum FieldKind {
    Bool,
    Int,
    Uint,
    Float,
    Vec(u32),
    IVec(u32),
    Mat { columns: u32, rows: u32 },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(super) struct UniformField {
    pub offset: u32,
    pub kind: FieldKind,
}

/// What the pipeline needs to know about a shader's resource interface.
#[derive(Debug, Clone, Default, PartialEq)]
pub(super) struct ShaderReflection {
    pub fields: HashMap<String, UniformField>,
    pub uniform_size: u32,
    pub uses_texture: bool,
}

/// CPU copy of a shader's uniform block.
#[derive(Debug)]
pub(super) struct UniformBlock {
    fields: HashMap<String, UniformField>,
    data: Vec<u8>,
    warned: HashSet<String>,
}

impl UniformBlock {
    pub fn new(reflection: &ShaderReflection) -> Self {
        Self {
            fields: reflection.fields.clone(),
            data: vec![0; reflection.uniform_size as usize],
            warned: HashSet::new(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Writes `value` into the named member. Unknown names and type
    /// mismatches are logged once per name and ignored.
    pub fn set(&mut self, name: &str, value: UniformValue) {
        let Some(field) = self.fields.get(name).copied() else {
            if self.warned.insert(name.to_string()) {
                log::warn!("wgpu: shader has no uniform named {name}");
            }
            return;
        };
        let Some(bytes) = encode(&value, field.kind) else {
            if self.warned.insert(name.to_string()) {
                log::warn!(
                    "wgpu: uniform {name} is {:?}, cannot assign a {}",
                    field.kind,
                    value.type_name()
                );
            }
            return;
        };
        let start = field.offset as usize;
        match self.data.get_mut(start..start + bytes.len()) {
            Some(slot) => slot.copy_from_slice(&bytes),
            None => log::error!("wgpu: uniform {name} lies outside its block"),
        }
    }
}

/// A compiled program: one module per stage and its reflection.
#[derive(Debug)]
pub(super) struct CompiledShader {
    pub vertex: wgpu::ShaderModule,
    pub fragment: wgpu::ShaderModule,
    pub reflection: ShaderReflection,
}

pub(super) fn compile(device: &wgpu::Device, data: &ShaderDataGlsl) -> Result<CompiledShader> {
    let reflection = reflect(data)?;
    let label = data.describe();

    let module = |source: &str, stage: naga::ShaderStage| {
        device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label.as_str()),
            source: wgpu::ShaderSource::Glsl {
                shader: Cow::Owned(source.to_string()),
                stage,
                defines: Default::default(),
            },
        })
    };

    let (vertex, fragment) = validated(device, &label, || {
        (
            module(&data.vertex, naga::ShaderStage::Vertex),
            module(&data.fragment, naga::ShaderStage::Fragment),
        )
    })?;
    Ok(CompiledShader {
        vertex,
        fragment,
        reflection,
    })
}

/// Parses and validates both stages and collects their uniform interface.
pub(super) fn reflect(data: &ShaderDataGlsl) -> Result<ShaderReflection> {
    anyhow::ensure!(
        data.geometry.is_none(),
        "geometry shaders are not supported by the wgpu backend ({})",
        data.describe()
    );

    let mut reflection = ShaderReflection::default();
    for stage in [ShaderStage::Vertex, ShaderStage::Fragment] {
        let source = data.source(stage).unwrap_or_default();
        let module = parse(source, stage)?;
        collect(&module, stage, &mut reflection)?;
    }
    Ok(reflection)
}

fn parse(source: &str, stage: ShaderStage) -> Result<naga::Module> {
    let naga_stage = match stage {
        ShaderStage::Vertex => naga::ShaderStage::Vertex,
        ShaderStage::Fragment => naga::ShaderStage::Fragment,
        ShaderStage::Geometry => anyhow::bail!("geometry shaders are not supported by the wgpu backend"),
    };

    let mut frontend = naga::front::glsl::Frontend::default();
    let module = frontend
        .parse(&naga::front::glsl::Options::from(naga_stage), source)
        .map_err(|e| anyhow!("{stage} shader failed to compile:\n{}", e.emit_to_string(source)))?;

    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::default(),
    )
    .validate(&module)
    .map_err(|e| anyhow!("{stage} shader failed validation:\n{}", e.emit_to_string(source)))?;

    Ok(module)
}

fn collect(module: &naga::Module, stage: ShaderStage, out: &mut ShaderReflection) -> Result<()> {
    for (_, var) in module.global_variables.iter() {
        let Some(binding) = &var.binding else { continue };
        let name = var.name.as_deref().unwrap_or("<unnamed>");

        match (binding.group, var.space) {
            (UNIFORM_GROUP, naga::AddressSpace::Uniform) => {
                anyhow::ensure!(
                    binding.binding == 0,
                    "{stage} shader: uniform block {name} must use binding 0"
                );
                let ty = &module.types[var.ty];
                match &ty.inner {
                    naga::TypeInner::Struct { members, span } => {
                        out.uniform_size = out.uniform_size.max(*span);
                        for member in members {
                            let Some(member_name) = &member.name else { continue };
                            match field_kind(&module.types[member.ty].inner) {
                                Some(kind) => {
                                    out.fields.insert(
                                        member_name.clone(),
                                        UniformField {
                                            offset: member.offset,
                                            kind,
                                        },
                                    );
                                }
                                None => log::debug!(
                                    "wgpu: uniform {member_name} has a type uniforms cannot set"
                                ),
                            }
                        }
                    }
                    other => anyhow::bail!(
                        "{stage} shader: uniform {name} must be a block, found {other:?}"
                    ),
                }
            }
            (TEXTURE_GROUP, naga::AddressSpace::Handle) => {
                anyhow::ensure!(
                    binding.binding <= 1,
                    "{stage} shader: {name} uses set 1 binding {}, only 0 (texture) and 1 (sampler) exist",
                    binding.binding
                );
                out.uses_texture = true;
            }
            (group, space) => anyhow::bail!(
                "{stage} shader: {name} ({space:?}) is bound to set {group}, which the engine does not provide"
            ),
        }
    }
    Ok(())
}

fn field_kind(inner: &naga::TypeInner) -> Option<FieldKind> {
    match inner {
        naga::TypeInner::Scalar(scalar) => match scalar.kind {
            naga::ScalarKind::Bool => Some(FieldKind::Bool),
            naga::ScalarKind::Sint => Some(FieldKind::Int),
            naga::ScalarKind::Uint => Some(FieldKind::Uint),
            naga::ScalarKind::Float => Some(FieldKind::Float),
            _ => None,
        },
        naga::TypeInner::Vector { size, scalar } => match scalar.kind {
            naga::ScalarKind::Float => Some(FieldKind::Vec(*size as u32)),
            naga::ScalarKind::Sint => Some(FieldKind::IVec(*size as u32)),
            _ => None,
        },
        naga::TypeInner::Matrix { columns, rows, .. } => Some(FieldKind::Mat {
            columns: *columns as u32,
            rows: *rows as u32,
        }),
        _ => None,
    }
}

/// Bytes for `value` laid out as a member of kind `kind`, or `None` when
/// the types do not match.
pub(super) fn encode(value: &UniformValue, kind: FieldKind) -> Option<Vec<u8>> {
    let floats = |values: &[f32]| bytemuck::cast_slice::<f32, u8>(values).to_vec();

    match (*value, kind) {
        (UniformValue::Bool(b), FieldKind::Bool | FieldKind::Int | FieldKind::Uint) => {
            Some(u32::from(b).to_le_bytes().to_vec())
        }
        (UniformValue::Int(i), FieldKind::Int) => Some(i.to_le_bytes().to_vec()),
        (UniformValue::Int(i), FieldKind::Uint) if i >= 0 => Some((i as u32).to_le_bytes().to_vec()),
        (UniformValue::Float(f), FieldKind::Float) => Some(f.to_le_bytes().to_vec()),
        (UniformValue::Vec2(v), FieldKind::Vec(2)) => Some(floats(&v.to_array())),
        (UniformValue::Vec3(v), FieldKind::Vec(3)) => Some(floats(&v.to_array())),
        (UniformValue::Vec4(v), FieldKind::Vec(4)) => Some(floats(&v.to_array())),
        (UniformValue::Mat2(m), FieldKind::Mat { columns: 2, rows: 2 }) => {
            Some(matrix(&m.to_cols_array(), 2))
        }
        (UniformValue::Mat3(m), FieldKind::Mat { columns: 3, rows: 3 }) => {
            Some(matrix(&m.to_cols_array(), 3))
        }
        (UniformValue::Mat4(m), FieldKind::Mat { columns: 4, rows: 4 }) => {
            Some(matrix(&m.to_cols_array(), 4))
        }
        _ => None,
    }
}

/// Column-major matrix with the column stride naga uses: 8 bytes for
/// two-row columns, 16 otherwise.
fn matrix(columns: &[f32], rows: usize) -> Vec<u8> {
    let stride = if rows == 2 { 2 } else { 4 };
    let mut padded = vec![0.0f32; columns.len() / rows * stride];
    for (c, column) in columns.chunks(rows).enumerate() {
        padded[c * stride..c * stride + rows].copy_from_slice(column);
    }
    bytemuck::cast_slice(&padded).to_vec()
}

#[cfg(test)]
mod tests {
    use glam::{Mat3, Vec2, Vec3};

    use super::*;

    fn floats(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    const VERTEX: &str = "#version 450
layout(location = 0) in vec3 a_Position;
layout(location = 1) in vec2 a_TexCoord;
layout(location = 0) out vec2 v_TexCoord;
layout(set = 0, binding = 0) uniform Uniforms {
    mat4 u_ViewProjection;
    vec3 u_Tint;
    float u_Strength;
};
void main() {
    v_TexCoord = a_TexCoord;
    gl_Position = u_ViewProjection * vec4(a_Position * u_Strength, 1.0);
}
";

    const FRAGMENT: &str = "#version 450
layout(location = 0) in vec2 v_TexCoord;
layout(location = 0) out vec4 o_Color;
layout(set = 1, binding = 0) uniform texture2D u_Texture;
layout(set = 1, binding = 1) uniform sampler u_Sampler;
void main() {
    o_Color = texture(sampler2D(u_Texture, u_Sampler), v_TexCoord);
}
";

    #[test]
    fn reflection_finds_block_members_and_texture() {
        let reflection = reflect(&ShaderDataGlsl::new(VERTEX, FRAGMENT)).unwrap();

        assert!(reflection.uses_texture);
        let vp = reflection.fields["u_ViewProjection"];
        assert_eq!(vp.offset, 0);
        assert_eq!(vp.kind, FieldKind::Mat { columns: 4, rows: 4 });
        assert_eq!(reflection.fields["u_Tint"].offset, 64);
        assert_eq!(reflection.fields["u_Tint"].kind, FieldKind::Vec(3));
        assert_eq!(reflection.fields["u_Strength"].offset, 76);
        assert!(reflection.uniform_size >= 80);
    }

    #[test]
    fn geometry_stage_is_rejected() {
        let data = ShaderDataGlsl::new(VERTEX, FRAGMENT).with_geometry("void main() {}");
        let err = reflect(&data).unwrap_err();
        assert!(err.to_string().contains("geometry shaders are not supported"));
    }

    #[test]
    fn syntax_errors_name_the_stage() {
        let err = reflect(&ShaderDataGlsl::new(VERTEX, "#version 450\nvoid main( {")).unwrap_err();
        assert!(err.to_string().starts_with("fragment shader failed to compile"));
    }

    #[test]
    fn uniform_block_writes_at_reflected_offsets() {
        let reflection = reflect(&ShaderDataGlsl::new(VERTEX, FRAGMENT)).unwrap();
        let mut block = UniformBlock::new(&reflection);

        block.set("u_Strength", UniformValue::Float(2.0));
        block.set("u_Tint", UniformValue::Vec3(Vec3::new(1.0, 0.5, 0.25)));

        assert_eq!(floats(&block.bytes()[64..80]), vec![1.0, 0.5, 0.25, 2.0]);
    }

    #[test]
    fn mismatched_uniform_type_is_ignored() {
        let reflection = reflect(&ShaderDataGlsl::new(VERTEX, FRAGMENT)).unwrap();
        let mut block = UniformBlock::new(&reflection);
        block.set("u_Strength", UniformValue::Vec2(Vec2::ONE));
        block.set("u_Missing", UniformValue::Float(1.0));
        assert!(block.bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn mat3_columns_are_padded_to_vec4() {
        let bytes = encode(
            &UniformValue::Mat3(Mat3::IDENTITY),
            FieldKind::Mat { columns: 3, rows: 3 },
        )
        .unwrap();
        let values = floats(&bytes);
        assert_eq!(values.len(), 12);
        assert_eq!(&values[4..8], &[0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn bool_is_written_as_u32() {
        assert_eq!(
            encode(&UniformValue::Bool(true), FieldKind::Int),
            Some(vec![1, 0, 0, 0])
        );
        assert_eq!(encode(&UniformValue::Int(-1), FieldKind::Uint), None);
    }
}
