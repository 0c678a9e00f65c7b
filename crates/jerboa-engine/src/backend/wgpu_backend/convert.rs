//! Engine enums to their wgpu equivalents.

use anyhow::Result;

use crate::render::{
    BlendingFactor, CompareFunction, FaceCullingMode, FrontFaceWinding, StencilOperation,
};
use crate::resource::{PixelFormat, ShaderDataType, TextureUsage};

pub(super) fn compare_function(f: CompareFunction) -> wgpu::CompareFunction {
    match f {
        CompareFunction::Never => wgpu::CompareFunction::Never,
        CompareFunction::Less => wgpu::CompareFunction::Less,
        CompareFunction::Equal => wgpu::CompareFunction::Equal,
        CompareFunction::LessOrEqual => wgpu::CompareFunction::LessEqual,
        CompareFunction::Greater => wgpu::CompareFunction::Greater,
        CompareFunction::NotEqual => wgpu::CompareFunction::NotEqual,
        CompareFunction::GreaterOrEqual => wgpu::CompareFunction::GreaterEqual,
        CompareFunction::Always => wgpu::CompareFunction::Always,
    }
}

pub(super) fn stencil_operation(op: StencilOperation) -> wgpu::StencilOperation {
    match op {
        StencilOperation::Keep => wgpu::StencilOperation::Keep,
        StencilOperation::Zero => wgpu::StencilOperation::Zero,
        StencilOperation::Replace => wgpu::StencilOperation::Replace,
        StencilOperation::Increment => wgpu::StencilOperation::IncrementClamp,
        StencilOperation::IncrementWrap => wgpu::StencilOperation::IncrementWrap,
        StencilOperation::Decrement => wgpu::StencilOperation::DecrementClamp,
        StencilOperation::DecrementWrap => wgpu::StencilOperation::DecrementWrap,
        StencilOperation::Invert => wgpu::StencilOperation::Invert,
    }
}

pub(super) fn cull_mode(mode: FaceCullingMode) -> Option<wgpu::Face> {
    match mode {
        FaceCullingMode::None => None,
        FaceCullingMode::Back => Some(wgpu::Face::Back),
        FaceCullingMode::Front => Some(wgpu::Face::Front),
    }
}

pub(super) fn front_face(winding: FrontFaceWinding) -> wgpu::FrontFace {
    match winding {
        FrontFaceWinding::Clockwise => wgpu::FrontFace::Cw,
        FrontFaceWinding::CounterClockwise => wgpu::FrontFace::Ccw,
    }
}

/// wgpu has a single blend constant, so the alpha variants read its alpha
/// channel through the same factor.
pub(super) fn blend_factor(factor: BlendingFactor) -> wgpu::BlendFactor {
    match factor {
        BlendingFactor::Zero => wgpu::BlendFactor::Zero,
        BlendingFactor::One => wgpu::BlendFactor::One,
        BlendingFactor::SourceColor => wgpu::BlendFactor::Src,
        BlendingFactor::OneMinusSourceColor => wgpu::BlendFactor::OneMinusSrc,
        BlendingFactor::DestinationColor => wgpu::BlendFactor::Dst,
        BlendingFactor::OneMinusDestinationColor => wgpu::BlendFactor::OneMinusDst,
        BlendingFactor::SourceAlpha => wgpu::BlendFactor::SrcAlpha,
        BlendingFactor::OneMinusSourceAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
        BlendingFactor::DestinationAlpha => wgpu::BlendFactor::DstAlpha,
        BlendingFactor::OneMinusDestinationAlpha => wgpu::BlendFactor::OneMinusDstAlpha,
        BlendingFactor::BlendColor | BlendingFactor::BlendAlpha => wgpu::BlendFactor::Constant,
        BlendingFactor::OneMinusBlendColor | BlendingFactor::OneMinusBlendAlpha => {
            wgpu::BlendFactor::OneMinusConstant
        }
    }
}

/// Vertex formats for one attribute. Matrices occupy one location per
/// column.
pub(super) fn vertex_formats(ty: ShaderDataType) -> Result<Vec<wgpu::VertexFormat>> {
    use wgpu::VertexFormat as F;
    Ok(match ty {
        ShaderDataType::Float => vec![F::Float32],
        ShaderDataType::Float2 => vec![F::Float32x2],
        ShaderDataType::Float3 => vec![F::Float32x3],
        ShaderDataType::Float4 => vec![F::Float32x4],
        ShaderDataType::Mat3 => vec![F::Float32x3; 3],
        ShaderDataType::Mat4 => vec![F::Float32x4; 4],
        ShaderDataType::Int => vec![F::Sint32],
        ShaderDataType::Int2 => vec![F::Sint32x2],
        ShaderDataType::Int3 => vec![F::Sint32x3],
        ShaderDataType::Int4 => vec![F::Sint32x4],
        ShaderDataType::Bool => anyhow::bail!("bool vertex attributes have no wgpu vertex format"),
    })
}

/// Sampled texture format. RGB data is widened to RGBA on upload.
pub(super) fn texture_format(format: PixelFormat, usage: TextureUsage) -> Result<wgpu::TextureFormat> {
    Ok(match usage {
        TextureUsage::DepthAttachment => wgpu::TextureFormat::Depth32Float,
        TextureUsage::StencilAttachment | TextureUsage::DepthStencilAttachment => {
            wgpu::TextureFormat::Depth24PlusStencil8
        }
        _ => match format {
            PixelFormat::Red => wgpu::TextureFormat::R8Unorm,
            PixelFormat::Rg => wgpu::TextureFormat::Rg8Unorm,
            PixelFormat::Rgb | PixelFormat::Rgba => wgpu::TextureFormat::Rgba8Unorm,
            PixelFormat::None => anyhow::bail!("color texture needs a pixel format"),
        },
    })
}

/// Channels stored per texel on the GPU for `format`.
pub(super) fn gpu_channels(format: PixelFormat) -> u32 {
    match format {
        PixelFormat::Rgb => 4,
        other => other.channels(),
    }
}

/// Full mip chain length for a `width` x `height` image.
pub(super) fn mip_level_count(width: u32, height: u32) -> u32 {
    u32::BITS - width.max(height).max(1).leading_zeros()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matrices_span_one_location_per_column() {
        assert_eq!(vertex_formats(ShaderDataType::Mat4).unwrap().len(), 4);
        assert_eq!(
            vertex_formats(ShaderDataType::Mat3).unwrap(),
            vec![wgpu::VertexFormat::Float32x3; 3]
        );
        assert!(vertex_formats(ShaderDataType::Bool).is_err());
    }

    #[test]
    fn attachment_usage_picks_depth_formats() {
        assert_eq!(
            texture_format(PixelFormat::None, TextureUsage::DepthStencilAttachment).unwrap(),
            wgpu::TextureFormat::Depth24PlusStencil8
        );
        assert_eq!(
            texture_format(PixelFormat::Rgb, TextureUsage::Diffuse).unwrap(),
            wgpu::TextureFormat::Rgba8Unorm
        );
        assert!(texture_format(PixelFormat::None, TextureUsage::Diffuse).is_err());
    }

    #[test]
    fn mip_chain_length() {
        assert_eq!(mip_level_count(1, 1), 1);
        assert_eq!(mip_level_count(256, 64), 9);
        assert_eq!(mip_level_count(300, 10), 9);
    }

    #[test]
    fn culling_none_disables_culling() {
        assert_eq!(cull_mode(FaceCullingMode::None), None);
        assert_eq!(cull_mode(FaceCullingMode::Front), Some(wgpu::Face::Front));
    }
}
