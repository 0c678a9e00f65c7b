use anyhow::Result;
use bytemuck::Pod;

/// Type of one vertex attribute (or uniform) as seen by a shader.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ShaderDataType {
    Float,
    Float2,
    Float3,
    Float4,
    Mat3,
    Mat4,
    Int,
    Int2,
    Int3,
    Int4,
    Bool,
}

impl ShaderDataType {
    /// Size in bytes.
    pub const fn size(self) -> u32 {
        match self {
            ShaderDataType::Float | ShaderDataType::Int => 4,
            ShaderDataType::Float2 | ShaderDataType::Int2 => 8,
            ShaderDataType::Float3 | ShaderDataType::Int3 => 12,
            ShaderDataType::Float4 | ShaderDataType::Int4 => 16,
            ShaderDataType::Mat3 => 4 * 3 * 3,
            ShaderDataType::Mat4 => 4 * 4 * 4,
            ShaderDataType::Bool => 1,
        }
    }

    /// Number of scalar components.
    pub const fn component_count(self) -> u32 {
        match self {
            ShaderDataType::Float | ShaderDataType::Int | ShaderDataType::Bool => 1,
            ShaderDataType::Float2 | ShaderDataType::Int2 => 2,
            ShaderDataType::Float3 | ShaderDataType::Int3 => 3,
            ShaderDataType::Float4 | ShaderDataType::Int4 => 4,
            ShaderDataType::Mat3 => 3 * 3,
            ShaderDataType::Mat4 => 4 * 4,
        }
    }
}

/// One attribute inside an interleaved vertex.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct BufferElement {
    pub data_type: ShaderDataType,
    pub normalized: bool,
    /// Byte offset inside the vertex; filled in by [`VertexBufferLayout::new`].
    pub offset: u32,
}

impl BufferElement {
    pub const fn new(data_type: ShaderDataType) -> Self {
        Self {
            data_type,
            normalized: false,
            offset: 0,
        }
    }

    pub const fn normalized(data_type: ShaderDataType) -> Self {
        Self {
            data_type,
            normalized: true,
            offset: 0,
        }
    }
}

impl From<ShaderDataType> for BufferElement {
    fn from(data_type: ShaderDataType) -> Self {
        Self::new(data_type)
    }
}

/// Interleaved vertex layout with offsets and stride computed up front.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct VertexBufferLayout {
    elements: Vec<BufferElement>,
    stride: u32,
}

impl VertexBufferLayout {
    pub fn new(elements: impl IntoIterator<Item = BufferElement>) -> Self {
        let mut elements: Vec<BufferElement> = elements.into_iter().collect();
        let mut offset = 0;
        for element in &mut elements {
            element.offset = offset;
            offset += element.data_type.size();
        }
        Self {
            elements,
            stride: offset,
        }
    }

    pub fn elements(&self) -> &[BufferElement] {
        &self.elements
    }

    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BufferElement> {
        self.elements.iter()
    }
}

impl<'a> IntoIterator for &'a VertexBufferLayout {
    type Item = &'a BufferElement;
    type IntoIter = std::slice::Iter<'a, BufferElement>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

impl FromIterator<ShaderDataType> for VertexBufferLayout {
    fn from_iter<I: IntoIterator<Item = ShaderDataType>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(BufferElement::new))
    }
}

/// How often the buffer contents are expected to change.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum VertexBufferUsage {
    #[default]
    Static,
    Dynamic,
    Stream,
}

/// Vertex data to upload. Borrowed for the duration of the create call.
#[derive(Debug, Clone)]
pub struct VertexBufferData<'a> {
    pub bytes: &'a [u8],
    pub layout: VertexBufferLayout,
    pub usage: VertexBufferUsage,
}

impl<'a> VertexBufferData<'a> {
    pub fn new(bytes: &'a [u8], layout: VertexBufferLayout, usage: VertexBufferUsage) -> Self {
        Self {
            bytes,
            layout,
            usage,
        }
    }

    /// Views a slice of plain-old-data vertices (or raw floats) as bytes.
    pub fn from_slice<T: Pod>(
        vertices: &'a [T],
        layout: VertexBufferLayout,
        usage: VertexBufferUsage,
    ) -> Self {
        Self::new(bytemuck::cast_slice(vertices), layout, usage)
    }

    /// Number of whole vertices in `bytes` according to the layout stride.
    pub fn vertex_count(&self) -> usize {
        match self.layout.stride() {
            0 => 0,
            stride => self.bytes.len() / stride as usize,
        }
    }
}

/// 32-bit triangle indices to upload.
#[derive(Debug, Copy, Clone)]
pub struct IndexBufferData<'a> {
    indices: &'a [u32],
    count: u32,
}

impl<'a> IndexBufferData<'a> {
    /// Fails when there are more indices than a 32-bit count can address.
    pub fn new(indices: &'a [u32]) -> Result<Self> {
        let count = index_count(indices.len())?;
        Ok(Self { indices, count })
    }

    pub fn indices(&self) -> &'a [u32] {
        self.indices
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn bytes(&self) -> &'a [u8] {
        bytemuck::cast_slice(self.indices)
    }
}

fn index_count(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| anyhow::anyhow!("{len} indices exceed the 32-bit index count"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_computes_offsets_and_stride() {
        let layout: VertexBufferLayout =
            [ShaderDataType::Float3, ShaderDataType::Float2].into_iter().collect();

        let offsets: Vec<u32> = layout.iter().map(|e| e.offset).collect();
        assert_eq!(offsets, vec![0, 12]);
        assert_eq!(layout.stride(), 20);
    }

    #[test]
    fn normalized_flag_survives_layout() {
        let layout = VertexBufferLayout::new([
            BufferElement::new(ShaderDataType::Float3),
            BufferElement::normalized(ShaderDataType::Int4),
        ]);
        assert!(!layout.elements()[0].normalized);
        assert!(layout.elements()[1].normalized);
        assert_eq!(layout.elements()[1].offset, 12);
        assert_eq!(layout.stride(), 28);
    }

    #[test]
    fn vertex_count_uses_stride() {
        let floats = [0.0f32; 10];
        let layout: VertexBufferLayout =
            [ShaderDataType::Float3, ShaderDataType::Float2].into_iter().collect();
        let data = VertexBufferData::from_slice(&floats, layout, VertexBufferUsage::Static);
        assert_eq!(data.bytes.len(), 40);
        assert_eq!(data.vertex_count(), 2);
    }

    #[test]
    fn empty_layout_has_no_vertices() {
        let data = VertexBufferData::new(&[1, 2, 3], VertexBufferLayout::default(), VertexBufferUsage::Dynamic);
        assert_eq!(data.vertex_count(), 0);
    }

    #[test]
    fn index_data_reports_count_and_bytes() {
        let indices = [0u32, 1, 2, 2, 3, 0];
        let data = IndexBufferData::new(&indices).unwrap();
        assert_eq!(data.count(), 6);
        assert_eq!(data.bytes().len(), 24);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn index_count_past_u32_is_rejected() {
        assert_eq!(index_count(u32::MAX as usize).unwrap(), u32::MAX);
        let err = index_count(u32::MAX as usize + 1).unwrap_err();
        assert!(err.to_string().contains("exceed the 32-bit index count"));
    }
}
