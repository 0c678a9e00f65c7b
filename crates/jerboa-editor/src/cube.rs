use glam::Vec3;
use jerboa_engine::resource::{
    IndexBufferData, PixelFormat, ShaderDataType, TextureData, VertexBufferData,
    VertexBufferLayout, VertexBufferUsage,
};

/// Position (xyz) followed by texture coordinates (uv).
pub type Vertex = [f32; 5];

/// Outward normal, then the face's u and v axes with `u × v == normal`, so
/// each face winds counter-clockwise seen from outside.
const FACES: [(Vec3, Vec3, Vec3); 6] = [
    (Vec3::X, Vec3::NEG_Z, Vec3::Y),
    (Vec3::NEG_X, Vec3::Z, Vec3::Y),
    (Vec3::Y, Vec3::X, Vec3::NEG_Z),
    (Vec3::NEG_Y, Vec3::X, Vec3::Z),
    (Vec3::Z, Vec3::X, Vec3::Y),
    (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
];

/// Unit cube centred on the origin, four vertices per face.
pub struct CubeGeometry {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl CubeGeometry {
    pub fn new() -> Self {
        let mut vertices = Vec::with_capacity(FACES.len() * 4);
        let mut indices = Vec::with_capacity(FACES.len() * 6);

        for (normal, u, v) in FACES {
            let base = vertices.len() as u32;
            for (s, t) in [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)] {
                let p = normal * 0.5 + u * (s - 0.5) + v * (t - 0.5);
                vertices.push([p.x, p.y, p.z, s, t]);
            }
            indices.extend([base, base + 1, base + 2, base + 2, base + 3, base]);
        }

        Self { vertices, indices }
    }

    pub fn layout() -> VertexBufferLayout {
        [ShaderDataType::Float3, ShaderDataType::Float2]
            .into_iter()
            .collect()
    }

    pub fn vertex_data(&self) -> VertexBufferData<'_> {
        VertexBufferData::from_slice(&self.vertices, Self::layout(), VertexBufferUsage::Static)
    }

    pub fn index_data(&self) -> anyhow::Result<IndexBufferData<'_>> {
        IndexBufferData::new(&self.indices)
    }
}

/// Two-tone RGB checkerboard of `cells × cells` squares.
pub fn checkerboard(size: u32, cells: u32) -> anyhow::Result<TextureData> {
    anyhow::ensure!(cells > 0 && size >= cells, "cannot split {size} pixels into {cells} cells");
    let cell = size / cells;
    let mut pixels = Vec::with_capacity((size * size * 3) as usize);
    for y in 0..size {
        for x in 0..size {
            let light = ((x / cell) + (y / cell)) % 2 == 0;
            pixels.extend(if light { [230, 226, 214] } else { [72, 84, 104] });
        }
    }
    TextureData::new(size, size, PixelFormat::Rgb, pixels)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(v: &Vertex) -> Vec3 {
        Vec3::new(v[0], v[1], v[2])
    }

    #[test]
    fn every_triangle_faces_outward() {
        let cube = CubeGeometry::new();
        assert_eq!(cube.vertices.len(), 24);
        assert_eq!(cube.indices.len(), 36);

        for tri in cube.indices.chunks_exact(3) {
            let [a, b, c] = [0, 1, 2].map(|i| position(&cube.vertices[tri[i] as usize]));
            let normal = (b - a).cross(c - a);
            let centroid = (a + b + c) / 3.0;
            assert!(normal.dot(centroid) > 0.0, "triangle {tri:?} winds inward");
        }
    }

    #[test]
    fn corners_sit_on_the_unit_cube() {
        let cube = CubeGeometry::new();
        for v in &cube.vertices {
            assert_eq!(position(v).abs().max_element(), 0.5);
            assert!((0.0..=1.0).contains(&v[3]) && (0.0..=1.0).contains(&v[4]));
        }
    }

    #[test]
    fn layout_matches_vertex_size() {
        assert_eq!(
            CubeGeometry::layout().stride() as usize,
            std::mem::size_of::<Vertex>()
        );
        assert_eq!(CubeGeometry::new().vertex_data().vertex_count(), 24);
    }

    #[test]
    fn checkerboard_alternates_cells() {
        let data = checkerboard(4, 2).unwrap();
        assert_eq!(data.width(), 4);
        assert_eq!(data.pixel_format(), PixelFormat::Rgb);
        let pixel = |x: usize, y: usize| &data.pixels()[(y * 4 + x) * 3..][..3];
        assert_eq!(pixel(0, 0), pixel(1, 1));
        assert_ne!(pixel(0, 0), pixel(2, 0));
        assert_eq!(pixel(0, 0), pixel(2, 2));
    }

    #[test]
    fn checkerboard_rejects_more_cells_than_pixels() {
        assert!(checkerboard(2, 4).is_err());
        assert!(checkerboard(8, 0).is_err());
    }
}
