//! Mesh generation module
//!
//! CPU-side geometry for the primitive shapes props are built from. All
//! primitives are centred on the origin; callers place them afterwards with
//! [`MeshData::transform`].

use glam::{Mat4, Vec3};
use std::f32::consts::PI;

/// Vertex data structure for 3D rendering
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    pub color: [f32; 4],
}

impl Vertex {
    pub const ATTRIBS: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Float32x3,
        2 => Float32x2,
        3 => Float32x4
    ];

    pub fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            uv,
            color: [1.0; 4],
        }
    }

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

/// Mesh data containing vertices and indices
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Add a quad (two triangles) with vertices in counter-clockwise order
    pub fn add_quad(&mut self, v0: Vertex, v1: Vertex, v2: Vertex, v3: Vertex) {
        let base = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&[v0, v1, v2, v3]);
        // Two triangles: 0-1-2 and 0-2-3
        self.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    /// Add a triangle
    pub fn add_triangle(&mut self, v0: Vertex, v1: Vertex, v2: Vertex) {
        let base = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&[v0, v1, v2]);
        self.indices.extend_from_slice(&[base, base + 1, base + 2]);
    }

    /// Merge another mesh into this one, returning the index range it occupies
    pub fn merge(&mut self, other: MeshData) -> std::ops::Range<u32> {
        let base = self.vertices.len() as u32;
        let start = self.indices.len() as u32;
        self.vertices.extend(other.vertices);
        self.indices.extend(other.indices.iter().map(|i| i + base));
        start..self.indices.len() as u32
    }

    /// Bake a transform into positions and normals
    pub fn transform(&mut self, matrix: Mat4) {
        let normal_matrix = matrix.inverse().transpose();
        for v in &mut self.vertices {
            v.position = matrix.transform_point3(Vec3::from(v.position)).to_array();
            v.normal = normal_matrix
                .transform_vector3(Vec3::from(v.normal))
                .normalize_or_zero()
                .to_array();
        }
    }

    /// Axis-aligned bounds as (min, max); `None` for an empty mesh
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let mut positions = self.vertices.iter().map(|v| Vec3::from(v.position));
        let first = positions.next()?;
        Some(positions.fold((first, first), |(min, max), p| (min.min(p), max.max(p))))
    }

    /// Bounds of the vertices referenced by an index range
    pub fn range_bounds(&self, range: std::ops::Range<u32>) -> Option<(Vec3, Vec3)> {
        let indices = self.indices.get(range.start as usize..range.end as usize)?;
        let mut positions = indices
            .iter()
            .filter_map(|&i| self.vertices.get(i as usize))
            .map(|v| Vec3::from(v.position));
        let first = positions.next()?;
        Some(positions.fold((first, first), |(min, max), p| (min.min(p), max.max(p))))
    }
}

/// Create a closed cylinder centred on the origin, axis along Y
pub fn create_cylinder(diameter: f32, height: f32, segments: u32) -> MeshData {
    let mut mesh = MeshData::new();
    let radius = diameter / 2.0;
    let bottom = -height / 2.0;
    let top = height / 2.0;

    for i in 0..segments {
        let u0 = i as f32 / segments as f32;
        let u1 = (i + 1) as f32 / segments as f32;
        let angle0 = u0 * 2.0 * PI;
        let angle1 = u1 * 2.0 * PI;

        let (x0, z0) = (angle0.cos() * radius, angle0.sin() * radius);
        let (x1, z1) = (angle1.cos() * radius, angle1.sin() * radius);

        // Side face normal (pointing outward)
        let n0 = [angle0.cos(), 0.0, angle0.sin()];
        let n1 = [angle1.cos(), 0.0, angle1.sin()];

        // Side quad, wound so the outward face is counter-clockwise
        mesh.add_quad(
            Vertex::new([x0, bottom, z0], n0, [u0, 1.0]),
            Vertex::new([x0, top, z0], n0, [u0, 0.0]),
            Vertex::new([x1, top, z1], n1, [u1, 0.0]),
            Vertex::new([x1, bottom, z1], n1, [u1, 1.0]),
        );

        let cap_uv = |x: f32, z: f32| [0.5 + x / diameter, 0.5 + z / diameter];

        // Bottom cap
        mesh.add_triangle(
            Vertex::new([0.0, bottom, 0.0], [0.0, -1.0, 0.0], [0.5, 0.5]),
            Vertex::new([x0, bottom, z0], [0.0, -1.0, 0.0], cap_uv(x0, z0)),
            Vertex::new([x1, bottom, z1], [0.0, -1.0, 0.0], cap_uv(x1, z1)),
        );

        // Top cap
        mesh.add_triangle(
            Vertex::new([0.0, top, 0.0], [0.0, 1.0, 0.0], [0.5, 0.5]),
            Vertex::new([x1, top, z1], [0.0, 1.0, 0.0], cap_uv(x1, z1)),
            Vertex::new([x0, top, z0], [0.0, 1.0, 0.0], cap_uv(x0, z0)),
        );
    }

    mesh
}

/// Create a box mesh centred on the origin
///
/// Each face has its own four vertices so normals and UVs stay per-face.
pub fn create_box(width: f32, height: f32, depth: f32) -> MeshData {
    let mut mesh = MeshData::new();
    let hw = width / 2.0;
    let hh = height / 2.0;
    let hd = depth / 2.0;

    let uv = [[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]];
    let mut face = |corners: [[f32; 3]; 4], normal: [f32; 3]| {
        mesh.add_quad(
            Vertex::new(corners[0], normal, uv[0]),
            Vertex::new(corners[1], normal, uv[1]),
            Vertex::new(corners[2], normal, uv[2]),
            Vertex::new(corners[3], normal, uv[3]),
        );
    };

    // Front face (+Z)
    face(
        [[-hw, -hh, hd], [hw, -hh, hd], [hw, hh, hd], [-hw, hh, hd]],
        [0.0, 0.0, 1.0],
    );
    // Back face (-Z)
    face(
        [[hw, -hh, -hd], [-hw, -hh, -hd], [-hw, hh, -hd], [hw, hh, -hd]],
        [0.0, 0.0, -1.0],
    );
    // Right face (+X)
    face(
        [[hw, -hh, hd], [hw, -hh, -hd], [hw, hh, -hd], [hw, hh, hd]],
        [1.0, 0.0, 0.0],
    );
    // Left face (-X)
    face(
        [[-hw, -hh, -hd], [-hw, -hh, hd], [-hw, hh, hd], [-hw, hh, -hd]],
        [-1.0, 0.0, 0.0],
    );
    // Top face (+Y)
    face(
        [[-hw, hh, hd], [hw, hh, hd], [hw, hh, -hd], [-hw, hh, -hd]],
        [0.0, 1.0, 0.0],
    );
    // Bottom face (-Y)
    face(
        [[-hw, -hh, -hd], [hw, -hh, -hd], [hw, -hh, hd], [-hw, -hh, hd]],
        [0.0, -1.0, 0.0],
    );

    mesh
}

/// Create a UV sphere centred on the origin
pub fn create_sphere(diameter: f32, h_segments: u32, v_segments: u32) -> MeshData {
    let mut mesh = MeshData::new();
    let radius = diameter / 2.0;

    for i in 0..h_segments {
        for j in 0..v_segments {
            let u0 = i as f32 / h_segments as f32;
            let u1 = (i + 1) as f32 / h_segments as f32;
            let w0 = j as f32 / v_segments as f32;
            let w1 = (j + 1) as f32 / v_segments as f32;
            let theta0 = u0 * 2.0 * PI;
            let theta1 = u1 * 2.0 * PI;
            let phi0 = w0 * PI;
            let phi1 = w1 * PI;

            // Normals point outward from center
            let n = |theta: f32, phi: f32| [phi.sin() * theta.cos(), phi.cos(), phi.sin() * theta.sin()];
            let p = |normal: [f32; 3]| [normal[0] * radius, normal[1] * radius, normal[2] * radius];

            let n00 = n(theta0, phi0);
            let n10 = n(theta1, phi0);
            let n01 = n(theta0, phi1);
            let n11 = n(theta1, phi1);

            mesh.add_quad(
                Vertex::new(p(n00), n00, [u0, w0]),
                Vertex::new(p(n10), n10, [u1, w0]),
                Vertex::new(p(n11), n11, [u1, w1]),
                Vertex::new(p(n01), n01, [u0, w1]),
            );
        }
    }

    mesh
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_box_counts() {
        let mesh = create_box(1.0, 2.0, 3.0);
        // 6 faces * 4 vertices, 6 faces * 2 triangles
        assert_eq!(mesh.vertices.len(), 24);
        assert_eq!(mesh.triangle_count(), 12);
    }

    #[test]
    fn test_box_bounds_are_centred() {
        let (min, max) = create_box(3.0, 0.5, 1.5).bounds().unwrap();
        assert_eq!(min, Vec3::new(-1.5, -0.25, -0.75));
        assert_eq!(max, Vec3::new(1.5, 0.25, 0.75));
    }

    #[test]
    fn test_cylinder_bounds() {
        let (min, max) = create_cylinder(0.2, 0.6, 24).bounds().unwrap();
        assert_relative_eq!(min.y, -0.3);
        assert_relative_eq!(max.y, 0.3);
        assert_relative_eq!(max.x, 0.1, epsilon = 1e-6);
        assert_relative_eq!(min.x, -0.1, epsilon = 1e-6);
    }

    #[test]
    fn test_sphere_vertices_on_surface() {
        let mesh = create_sphere(0.3, 16, 12);
        assert!(!mesh.is_empty());
        for v in &mesh.vertices {
            assert_relative_eq!(Vec3::from(v.position).length(), 0.15, epsilon = 1e-5);
            assert_relative_eq!(Vec3::from(v.normal).length(), 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_merge_offsets_indices() {
        let mut mesh = create_box(1.0, 1.0, 1.0);
        let range = mesh.merge(create_box(1.0, 1.0, 1.0));
        assert_eq!(range, 36..72);
        assert_eq!(mesh.vertices.len(), 48);
        assert!(mesh.indices[36..].iter().all(|&i| (24..48).contains(&i)));
    }

    #[test]
    fn test_transform_translates_and_rotates() {
        let mut mesh = create_box(2.0, 2.0, 2.0);
        mesh.transform(Mat4::from_translation(Vec3::new(0.0, 5.0, 0.0)));
        let (min, max) = mesh.bounds().unwrap();
        assert_relative_eq!(min.y, 4.0);
        assert_relative_eq!(max.y, 6.0);

        let mut tall = create_box(1.0, 4.0, 1.0);
        tall.transform(Mat4::from_rotation_z(PI / 2.0));
        let (min, max) = tall.bounds().unwrap();
        assert_relative_eq!(max.x - min.x, 4.0, epsilon = 1e-5);
        assert_relative_eq!(max.y - min.y, 1.0, epsilon = 1e-5);
        for v in &tall.vertices {
            assert_relative_eq!(Vec3::from(v.normal).length(), 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_range_bounds() {
        let mut mesh = create_box(1.0, 1.0, 1.0);
        let mut moved = create_box(1.0, 1.0, 1.0);
        moved.transform(Mat4::from_translation(Vec3::X * 10.0));
        let range = mesh.merge(moved);
        let (min, max) = mesh.range_bounds(range).unwrap();
        assert_relative_eq!((min + max).x / 2.0, 10.0);
        assert!(mesh.range_bounds(100..200).is_none());
    }
}
