//! Test meshes for voxelizer and solver tests.
//!
//! Closed, already-parsed triangle meshes with known interiors:
//! - `cuboid`: axis-aligned box, the trivial parity case
//! - `octahedron`: convex with slanted faces
//! - `uv_sphere`: convex, many small triangles
//! - `slab_stack`: separated slabs along X, more surface crossings per ray
//!   than a small depth-layer budget can resolve

use crate::mesh::TriangleMesh;
use glam::{Vec2, Vec3};
use std::f32::consts::PI;

/// Axis-aligned box centered at `center` with the given half extents.
pub fn cuboid(center: Vec3, half: Vec3) -> TriangleMesh {
    let mut positions = Vec::with_capacity(8);
    for &z in &[-1.0, 1.0] {
        for &y in &[-1.0, 1.0] {
            for &x in &[-1.0, 1.0] {
                positions.push(center + Vec3::new(x, y, z) * half);
            }
        }
    }
    // Corner index = x + 2y + 4z with x, y, z in {0, 1}
    let indices = vec![
        0, 2, 1, 1, 2, 3, // -Z
        4, 5, 6, 5, 7, 6, // +Z
        0, 1, 4, 1, 5, 4, // -Y
        2, 6, 3, 3, 6, 7, // +Y
        0, 4, 2, 2, 4, 6, // -X
        1, 3, 5, 3, 7, 5, // +X
    ];
    let mut mesh = TriangleMesh::new(positions, indices);
    mesh.normals = mesh.positions.iter().map(|p| (*p - center).normalize_or_zero()).collect();
    mesh
}

/// Cube with the given edge length, centered at the origin.
pub fn cube(edge: f32) -> TriangleMesh {
    cuboid(Vec3::ZERO, Vec3::splat(edge * 0.5))
}

/// Regular octahedron with vertices at distance `radius` on each axis.
pub fn octahedron(radius: f32) -> TriangleMesh {
    let positions = vec![
        Vec3::X * radius,
        -Vec3::X * radius,
        Vec3::Y * radius,
        -Vec3::Y * radius,
        Vec3::Z * radius,
        -Vec3::Z * radius,
    ];
    let indices = vec![
        0, 2, 4, 2, 1, 4, 1, 3, 4, 3, 0, 4, //
        2, 0, 5, 1, 2, 5, 3, 1, 5, 0, 3, 5,
    ];
    TriangleMesh::new(positions, indices)
}

/// Latitude/longitude sphere.
pub fn uv_sphere(radius: f32, rings: u32, segments: u32) -> TriangleMesh {
    let rings = rings.max(2);
    let segments = segments.max(3);
    let mut positions = Vec::new();
    let mut uvs = Vec::new();
    for r in 0..=rings {
        let v = r as f32 / rings as f32;
        let theta = v * PI;
        for s in 0..=segments {
            let u = s as f32 / segments as f32;
            let phi = u * 2.0 * PI;
            positions.push(
                Vec3::new(theta.sin() * phi.cos(), theta.cos(), theta.sin() * phi.sin()) * radius,
            );
            uvs.push(Vec2::new(u, v));
        }
    }
    let stride = segments + 1;
    let mut indices = Vec::new();
    for r in 0..rings {
        for s in 0..segments {
            let a = r * stride + s;
            let b = a + stride;
            indices.extend_from_slice(&[a, b, a + 1, a + 1, b, b + 1]);
        }
    }
    let mut mesh = TriangleMesh::new(positions, indices);
    mesh.normals = mesh.positions.iter().map(|p| p.normalize_or_zero()).collect();
    mesh.uvs = uvs;
    mesh
}

/// `count` separate slabs stacked along X. Each slab is `thickness` thick,
/// `half_size` half-wide in Y and Z, with `gap` between slabs.
pub fn slab_stack(count: usize, thickness: f32, gap: f32, half_size: f32) -> TriangleMesh {
    let mut mesh = TriangleMesh::default();
    let pitch = thickness + gap;
    let total = count as f32 * pitch - gap;
    for i in 0..count {
        let x = -total * 0.5 + i as f32 * pitch + thickness * 0.5;
        let slab = cuboid(
            Vec3::new(x, 0.0, 0.0),
            Vec3::new(thickness * 0.5, half_size, half_size),
        );
        let base = mesh.positions.len() as u32;
        mesh.positions.extend(slab.positions);
        mesh.indices.extend(slab.indices.iter().map(|i| i + base));
    }
    mesh
}
