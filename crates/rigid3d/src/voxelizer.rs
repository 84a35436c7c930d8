//! Shape voxelization by depth peeling.
//!
//! Turns an arbitrary closed triangle mesh into the particle template shared by
//! every instance:
//!
//! 1. Center the mesh on its vertex center of mass, scale it to the preferred
//!    size and accumulate the (unit-mass) inertia tensor from the vertices.
//! 2. Look at the mesh orthographically along +X at the grid's native
//!    cross-section resolution and peel K ordered depth layers per column:
//!    layer 0 is the nearest surface, layer i the nearest surface strictly
//!    farther than layer i-1.
//! 3. For every column and every slice along X, count the captured layers
//!    nearer than the slice. An odd count marks the voxel center as interior.
//! 4. The interior voxel centers, relative to the center of mass, form the
//!    particle template.
//!
//! K bounds the number of surface crossings a column can resolve. Shapes that
//! need more layers lose the interior behind the K-th crossing.

use crate::config::VoxelizerConfig;
use crate::grid::SimulationGrid;
use crate::mesh::TriangleMesh;
use glam::{Mat3, UVec3, Vec2, Vec3};
use rayon::prelude::*;

/// Projected area below which a triangle is edge-on to the view
const MIN_PROJECTED_AREA: f32 = 1.0e-12;

/// View rays pass slightly off the voxel-center lattice (in voxel lengths) so
/// they never run exactly through mesh edges aligned with the lattice
const RAY_JITTER: Vec2 = Vec2::new(1.3e-3, 0.7e-3);

/// Fragments closer than this (in voxel lengths) belong to the same surface
const SAME_SURFACE: f32 = 1.0e-5;

/// Particle template and mass properties of the shared shape.
#[derive(Clone, Debug)]
pub struct ShapeTemplate {
    /// Interior sample offsets from the center of mass
    pub samples: Vec<Vec3>,
    /// Inertia tensor about the sample centroid for unit mass
    pub unit_inertia: Mat3,
    /// Bounds of the centered, scaled mesh
    pub bounds_min: Vec3,
    pub bounds_max: Vec3,
    /// Uniform scale applied to the input mesh
    pub scale: f32,
    /// Voxel edge length the samples were taken at
    pub voxel_length: f32,
    /// True when the synthetic six-point set replaced an empty result
    pub used_fallback: bool,
    /// Centered, scaled mesh for the visual layer
    pub render_mesh: TriangleMesh,
}

impl ShapeTemplate {
    /// Template with no collision samples. The shape is still placed, it
    /// just never collides.
    pub fn empty(voxel_length: f32) -> Self {
        Self {
            samples: Vec::new(),
            unit_inertia: Mat3::IDENTITY,
            bounds_min: Vec3::ZERO,
            bounds_max: Vec3::ZERO,
            scale: 1.0,
            voxel_length,
            used_fallback: false,
            render_mesh: TriangleMesh::default(),
        }
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Inertia tensor for the given body mass.
    pub fn inertia(&self, mass: f32) -> Mat3 {
        self.unit_inertia * mass
    }

    /// Inverse inertia tensor for the given body mass.
    ///
    /// Flat or point-like shapes have a singular tensor; they get a sphere of
    /// one voxel added so rotation stays bounded.
    pub fn inverse_inertia(&self, mass: f32) -> Mat3 {
        let jitter = (0.4 * mass * self.voxel_length * self.voxel_length).max(1.0e-9);
        let inertia = self.inertia(mass);
        if inertia.determinant().abs() > jitter * jitter * jitter {
            inertia.inverse()
        } else {
            (inertia + Mat3::from_diagonal(Vec3::splat(jitter))).inverse()
        }
    }
}

/// K depth images of one orthographic view along +X.
///
/// Image columns follow Y, rows follow Z. `f32::INFINITY` marks a column with
/// fewer than `layer + 1` surfaces.
#[derive(Clone, Debug)]
pub struct DepthLayers {
    pub width: usize,
    pub height: usize,
    layers: Vec<Vec<f32>>,
}

impl DepthLayers {
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn depth(&self, layer: usize, col: usize, row: usize) -> f32 {
        self.layers[layer][row * self.width + col]
    }

    /// Number of captured surfaces strictly nearer than `depth`.
    pub fn crossings_nearer(&self, col: usize, row: usize, depth: f32) -> usize {
        let idx = row * self.width + col;
        self.layers
            .iter()
            .take_while(|layer| layer[idx].is_finite())
            .filter(|layer| layer[idx] < depth)
            .count()
    }
}

/// A triangle projected onto the YZ image plane, wound counter-clockwise.
struct ProjectedTriangle {
    v: [Vec2; 3],
    /// X of each vertex
    depth: Vec3,
    min: Vec2,
    max: Vec2,
}

/// Edge function evaluated in a canonical vertex order, so both triangles
/// sharing an edge see the same value with opposite sign.
fn edge(u: Vec2, v: Vec2, p: Vec2) -> f32 {
    if u.x < v.x || (u.x == v.x && u.y <= v.y) {
        (v - u).perp_dot(p - u)
    } else {
        -(u - v).perp_dot(p - v)
    }
}

impl ProjectedTriangle {
    fn new(tri: [Vec3; 3]) -> Option<Self> {
        let [mut p0, mut p1, p2] = tri;
        let project = |p: Vec3| Vec2::new(p.y, p.z);
        let area = (project(p1) - project(p0)).perp_dot(project(p2) - project(p0));
        if area.abs() < MIN_PROJECTED_AREA {
            return None;
        }
        if area < 0.0 {
            std::mem::swap(&mut p0, &mut p1);
        }
        let v = [project(p0), project(p1), project(p2)];
        Some(Self {
            v,
            depth: Vec3::new(p0.x, p1.x, p2.x),
            min: v[0].min(v[1]).min(v[2]),
            max: v[0].max(v[1]).max(v[2]),
        })
    }

    /// Interpolated depth where the view ray through `p` hits the triangle.
    fn depth_at(&self, p: Vec2) -> Option<f32> {
        let [a, b, c] = self.v;
        let w = Vec3::new(edge(b, c, p), edge(c, a, p), edge(a, b, p));
        if w.min_element() < 0.0 {
            return None;
        }
        let total = w.x + w.y + w.z;
        if total <= 0.0 {
            return None;
        }
        Some(w.dot(self.depth) / total)
    }
}

/// Voxel-center lattice of `n` cells with a cell boundary through the origin.
fn lattice(n: u32, h: f32) -> Vec<f32> {
    let half = (n / 2) as i64;
    (0..n as i64)
        .map(|i| (i - half) as f32 * h + 0.5 * h)
        .collect()
}

/// Index range of lattice cells whose centers may fall in `[lo, hi]`.
fn lattice_range(lo: f32, hi: f32, n: u32, h: f32) -> std::ops::Range<usize> {
    let half = (n / 2) as f32;
    let first = ((lo - 0.5 * h) / h + half).floor().max(0.0) as usize;
    let last = ((hi - 0.5 * h) / h + half).ceil() + 1.0;
    let last = last.clamp(0.0, n as f32) as usize;
    first.min(last)..last
}

/// Result of the centering pass.
struct NormalizedMesh {
    positions: Vec<Vec3>,
    unit_inertia: Mat3,
    scale: f32,
}

pub struct ShapeVoxelizer {
    config: VoxelizerConfig,
    voxel_length: f32,
    resolution: UVec3,
}

impl ShapeVoxelizer {
    pub fn new(config: VoxelizerConfig, grid: &SimulationGrid) -> Self {
        Self {
            config,
            voxel_length: grid.voxel_length(),
            resolution: grid.resolution,
        }
    }

    /// Build the particle template for `mesh`.
    ///
    /// Never fails: an unusable mesh or an empty interior degrades to the
    /// fallback set (when enabled) or to an empty template.
    pub fn voxelize(&self, mesh: &TriangleMesh) -> ShapeTemplate {
        if let Err(e) = mesh.validate() {
            log::error!("Voxelization skipped: {}", e);
            return self.degrade(ShapeTemplate::empty(self.voxel_length));
        }

        let normalized = self.normalize(mesh);
        let (bounds_min, bounds_max) = bounds(&normalized.positions);
        let coverage = self.resolution.as_vec3() * self.voxel_length * 0.5;
        if bounds_min.cmplt(-coverage).any() || bounds_max.cmpgt(coverage).any() {
            log::warn!(
                "Shape extent {:?}..{:?} exceeds the voxelization window +-{:?}; samples are clipped",
                bounds_min,
                bounds_max,
                coverage
            );
        }

        let layers = self.peel_depth_layers(&normalized.positions, &mesh.indices);
        let samples = self.classify(&layers);

        let mut render_mesh = mesh.clone();
        render_mesh.positions = normalized.positions;

        let template = ShapeTemplate {
            samples,
            unit_inertia: normalized.unit_inertia,
            bounds_min,
            bounds_max,
            scale: normalized.scale,
            voxel_length: self.voxel_length,
            used_fallback: false,
            render_mesh,
        };

        let template = if template.samples.is_empty() {
            self.degrade(template)
        } else {
            recenter(template)
        };

        log::info!(
            "Voxelized mesh: {} vertices, {} triangles -> {} samples (scale {:.4}, fallback {})",
            mesh.vertex_count(),
            mesh.triangle_count(),
            template.sample_count(),
            template.scale,
            template.used_fallback
        );
        template
    }

    /// Step 1: move to the vertex center of mass, scale, accumulate inertia.
    fn normalize(&self, mesh: &TriangleMesh) -> NormalizedMesh {
        let n = mesh.positions.len() as f32;
        let com = mesh.positions.iter().fold(Vec3::ZERO, |acc, p| acc + *p) / n;

        let mut positions: Vec<Vec3> = mesh.positions.iter().map(|p| *p - com).collect();
        let (lo, hi) = bounds(&positions);
        let extent = (hi - lo).max_element();

        let scale = match self.config.preferred_size {
            Some(size) if extent > f32::EPSILON => size / extent,
            Some(_) => {
                log::warn!("Mesh has no extent, keeping its scale");
                1.0
            }
            None => 1.0,
        };

        let mut inertia = Mat3::ZERO;
        for p in &mut positions {
            *p *= scale;
            let r = *p;
            let diag = Mat3::from_diagonal(Vec3::splat(r.length_squared()));
            let outer = Mat3::from_cols(r * r.x, r * r.y, r * r.z);
            inertia += diag - outer;
        }

        NormalizedMesh {
            positions,
            unit_inertia: inertia * (1.0 / n),
            scale,
        }
    }

    /// Step 2: capture K ordered depth layers looking along +X.
    pub fn peel_depth_layers(&self, positions: &[Vec3], indices: &[u32]) -> DepthLayers {
        let h = self.voxel_length;
        let (ny, nz) = (self.resolution.y, self.resolution.z);
        let width = ny as usize;
        let height = nz as usize;
        let jitter = RAY_JITTER * h;
        let ys: Vec<f32> = lattice(ny, h).into_iter().map(|y| y + jitter.x).collect();
        let zs: Vec<f32> = lattice(nz, h).into_iter().map(|z| z + jitter.y).collect();
        let same_surface = SAME_SURFACE * h;

        let triangles: Vec<ProjectedTriangle> = indices
            .chunks_exact(3)
            .filter_map(|t| {
                ProjectedTriangle::new([
                    positions[t[0] as usize],
                    positions[t[1] as usize],
                    positions[t[2] as usize],
                ])
            })
            .collect();

        let mut layers = vec![vec![f32::INFINITY; width * height]; self.config.depth_layers];

        for layer in 0..layers.len() {
            let (done, rest) = layers.split_at_mut(layer);
            let previous = done.last();
            let current = &mut rest[0];

            current
                .par_chunks_mut(width)
                .enumerate()
                .for_each(|(row, out)| {
                    let z = zs[row];
                    for tri in &triangles {
                        if z < tri.min.y || z > tri.max.y {
                            continue;
                        }
                        for col in lattice_range(tri.min.x, tri.max.x, ny, h) {
                            let Some(d) = tri.depth_at(Vec2::new(ys[col], z)) else {
                                continue;
                            };
                            if let Some(prev) = previous {
                                // Only surfaces strictly behind the previous layer
                                if d <= prev[row * width + col] + same_surface {
                                    continue;
                                }
                            }
                            if d < out[col] {
                                out[col] = d;
                            }
                        }
                    }
                });
        }

        DepthLayers {
            width,
            height,
            layers,
        }
    }

    /// Step 3 and 4: parity test per voxel center, collect interior centers.
    pub fn classify(&self, layers: &DepthLayers) -> Vec<Vec3> {
        let h = self.voxel_length;
        let xs = lattice(self.resolution.x, h);
        let ys = lattice(self.resolution.y, h);
        let zs = lattice(self.resolution.z, h);
        let (xs, ys, zs) = (&xs, &ys, &zs);
        let width = layers.width;

        (0..layers.width * layers.height)
            .into_par_iter()
            .flat_map_iter(move |column| {
                let (col, row) = (column % width, column / width);
                let hit = layers.layer_count() > 0 && layers.depth(0, col, row).is_finite();
                xs.iter()
                    .filter(move |&&x| hit && layers.crossings_nearer(col, row, x) % 2 == 1)
                    .map(move |&x| Vec3::new(x, ys[col], zs[row]))
            })
            .collect()
    }

    /// Replace an empty template with the six-point set if enabled.
    fn degrade(&self, mut template: ShapeTemplate) -> ShapeTemplate {
        if self.config.fallback {
            log::warn!("No interior voxels found, using the six-point fallback set");
            template.samples = fallback_samples(self.voxel_length);
            template.used_fallback = true;
        } else {
            log::warn!("No interior voxels found, shape will never collide");
        }
        template
    }
}

/// Six points half a voxel out along each axis.
pub fn fallback_samples(voxel_length: f32) -> Vec<Vec3> {
    let d = voxel_length * 0.5;
    vec![
        Vec3::X * d,
        -Vec3::X * d,
        Vec3::Y * d,
        -Vec3::Y * d,
        Vec3::Z * d,
        -Vec3::Z * d,
    ]
}

/// Shift samples and render mesh so the sample centroid is the origin. The
/// inertia tensor moves with it (parallel axis, unit mass).
fn recenter(mut template: ShapeTemplate) -> ShapeTemplate {
    let n = template.samples.len() as f32;
    let centroid = template.samples.iter().fold(Vec3::ZERO, |acc, s| acc + *s) / n;
    if centroid.length_squared() < 1.0e-12 {
        return template;
    }
    log::debug!("Recentering template on sample centroid {:?}", centroid);
    for s in &mut template.samples {
        *s -= centroid;
    }
    for p in &mut template.render_mesh.positions {
        *p -= centroid;
    }
    template.bounds_min -= centroid;
    template.bounds_max -= centroid;
    let d = centroid;
    template.unit_inertia += Mat3::from_diagonal(Vec3::splat(d.length_squared()))
        - Mat3::from_cols(d * d.x, d * d.y, d * d.z);
    template
}

fn bounds(points: &[Vec3]) -> (Vec3, Vec3) {
    if points.is_empty() {
        return (Vec3::ZERO, Vec3::ZERO);
    }
    points.iter().fold(
        (Vec3::splat(f32::INFINITY), Vec3::splat(f32::NEG_INFINITY)),
        |(lo, hi), p| (lo.min(*p), hi.max(*p)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_geometry::{cube, octahedron, slab_stack, uv_sphere};

    const H: f32 = 0.05;

    fn voxelizer(res: u32, layers: usize, fallback: bool) -> ShapeVoxelizer {
        let grid = SimulationGrid::new(UVec3::splat(res), H, Vec3::ZERO);
        ShapeVoxelizer::new(
            VoxelizerConfig {
                preferred_size: None,
                depth_layers: layers,
                fallback,
            },
            &grid,
        )
    }

    // ========== Lattice Tests ==========

    #[test]
    fn test_lattice_has_boundary_at_origin() {
        let xs = lattice(4, 1.0);
        assert_eq!(xs, vec![-1.5, -0.5, 0.5, 1.5]);
        let odd = lattice(5, 1.0);
        assert_eq!(odd, vec![-1.5, -0.5, 0.5, 1.5, 2.5]);
    }

    #[test]
    fn test_lattice_range_covers_centers() {
        let xs = lattice(8, 1.0);
        let range = lattice_range(-1.0, 1.0, 8, 1.0);
        for (i, x) in xs.iter().enumerate() {
            if (-1.0..=1.0).contains(x) {
                assert!(range.contains(&i), "center {} missing from {:?}", x, range);
            }
        }
    }

    // ========== Depth Peel Tests ==========

    #[test]
    fn test_cube_has_two_layers() {
        let vox = voxelizer(16, 4, false);
        let mesh = cube(4.0 * H);
        let layers = vox.peel_depth_layers(&mesh.positions, &mesh.indices);
        // Column through (y, z) = (0.5h, 0.5h)
        let (col, row) = (8, 8);
        assert!((layers.depth(0, col, row) + 2.0 * H).abs() < 1e-5);
        assert!((layers.depth(1, col, row) - 2.0 * H).abs() < 1e-5);
        assert!(layers.depth(2, col, row).is_infinite());
        assert_eq!(layers.crossings_nearer(col, row, 0.0), 1);
    }

    #[test]
    fn test_layers_strictly_increase() {
        let vox = voxelizer(24, 4, false);
        let mesh = slab_stack(3, 2.0 * H, 2.0 * H, 4.0 * H);
        let layers = vox.peel_depth_layers(&mesh.positions, &mesh.indices);
        for row in 0..layers.height {
            for col in 0..layers.width {
                for l in 1..layers.layer_count() {
                    let a = layers.depth(l - 1, col, row);
                    let b = layers.depth(l, col, row);
                    assert!(b.is_infinite() || b > a, "layer {} not behind {}", l, l - 1);
                }
            }
        }
    }

    #[test]
    fn test_empty_column_has_no_crossings() {
        let vox = voxelizer(16, 4, false);
        let mesh = cube(4.0 * H);
        let layers = vox.peel_depth_layers(&mesh.positions, &mesh.indices);
        assert!(layers.depth(0, 0, 0).is_infinite());
        assert_eq!(layers.crossings_nearer(0, 0, 10.0), 0);
    }

    // ========== Classification Tests ==========

    #[test]
    fn test_cube_of_four_voxels_gives_64_samples() {
        let template = voxelizer(16, 4, false).voxelize(&cube(4.0 * H));
        assert_eq!(template.sample_count(), 64);
        assert!(!template.used_fallback);
        for s in &template.samples {
            assert!(s.abs().max_element() < 2.0 * H);
        }
    }

    #[test]
    fn test_octahedron_interior() {
        let radius = 6.0 * H;
        let template = voxelizer(32, 4, false).voxelize(&octahedron(radius));
        assert!(template.sample_count() > 0);
        for s in &template.samples {
            let l1 = s.x.abs() + s.y.abs() + s.z.abs();
            assert!(l1 < radius + 0.05 * H, "sample {:?} outside octahedron", s);
        }
    }

    #[test]
    fn test_sphere_inner_ball_is_interior() {
        let radius = 5.0 * H;
        let template = voxelizer(32, 4, false).voxelize(&uv_sphere(radius, 16, 24));
        let inner = radius * 0.8 - H;
        let xs = lattice(32, H);
        let mut expected = 0;
        for &x in &xs {
            for &y in &xs {
                for &z in &xs {
                    if Vec3::new(x, y, z).length() < inner {
                        expected += 1;
                        let p = Vec3::new(x, y, z);
                        assert!(
                            template.samples.iter().any(|s| (*s - p).length() < 0.1 * H),
                            "inner point {:?} not classified interior",
                            p
                        );
                    }
                }
            }
        }
        assert!(expected > 0);
        for s in &template.samples {
            assert!(s.length() < radius + H);
        }
    }

    #[test]
    fn test_too_few_layers_undersamples_slabs() {
        let mesh = slab_stack(3, 2.0 * H, 2.0 * H, 2.0 * H);
        let full = voxelizer(32, 6, false).voxelize(&mesh);
        let peeled = voxelizer(32, 4, false).voxelize(&mesh);
        // 3 slabs of 2x4x4 voxels
        assert_eq!(full.sample_count(), 96);
        // The third slab sits behind the 4th crossing
        assert_eq!(peeled.sample_count(), 64);
    }

    // ========== Fallback Tests ==========

    #[test]
    fn test_sub_voxel_shape_uses_fallback() {
        let template = voxelizer(16, 4, true).voxelize(&cube(0.5 * H));
        assert!(template.used_fallback);
        assert_eq!(template.samples, fallback_samples(H));
    }

    #[test]
    fn test_sub_voxel_shape_without_fallback_is_empty() {
        let template = voxelizer(16, 4, false).voxelize(&cube(0.5 * H));
        assert!(!template.used_fallback);
        assert!(template.samples.is_empty());
    }

    #[test]
    fn test_invalid_mesh_degrades() {
        let mut mesh = cube(4.0 * H);
        mesh.indices.push(0);
        let template = voxelizer(16, 4, true).voxelize(&mesh);
        assert!(template.used_fallback);
        assert_eq!(template.sample_count(), 6);
    }

    // ========== Mass Property Tests ==========

    #[test]
    fn test_preferred_size_scales_mesh() {
        let grid = SimulationGrid::new(UVec3::splat(16), H, Vec3::ZERO);
        let vox = ShapeVoxelizer::new(
            VoxelizerConfig {
                preferred_size: Some(4.0 * H),
                depth_layers: 4,
                fallback: false,
            },
            &grid,
        );
        let template = vox.voxelize(&cube(1.0));
        assert!((template.scale - 4.0 * H).abs() < 1e-6);
        assert_eq!(template.sample_count(), 64);
        assert!((template.bounds_max.x - 2.0 * H).abs() < 1e-5);
    }

    #[test]
    fn test_cube_inertia_is_isotropic() {
        let template = voxelizer(16, 4, false).voxelize(&cube(4.0 * H));
        let i = template.unit_inertia;
        // 8 corners at (+-a)^3: 2a^2 on the diagonal, no products of inertia
        let a = 2.0 * H;
        assert!((i.x_axis.x - 2.0 * a * a).abs() < 1e-6);
        assert!((i.y_axis.y - i.x_axis.x).abs() < 1e-6);
        assert!((i.z_axis.z - i.x_axis.x).abs() < 1e-6);
        assert!(i.x_axis.y.abs() < 1e-6);

        let inv = template.inverse_inertia(2.0);
        let product = template.inertia(2.0) * inv;
        assert!(product.abs_diff_eq(Mat3::IDENTITY, 1e-4));
    }

    #[test]
    fn test_recenter_shifts_inertia_to_sample_centroid() {
        let mut template = ShapeTemplate::empty(H);
        template.unit_inertia = Mat3::from_diagonal(Vec3::splat(0.5));
        let d = Vec3::new(0.0, H, 0.0);
        template.samples = vec![d + Vec3::X * H, d - Vec3::X * H];

        let template = recenter(template);
        assert_eq!(template.samples, vec![Vec3::X * H, -Vec3::X * H]);
        // Axes perpendicular to the shift gain |d|^2, the shift axis nothing
        let i = template.unit_inertia;
        assert!((i.x_axis.x - (0.5 + H * H)).abs() < 1e-7);
        assert!((i.y_axis.y - 0.5).abs() < 1e-7);
        assert!((i.z_axis.z - (0.5 + H * H)).abs() < 1e-7);
        assert!(i.x_axis.y.abs() < 1e-9);
    }

    #[test]
    fn test_degenerate_inertia_stays_finite() {
        let template = ShapeTemplate::empty(H);
        let mut flat = template.clone();
        flat.unit_inertia = Mat3::ZERO;
        let inv = flat.inverse_inertia(1.0);
        assert!(inv.is_finite());
        assert!(inv.x_axis.x > 0.0);
    }
}
