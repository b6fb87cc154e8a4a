//! Terrain mesh construction for one chunk
//!
//! Samples a regular `(resolution + 1)^2` grid over the chunk footprint and
//! triangulates every cell into two triangles. Positions are local to the
//! chunk; `TerrainGeometry::origin` places the mesh in the world.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use super::surface::SurfaceClassifier;
use crate::core::Rgb;
use crate::streaming::chunk::{ChunkKey, CHUNK_SIZE};

/// Grid cells per chunk edge
pub const MESH_RESOLUTION: usize = 25;

/// Height of the ground cap panel below every chunk
pub const GROUND_CAP_Y: f32 = -6.0;

const GROUND_CAP_COLOR: Rgb = Rgb::from_hex(0x3a2e21);

/// One vertex record, laid out for direct upload.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct TerrainVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub color: [f32; 3],
    pub uv: [f32; 2],
}

/// Immutable renderable terrain for one chunk
#[derive(Clone, Debug, PartialEq)]
pub struct TerrainGeometry {
    pub key: ChunkKey,
    /// World translation of the local vertex positions
    pub origin: Vec3,
    pub resolution: usize,
    pub vertices: Vec<TerrainVertex>,
    /// Three indices per triangle
    pub indices: Vec<u32>,
}

impl TerrainGeometry {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Iterator over triangles as index triples
    pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.indices.chunks_exact(3).map(|t| [t[0], t[1], t[2]])
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    /// Lowest and highest local elevation in the mesh
    pub fn height_range(&self) -> (f32, f32) {
        self.vertices.iter().fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v.position[1]), hi.max(v.position[1]))
        })
    }
}

/// Flat opaque panel hiding the open underside of a chunk
#[derive(Clone, Debug, PartialEq)]
pub struct GroundCap {
    pub key: ChunkKey,
    /// World-space centre of the panel
    pub center: Vec3,
    pub size: f32,
    pub color: Rgb,
}

impl GroundCap {
    pub fn for_chunk(key: ChunkKey) -> Self {
        let half = CHUNK_SIZE * 0.5;
        let origin = key.world_origin();
        Self {
            key,
            center: Vec3::new(origin.x + half, GROUND_CAP_Y, origin.z + half),
            size: CHUNK_SIZE,
            color: GROUND_CAP_COLOR,
        }
    }

    /// Facing up
    pub fn normal(&self) -> Vec3 {
        Vec3::Y
    }

    /// Corners wound counter-clockwise seen from above
    pub fn corners(&self) -> [Vec3; 4] {
        let h = self.size * 0.5;
        let c = self.center;
        [
            Vec3::new(c.x - h, c.y, c.z - h),
            Vec3::new(c.x - h, c.y, c.z + h),
            Vec3::new(c.x + h, c.y, c.z + h),
            Vec3::new(c.x + h, c.y, c.z - h),
        ]
    }
}

/// Builds terrain geometry for chunks
#[derive(Clone, Debug)]
pub struct TerrainMeshBuilder {
    surface: SurfaceClassifier,
    resolution: usize,
}

impl TerrainMeshBuilder {
    pub fn new(surface: SurfaceClassifier) -> Self {
        Self::with_resolution(surface, MESH_RESOLUTION)
    }

    pub fn with_resolution(surface: SurfaceClassifier, resolution: usize) -> Self {
        Self { surface, resolution: resolution.max(1) }
    }

    pub fn resolution(&self) -> usize {
        self.resolution
    }

    pub fn surface(&self) -> &SurfaceClassifier {
        &self.surface
    }

    pub fn build(&self, key: ChunkKey) -> TerrainGeometry {
        let res = self.resolution;
        let row = res + 1;
        let step = CHUNK_SIZE as f64 / res as f64;
        let (origin_x, origin_z) = key.world_origin_f64();
        let height = self.surface.height_field();

        let mut vertices = Vec::with_capacity(row * row);
        for rz in 0..=res {
            for rx in 0..=res {
                let local_x = rx as f64 * step;
                let local_z = rz as f64 * step;
                let world_x = origin_x + local_x;
                let world_z = origin_z + local_z;

                let h = height.elevation(world_x, world_z);
                let normal = self.surface.normal_at(world_x, world_z);
                let color = self.surface.color(h, world_x, world_z, normal.y);

                vertices.push(TerrainVertex {
                    position: [local_x as f32, h as f32, local_z as f32],
                    normal: normal.as_vec3().to_array(),
                    color: color.to_array(),
                    uv: [rx as f32 / res as f32, rz as f32 / res as f32],
                });
            }
        }

        // a--c      a,b,c / b,d,c keeps every face pointing +Y
        // |  |
        // b--d
        let mut indices = Vec::with_capacity(res * res * 6);
        for rz in 0..res {
            for rx in 0..res {
                let a = (rx + row * rz) as u32;
                let b = (rx + row * (rz + 1)) as u32;
                let c = (rx + 1 + row * rz) as u32;
                let d = (rx + 1 + row * (rz + 1)) as u32;
                indices.extend_from_slice(&[a, b, c, b, d, c]);
            }
        }

        TerrainGeometry {
            key,
            origin: key.world_origin(),
            resolution: res,
            vertices,
            indices,
        }
    }
}
