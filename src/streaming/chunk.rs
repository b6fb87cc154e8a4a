//! Chunk keys and the per-chunk bundle of generated content

use std::fmt;
use std::sync::Arc;

use glam::Vec3;

use crate::terrain::mesh::{GroundCap, TerrainGeometry};
use crate::vegetation::scatter::VegetationBatchSet;

/// Edge length of a chunk in world units
pub const CHUNK_SIZE: f32 = 50.0;

/// Default render radius in chunks
pub const RENDER_DISTANCE: i32 = 4;

/// Integer coordinate identifying a chunk on the XZ grid
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkKey {
    pub cx: i32,
    pub cz: i32,
}

impl ChunkKey {
    pub const fn new(cx: i32, cz: i32) -> Self {
        Self { cx, cz }
    }

    /// Chunk containing a world position (y is ignored)
    pub fn from_world_pos(pos: Vec3) -> Self {
        Self {
            cx: (pos.x / CHUNK_SIZE).floor() as i32,
            cz: (pos.z / CHUNK_SIZE).floor() as i32,
        }
    }

    /// World-space minimum corner of this chunk at y = 0
    pub fn world_origin(&self) -> Vec3 {
        Vec3::new(self.cx as f32 * CHUNK_SIZE, 0.0, self.cz as f32 * CHUNK_SIZE)
    }

    /// World-space origin in double precision, used for noise sampling
    pub fn world_origin_f64(&self) -> (f64, f64) {
        (
            self.cx as f64 * CHUNK_SIZE as f64,
            self.cz as f64 * CHUNK_SIZE as f64,
        )
    }

    /// Chebyshev distance in grid units
    pub fn chebyshev_distance(&self, other: ChunkKey) -> u32 {
        self.cx.abs_diff(other.cx).max(self.cz.abs_diff(other.cz))
    }

    pub fn offset(&self, dx: i32, dz: i32) -> Self {
        Self::new(self.cx + dx, self.cz + dz)
    }
}

impl fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.cx, self.cz)
    }
}

/// All content owned for one loaded key.
///
/// Terrain and ground cap live as long as the chunk. Vegetation is `None`
/// only between an invalidation and the next reconcile.
#[derive(Clone, Debug)]
pub struct Chunk {
    pub key: ChunkKey,
    pub terrain: Arc<TerrainGeometry>,
    pub ground_cap: Arc<GroundCap>,
    pub vegetation: Option<Arc<VegetationBatchSet>>,
}

impl Chunk {
    pub fn has_vegetation(&self) -> bool {
        self.vegetation.is_some()
    }
}
