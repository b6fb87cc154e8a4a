//! Deterministic vegetation scattering for one chunk
//!
//! Candidate points are drawn from the chunk's own [`ChunkRng`], classified
//! through the placement decision table, and expanded into instances that
//! are grouped per species into batches. The result depends only on the
//! chunk key, the density and the terrain noise seed.

use std::collections::BTreeMap;
use std::f64::consts::TAU;
use std::sync::Arc;

use glam::{DVec3, Mat4, Quat, Vec3};

use super::rng::{scramble, ChunkRng};
use super::species::{
    elevation_favorability, select_placement, Placement, Species, STEEP_NORMAL_Y,
};
use super::templates::{SpeciesTemplate, TemplateRegistry};
use crate::core::{Result, Rgb};
use crate::streaming::chunk::{ChunkKey, CHUNK_SIZE};
use crate::terrain::surface::SurfaceClassifier;

/// Candidate points per chunk at density 1.0
pub const CANDIDATES_PER_CHUNK: f32 = 50.0;

/// Highest usable density; larger values are treated as this.
pub const MAX_DENSITY: f32 = 20.0;

/// Nothing grows below this elevation (water and shoreline)
pub const MIN_ELEVATION: f64 = 2.0;

const ROCK_CLUSTER_SPREAD: f64 = 5.0;
const ROCK_CLUSTER_TOLERANCE: f64 = 2.5;
const FLOWER_SPREAD: f64 = 2.0;
const FLOWER_TOLERANCE: f64 = 1.0;
const BROADLEAF_SHARE: f64 = 0.7;
const AUTUMN_THRESHOLD: f64 = 0.6;

const BROADLEAF_BARK: Rgb = Rgb::from_hex(0x8b4513);
const CONIFER_BARK: Rgb = Rgb::from_hex(0x654321);
const BUSH_LEAVES: Rgb = Rgb::from_hex(0x2e4432);
const AUTUMN_LEAVES: [u32; 3] = [0xffa500, 0xd2691e, 0x8b0000];
const GREEN_LEAVES: [u32; 3] = [0x228b22, 0x006400, 0x556b2f];
const FLOWER_PALETTE: [u32; 4] = [0xff69b4, 0xffff00, 0x9400d3, 0x1e90ff];

/// Per-instance colouring
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Tint {
    /// Species material colour is used as-is
    None,
    Solid(Rgb),
    Tree { bark: Rgb, foliage: Rgb },
}

/// One placed object
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Instance {
    pub translation: Vec3,
    /// Rotation about +Y in radians
    pub yaw: f32,
    pub scale: Vec3,
    pub tint: Tint,
}

impl Instance {
    fn plain(translation: DVec3, yaw: f64, scale: Vec3) -> Self {
        Self {
            translation: translation.as_vec3(),
            yaw: yaw as f32,
            scale,
            tint: Tint::None,
        }
    }

    fn tinted(mut self, tint: Tint) -> Self {
        self.tint = tint;
        self
    }

    /// Translation * rotation * scale
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            self.scale,
            Quat::from_rotation_y(self.yaw),
            self.translation,
        )
    }
}

/// Every instance of one species within a chunk
#[derive(Clone, Debug, PartialEq)]
pub struct InstanceBatch {
    pub species: Species,
    pub template: SpeciesTemplate,
    pub instances: Vec<Instance>,
}

impl InstanceBatch {
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn matrices(&self) -> impl Iterator<Item = Mat4> + '_ {
        self.instances.iter().map(Instance::matrix)
    }
}

/// All vegetation batches of one chunk. Species with no instances are absent.
#[derive(Clone, Debug, PartialEq)]
pub struct VegetationBatchSet {
    pub key: ChunkKey,
    pub density: f32,
    pub batches: BTreeMap<Species, InstanceBatch>,
}

impl VegetationBatchSet {
    pub fn get(&self, species: Species) -> Option<&InstanceBatch> {
        self.batches.get(&species)
    }

    pub fn instance_count(&self) -> usize {
        self.batches.values().map(InstanceBatch::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &InstanceBatch> {
        self.batches.values()
    }
}

/// Instances collected before templates are resolved
#[derive(Default)]
struct Placed {
    by_species: BTreeMap<Species, Vec<Instance>>,
}

impl Placed {
    fn push(&mut self, species: Species, instance: Instance) {
        self.by_species.entry(species).or_default().push(instance);
    }

    fn count(&self, species: Species) -> usize {
        self.by_species.get(&species).map_or(0, Vec::len)
    }
}

#[derive(Clone, Debug)]
pub struct VegetationScatterer {
    surface: SurfaceClassifier,
    templates: Arc<TemplateRegistry>,
}

impl VegetationScatterer {
    pub fn new(surface: SurfaceClassifier, templates: Arc<TemplateRegistry>) -> Self {
        Self { surface, templates }
    }

    pub fn templates(&self) -> &Arc<TemplateRegistry> {
        &self.templates
    }

    /// Scatter vegetation over the chunk footprint.
    ///
    /// Fails with `GenerationPrecondition` when a species that received
    /// instances has no registered template.
    pub fn scatter(&self, key: ChunkKey, density: f32) -> Result<VegetationBatchSet> {
        let mut rng = ChunkRng::for_chunk(key);
        let mut placed = Placed::default();

        let candidates = (CANDIDATES_PER_CHUNK * density.clamp(0.0, MAX_DENSITY)).floor() as usize;
        let (origin_x, origin_z) = key.world_origin_f64();
        let height = self.surface.height_field();

        for i in 0..candidates {
            let x = origin_x + rng.next_f64() * CHUNK_SIZE as f64;
            let z = origin_z + rng.next_f64() * CHUNK_SIZE as f64;
            let h = height.elevation(x, z);
            if h < MIN_ELEVATION {
                continue;
            }

            let steep = self.surface.normal_at(x, z).y < STEEP_NORMAL_Y;
            let draw = rng.next_f64();
            let anchor = DVec3::new(x, h, z);

            match select_placement(draw, steep, elevation_favorability(h)) {
                Some(Placement::RockCluster) => self.place_rock_cluster(anchor, &mut rng, &mut placed),
                Some(Placement::Tree) => self.place_tree(anchor, i, &mut rng, &mut placed),
                Some(Placement::Bush) => Self::place_bush(anchor, &mut rng, &mut placed),
                Some(Placement::FlowerCluster) => self.place_flowers(anchor, &mut rng, &mut placed),
                Some(Placement::SingleRock) => Self::place_single_rock(anchor, &mut rng, &mut placed),
                None => {}
            }
        }

        let mut batches = BTreeMap::new();
        for (species, instances) in placed.by_species {
            let template = self.templates.require(species)?;
            batches.insert(species, InstanceBatch { species, template, instances });
        }

        Ok(VegetationBatchSet { key, density, batches })
    }

    /// Elevation at an offset point if it stays close to the anchor and
    /// above the shoreline.
    fn settle(&self, anchor: DVec3, dx: f64, dz: f64, tolerance: f64) -> Option<DVec3> {
        let x = anchor.x + dx;
        let z = anchor.z + dz;
        let h = self.surface.height_field().elevation(x, z);
        if (h - anchor.y).abs() > tolerance || h < MIN_ELEVATION {
            return None;
        }
        Some(DVec3::new(x, h, z))
    }

    fn place_rock_cluster(&self, anchor: DVec3, rng: &mut ChunkRng, placed: &mut Placed) {
        let count = rock_cluster_size(rng.peek());
        for _ in 0..count {
            let dx = (rng.next_f64() - 0.5) * ROCK_CLUSTER_SPREAD;
            let dz = (rng.next_f64() - 0.5) * ROCK_CLUSTER_SPREAD;
            let Some(position) = self.settle(anchor, dx, dz, ROCK_CLUSTER_TOLERANCE) else {
                continue;
            };
            let yaw = rng.next_f64() * TAU;
            let scale = rng.next_range(0.7, 1.5) as f32;
            placed.push(Species::RockCluster, Instance::plain(position, yaw, Vec3::splat(scale)));
        }
    }

    fn place_tree(&self, anchor: DVec3, index: usize, rng: &mut ChunkRng, placed: &mut Placed) {
        let yaw = rng.next_f64() * TAU;
        let scale_y = rng.next_range(0.7, 1.3) as f32;
        let scale_xz = rng.next_range(0.8, 1.2) as f32;

        let kind_draw = rng.current();
        let seed = kind_draw * index as f64;
        let foliage = self.leaf_color(anchor.x, anchor.z, seed);
        let (species, bark) = if kind_draw < BROADLEAF_SHARE {
            let jitter = 0.9 + scramble(seed) * 0.2;
            (Species::BroadleafTree, BROADLEAF_BARK.scale(jitter as f32))
        } else {
            (Species::ConiferTree, CONIFER_BARK)
        };

        let instance = Instance::plain(anchor, yaw, Vec3::new(scale_xz, scale_y, scale_xz))
            .tinted(Tint::Tree { bark, foliage });
        placed.push(species, instance);
    }

    fn place_bush(anchor: DVec3, rng: &mut ChunkRng, placed: &mut Placed) {
        let scale = rng.next_range(0.8, 1.6) as f32;
        let index = placed.count(Species::Bush);
        let jitter = 0.9 + scramble(index as f64) * 0.2;
        let instance = Instance::plain(anchor, 0.0, Vec3::splat(scale))
            .tinted(Tint::Solid(BUSH_LEAVES.scale(jitter as f32)));
        placed.push(Species::Bush, instance);
    }

    fn place_flowers(&self, anchor: DVec3, rng: &mut ChunkRng, placed: &mut Placed) {
        let pick = pick_index(rng.next_f64(), FLOWER_PALETTE.len());
        let cluster_color = Rgb::from_hex(FLOWER_PALETTE[pick]);
        let count = flower_cluster_size(rng.peek());

        for _ in 0..count {
            let dx = (rng.next_f64() - 0.5) * FLOWER_SPREAD;
            let dz = (rng.next_f64() - 0.5) * FLOWER_SPREAD;
            let Some(position) = self.settle(anchor, dx, dz, FLOWER_TOLERANCE) else {
                continue;
            };
            let scale = Vec3::splat(rng.next_range(0.7, 1.3) as f32);

            placed.push(Species::FlowerStem, Instance::plain(position, 0.0, scale));

            let jitter = 1.0 + (rng.peek() - 0.5) * 0.2;
            let head = Instance::plain(position, 0.0, scale)
                .tinted(Tint::Solid(cluster_color.scale(jitter as f32)));
            placed.push(Species::FlowerHead, head);

            let leaves = 1 + (scramble(rng.peek()) * 2.0) as usize;
            for k in 0..leaves {
                let yaw = scramble(rng.current() * k as f64 * 13.37) * TAU;
                placed.push(Species::FlowerLeaf, Instance::plain(position, yaw, scale));
            }
        }
    }

    fn place_single_rock(anchor: DVec3, rng: &mut ChunkRng, placed: &mut Placed) {
        let scale = Vec3::new(
            rng.next_range(0.8, 1.2) as f32,
            rng.next_range(0.6, 1.2) as f32,
            rng.next_range(0.8, 1.2) as f32,
        );
        placed.push(Species::FreestandingRock, Instance::plain(anchor, 0.0, scale));
    }

    /// Autumn or green foliage depending on a regional noise channel.
    fn leaf_color(&self, x: f64, z: f64, seed: f64) -> Rgb {
        let noise = self.surface.height_field().noise();
        let autumn = (noise.sample_2d(x * 0.02, z * 0.02) + 1.0) / 2.0;
        let palette = if autumn > AUTUMN_THRESHOLD { &AUTUMN_LEAVES } else { &GREEN_LEAVES };
        let pick = pick_index(scramble(seed * 3.0), palette.len());
        let brightness = 0.85 + scramble(seed * 2.0) * 0.3;
        Rgb::from_hex(palette[pick]).scale(brightness as f32)
    }
}

/// 2 to 5 rocks for a draw in [0, 1)
fn rock_cluster_size(draw: f64) -> usize {
    2 + ((draw * 4.0) as usize).min(3)
}

/// 3 to 7 stems for a draw in [0, 1)
fn flower_cluster_size(draw: f64) -> usize {
    3 + ((draw * 5.0) as usize).min(4)
}

fn pick_index(draw: f64, len: usize) -> usize {
    ((draw * len as f64) as usize).min(len - 1)
}
