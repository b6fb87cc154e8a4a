//! World generation pipeline: terrain mesh, ground cap and vegetation for one chunk.
//!
//! The pipeline owns one shared [`NoiseField`] and the builders layered on
//! top of it. Every output is a pure function of the chunk key, the
//! vegetation density and the noise seed, so chunks can be built on any
//! thread in any order.

pub mod config;

pub use config::{StreamingParams, WorldConfig};

use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;

use crate::core::Result;
use crate::streaming::chunk::ChunkKey;
use crate::terrain::height::{HeightField, TerrainParams};
use crate::terrain::mesh::{GroundCap, TerrainGeometry, TerrainMeshBuilder};
use crate::terrain::perlin::NoiseField;
use crate::terrain::surface::SurfaceClassifier;
use crate::vegetation::scatter::{VegetationBatchSet, VegetationScatterer};
use crate::vegetation::templates::TemplateRegistry;

/// Everything generated for one chunk key.
#[derive(Clone, Debug)]
pub struct GeneratedChunk {
    pub key: ChunkKey,
    pub terrain: TerrainGeometry,
    pub ground_cap: GroundCap,
    pub vegetation: VegetationBatchSet,
}

/// Composes the terrain and vegetation builders over a shared noise field.
#[derive(Clone, Debug)]
pub struct WorldGenerator {
    noise: Arc<NoiseField>,
    mesh: TerrainMeshBuilder,
    scatterer: VegetationScatterer,
}

impl WorldGenerator {
    /// Create from configuration with every species template registered.
    pub fn new(config: &WorldConfig) -> Self {
        Self::with_templates(config, Arc::new(TemplateRegistry::standard()))
    }

    pub fn with_templates(config: &WorldConfig, templates: Arc<TemplateRegistry>) -> Self {
        let noise = Arc::new(NoiseField::new(config.seed));
        Self::from_noise(noise, config.terrain.clone(), templates)
    }

    pub fn from_noise(
        noise: Arc<NoiseField>,
        terrain: TerrainParams,
        templates: Arc<TemplateRegistry>,
    ) -> Self {
        let surface = SurfaceClassifier::new(HeightField::new(Arc::clone(&noise), terrain));
        Self {
            noise,
            mesh: TerrainMeshBuilder::new(surface.clone()),
            scatterer: VegetationScatterer::new(surface, templates),
        }
    }

    /// Same noise and terrain with a different template registry.
    pub fn replace_templates(&self, templates: Arc<TemplateRegistry>) -> Self {
        let surface = self.surface().clone();
        Self {
            noise: Arc::clone(&self.noise),
            mesh: self.mesh.clone(),
            scatterer: VegetationScatterer::new(surface, templates),
        }
    }

    pub fn noise(&self) -> &Arc<NoiseField> {
        &self.noise
    }

    pub fn height_field(&self) -> &HeightField {
        self.surface().height_field()
    }

    pub fn surface(&self) -> &SurfaceClassifier {
        self.mesh.surface()
    }

    pub fn templates(&self) -> &Arc<TemplateRegistry> {
        self.scatterer.templates()
    }

    pub fn generate_terrain(&self, key: ChunkKey) -> (TerrainGeometry, GroundCap) {
        (self.mesh.build(key), GroundCap::for_chunk(key))
    }

    pub fn generate_vegetation(&self, key: ChunkKey, density: f32) -> Result<VegetationBatchSet> {
        self.scatterer.scatter(key, density)
    }

    /// Build a complete chunk. Vegetation is scattered first so a missing
    /// template fails before any mesh work is done.
    pub fn generate_chunk(&self, key: ChunkKey, density: f32) -> Result<GeneratedChunk> {
        let vegetation = self.generate_vegetation(key, density)?;
        let (terrain, ground_cap) = self.generate_terrain(key);
        Ok(GeneratedChunk { key, terrain, ground_cap, vegetation })
    }

    /// Build many chunks in parallel. Results keep the order of `keys`.
    pub fn generate_chunks(&self, keys: &[ChunkKey], density: f32) -> Vec<(ChunkKey, Result<GeneratedChunk>)> {
        if keys.is_empty() {
            return Vec::new();
        }

        let start = Instant::now();
        let results: Vec<_> = keys
            .par_iter()
            .map(|&key| (key, self.generate_chunk(key, density)))
            .collect();

        let elapsed = start.elapsed();
        log::debug!(
            "Generated {} chunks in {:.1}ms ({:.0} chunks/sec)",
            results.len(),
            elapsed.as_secs_f64() * 1000.0,
            results.len() as f64 / elapsed.as_secs_f64().max(1e-9)
        );
        results
    }
}
