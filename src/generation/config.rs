//! World configuration and per-tick streaming parameters.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::Result;
use crate::streaming::chunk::RENDER_DISTANCE;
use crate::terrain::height::TerrainParams;
use crate::vegetation::scatter::MAX_DENSITY;

/// Parameters the render loop may change between ticks.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingParams {
    /// Radius in chunks around the observer's chunk
    pub render_distance: i32,
    /// Multiplier on vegetation candidates per chunk
    pub vegetation_density: f32,
}

impl Default for StreamingParams {
    fn default() -> Self {
        Self {
            render_distance: RENDER_DISTANCE,
            vegetation_density: 1.0,
        }
    }
}

impl StreamingParams {
    pub fn new(render_distance: i32, vegetation_density: f32) -> Self {
        Self { render_distance, vegetation_density }
    }

    /// Clamp out-of-range values to the nearest valid one.
    ///
    /// A non-finite density falls back to zero; density is capped at
    /// [`MAX_DENSITY`].
    pub fn sanitized(self) -> Self {
        let mut out = self;
        if out.render_distance < 0 {
            log::warn!("render distance {} is negative, clamping to 0", out.render_distance);
            out.render_distance = 0;
        }
        if !out.vegetation_density.is_finite() || out.vegetation_density < 0.0 {
            log::warn!(
                "vegetation density {} is out of range, clamping to 0",
                out.vegetation_density
            );
            out.vegetation_density = 0.0;
        }
        if out.vegetation_density > MAX_DENSITY {
            log::warn!(
                "vegetation density {} exceeds {}, clamping",
                out.vegetation_density,
                MAX_DENSITY
            );
            out.vegetation_density = MAX_DENSITY;
        }
        out
    }

    pub fn radius(&self) -> u32 {
        self.render_distance.max(0) as u32
    }
}

/// Top-level configuration for a generated world.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Seed for the noise permutation table
    pub seed: u64,
    pub terrain: TerrainParams,
    pub streaming: StreamingParams,
    /// Max chunk builds in flight on the background queue
    pub max_build_jobs: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            seed: 12345,
            terrain: TerrainParams::default(),
            streaming: StreamingParams::default(),
            max_build_jobs: 4,
        }
    }
}

impl WorldConfig {
    /// Load from a JSON file. Missing fields take their default values.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_json(&text)?;
        log::debug!("loaded world config from {}", path.as_ref().display());
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
