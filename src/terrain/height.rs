//! Elevation function built from three fractal noise regimes

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::perlin::NoiseField;

/// One fractal sum: each octave halves amplitude and doubles frequency.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct OctaveLayer {
    pub octaves: u32,
    pub frequency: f64,
    pub amplitude: f64,
}

impl OctaveLayer {
    pub const fn new(octaves: u32, frequency: f64, amplitude: f64) -> Self {
        Self { octaves, frequency, amplitude }
    }
}

/// Parameters controlling terrain elevation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainParams {
    /// Broad landmasses
    pub continental: OctaveLayer,
    /// Small bumps on top of the continents
    pub detail: OctaveLayer,
    /// `(1 - |n|)` octaves producing sharp crests
    pub ridge: OctaveLayer,
    /// Frequency of the mask that fades ridges in and out
    pub ridge_blend_frequency: f64,
}

impl Default for TerrainParams {
    fn default() -> Self {
        Self {
            continental: OctaveLayer::new(4, 0.008, 30.0),
            detail: OctaveLayer::new(3, 0.05, 4.0),
            ridge: OctaveLayer::new(4, 0.02, 15.0),
            ridge_blend_frequency: 0.003,
        }
    }
}

/// Elevation at any world (x, z). Cheap to clone; the noise table is shared.
#[derive(Clone, Debug)]
pub struct HeightField {
    noise: Arc<NoiseField>,
    params: TerrainParams,
}

impl HeightField {
    pub fn new(noise: Arc<NoiseField>, params: TerrainParams) -> Self {
        Self { noise, params }
    }

    pub fn params(&self) -> &TerrainParams {
        &self.params
    }

    pub fn noise(&self) -> &Arc<NoiseField> {
        &self.noise
    }

    /// Terrain height at world position (x, z)
    pub fn elevation(&self, x: f64, z: f64) -> f64 {
        let continental = self.fractal(&self.params.continental, x, z, |n| n);
        let detail = self.fractal(&self.params.detail, x, z, |n| n);
        let ridged = self.fractal(&self.params.ridge, x, z, |n| 1.0 - n.abs());
        let blend = self.ridge_blend(x, z);

        continental + detail + ridged * blend * blend
    }

    /// Ridge mask in [0, 1].
    pub fn ridge_blend(&self, x: f64, z: f64) -> f64 {
        let f = self.params.ridge_blend_frequency;
        (self.noise.sample_2d(x * f, z * f) + 1.0) / 2.0
    }

    fn fractal(&self, layer: &OctaveLayer, x: f64, z: f64, shape: impl Fn(f64) -> f64) -> f64 {
        let mut sum = 0.0;
        let mut frequency = layer.frequency;
        let mut amplitude = layer.amplitude;
        for _ in 0..layer.octaves {
            sum += shape(self.noise.sample_2d(x * frequency, z * frequency)) * amplitude;
            amplitude *= 0.5;
            frequency *= 2.0;
        }
        sum
    }
}
