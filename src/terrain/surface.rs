//! Surface normals and biome colouring derived from the height field

use glam::DVec3;

use super::height::HeightField;
use crate::core::Rgb;

/// Step used for central finite differences of elevation.
pub const NORMAL_EPSILON: f64 = 0.01;

const SAND: Rgb = Rgb::new(0.9, 0.8, 0.5);
const LUSH_GRASS: Rgb = Rgb::new(0.1, 0.4, 0.05);
const DRY_GRASS: Rgb = Rgb::new(0.4, 0.5, 0.1);
const FOREST_FLOOR: Rgb = Rgb::new(0.2, 0.3, 0.1);
const ROCK: Rgb = Rgb::new(0.5, 0.45, 0.4);
const SNOW: Rgb = Rgb::new(0.95, 0.95, 1.0);

/// Elevation band a surface colour is drawn from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SurfaceBand {
    /// Below 3
    Sand,
    /// 3..25, grass fading into forest floor
    Lowland,
    /// 25..40, forest floor fading into rock
    Highland,
    /// 40..55, rock fading into snow
    Alpine,
    /// 55 and above
    Snow,
}

impl SurfaceBand {
    pub fn from_height(height: f64) -> Self {
        if height < 3.0 {
            SurfaceBand::Sand
        } else if height < 25.0 {
            SurfaceBand::Lowland
        } else if height < 40.0 {
            SurfaceBand::Highland
        } else if height < 55.0 {
            SurfaceBand::Alpine
        } else {
            SurfaceBand::Snow
        }
    }

    /// Base colour inside the band before slope, tint and brightness.
    fn base_color(self, height: f64, grass: Rgb) -> Rgb {
        match self {
            SurfaceBand::Sand => SAND,
            SurfaceBand::Lowland => grass.lerp(FOREST_FLOOR, ((height - 3.0) / 22.0) as f32),
            SurfaceBand::Highland => FOREST_FLOOR.lerp(ROCK, ((height - 25.0) / 15.0) as f32),
            SurfaceBand::Alpine => ROCK.lerp(SNOW, ((height - 40.0) / 15.0) as f32),
            SurfaceBand::Snow => SNOW,
        }
    }
}

/// Derives normals and colours for any terrain point.
#[derive(Clone, Debug)]
pub struct SurfaceClassifier {
    height: HeightField,
}

impl SurfaceClassifier {
    pub fn new(height: HeightField) -> Self {
        Self { height }
    }

    pub fn height_field(&self) -> &HeightField {
        &self.height
    }

    /// Unit surface normal from central differences of elevation.
    pub fn normal_at(&self, x: f64, z: f64) -> DVec3 {
        let e = NORMAL_EPSILON;
        let h = &self.height;
        let dh_dx = (h.elevation(x + e, z) - h.elevation(x - e, z)) / (2.0 * e);
        let dh_dz = (h.elevation(x, z + e) - h.elevation(x, z - e)) / (2.0 * e);
        DVec3::new(-dh_dx, 1.0, -dh_dz).normalize()
    }

    /// Surface colour in [0, 1]^3.
    pub fn color(&self, height: f64, x: f64, z: f64, normal_y: f64) -> Rgb {
        let noise = self.height.noise();
        let moisture = (noise.sample_2d(x * 0.005 + 50.0, z * 0.005 + 50.0) + 1.0) / 2.0;
        let rockiness = (noise.sample_2d(x * 0.05, z * 0.05) + 1.0) / 2.0;
        let tint = noise.sample_2d(x * 0.008, z * 0.008) as f32;

        let grass = DRY_GRASS.lerp(LUSH_GRASS, moisture as f32);
        let mut color = SurfaceBand::from_height(height).base_color(height, grass);

        let slope = 1.0 - (normal_y * 1.75).min(1.0);
        color = color.lerp(ROCK, (slope * slope + rockiness * 0.2) as f32);

        if tint > 0.0 {
            color.r += tint * 0.08;
            color.g += tint * 0.04;
        } else {
            color.b -= tint * 0.05;
        }

        let brightness = 0.9 + (noise.sample_2d(x * 0.08, z * 0.08) + 1.0) / 2.0 * 0.2;
        color.scale(brightness as f32).clamped()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::height::TerrainParams;
    use crate::terrain::perlin::NoiseField;
    use std::sync::Arc;

    fn classifier() -> SurfaceClassifier {
        let noise = Arc::new(NoiseField::new(12345));
        SurfaceClassifier::new(HeightField::new(noise, TerrainParams::default()))
    }

    #[test]
    fn test_band_thresholds() {
        assert_eq!(SurfaceBand::from_height(-20.0), SurfaceBand::Sand);
        assert_eq!(SurfaceBand::from_height(2.999), SurfaceBand::Sand);
        assert_eq!(SurfaceBand::from_height(3.0), SurfaceBand::Lowland);
        assert_eq!(SurfaceBand::from_height(24.9), SurfaceBand::Lowland);
        assert_eq!(SurfaceBand::from_height(25.0), SurfaceBand::Highland);
        assert_eq!(SurfaceBand::from_height(40.0), SurfaceBand::Alpine);
        assert_eq!(SurfaceBand::from_height(55.0), SurfaceBand::Snow);
        assert_eq!(SurfaceBand::from_height(500.0), SurfaceBand::Snow);
    }

    #[test]
    fn test_sand_band_ignores_grass() {
        let grass = Rgb::new(0.0, 1.0, 0.0);
        assert_eq!(SurfaceBand::Sand.base_color(1.0, grass), SAND);
        assert_eq!(SurfaceBand::Lowland.base_color(3.0, grass), grass);
    }

    #[test]
    fn test_band_colors_continuous_at_edges() {
        let grass = DRY_GRASS;
        let lowland_top = SurfaceBand::Lowland.base_color(25.0, grass);
        assert_eq!(lowland_top, FOREST_FLOOR);
        let highland_top = SurfaceBand::Highland.base_color(40.0, grass);
        assert_eq!(highland_top, ROCK);
        let alpine_top = SurfaceBand::Alpine.base_color(55.0, grass);
        assert_eq!(alpine_top, SNOW);
    }

    #[test]
    fn test_normal_is_unit_and_upward() {
        let c = classifier();
        for i in 0..100 {
            let x = i as f64 * 7.3 - 200.0;
            let z = i as f64 * 3.1 + 40.0;
            let n = c.normal_at(x, z);
            assert!((n.length() - 1.0).abs() < 1e-9);
            assert!(n.y > 0.0);
        }
    }

    #[test]
    fn test_color_in_unit_cube() {
        let c = classifier();
        for i in 0..300 {
            let x = i as f64 * 11.1 - 1500.0;
            let z = i as f64 * -5.7 + 800.0;
            let h = c.height_field().elevation(x, z);
            let n = c.normal_at(x, z);
            let color = c.color(h, x, z, n.y);
            for ch in color.to_array() {
                assert!((0.0..=1.0).contains(&ch));
            }
        }
    }

    #[test]
    fn test_color_deterministic() {
        let a = classifier();
        let b = classifier();
        let ca = a.color(12.0, 81.5, -9.25, 0.8);
        let cb = b.color(12.0, 81.5, -9.25, 0.8);
        assert_eq!(ca, cb);
    }

    #[test]
    fn test_slope_changes_color() {
        let c = classifier();
        let flat = c.color(10.0, 5.0, 5.0, 1.0);
        let steep = c.color(10.0, 5.0, 5.0, 0.1);
        assert_ne!(flat, steep);
    }
}
