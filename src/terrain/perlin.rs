//! Seeded gradient noise shared by every terrain sampler.
//!
//! Classic improved Perlin noise over a 256-entry permutation table that is
//! shuffled once at construction and duplicated to 512 entries so lattice
//! hashing never wraps. The table is immutable afterwards, so one
//! `Arc<NoiseField>` can be read from any number of generation threads.

use noise::NoiseFn;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Gradient noise primitive: `sample(x, y, z)` in [-1, 1].
#[derive(Clone)]
pub struct NoiseField {
    perm: [u8; 512],
    seed: Option<u64>,
}

impl NoiseField {
    /// Deterministic table for the given seed.
    pub fn new(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut field = Self::shuffled(&mut rng);
        field.seed = Some(seed);
        field
    }

    /// Table shuffled from OS entropy; differs on every process run.
    pub fn from_entropy() -> Self {
        let mut rng = StdRng::from_os_rng();
        Self::shuffled(&mut rng)
    }

    fn shuffled(rng: &mut StdRng) -> Self {
        let mut base: Vec<u8> = (0..=255u8).collect();
        base.shuffle(rng);

        let mut perm = [0u8; 512];
        perm[..256].copy_from_slice(&base);
        perm[256..].copy_from_slice(&base);
        Self { perm, seed: None }
    }

    /// Seed the table was built from, if it was built deterministically.
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// Sample noise at a 3D point.
    pub fn sample(&self, x: f64, y: f64, z: f64) -> f64 {
        let p = &self.perm;

        let xi = (x.floor() as i64 & 255) as usize;
        let yi = (y.floor() as i64 & 255) as usize;
        let zi = (z.floor() as i64 & 255) as usize;

        let x = x - x.floor();
        let y = y - y.floor();
        let z = z - z.floor();

        let u = fade(x);
        let v = fade(y);
        let w = fade(z);

        let a = p[xi] as usize + yi;
        let aa = p[a] as usize + zi;
        let ab = p[a + 1] as usize + zi;
        let b = p[xi + 1] as usize + yi;
        let ba = p[b] as usize + zi;
        let bb = p[b + 1] as usize + zi;

        let value = lerp(
            w,
            lerp(
                v,
                lerp(u, grad(p[aa], x, y, z), grad(p[ba], x - 1.0, y, z)),
                lerp(u, grad(p[ab], x, y - 1.0, z), grad(p[bb], x - 1.0, y - 1.0, z)),
            ),
            lerp(
                v,
                lerp(u, grad(p[aa + 1], x, y, z - 1.0), grad(p[ba + 1], x - 1.0, y, z - 1.0)),
                lerp(
                    u,
                    grad(p[ab + 1], x, y - 1.0, z - 1.0),
                    grad(p[bb + 1], x - 1.0, y - 1.0, z - 1.0),
                ),
            ),
        );

        value.clamp(-1.0, 1.0)
    }

    /// Sample the z = 0 slice.
    pub fn sample_2d(&self, x: f64, y: f64) -> f64 {
        self.sample(x, y, 0.0)
    }
}

impl std::fmt::Debug for NoiseField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoiseField").field("seed", &self.seed).finish_non_exhaustive()
    }
}

impl NoiseFn<f64, 2> for NoiseField {
    fn get(&self, point: [f64; 2]) -> f64 {
        self.sample_2d(point[0], point[1])
    }
}

impl NoiseFn<f64, 3> for NoiseField {
    fn get(&self, point: [f64; 3]) -> f64 {
        self.sample(point[0], point[1], point[2])
    }
}

#[inline]
fn fade(t: f64) -> f64 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

#[inline]
fn lerp(t: f64, a: f64, b: f64) -> f64 {
    a + t * (b - a)
}

/// Dot product with one of 12 edge gradients picked by the low 4 hash bits.
#[inline]
fn grad(hash: u8, x: f64, y: f64, z: f64) -> f64 {
    let h = hash & 15;
    let u = if h < 8 { x } else { y };
    let v = if h < 4 {
        y
    } else if h == 12 || h == 14 {
        x
    } else {
        z
    };
    let u = if h & 1 == 0 { u } else { -u };
    let v = if h & 2 == 0 { v } else { -v };
    u + v
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permutation_is_duplicated_shuffle() {
        let field = NoiseField::new(7);
        let mut seen = [false; 256];
        for &v in &field.perm[..256] {
            assert!(!seen[v as usize], "value {} repeated", v);
            seen[v as usize] = true;
        }
        assert_eq!(&field.perm[..256], &field.perm[256..]);
    }

    #[test]
    fn test_same_seed_same_values() {
        let a = NoiseField::new(12345);
        let b = NoiseField::new(12345);
        for i in 0..200 {
            let x = i as f64 * 0.731 - 40.0;
            let z = i as f64 * 1.37 + 3.0;
            assert_eq!(a.sample(x, 0.5, z).to_bits(), b.sample(x, 0.5, z).to_bits());
        }
    }

    #[test]
    fn test_different_seeds_differ() {
        let a = NoiseField::new(1);
        let b = NoiseField::new(2);
        let differs = (0..50).any(|i| {
            let x = i as f64 * 0.37 + 0.11;
            a.sample_2d(x, x * 0.5) != b.sample_2d(x, x * 0.5)
        });
        assert!(differs);
    }

    #[test]
    fn test_zero_at_lattice_points() {
        let field = NoiseField::new(99);
        for x in -3..3 {
            for y in -3..3 {
                assert_eq!(field.sample(x as f64, y as f64, 0.0), 0.0);
            }
        }
    }

    #[test]
    fn test_range() {
        let field = NoiseField::new(3);
        for i in 0..5000 {
            let t = i as f64 * 0.0173;
            let n = field.sample(t * 3.1, t * 0.7 - 11.0, t * 1.9);
            assert!((-1.0..=1.0).contains(&n), "noise {} out of range", n);
        }
    }

    #[test]
    fn test_noise_fn_matches_sample() {
        let field = NoiseField::new(5);
        assert_eq!(NoiseFn::<f64, 2>::get(&field, [1.25, -3.5]), field.sample_2d(1.25, -3.5));
        assert_eq!(NoiseFn::<f64, 3>::get(&field, [0.3, 0.6, 0.9]), field.sample(0.3, 0.6, 0.9));
    }

    #[test]
    fn test_entropy_table_has_no_seed() {
        assert_eq!(NoiseField::from_entropy().seed(), None);
        assert_eq!(NoiseField::new(4).seed(), Some(4));
    }
}
