//! Chunk-local pseudo-random sequence for vegetation placement.
//!
//! Deliberately independent of the terrain noise table: every chunk starts
//! from a value derived only from its key and advances by feeding the
//! previous value back through `scramble`.

use crate::streaming::chunk::ChunkKey;

const ADVANCE: f64 = 12.9898;

/// Fractional part of `sin(seed) * 10000`, in [0, 1).
#[inline]
pub fn scramble(seed: f64) -> f64 {
    let x = seed.sin() * 10000.0;
    x - x.floor()
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChunkRng {
    state: f64,
}

impl ChunkRng {
    pub fn for_chunk(key: ChunkKey) -> Self {
        let seed = key.cx as i64 * 1000 + key.cz as i64;
        // 0 is a fixed point of the sequence, and key (0, 0) hashes to it.
        let mut state = scramble(seed as f64);
        if state == 0.0 {
            state = scramble(ADVANCE);
        }
        Self { state }
    }

    /// Advance and return the new value in [0, 1).
    pub fn next_f64(&mut self) -> f64 {
        self.state = scramble(self.state * ADVANCE);
        self.state
    }

    /// The value `next_f64` would return, without advancing.
    pub fn peek(&self) -> f64 {
        scramble(self.state * ADVANCE)
    }

    /// Most recently produced value.
    pub fn current(&self) -> f64 {
        self.state
    }

    /// `lo + next * (hi - lo)`
    pub fn next_range(&mut self, lo: f64, hi: f64) -> f64 {
        lo + self.next_f64() * (hi - lo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scramble_unit_interval() {
        for i in -500..500 {
            let v = scramble(i as f64 * 0.377);
            assert!((0.0..1.0).contains(&v));
        }
    }

    #[test]
    fn test_same_key_same_sequence() {
        let mut a = ChunkRng::for_chunk(ChunkKey::new(3, -8));
        let mut b = ChunkRng::for_chunk(ChunkKey::new(3, -8));
        for _ in 0..100 {
            assert_eq!(a.next_f64().to_bits(), b.next_f64().to_bits());
        }
    }

    #[test]
    fn test_neighbouring_keys_diverge() {
        let mut a = ChunkRng::for_chunk(ChunkKey::new(0, 1));
        let mut b = ChunkRng::for_chunk(ChunkKey::new(1, 0));
        let same = (0..10).filter(|_| a.next_f64() == b.next_f64()).count();
        assert!(same < 10);
    }

    #[test]
    fn test_origin_chunk_advances() {
        let mut rng = ChunkRng::for_chunk(ChunkKey::new(0, 0));
        let a = rng.next_f64();
        let b = rng.next_f64();
        assert_ne!(a, 0.0);
        assert_ne!(a, b);
    }

    #[test]
    fn test_peek_does_not_advance() {
        let mut rng = ChunkRng::for_chunk(ChunkKey::new(5, 5));
        let peeked = rng.peek();
        assert_eq!(rng.peek(), peeked);
        assert_eq!(rng.next_f64(), peeked);
        assert_eq!(rng.current(), peeked);
    }

    #[test]
    fn test_next_range() {
        let mut rng = ChunkRng::for_chunk(ChunkKey::new(-2, 9));
        for _ in 0..200 {
            let v = rng.next_range(0.7, 1.3);
            assert!((0.7..1.3).contains(&v));
        }
    }
}
