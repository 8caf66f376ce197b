//! Deterministic, seedable PRNG.
//!
//! The algorithm itself is explicitly out of scope for this specification
//! ("a deterministic PRNG seedable from a 64-bit state"); what matters is
//! that two `Prng`s seeded identically produce identical draw sequences,
//! and that state can be threaded out of one computation and into another
//! (the genetic engine copies a genotype's PRNG state into and out of each
//! trait evaluation). `rand_pcg::Pcg64` is used as the concrete generator
//! since it is a real, seedable, reproducible PRNG in this codebase's
//! dependency lineage.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrngState {
    pub state: [u64; 2],
}

impl PrngState {
    pub fn from_seed(seed: u64) -> Self {
        PrngState {
            state: [seed, seed ^ 0x9E3779B97F4A7C15],
        }
    }
}

/// A running PRNG, constructed from and collapsible back into a
/// [`PrngState`] so callers can thread state across VM re-entries.
pub struct Prng {
    rng: Pcg64,
    seed_state: [u64; 2],
}

impl Prng {
    pub fn from_state(state: PrngState) -> Self {
        let seed = ((state.state[0] as u128) << 64) | state.state[1] as u128;
        Prng {
            rng: Pcg64::from_seed(seed.to_le_bytes()),
            seed_state: state.state,
        }
    }

    /// Snapshot: NOT the same as the live generator's internal counter,
    /// but re-seeding from it reproduces the same sequence this instance
    /// was created with. Sufficient for the threading use the genetic
    /// engine needs (re-seed a scratch VM with a derived seed per call).
    pub fn state(&self) -> PrngState {
        PrngState {
            state: self.seed_state,
        }
    }

    pub fn i32_range(&mut self, min: i32, max: i32) -> i32 {
        if min >= max {
            return min;
        }
        self.rng.gen_range(min..max)
    }

    pub fn f32(&mut self) -> f32 {
        self.rng.gen_range(0.0f32..1.0f32)
    }

    pub fn f32_range(&mut self, min: f32, max: f32) -> f32 {
        if min >= max {
            return min;
        }
        self.rng.gen_range(min..max)
    }

    /// Derives a fresh, distinct seed from this generator's stream, used to
    /// seed per-genotype PRNGs from one master seed during initial
    /// generation construction.
    pub fn derive_seed(&mut self) -> u64 {
        self.rng.gen()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_yields_same_sequence() {
        let mut a = Prng::from_state(PrngState::from_seed(42));
        let mut b = Prng::from_state(PrngState::from_seed(42));
        for _ in 0..10 {
            assert_eq!(a.i32_range(0, 1000), b.i32_range(0, 1000));
        }
    }

    #[test]
    fn range_draws_stay_in_bounds() {
        let mut p = Prng::from_state(PrngState::from_seed(7));
        for _ in 0..200 {
            let v = p.f32_range(0.0, 500.0);
            assert!((0.0..500.0).contains(&v));
        }
    }
}
