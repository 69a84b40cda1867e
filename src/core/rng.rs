//! Deterministic Random Number Generator
//!
//! Uses Xorshift128+ algorithm for fast, high-quality, deterministic randomness.
//! Given the same seed, produces identical sequence on all platforms.
//! Only spawn placement draws from it, so a round can be reproduced from its seed.

use serde::{Serialize, Deserialize};
use sha2::{Sha256, Digest};

use super::vec3::Vec3;

/// Deterministic PRNG using Xorshift128+ algorithm.
///
/// # Example
///
/// ```
/// use cannon_duel::core::rng::DeterministicRng;
///
/// let mut a = DeterministicRng::new(12345);
/// let mut b = DeterministicRng::new(12345);
/// assert_eq!(a.next_u64(), b.next_u64());
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeterministicRng {
    state: [u64; 2],
}

impl Default for DeterministicRng {
    fn default() -> Self {
        Self::new(0)
    }
}

impl DeterministicRng {
    /// Create a new RNG from a 64-bit seed.
    ///
    /// Uses SplitMix64 to initialize the internal state, ensuring
    /// good distribution even from weak seeds.
    pub fn new(seed: u64) -> Self {
        let mut s = seed;
        let state0 = splitmix64(&mut s);
        let state1 = splitmix64(&mut s);

        // Ensure state is never all zeros
        let state = if state0 == 0 && state1 == 0 {
            [1, 1]
        } else {
            [state0, state1]
        };

        Self { state }
    }

    /// Create the RNG for one round of a session.
    pub fn for_round(session_seed: u64, round: u32) -> Self {
        Self::new(derive_round_seed(session_seed, round))
    }

    /// Generate the next 64-bit random value.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let s0 = self.state[0];
        let mut s1 = self.state[1];
        let result = s0.wrapping_add(s1);

        s1 ^= s0;
        self.state[0] = s0.rotate_left(24) ^ s1 ^ (s1 << 16);
        self.state[1] = s1.rotate_left(37);

        result
    }

    /// Generate a float in [0, 1).
    #[inline]
    pub fn next_unit(&mut self) -> f32 {
        // 24 bits of mantissa
        (self.next_u64() >> 40) as f32 / (1u64 << 24) as f32
    }

    /// Generate a float in [min, max).
    #[inline]
    pub fn next_range(&mut self, min: f32, max: f32) -> f32 {
        if min >= max {
            return min;
        }
        lerp_below(min, max, self.next_unit())
    }

    /// Generate a point inside the box spanned by `min` and `max`.
    pub fn next_point(&mut self, min: Vec3, max: Vec3) -> Vec3 {
        let x = self.next_range(min.x, max.x);
        let y = self.next_range(min.y, max.y);
        let z = self.next_range(min.z, max.z);
        Vec3::new(x, y, z)
    }
}

/// `min + (max - min) * unit`, kept below `max`.
///
/// f32 rounding can land a unit just under 1 exactly on `max`.
#[inline]
fn lerp_below(min: f32, max: f32, unit: f32) -> f32 {
    let v = min + (max - min) * unit;
    if v < max {
        v
    } else {
        min
    }
}

/// SplitMix64 for seed initialization.
/// Produces well-distributed values from sequential seeds.
#[inline]
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// Derive the spawn seed for a round.
///
/// Rounds of the same session get unrelated layouts while staying
/// reproducible from `(session_seed, round)`.
pub fn derive_round_seed(session_seed: u64, round: u32) -> u64 {
    let mut hasher = Sha256::new();

    // Domain separator
    hasher.update(b"CANNON_DUEL_ROUND_V1");
    hasher.update(session_seed.to_le_bytes());
    hasher.update(round.to_le_bytes());

    let hash = hasher.finalize();
    let mut seed = [0u8; 8];
    seed.copy_from_slice(&hash[..8]);
    u64::from_le_bytes(seed)
}
