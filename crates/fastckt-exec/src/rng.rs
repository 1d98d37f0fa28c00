//! Seedable source of lane-wide random values for RANDOM gates.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use crate::Lane;

/// Generator feeding RANDOM gates.
///
/// Each execution borrows it mutably, so a single instance can never be
/// drawn from by two executions at once. Hosts running circuits concurrently
/// give each thread its own instance.
pub struct RandomSource {
    rng: ChaCha20Rng,
}

impl RandomSource {
    /// Creates a generator with a deterministic seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }

    /// Creates a generator seeded from the wall clock.
    pub fn from_time() -> Self {
        Self::new(time_seed())
    }

    /// Reseeds deterministically. Subsequent draws are identical to those of
    /// `RandomSource::new(seed)`.
    pub fn set_seed(&mut self, seed: u64) {
        self.rng = ChaCha20Rng::seed_from_u64(seed);
    }

    /// Reseeds from the wall clock.
    pub fn set_seed_time(&mut self) {
        self.set_seed(time_seed());
    }

    /// Draws one register of independent random lanes.
    #[inline]
    pub fn draw<L: Lane>(&mut self) -> L {
        L::random(&mut self.rng)
    }
}

impl Default for RandomSource {
    fn default() -> Self {
        Self::from_time()
    }
}

// Keep the generator state out of logs.
impl fmt::Debug for RandomSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RandomSource").finish_non_exhaustive()
    }
}

fn time_seed() -> u64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    // Fold the high bits in so seeds taken within the same second differ.
    (nanos as u64) ^ ((nanos >> 64) as u64)
}
