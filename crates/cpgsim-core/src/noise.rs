use crate::{Methylation, Result, SimError, F};
use rand::distributions::WeightedIndex;
use rand::rngs::OsRng;
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rand_distr::{Distribution, Open01};

/// Random stream owned by a single replicate.
#[derive(Clone, Debug)]
pub struct ReplicateRng {
    rng: ChaCha20Rng,
}

impl ReplicateRng {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }

    pub fn from_replicate_id(global_seed: u64, replicate: u64) -> Self {
        // Combine seeds deterministically
        let seed = global_seed.wrapping_add(replicate.wrapping_mul(0x9e3779b97f4a7c15));
        Self::new(seed)
    }

    /// One of the three levels with probability 1/3 each.
    pub fn methylation(&mut self) -> Methylation {
        Methylation::ALL[self.rng.gen_range(0..Methylation::ALL.len())]
    }

    /// Exponential inter-event time `-ln(u) / total` with `u` in (0, 1).
    pub fn waiting_time(&mut self, total_propensity: F) -> F {
        let u: F = Open01.sample(&mut self.rng);
        -u.ln() / total_propensity
    }

    /// Uniform draw on `[0, total)` for roulette-wheel selection.
    pub fn roulette(&mut self, total: F) -> F {
        self.rng.gen::<F>() * total
    }

    /// Categorical draw over `weights`.
    pub fn categorical(&mut self, weights: &[F]) -> Result<usize> {
        let dist = WeightedIndex::new(weights).map_err(|e| SimError::RandomSource(e.to_string()))?;
        Ok(dist.sample(&mut self.rng))
    }
}

/// One independent stream per replicate, all derived from a global seed.
///
/// Draws for a replicate only ever come from its own stream, so results do not
/// depend on how replicates are scheduled across threads.
#[derive(Clone, Debug)]
pub struct ReplicateStreams {
    global_seed: u64,
    streams: Vec<ReplicateRng>,
}

impl ReplicateStreams {
    pub fn new(global_seed: u64, num_replicates: usize) -> Self {
        let streams = (0..num_replicates as u64)
            .map(|replicate| ReplicateRng::from_replicate_id(global_seed, replicate))
            .collect();
        Self { global_seed, streams }
    }

    /// Seeds from the operating system.
    pub fn from_entropy(num_replicates: usize) -> Result<Self> {
        let mut seed = [0u8; 8];
        OsRng
            .try_fill_bytes(&mut seed)
            .map_err(|e| SimError::RandomSource(e.to_string()))?;
        Ok(Self::new(u64::from_le_bytes(seed), num_replicates))
    }

    pub fn global_seed(&self) -> u64 {
        self.global_seed
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    pub fn stream_mut(&mut self, replicate: usize) -> &mut ReplicateRng {
        &mut self.streams[replicate]
    }

    pub fn as_mut_slice(&mut self) -> &mut [ReplicateRng] {
        &mut self.streams
    }
}
