//! Nearest-neighbour methylation simulator.
//!
//! Each step rebuilds the propensity tensor from the current state, then every
//! active replicate independently draws a waiting time, a site and a reaction
//! from its own random stream. Replicates are advanced in parallel with Rayon.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::noise::ReplicateStreams;
use crate::path::{HorizonPolicy, RunSpec, Trajectory};
use crate::propensity::PropensityTensor;
use crate::reactions::{RateConstants, ReactionTable};
use crate::selector::{advance_replicate, Event};
use crate::{CpgStateMatrix, Result, Ring, SimError, TimeVector, F};

/// Shape and kinetics of a simulation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub num_sites: usize,
    pub num_replicates: usize,
    pub rates: RateConstants,
}

impl ModelConfig {
    pub fn new(num_sites: usize, num_replicates: usize, a: F, x: F, y: F) -> Self {
        Self {
            num_sites,
            num_replicates,
            rates: RateConstants::new(a, x, y),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_sites < 1 {
            return Err(SimError::Configuration(
                "num_sites must be at least 1".to_string(),
            ));
        }
        if self.num_replicates < 1 {
            return Err(SimError::Configuration(
                "num_replicates must be at least 1".to_string(),
            ));
        }
        self.rates.validate()
    }
}

pub struct Simulator {
    config: ModelConfig,
    table: ReactionTable,
    ring: Ring,
    states: CpgStateMatrix,
    times: TimeVector,
    streams: ReplicateStreams,
}

impl Simulator {
    /// Builds the reaction table and draws the initial state from `streams`,
    /// which must hold one stream per replicate.
    pub fn new(config: ModelConfig, mut streams: ReplicateStreams) -> Result<Self> {
        config.validate()?;
        check_streams(&config, &streams)?;
        let states = CpgStateMatrix::uniform(config.num_sites, &mut streams);
        Self::assemble(config, states, streams)
    }

    pub fn with_seed(config: ModelConfig, seed: u64) -> Result<Self> {
        let streams = ReplicateStreams::new(seed, config.num_replicates);
        Self::new(config, streams)
    }

    /// Starts from an explicit state matrix instead of a random draw.
    pub fn with_initial_state(
        config: ModelConfig,
        states: CpgStateMatrix,
        streams: ReplicateStreams,
    ) -> Result<Self> {
        config.validate()?;
        check_streams(&config, &streams)?;
        if states.shape() != (config.num_sites, config.num_replicates) {
            return Err(SimError::Configuration(format!(
                "initial state is {}x{}, expected {}x{}",
                states.num_sites(),
                states.num_replicates(),
                config.num_sites,
                config.num_replicates
            )));
        }
        Self::assemble(config, states, streams)
    }

    fn assemble(
        config: ModelConfig,
        states: CpgStateMatrix,
        streams: ReplicateStreams,
    ) -> Result<Self> {
        let table = ReactionTable::new(config.rates)?;
        debug!(
            sites = config.num_sites,
            replicates = config.num_replicates,
            a = config.rates.a,
            x = config.rates.x,
            y = config.rates.y,
            seed = streams.global_seed(),
            "simulator constructed"
        );
        Ok(Self {
            ring: Ring::new(config.num_sites),
            times: TimeVector::zeros(config.num_replicates),
            config,
            table,
            states,
            streams,
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn table(&self) -> &ReactionTable {
        &self.table
    }

    pub fn ring(&self) -> &Ring {
        &self.ring
    }

    pub fn states(&self) -> &CpgStateMatrix {
        &self.states
    }

    pub fn times(&self) -> &TimeVector {
        &self.times
    }

    /// Steps until every replicate has reached `spec.t_end` and returns the
    /// full history.
    ///
    /// Elapsed time restarts from zero on each call; the methylation state
    /// carries over from the previous run. On error no trajectory is returned.
    pub fn run(&mut self, spec: &RunSpec) -> Result<Trajectory> {
        spec.validate()?;
        self.times.reset();

        let horizon = spec.t_end;
        let mut trajectory = Trajectory::new(spec.clone(), self.states.clone(), self.times.clone());

        while !self.times.all_reached(horizon) {
            let step = trajectory.steps();
            let events = match self.step(step, spec) {
                Ok(events) => events,
                Err(err) => {
                    warn!(step, error = %err, "run aborted");
                    return Err(err);
                }
            };
            trace!(step, min_time = self.times.min(), "step complete");
            trajectory.push(self.states.clone(), self.times.clone(), events);
        }

        info!(
            steps = trajectory.steps(),
            horizon,
            policy = ?spec.horizon,
            "run complete"
        );
        Ok(trajectory)
    }

    fn step(&mut self, step: usize, spec: &RunSpec) -> Result<Vec<Option<Event>>> {
        let tensor = PropensityTensor::build(&self.table, &self.ring, &self.states);
        let freeze = spec.horizon == HorizonPolicy::FreezeFinished;
        let horizon = spec.t_end;
        let table = &self.table;

        self.states
            .par_columns_mut()
            .zip(self.times.as_mut_slice().par_iter_mut())
            .zip(self.streams.as_mut_slice().par_iter_mut())
            .enumerate()
            .map(|(replicate, ((chain, time), rng))| {
                if freeze && *time >= horizon {
                    return Ok(None);
                }
                advance_replicate(table, &tensor, replicate, step, chain, time, rng).map(Some)
            })
            .collect()
    }
}

fn check_streams(config: &ModelConfig, streams: &ReplicateStreams) -> Result<()> {
    if streams.len() != config.num_replicates {
        return Err(SimError::Configuration(format!(
            "{} random streams for {} replicates",
            streams.len(),
            config.num_replicates
        )));
    }
    Ok(())
}
