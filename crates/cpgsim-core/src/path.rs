use serde::{Deserialize, Serialize};

use crate::selector::Event;
use crate::{CpgStateMatrix, Result, SimError, Time, TimeVector};

/// What happens to replicates that have already reached the horizon while
/// others are still running.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HorizonPolicy {
    /// Every replicate fires one event per step until all have reached the
    /// horizon; finished replicates keep advancing.
    #[default]
    Lockstep,
    /// A replicate stops drawing once its time reaches the horizon.
    FreezeFinished,
}

/// Run request: the time span and the number of requested samples.
///
/// Elapsed time always starts from zero; `t_start` is recorded only.
/// `num_samples` is carried through to the trajectory and does not subsample
/// the recorded history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunSpec {
    pub t_start: Time,
    pub t_end: Time,
    pub num_samples: usize,
    #[serde(default)]
    pub horizon: HorizonPolicy,
}

impl RunSpec {
    pub fn new(timespan: (Time, Time), num_samples: usize) -> Self {
        Self {
            t_start: timespan.0,
            t_end: timespan.1,
            num_samples,
            horizon: HorizonPolicy::default(),
        }
    }

    pub fn with_horizon(mut self, horizon: HorizonPolicy) -> Self {
        self.horizon = horizon;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.t_start.is_finite() || !self.t_end.is_finite() {
            return Err(SimError::Configuration(format!(
                "timespan ({}, {}) must be finite",
                self.t_start, self.t_end
            )));
        }
        if self.t_end < self.t_start {
            return Err(SimError::Configuration(format!(
                "timespan end {} precedes start {}",
                self.t_end, self.t_start
            )));
        }
        Ok(())
    }
}

/// Full history of a run: the initial condition followed by one snapshot per
/// step. Snapshots are never modified once recorded.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub spec: RunSpec,
    pub states: Vec<CpgStateMatrix>,
    pub times: Vec<TimeVector>,
    /// Events fired at each step, one entry per replicate; `None` for frozen
    /// replicates.
    pub events: Vec<Vec<Option<Event>>>,
}

impl Trajectory {
    pub fn new(spec: RunSpec, initial_states: CpgStateMatrix, initial_times: TimeVector) -> Self {
        Self {
            spec,
            states: vec![initial_states],
            times: vec![initial_times],
            events: Vec::new(),
        }
    }

    pub fn push(&mut self, states: CpgStateMatrix, times: TimeVector, events: Vec<Option<Event>>) {
        self.states.push(states);
        self.times.push(times);
        self.events.push(events);
    }

    /// Number of recorded snapshots, `steps() + 1`.
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn steps(&self) -> usize {
        self.events.len()
    }

    pub fn initial_state(&self) -> Option<&CpgStateMatrix> {
        self.states.first()
    }

    pub fn final_state(&self) -> Option<&CpgStateMatrix> {
        self.states.last()
    }

    pub fn final_times(&self) -> Option<&TimeVector> {
        self.times.last()
    }

    /// `(states, times)` pairs in recording order.
    pub fn snapshots(&self) -> impl Iterator<Item = (&CpgStateMatrix, &TimeVector)> {
        self.states.iter().zip(self.times.iter())
    }

    /// Elapsed time of one replicate at every snapshot.
    pub fn replicate_times(&self, replicate: usize) -> Vec<Time> {
        self.times.iter().map(|t| t.get(replicate)).collect()
    }
}
