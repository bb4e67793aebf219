use thiserror::Error;

/// Failures surfaced by the simulation engine. None of them are retried
/// internally; a failed step aborts the whole run.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("replicate {replicate} has zero total propensity at step {step}")]
    DegeneratePropensity { replicate: usize, step: usize },

    #[error("random source failure: {0}")]
    RandomSource(String),
}

pub type Result<T> = std::result::Result<T, SimError>;
