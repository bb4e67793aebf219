pub mod error;
pub mod state;
pub mod reactions;
pub mod propensity;
pub mod noise;
pub mod selector;
pub mod path;
pub mod engine;

// Core types
pub type F = f64;
pub use error::{Result, SimError};
pub use state::{CpgStateMatrix, Methylation, Ring, Time, TimeVector};
pub use noise::{ReplicateRng, ReplicateStreams};

// Reaction model
pub use reactions::{NeighborRequirement, RateConstants, Reaction, ReactionTable, NUM_REACTIONS};
pub use propensity::PropensityTensor;
pub use selector::Event;

// Runs and trajectories
pub use path::{HorizonPolicy, RunSpec, Trajectory};
pub use engine::{ModelConfig, Simulator};
