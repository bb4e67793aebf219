use crate::{load_model_config, RunManifest};
use cpgsim_core::{HorizonPolicy, ModelConfig, ReplicateStreams, RunSpec, Simulator};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "cpgsim")]
#[command(about = "Nearest-neighbour CpG methylation simulator")]
#[command(
    long_about = "Gillespie simulation of hemi/full CpG methylation on a ring of sites, \
                  over many replicates"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the simulation and print a JSON run manifest
    Simulate(SimulateArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct SimulateArgs {
    /// Number of CpG sites on the ring
    #[arg(long, default_value = "10")]
    pub sites: usize,

    /// Number of independent replicates
    #[arg(long, default_value = "100")]
    pub replicates: usize,

    /// Base rate
    #[arg(long, default_value = "1.0")]
    pub a: f64,

    /// Neighbour coupling multiplier
    #[arg(long, default_value = "0.5")]
    pub x: f64,

    /// Hemimethylation multiplier
    #[arg(long, default_value = "0.5")]
    pub y: f64,

    /// Model configuration (JSON); overrides sites, replicates and rates
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Start of the time span (recorded only)
    #[arg(long, default_value = "0.0")]
    pub t_start: f64,

    /// Time horizon every replicate must reach
    #[arg(long)]
    pub t_end: f64,

    /// Requested number of samples
    #[arg(long, default_value = "100")]
    pub samples: usize,

    /// Random seed; drawn from the OS when omitted
    #[arg(long)]
    pub seed: Option<u64>,

    /// Handling of replicates that already reached the horizon
    #[arg(long, value_enum, default_value = "lockstep")]
    pub horizon: HorizonType,

    /// Write the manifest here instead of stdout
    #[arg(long)]
    pub manifest: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum HorizonType {
    #[value(name = "lockstep")]
    Lockstep,
    #[value(name = "freeze")]
    Freeze,
}

impl From<HorizonType> for HorizonPolicy {
    fn from(horizon: HorizonType) -> Self {
        match horizon {
            HorizonType::Lockstep => HorizonPolicy::Lockstep,
            HorizonType::Freeze => HorizonPolicy::FreezeFinished,
        }
    }
}

impl SimulateArgs {
    pub fn model_config(&self) -> anyhow::Result<ModelConfig> {
        match &self.config {
            Some(path) => {
                let path = path
                    .to_str()
                    .ok_or_else(|| anyhow::anyhow!("config path {:?} is not valid UTF-8", path))?;
                load_model_config(path)
            }
            None => Ok(ModelConfig::new(self.sites, self.replicates, self.a, self.x, self.y)),
        }
    }

    pub fn run_spec(&self) -> RunSpec {
        RunSpec::new((self.t_start, self.t_end), self.samples).with_horizon(self.horizon.into())
    }
}

pub fn run_simulate_command(args: SimulateArgs) -> anyhow::Result<RunManifest> {
    let model = args.model_config()?;
    let spec = args.run_spec();

    let streams = match args.seed {
        Some(seed) => ReplicateStreams::new(seed, model.num_replicates),
        None => ReplicateStreams::from_entropy(model.num_replicates)?,
    };
    let seed = streams.global_seed();

    info!(
        sites = model.num_sites,
        replicates = model.num_replicates,
        t_end = spec.t_end,
        seed,
        "starting simulation"
    );

    let mut simulator = Simulator::new(model.clone(), streams)?;
    let trajectory = simulator.run(&spec)?;
    let manifest = RunManifest::new(seed, &model, &trajectory);

    info!(
        steps = manifest.steps,
        unmethylated = manifest.final_level_counts[0],
        hemimethylated = manifest.final_level_counts[1],
        methylated = manifest.final_level_counts[2],
        "simulation finished"
    );

    match &args.manifest {
        Some(path) => {
            let path = path
                .to_str()
                .ok_or_else(|| anyhow::anyhow!("manifest path {:?} is not valid UTF-8", path))?;
            manifest.save_to_file(path)?;
            info!(path, "wrote manifest");
        }
        None => println!("{}", serde_json::to_string_pretty(&manifest)?),
    }

    Ok(manifest)
}
