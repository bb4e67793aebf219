use cpgsim_core::{ModelConfig, RunSpec, Trajectory, F};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod cli;
pub use cli::*;

/// Run manifest for complete reproducibility
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: String,
    pub timestamp: String,
    pub seed: u64,
    pub model: ModelConfig,
    pub run: RunSpec,
    pub steps: usize,
    pub final_times: Vec<F>,
    /// Final site counts at levels 0, 1 and 2 over all replicates.
    pub final_level_counts: [usize; 3],
    pub commit_hash: Option<String>,
}

impl RunManifest {
    pub fn new(seed: u64, model: &ModelConfig, trajectory: &Trajectory) -> Self {
        let final_times = trajectory
            .final_times()
            .map(|t| t.as_slice().to_vec())
            .unwrap_or_default();
        let final_level_counts = trajectory
            .final_state()
            .map(|s| s.level_counts())
            .unwrap_or_default();

        Self {
            run_id: Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            seed,
            model: model.clone(),
            run: trajectory.spec.clone(),
            steps: trajectory.steps(),
            final_times,
            final_level_counts,
            commit_hash: get_git_commit(),
        }
    }

    pub fn save_to_file(&self, path: &str) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load_from_file(path: &str) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let manifest = serde_json::from_str(&json)?;
        Ok(manifest)
    }
}

/// Load a model configuration from a JSON file.
pub fn load_model_config(path: &str) -> anyhow::Result<ModelConfig> {
    let json = std::fs::read_to_string(path)?;
    let config: ModelConfig = serde_json::from_str(&json)?;
    config.validate()?;
    Ok(config)
}

/// Get git commit hash for reproducibility
fn get_git_commit() -> Option<String> {
    std::process::Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .and_then(|output| {
            if output.status.success() {
                String::from_utf8(output.stdout).ok()
            } else {
                None
            }
        })
        .map(|s| s.trim().to_string())
}
