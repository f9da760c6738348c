use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tuner::{Objective, SearchSpace};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    pub space: SearchSpace,
    pub objective: Objective,
    #[serde(default)]
    pub max_trials: Option<usize>,
    pub project_dir: PathBuf,
    /// Continue the search saved in `project_dir` instead of starting over.
    #[serde(default)]
    pub resume: bool,
    #[serde(default)]
    pub seed: Option<u64>,
    /// How many of the best trials to report.
    #[serde(default = "default_summary")]
    pub summary: usize,
}

fn default_summary() -> usize {
    5
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub checkpoint: Option<PathBuf>,
    #[serde(default)]
    pub report: Option<PathBuf>,
}
