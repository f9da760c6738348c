mod adapter;
mod dataset;
mod model;
mod search;
mod training;

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::HarnessErr;

pub use adapter::Adapter;
pub(crate) use adapter::check_learning_rate;
pub use dataset::{DatasetConfig, SourceConfig};
pub use model::{ActFnConfig, LayerConfig, ModelConfig, ParamGenConfig};
pub use search::{OutputConfig, SearchConfig};
pub use training::{
    EarlyStoppingConfig, EvaluationConfig, LatentConfig, LossFnConfig, OptimizerConfig,
    ProjectionConfig, TrainingConfig,
};

/// Everything a `harness` run reads from its JSON config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarnessConfig {
    pub model: ModelConfig,
    pub training: TrainingConfig,
    pub dataset: DatasetConfig,
    #[serde(default)]
    pub search: Option<SearchConfig>,
    #[serde(default)]
    pub output: OutputConfig,
}

impl HarnessConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, HarnessErr> {
        let raw = fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, HarnessErr> {
        Ok(serde_json::from_str(raw)?)
    }
}
