use machine_learning::dataset::ImageShape;
use serde::{Deserialize, Serialize};

/// Where the images come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceConfig {
    Synthetic {
        len: usize,
        #[serde(default)]
        seed: u64,
    },
    Inline {
        data: Vec<f32>,
    },
}

/// The images, the last `holdout` of them are only used for evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    pub shape: ImageShape,
    pub source: SourceConfig,
    pub holdout: usize,
}
