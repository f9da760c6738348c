use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossFnConfig {
    #[default]
    Mse,
    Mae,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerConfig {
    Adam {
        lr: f32,
        #[serde(default = "default_b1")]
        b1: f32,
        #[serde(default = "default_b2")]
        b2: f32,
        #[serde(default = "default_eps")]
        eps: f32,
    },
    GradientDescent {
        lr: f32,
    },
    GradientDescentWithMomentum {
        lr: f32,
        mu: f32,
    },
}

fn default_b1() -> f32 {
    0.9
}

fn default_b2() -> f32 {
    0.999
}

fn default_eps() -> f32 {
    1e-7
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionConfig {
    #[serde(rename = "none", alias = "unconstrained")]
    Unconstrained,
    #[default]
    UnitBall,
    UnitSphere,
}

/// The per-image codes learned alongside the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatentConfig {
    pub dim: usize,
    pub lr: f32,
    #[serde(default = "default_init_std")]
    pub init_std: f32,
    #[serde(default)]
    pub projection: ProjectionConfig,
}

fn default_init_std() -> f32 {
    1.0
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EarlyStoppingConfig {
    pub patience: usize,
    #[serde(default)]
    pub min_delta: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationConfig {
    #[serde(default = "default_eval_steps")]
    pub steps: usize,
    #[serde(default = "default_eval_lr")]
    pub lr: f32,
}

fn default_eval_steps() -> usize {
    50
}

fn default_eval_lr() -> f32 {
    0.1
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            steps: default_eval_steps(),
            lr: default_eval_lr(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub optimizer: OptimizerConfig,
    #[serde(default)]
    pub loss_fn: LossFnConfig,
    pub latent: LatentConfig,
    pub epochs: usize,
    pub batch_size: usize,
    #[serde(default)]
    pub early_stopping: Option<EarlyStoppingConfig>,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    #[serde(default)]
    pub seed: Option<u64>,
}
