//! Serializable descriptions of everything the `TrainerBuilder` knows how to build.

use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

/// The specification for the `ActFn` enum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActFnSpec {
    Sigmoid { amp: f32 },
    Relu,
    LeakyRelu { alpha: f32 },
    Tanh,
}

/// The specification for the weight initialization of a layer, the biases always start at zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamGenSpec {
    Const {
        value: f32,
    },
    Uniform {
        low: f32,
        high: f32,
    },
    UniformInclusive {
        low: f32,
        high: f32,
    },
    #[default]
    XavierUniform,
    LecunUniform,
    Normal {
        mean: f32,
        std_dev: f32,
    },
    Kaiming,
    Xavier,
    Lecun,
}

/// The specification for the `Layer` enum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerSpec {
    Dense {
        dim: (usize, usize),
        #[serde(default)]
        act_fn: Option<ActFnSpec>,
        #[serde(default)]
        init: ParamGenSpec,
    },
}

impl LayerSpec {
    /// Returns the amount of inputs and outputs of the layer.
    pub fn dim(&self) -> (usize, usize) {
        match *self {
            LayerSpec::Dense { dim, .. } => dim,
        }
    }

    /// Returns the amount of parameters of the layer.
    pub fn size(&self) -> usize {
        let (n, m) = self.dim();
        (n + 1) * m
    }
}

/// The specification for the decoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelSpec {
    Sequential { layers: Vec<LayerSpec> },
}

impl ModelSpec {
    pub fn layers(&self) -> &[LayerSpec] {
        match self {
            ModelSpec::Sequential { layers } => layers,
        }
    }

    pub fn layers_mut(&mut self) -> &mut Vec<LayerSpec> {
        match self {
            ModelSpec::Sequential { layers } => layers,
        }
    }

    /// Returns the width of the model's input, that is, the latent dimension it expects.
    pub fn input_dim(&self) -> Option<usize> {
        self.layers().first().map(|layer| layer.dim().0)
    }

    /// Returns the width of the model's output, that is, the size of the images it decodes.
    pub fn output_dim(&self) -> Option<usize> {
        self.layers().last().map(|layer| layer.dim().1)
    }
}

/// The specification for the `Optimizer` trait, shared by both parameter groups.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerSpec {
    Adam {
        learning_rate: f32,
        #[serde(default = "default_beta1")]
        beta1: f32,
        #[serde(default = "default_beta2")]
        beta2: f32,
        #[serde(default = "default_epsilon")]
        epsilon: f32,
    },
    GradientDescent {
        learning_rate: f32,
    },
    GradientDescentWithMomentum {
        learning_rate: f32,
        momentum: f32,
    },
}

impl OptimizerSpec {
    pub fn learning_rate(&self) -> f32 {
        match *self {
            OptimizerSpec::Adam { learning_rate, .. }
            | OptimizerSpec::GradientDescent { learning_rate }
            | OptimizerSpec::GradientDescentWithMomentum { learning_rate, .. } => learning_rate,
        }
    }

    /// Returns the same spec with its learning rate replaced.
    pub fn with_learning_rate(mut self, lr: f32) -> Self {
        match &mut self {
            OptimizerSpec::Adam { learning_rate, .. }
            | OptimizerSpec::GradientDescent { learning_rate }
            | OptimizerSpec::GradientDescentWithMomentum { learning_rate, .. } => {
                *learning_rate = lr
            }
        }

        self
    }
}

fn default_beta1() -> f32 {
    0.9
}

fn default_beta2() -> f32 {
    0.999
}

fn default_epsilon() -> f32 {
    1e-7
}

/// The specification for the `LossFn` trait.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossFnSpec {
    #[default]
    Mse,
    Mae,
}

/// The constraint applied to every latent code after it's updated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionSpec {
    #[serde(rename = "none", alias = "unconstrained")]
    Unconstrained,
    #[default]
    UnitBall,
    UnitSphere,
}

/// The specification for the latent table, the trainer's second parameter group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatentSpec {
    pub dim: usize,
    pub learning_rate: f32,
    #[serde(default = "default_init_std")]
    pub init_std: f32,
    #[serde(default)]
    pub projection: ProjectionSpec,
}

fn default_init_std() -> f32 {
    1.0
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EarlyStoppingSpec {
    pub patience: NonZeroUsize,
    #[serde(default)]
    pub min_delta: f32,
}

/// The specification for the latent inference run when evaluating on unseen images.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSpec {
    pub steps: usize,
    pub learning_rate: f32,
}

impl Default for EvaluationSpec {
    fn default() -> Self {
        Self {
            steps: 50,
            learning_rate: 0.1,
        }
    }
}

/// The specification for the `Trainer`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerSpec {
    pub model: ModelSpec,
    pub latent: LatentSpec,
    pub optimizer: OptimizerSpec,
    #[serde(default)]
    pub loss: LossFnSpec,
    pub epochs: NonZeroUsize,
    pub batch_size: NonZeroUsize,
    #[serde(default)]
    pub early_stopping: Option<EarlyStoppingSpec>,
    #[serde(default)]
    pub evaluation: EvaluationSpec,
    #[serde(default)]
    pub seed: Option<u64>,
}
