use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActFnConfig {
    Sigmoid { amp: f32 },
    Relu,
    LeakyRelu { alpha: f32 },
    Tanh,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamGenConfig {
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

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerConfig {
    Dense {
        dim: (usize, usize),
        #[serde(default)]
        init: ParamGenConfig,
        #[serde(default)]
        act_fn: Option<ActFnConfig>,
    },
}

impl LayerConfig {
    pub fn dim(&self) -> (usize, usize) {
        match *self {
            LayerConfig::Dense { dim, .. } => dim,
        }
    }
}

/// The decoder, going from the latent codes to the flattened images.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelConfig {
    Sequential { layers: Vec<LayerConfig> },
}

impl ModelConfig {
    pub fn layers(&self) -> &[LayerConfig] {
        match self {
            ModelConfig::Sequential { layers } => layers,
        }
    }
}
