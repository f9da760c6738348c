use ndarray::{Array2, ArrayView2};

use super::Dense;
use crate::{Result, arch::activations::ActFn};

/// A layer of a `Sequential` model.
#[derive(Debug, Clone)]
pub enum Layer {
    Dense(Dense),
}

impl Layer {
    pub fn dense(dim: (usize, usize), act_fn: Option<ActFn>) -> Self {
        Self::Dense(Dense::new(dim, act_fn))
    }

    /// Returns the amount of parameters this layer reads from the parameter buffer.
    pub fn size(&self) -> usize {
        match self {
            Layer::Dense(l) => l.size(),
        }
    }

    pub fn input_dim(&self) -> usize {
        match self {
            Layer::Dense(l) => l.dim().0,
        }
    }

    pub fn output_dim(&self) -> usize {
        match self {
            Layer::Dense(l) => l.dim().1,
        }
    }

    pub fn forward(&mut self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        match self {
            Layer::Dense(l) => l.forward(params, x),
        }
    }

    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        d: Array2<f32>,
    ) -> Result<Array2<f32>> {
        match self {
            Layer::Dense(l) => l.backward(params, grad, d),
        }
    }
}
