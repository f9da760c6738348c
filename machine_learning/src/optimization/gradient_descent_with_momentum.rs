use rayon::prelude::*;

use super::{Optimizer, PARALLEL_MIN_LEN, optimizer::check_sizes};
use crate::Result;

#[derive(Debug, Clone)]
pub struct GradientDescentWithMomentum {
    learning_rate: f32,
    momentum: f32,
    velocity: Vec<f32>,
}

impl GradientDescentWithMomentum {
    /// Creates a new `GradientDescentWithMomentum` optimizer.
    ///
    /// # Arguments
    /// * `len` - The amount of parameters this instance should hold.
    /// * `learning_rate` - The small coefficient that modulates the amount of training per update.
    /// * `momentum` - Hyperparameter to the optimization algorithm.
    ///
    /// # Returns
    /// A new `GradientDescentWithMomentum` instance.
    pub fn new(len: usize, learning_rate: f32, momentum: f32) -> Self {
        Self {
            learning_rate,
            momentum,
            velocity: vec![0.; len],
        }
    }
}

impl Optimizer for GradientDescentWithMomentum {
    fn update_params(&mut self, params: &mut [f32], grad: &[f32]) -> Result<()> {
        check_sizes(params.len(), grad.len(), Some(self.velocity.len()))?;

        let lr = self.learning_rate;
        let mu = self.momentum;
        let step = |((p, g), v): ((&mut f32, &f32), &mut f32)| {
            *v = (mu * *v) + g;
            *p -= lr * *v;
        };

        if params.len() >= PARALLEL_MIN_LEN {
            params
                .par_iter_mut()
                .zip(grad.par_iter())
                .zip(self.velocity.par_iter_mut())
                .for_each(step);
        } else {
            params
                .iter_mut()
                .zip(grad)
                .zip(self.velocity.iter_mut())
                .for_each(step);
        }

        Ok(())
    }

    fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    fn set_learning_rate(&mut self, learning_rate: f32) {
        self.learning_rate = learning_rate;
    }

    fn spawn(&self, len: usize) -> Self {
        Self::new(len, self.learning_rate, self.momentum)
    }
}
