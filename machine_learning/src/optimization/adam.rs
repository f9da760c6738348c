use rayon::prelude::*;

use super::{Optimizer, PARALLEL_MIN_LEN, optimizer::check_sizes};
use crate::Result;

#[derive(Debug, Clone)]
pub struct Adam {
    learning_rate: f32,
    beta1: f32,
    beta2: f32,
    beta1_t: f32,
    beta2_t: f32,
    v: Vec<f32>,
    s: Vec<f32>,
    epsilon: f32,
}

impl Adam {
    /// Creates a new `Adam` optimizer.
    ///
    /// # Arguments
    /// * `len` - The amount of parameters this instance should hold.
    /// * `learning_rate` - The small coefficient that modulates the amount of training per update.
    /// * `beta1`, `beta2`, `epsilon` - Hyperparameters to the optimization algorithm.
    ///
    /// # Returns
    /// A new `Adam` instance.
    pub fn new(len: usize, learning_rate: f32, beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Self {
            learning_rate,
            beta1,
            beta2,
            beta1_t: 1.,
            beta2_t: 1.,
            v: vec![0.; len],
            s: vec![0.; len],
            epsilon,
        }
    }
}

impl Optimizer for Adam {
    fn update_params(&mut self, params: &mut [f32], grad: &[f32]) -> Result<()> {
        check_sizes(params.len(), grad.len(), Some(self.v.len()))?;

        let Self {
            learning_rate: lr,
            beta1: b1,
            beta2: b2,
            epsilon: eps,
            ..
        } = *self;

        self.beta1_t *= b1;
        self.beta2_t *= b2;

        let bc1 = 1. - self.beta1_t;
        let bc2 = 1. - self.beta2_t;
        let step_size = lr * (bc2.sqrt() / bc1);

        let step = |(((p, g), v), s): (((&mut f32, &f32), &mut f32), &mut f32)| {
            *v = b1 * *v + (1. - b1) * g;
            *s = b2 * *s + (1. - b2) * g.powi(2);
            *p -= step_size * *v / (s.sqrt() + eps);
        };

        if params.len() >= PARALLEL_MIN_LEN {
            params
                .par_iter_mut()
                .zip(grad.par_iter())
                .zip(self.v.par_iter_mut())
                .zip(self.s.par_iter_mut())
                .for_each(step);
        } else {
            params
                .iter_mut()
                .zip(grad)
                .zip(self.v.iter_mut())
                .zip(self.s.iter_mut())
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
        Self::new(len, self.learning_rate, self.beta1, self.beta2, self.epsilon)
    }
}
