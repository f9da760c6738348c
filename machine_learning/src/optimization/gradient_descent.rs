use rayon::prelude::*;

use super::{Optimizer, PARALLEL_MIN_LEN, optimizer::check_sizes};
use crate::Result;

/// Gradient descent optimization algorithm.
#[derive(Debug, Clone)]
pub struct GradientDescent {
    learning_rate: f32,
}

impl GradientDescent {
    /// Returns a new `GradientDescent`.
    ///
    /// # Arguments
    /// * `learning_rate` - The *length* of the steps taken on `update_params`.
    pub fn new(learning_rate: f32) -> Self {
        Self { learning_rate }
    }
}

impl Optimizer for GradientDescent {
    /// Updates the parameters according to the algorithm's learning rule, that is, making a step in
    /// the opposite direction of the gradient, with a length of `learning_rate`.
    fn update_params(&mut self, params: &mut [f32], grad: &[f32]) -> Result<()> {
        check_sizes(params.len(), grad.len(), None)?;

        let lr = self.learning_rate;
        let step = |(p, g): (&mut f32, &f32)| *p -= lr * g;

        if params.len() >= PARALLEL_MIN_LEN {
            params.par_iter_mut().zip(grad.par_iter()).for_each(step);
        } else {
            params.iter_mut().zip(grad).for_each(step);
        }

        Ok(())
    }

    fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    fn set_learning_rate(&mut self, learning_rate: f32) {
        self.learning_rate = learning_rate;
    }

    fn spawn(&self, _len: usize) -> Self {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_against_the_gradient() {
        let mut optimizer = GradientDescent::new(0.5);
        let mut params = [1., 2.];

        optimizer.update_params(&mut params, &[2., -4.]).unwrap();
        assert_eq!(params, [0., 4.]);
    }

    #[test]
    fn size_mismatch_fails() {
        let mut optimizer = GradientDescent::new(0.5);
        assert!(optimizer.update_params(&mut [1., 2.], &[1.]).is_err());
    }
}
