use ndarray::{Array2, ArrayView2};

use super::LossFn;

/// Mean absolute error loss function.
#[derive(Debug, Default, Clone, Copy)]
pub struct Mae;

impl Mae {
    /// Returns a new `Mae`.
    pub fn new() -> Self {
        Self
    }
}

impl LossFn for Mae {
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> f32 {
        (&y_pred - &y).mapv(f32::abs).mean().unwrap_or_default()
    }

    // The subgradient at zero is taken as zero.
    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Array2<f32> {
        let n = y_pred.len() as f32;

        (&y_pred - &y).mapv(|e| {
            if e > 0. {
                1. / n
            } else if e < 0. {
                -1. / n
            } else {
                0.
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn loss_and_derivative() {
        let y_pred = array![[1., 2.], [3., 0.]];
        let y = array![[1., 0.], [3., 2.]];

        assert_eq!(Mae.loss(y_pred.view(), y.view()), 1.);
        assert_eq!(
            Mae.loss_prime(y_pred.view(), y.view()),
            array![[0., 0.25], [0., -0.25]]
        );
    }
}
