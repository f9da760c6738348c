use ndarray::{Array2, ArrayView2};

use super::{Model, layers::Layer};
use crate::{MlErr, Result};

/// A sequential model: information flows forward when computing an output and backward when
/// computing the *deltas* of its layers.
///
/// Used as the decoder, its input rows are latent codes and its output rows are flattened images.
#[derive(Debug, Clone)]
pub struct Sequential {
    layers: Vec<Layer>,
}

impl Sequential {
    /// Creates a new `Sequential`.
    ///
    /// # Arguments
    /// * `layers` - The layers the sequential is composed of.
    ///
    /// # Returns
    /// A new `Sequential` instance.
    pub fn new<I>(layers: I) -> Self
    where
        I: IntoIterator<Item = Layer>,
    {
        Self {
            layers: layers.into_iter().collect(),
        }
    }

    /// Returns the layers of this model.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    fn check_len(&self, what: &'static str, got: usize) -> Result<()> {
        let expected = self.size();

        if got != expected {
            return Err(MlErr::SizeMismatch {
                what,
                got,
                expected,
            });
        }

        Ok(())
    }
}

impl Model for Sequential {
    fn size(&self) -> usize {
        self.layers.iter().map(|layer| layer.size()).sum()
    }

    fn input_dim(&self) -> usize {
        self.layers.first().map(Layer::input_dim).unwrap_or_default()
    }

    fn output_dim(&self) -> usize {
        self.layers.last().map(Layer::output_dim).unwrap_or_default()
    }

    fn forward(&mut self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        self.check_len("model parameters", params.len())?;

        let mut a = x.to_owned();
        let mut start = 0;

        for layer in self.layers.iter_mut() {
            let end = start + layer.size();
            a = layer.forward(&params[start..end], a.view())?;
            start = end;
        }

        Ok(a)
    }

    fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        mut d: Array2<f32>,
    ) -> Result<Array2<f32>> {
        self.check_len("model parameters", params.len())?;
        self.check_len("model gradient", grad.len())?;

        let mut end = params.len();

        for layer in self.layers.iter_mut().rev() {
            let start = end - layer.size();
            d = layer.backward(&params[start..end], &mut grad[start..end], d)?;
            end = start;
        }

        Ok(d)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;
    use crate::arch::{
        activations::ActFn,
        loss::{LossFn, Mse},
    };

    fn decoder() -> Sequential {
        Sequential::new([
            Layer::dense((2, 3), Some(ActFn::tanh())),
            Layer::dense((3, 4), Some(ActFn::sigmoid(1.))),
        ])
    }

    #[test]
    fn dimensions_follow_the_layers() {
        let model = decoder();

        assert_eq!(model.size(), 3 * 3 + 4 * 4);
        assert_eq!(model.input_dim(), 2);
        assert_eq!(model.output_dim(), 4);
    }

    #[test]
    fn parameter_count_is_checked() {
        let mut model = decoder();
        let x = array![[0.1, 0.2]];

        assert!(matches!(
            model.forward(&[0.; 3], x.view()),
            Err(MlErr::SizeMismatch { expected: 25, .. })
        ));
    }

    #[test]
    fn input_gradient_matches_finite_differences() {
        const EPS: f32 = 1e-2;
        const TOL: f32 = 1e-3;

        let mut model = decoder();
        let params: Vec<f32> = (0..model.size()).map(|i| (i as f32 * 0.71).cos()).collect();
        let z = array![[0.4, -0.3], [0.05, 0.9]];
        let y = array![[0.1, 0.9, 0.5, 0.0], [1.0, 0.2, 0.3, 0.7]];

        let y_pred = model.forward(&params, z.view()).unwrap();
        let d = Mse.loss_prime(y_pred.view(), y.view());
        let mut grad = vec![0.; model.size()];
        let dz = model.backward(&params, &mut grad, d).unwrap();

        for ((row, col), &analytic) in dz.indexed_iter() {
            let mut plus = z.clone();
            let mut minus = z.clone();
            plus[[row, col]] += EPS;
            minus[[row, col]] -= EPS;

            let lp = Mse.loss(model.forward(&params, plus.view()).unwrap().view(), y.view());
            let lm = Mse.loss(model.forward(&params, minus.view()).unwrap().view(), y.view());
            let numeric = (lp - lm) / (2. * EPS);

            assert!((numeric - analytic).abs() < TOL, "latent {row},{col}");
        }

        for i in 0..params.len() {
            let mut plus = params.clone();
            let mut minus = params.clone();
            plus[i] += EPS;
            minus[i] -= EPS;

            let lp = Mse.loss(model.forward(&plus, z.view()).unwrap().view(), y.view());
            let lm = Mse.loss(model.forward(&minus, z.view()).unwrap().view(), y.view());
            let numeric = (lp - lm) / (2. * EPS);

            assert!((numeric - grad[i]).abs() < TOL, "param {i}");
        }
    }
}
