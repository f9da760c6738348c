use ndarray::{Array2, ArrayView2};

use crate::Result;

/// A differentiable model whose parameters live outside of it, in a flat buffer.
pub trait Model {
    /// Returns the amount of parameters in the model.
    fn size(&self) -> usize;

    /// Returns the width of the model's input rows.
    fn input_dim(&self) -> usize;

    /// Returns the width of the model's output rows.
    fn output_dim(&self) -> usize;

    /// Makes a forward pass through the model.
    ///
    /// # Arguments
    /// * `params` - The model's parameters.
    /// * `x` - The input data, one row per sample.
    ///
    /// # Returns
    /// The prediction for the given input or an error if occurred.
    fn forward(&mut self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>>;

    /// Makes a backward pass through the model, it must be preceded by a `forward` call.
    ///
    /// # Arguments
    /// * `params` - The model's parameters.
    /// * `grad` - A buffer for writing the gradient of the loss with respect to `params`.
    /// * `d` - The derivative of the loss with respect to the model's output.
    ///
    /// # Returns
    /// The derivative of the loss with respect to the model's input.
    fn backward(&mut self, params: &[f32], grad: &mut [f32], d: Array2<f32>)
    -> Result<Array2<f32>>;
}
