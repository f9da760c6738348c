use crate::{MlErr, Result};

/// Defines the strategy for updating a group of parameters based on calculated gradients.
pub trait Optimizer {
    /// Updates the provided slice of parameters using the gradient.
    ///
    /// # Arguments
    /// * `params` - The parameters to update.
    /// * `grad` - The gradient of the loss with respect to `params`.
    ///
    /// # Returns
    /// An error if there's a mismatch in the sizes of `grad`, `params` and the optimizer's state.
    fn update_params(&mut self, params: &mut [f32], grad: &[f32]) -> Result<()>;

    /// Returns the current learning rate.
    fn learning_rate(&self) -> f32;

    /// Replaces the learning rate, the rest of the state is kept.
    fn set_learning_rate(&mut self, learning_rate: f32);

    /// Creates an optimizer with the same hyperparameters and a clean state for `len` parameters.
    fn spawn(&self, len: usize) -> Self
    where
        Self: Sized;
}

pub(super) fn check_sizes(params: usize, grad: usize, state: Option<usize>) -> Result<()> {
    if grad != params {
        return Err(MlErr::SizeMismatch {
            what: "optimizer gradient",
            got: grad,
            expected: params,
        });
    }

    match state {
        Some(state) if state != params => Err(MlErr::SizeMismatch {
            what: "optimizer state",
            got: params,
            expected: state,
        }),
        _ => Ok(()),
    }
}
