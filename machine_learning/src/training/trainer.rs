use ndarray::{Array2, ArrayView2};

use super::History;
use crate::{Result, checkpoint::Checkpoint, dataset::Dataset, evaluation::Evaluation};

/// The trainer trait, jointly optimizes a decoder and the latent codes of its training images.
pub trait Trainer {
    /// Trains the decoder and the latent codes for the configured amount of epochs.
    ///
    /// # Returns
    /// The metrics of every epoch that ran, or an error if the loss stopped being finite.
    fn fit(&mut self) -> Result<History>;

    /// Fits fresh latent codes to `images` while keeping the decoder frozen.
    ///
    /// # Arguments
    /// * `images` - Images the decoder has never seen, with the same shape as the training ones.
    ///
    /// # Returns
    /// How well the decoder reconstructs `images`.
    fn evaluate(&mut self, images: &Dataset) -> Result<Evaluation>;

    /// Decodes arbitrary latent codes, one per row.
    fn decode(&mut self, z: ArrayView2<f32>) -> Result<Array2<f32>>;

    /// Decodes the latent codes of the given training images.
    fn reconstruct(&mut self, indices: &[usize]) -> Result<Array2<f32>>;

    /// Returns the decoder's flat parameters.
    fn params(&self) -> &[f32];

    /// Returns the training latent codes, one after the other.
    fn latents(&self) -> &[f32];

    fn checkpoint(&self) -> Checkpoint;

    /// Replaces the decoder's parameters and the latent codes with the ones of a checkpoint.
    fn restore(&mut self, checkpoint: Checkpoint) -> Result<()>;
}
