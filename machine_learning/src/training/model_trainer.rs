use std::num::NonZeroUsize;

use log::{debug, info};
use ndarray::{Array2, ArrayView2};
use rand::{Rng, seq::SliceRandom};

use super::{EpochMetrics, History, Trainer};
use crate::{
    MlErr, Result,
    arch::{
        Model,
        loss::{LossFn, Mse},
    },
    checkpoint::Checkpoint,
    dataset::Dataset,
    evaluation::{self, Evaluation},
    latent::LatentTable,
    optimization::Optimizer,
    specs::{EarlyStoppingSpec, EvaluationSpec, LatentSpec, TrainerSpec},
};

/// A model `Trainer`. Contains the decoder, its parameters and the latent codes of the training
/// images, along with everything needed to optimize both groups.
pub struct ModelTrainer<M, O, L, R>
where
    M: Model,
    O: Optimizer,
    L: LossFn,
    R: Rng,
{
    model: M,
    params: Vec<f32>,
    grad: Vec<f32>,
    optimizer: O,
    latents: LatentTable<O>,
    loss_fn: L,
    dataset: Dataset,

    latent_spec: LatentSpec,
    epochs: NonZeroUsize,
    batch_size: NonZeroUsize,
    early_stopping: Option<EarlyStoppingSpec>,
    evaluation: EvaluationSpec,
    rng: R,
}

impl<M, O, L, R> ModelTrainer<M, O, L, R>
where
    M: Model,
    O: Optimizer,
    L: LossFn,
    R: Rng,
{
    /// Returns a new `ModelTrainer`, with freshly initialized latent codes.
    ///
    /// # Arguments
    /// * `model` - The decoder that will be trained.
    /// * `params` - The decoder's initial parameters.
    /// * `optimizer` - The decoder's optimizer, the latent codes get optimizers of the same kind.
    /// * `loss_fn` - The reconstruction loss.
    /// * `dataset` - The training images, one latent code is created for each.
    /// * `spec` - The rest of the training configuration.
    /// * `rng` - A random number generator, used for the codes and for shuffling.
    ///
    /// # Returns
    /// A new `ModelTrainer` or an error if the sizes of the pieces don't fit together.
    pub fn new(
        model: M,
        params: Vec<f32>,
        optimizer: O,
        loss_fn: L,
        dataset: Dataset,
        spec: &TrainerSpec,
        mut rng: R,
    ) -> Result<Self> {
        let checks = [
            ("decoder parameters", params.len(), model.size()),
            ("decoder input", model.input_dim(), spec.latent.dim),
            ("decoder output", model.output_dim(), dataset.sample_size()),
        ];

        for (what, got, expected) in checks {
            if got != expected {
                return Err(MlErr::SizeMismatch {
                    what,
                    got,
                    expected,
                });
            }
        }

        let prototype = latent_optimizer(&optimizer, spec.latent.learning_rate);
        let latents = LatentTable::new(dataset.len(), &spec.latent, &prototype, &mut rng)?;

        Ok(Self {
            grad: vec![0.; params.len()],
            model,
            params,
            optimizer,
            latents,
            loss_fn,
            dataset,
            latent_spec: spec.latent,
            epochs: spec.epochs,
            batch_size: spec.batch_size,
            early_stopping: spec.early_stopping,
            evaluation: spec.evaluation,
            rng,
        })
    }

    /// Runs a single optimization step over both parameter groups.
    ///
    /// # Returns
    /// The batch loss, measured before the step.
    fn train_batch(&mut self, indices: &[usize]) -> Result<f32> {
        let z = self.latents.gather(indices)?;
        let y = self.dataset.select(indices)?;

        let y_pred = self.model.forward(&self.params, z.view())?;
        let loss = self.loss_fn.loss(y_pred.view(), y.view());
        let d = self.loss_fn.loss_prime(y_pred.view(), y.view());

        self.grad.fill(0.);
        let dz = self.model.backward(&self.params, &mut self.grad, d)?;

        self.optimizer.update_params(&mut self.params, &self.grad)?;
        self.latents.step(indices, dz.view())?;
        Ok(loss)
    }

    /// Optimizes `latents` alone so that the frozen decoder reconstructs `images`.
    fn infer_latents(&mut self, latents: &mut LatentTable<O>, images: &Dataset) -> Result<()> {
        let mut order: Vec<usize> = (0..images.len()).collect();

        for _ in 0..self.evaluation.steps {
            order.shuffle(&mut self.rng);

            for batch in order.chunks(self.batch_size.get()) {
                let z = latents.gather(batch)?;
                let y = images.select(batch)?;

                let y_pred = self.model.forward(&self.params, z.view())?;
                let d = self.loss_fn.loss_prime(y_pred.view(), y.view());

                // The weight gradient is computed but never applied.
                let dz = self.model.backward(&self.params, &mut self.grad, d)?;
                latents.step(batch, dz.view())?;
            }
        }

        Ok(())
    }

    /// Returns the reconstruction loss and the mean squared error over every image.
    fn reconstruction_error(
        &mut self,
        latents: &LatentTable<O>,
        images: &Dataset,
    ) -> Result<(f32, f32)> {
        let indices: Vec<usize> = (0..images.len()).collect();
        let (mut loss, mut sq_err) = (0., 0.);

        for batch in indices.chunks(self.batch_size.get()) {
            let z = latents.gather(batch)?;
            let y = images.select(batch)?;
            let y_pred = self.model.forward(&self.params, z.view())?;

            let weight = batch.len() as f32;
            loss += self.loss_fn.loss(y_pred.view(), y.view()) * weight;
            sq_err += Mse.loss(y_pred.view(), y.view()) * weight;
        }

        let n = images.len() as f32;
        Ok((loss / n, sq_err / n))
    }
}

/// Creates a clean optimizer for latent codes, like `optimizer` but with its own learning rate.
fn latent_optimizer<O: Optimizer>(optimizer: &O, learning_rate: f32) -> O {
    let mut prototype = optimizer.spawn(0);
    prototype.set_learning_rate(learning_rate);
    prototype
}

impl<M, O, L, R> Trainer for ModelTrainer<M, O, L, R>
where
    M: Model,
    O: Optimizer,
    L: LossFn,
    R: Rng,
{
    fn fit(&mut self) -> Result<History> {
        let mut history = History::default();
        let mut order: Vec<usize> = (0..self.dataset.len()).collect();
        let (mut best, mut stale) = (f32::INFINITY, 0);

        for epoch in 1..=self.epochs.get() {
            order.shuffle(&mut self.rng);

            let mut total = 0.;
            let mut batches = 0;

            for batch in order.chunks(self.batch_size.get()) {
                total += self.train_batch(batch)?;
                batches += 1;
            }

            let loss = total / batches as f32;

            if !loss.is_finite() {
                return Err(MlErr::Diverged { epoch });
            }

            let latent_norm = self.latents.mean_norm();
            info!(epoch = epoch, loss = loss, latent_norm = latent_norm; "epoch finished");

            history.push(EpochMetrics {
                epoch,
                loss,
                latent_norm,
            });

            let Some(EarlyStoppingSpec {
                patience,
                min_delta,
            }) = self.early_stopping
            else {
                continue;
            };

            if loss < best - min_delta {
                best = loss;
                stale = 0;
            } else {
                stale += 1;
            }

            if stale >= patience.get() {
                info!("no improvement in {stale} epochs, stopping early at epoch {epoch}");
                history.stop_early();
                break;
            }
        }

        Ok(history)
    }

    fn evaluate(&mut self, images: &Dataset) -> Result<Evaluation> {
        if images.sample_size() != self.dataset.sample_size() {
            return Err(MlErr::SizeMismatch {
                what: "evaluation images",
                got: images.sample_size(),
                expected: self.dataset.sample_size(),
            });
        }

        let EvaluationSpec {
            steps,
            learning_rate,
        } = self.evaluation;

        let prototype = latent_optimizer(&self.optimizer, learning_rate);
        let mut latents =
            LatentTable::new(images.len(), &self.latent_spec, &prototype, &mut self.rng)?;

        debug!(images = images.len(), steps = steps; "inferring evaluation latents");
        self.infer_latents(&mut latents, images)?;

        let (loss, mse) = self.reconstruction_error(&latents, images)?;
        let psnr = evaluation::psnr(mse);
        info!(loss = loss, mse = mse, psnr = psnr; "evaluation finished");

        Ok(Evaluation {
            loss,
            mse,
            psnr,
            steps,
        })
    }

    fn decode(&mut self, z: ArrayView2<f32>) -> Result<Array2<f32>> {
        self.model.forward(&self.params, z)
    }

    fn reconstruct(&mut self, indices: &[usize]) -> Result<Array2<f32>> {
        let z = self.latents.gather(indices)?;
        self.model.forward(&self.params, z.view())
    }

    fn params(&self) -> &[f32] {
        &self.params
    }

    fn latents(&self) -> &[f32] {
        self.latents.as_slice()
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            params: self.params.clone(),
            latents: self.latents.as_slice().to_vec(),
            latent_dim: self.latents.dim(),
        }
    }

    fn restore(&mut self, checkpoint: Checkpoint) -> Result<()> {
        let Checkpoint {
            params,
            latents,
            latent_dim,
        } = checkpoint;

        if params.len() != self.params.len() {
            return Err(MlErr::SizeMismatch {
                what: "checkpoint parameters",
                got: params.len(),
                expected: self.params.len(),
            });
        }

        if latent_dim != self.latents.dim() {
            return Err(MlErr::SizeMismatch {
                what: "checkpoint latent dimension",
                got: latent_dim,
                expected: self.latents.dim(),
            });
        }

        let prototype = latent_optimizer(&self.optimizer, self.latent_spec.learning_rate);
        let latents = LatentTable::from_codes(
            latents,
            latent_dim,
            self.latent_spec.projection.into(),
            &prototype,
        )?;

        if latents.len() != self.dataset.len() {
            return Err(MlErr::SizeMismatch {
                what: "checkpoint latent codes",
                got: latents.len(),
                expected: self.dataset.len(),
            });
        }

        self.params = params;
        self.latents = latents;
        Ok(())
    }
}
