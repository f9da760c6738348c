use std::num::NonZeroUsize;

use log::{debug, info};
use machine_learning::{
    dataset::Dataset,
    specs::{LayerSpec, TrainerSpec},
    training::TrainerBuilder,
};
use tuner::{HyperModel, HyperValues, SearchSpace, TrialMetrics, TrialRecorder};

use crate::{
    HarnessErr,
    configs::{Adapter, check_learning_rate},
};

/// The hyperparameter names a `DecoderHyperModel` knows how to apply.
pub const HYPERPARAMETERS: [&str; 7] = [
    "learning_rate",
    "latent_learning_rate",
    "eval_learning_rate",
    "batch_size",
    "epochs",
    "latent_dim",
    "seed",
];

/// Trains a decoder per trial, starting from a base spec and overriding it with the trial's
/// hyperparameters.
///
/// Every epoch is recorded as a step with its `loss` and `latent_norm`. The trial reports the
/// last training `loss` along with the `val_loss`, `val_mse` and `val_psnr` of an evaluation on
/// the holdout images.
pub struct DecoderHyperModel {
    base: TrainerSpec,
    train: Dataset,
    holdout: Dataset,
    adapter: Adapter,
}

impl DecoderHyperModel {
    pub fn new(base: TrainerSpec, train: Dataset, holdout: Dataset) -> Self {
        Self {
            base,
            train,
            holdout,
            adapter: Adapter::new(),
        }
    }

    /// Returns the base spec with `values` applied on top.
    ///
    /// # Returns
    /// An error if a name is unknown, a value has the wrong type or the resulting spec can't be
    /// fitted to the training images.
    pub fn spec_for(&self, values: &HyperValues) -> Result<TrainerSpec, HarnessErr> {
        let mut spec = self.base.clone();

        for (name, _) in values.iter() {
            match name {
                "learning_rate" => {
                    let lr = positive_float(values, name)?;
                    spec.optimizer = spec.optimizer.with_learning_rate(lr);
                }
                "latent_learning_rate" => spec.latent.learning_rate = positive_float(values, name)?,
                "eval_learning_rate" => {
                    spec.evaluation.learning_rate = positive_float(values, name)?
                }
                "batch_size" => spec.batch_size = positive_int(values, name)?,
                "epochs" => spec.epochs = positive_int(values, name)?,
                "latent_dim" => {
                    let dim = positive_int(values, name)?.get();
                    spec.latent.dim = dim;
                    if let Some(first) = spec.model.layers_mut().first_mut() {
                        resize_input(first, dim);
                    }
                }
                "seed" => {
                    let seed = values.int(name)?;
                    let seed = u64::try_from(seed).map_err(|_| {
                        HarnessErr::InvalidConfig(format!("seed must not be negative, got {seed}"))
                    })?;
                    spec.seed = Some(seed);
                }
                other => {
                    return Err(HarnessErr::InvalidConfig(format!(
                        "unknown hyperparameter {other}, expected one of {}",
                        HYPERPARAMETERS.join(", ")
                    )));
                }
            }
        }

        self.adapter.validate_fit(&spec, &self.train)?;
        Ok(spec)
    }

    /// Checks every point of `space` up front, so a bad space fails before any trial runs.
    pub fn check_space(&self, space: &SearchSpace) -> Result<(), HarnessErr> {
        for k in 0..space.grid_size() {
            if let Some(values) = space.combination(k) {
                self.spec_for(&values)?;
            }
        }

        debug!(points = space.grid_size(); "search space checked");
        Ok(())
    }
}

impl HyperModel for DecoderHyperModel {
    type Error = HarnessErr;

    fn run_trial(
        &mut self,
        values: &HyperValues,
        recorder: &mut TrialRecorder<'_>,
    ) -> Result<TrialMetrics, HarnessErr> {
        let spec = self.spec_for(values)?;
        let mut trainer = TrainerBuilder::new().build(&spec, self.train.clone())?;

        let history = trainer.fit()?;
        for m in history.epochs() {
            recorder.record(
                m.epoch,
                TrialMetrics::from([
                    ("loss".to_string(), m.loss as f64),
                    ("latent_norm".to_string(), m.latent_norm as f64),
                ]),
            );
        }

        let evaluation = trainer.evaluate(&self.holdout)?;
        info!(
            trial = recorder.trial_id(),
            val_loss = evaluation.loss,
            val_psnr = evaluation.psnr;
            "trial evaluated"
        );

        let mut metrics = TrialMetrics::from([
            ("val_loss".to_string(), evaluation.loss as f64),
            ("val_mse".to_string(), evaluation.mse as f64),
            ("val_psnr".to_string(), evaluation.psnr as f64),
        ]);

        if let Some(last) = history.last() {
            metrics.insert("loss".to_string(), last.loss as f64);
        }

        Ok(metrics)
    }
}

fn resize_input(layer: &mut LayerSpec, n: usize) {
    match layer {
        LayerSpec::Dense { dim, .. } => dim.0 = n,
    }
}

fn positive_float(values: &HyperValues, name: &str) -> Result<f32, HarnessErr> {
    let value = values.float(name)? as f32;
    check_learning_rate(name, value)?;
    Ok(value)
}

fn positive_int(values: &HyperValues, name: &str) -> Result<NonZeroUsize, HarnessErr> {
    let value = values.int(name)?;

    usize::try_from(value)
        .ok()
        .and_then(NonZeroUsize::new)
        .ok_or_else(|| HarnessErr::InvalidConfig(format!("{name} must be positive, got {value}")))
}

#[cfg(test)]
mod tests {
    use machine_learning::{
        dataset::ImageShape,
        specs::{
            ActFnSpec, EvaluationSpec, LatentSpec, LossFnSpec, ModelSpec, OptimizerSpec,
            ParamGenSpec, ProjectionSpec,
        },
    };
    use rand::{SeedableRng, rngs::StdRng};
    use tuner::Trial;

    use super::*;

    fn hyper_model() -> DecoderHyperModel {
        let shape = ImageShape {
            height: 2,
            width: 2,
            channels: 1,
        };
        let images = Dataset::synthetic(10, shape, &mut StdRng::seed_from_u64(0)).unwrap();
        let (train, holdout) = images.split(2).unwrap();

        let base = TrainerSpec {
            model: ModelSpec::Sequential {
                layers: vec![
                    LayerSpec::Dense {
                        dim: (3, 8),
                        act_fn: Some(ActFnSpec::Tanh),
                        init: ParamGenSpec::XavierUniform,
                    },
                    LayerSpec::Dense {
                        dim: (8, 4),
                        act_fn: Some(ActFnSpec::Sigmoid { amp: 1. }),
                        init: ParamGenSpec::XavierUniform,
                    },
                ],
            },
            latent: LatentSpec {
                dim: 3,
                learning_rate: 0.05,
                init_std: 0.3,
                projection: ProjectionSpec::UnitBall,
            },
            optimizer: OptimizerSpec::GradientDescent { learning_rate: 0.1 },
            loss: LossFnSpec::Mse,
            epochs: NonZeroUsize::new(3).unwrap(),
            batch_size: NonZeroUsize::new(4).unwrap(),
            early_stopping: None,
            evaluation: EvaluationSpec {
                steps: 2,
                learning_rate: 0.1,
            },
            seed: Some(3),
        };

        DecoderHyperModel::new(base, train, holdout)
    }

    fn values(pairs: &[(&str, tuner::Value)]) -> HyperValues {
        let mut values = HyperValues::new();
        for (name, value) in pairs {
            values.insert(*name, value.clone());
        }
        values
    }

    #[test]
    fn hyperparameters_override_the_base_spec() {
        let spec = hyper_model()
            .spec_for(&values(&[
                ("learning_rate", 0.5.into()),
                ("latent_learning_rate", 0.2.into()),
                ("batch_size", 2i64.into()),
                ("latent_dim", 5i64.into()),
                ("seed", 9i64.into()),
            ]))
            .unwrap();

        assert_eq!(spec.optimizer.learning_rate(), 0.5);
        assert_eq!(spec.latent.learning_rate, 0.2);
        assert_eq!(spec.batch_size.get(), 2);
        assert_eq!(spec.latent.dim, 5);
        assert_eq!(spec.model.input_dim(), Some(5));
        assert_eq!(spec.seed, Some(9));
    }

    #[test]
    fn bad_hyperparameters_are_rejected() {
        let hyper_model = hyper_model();

        let bad = [
            values(&[("dropout", 0.1.into())]),
            values(&[("batch_size", 0i64.into())]),
            values(&[("batch_size", 64i64.into())]),
            values(&[("learning_rate", (-1.).into())]),
            values(&[("epochs", "many".into())]),
        ];

        for values in bad {
            assert!(hyper_model.spec_for(&values).is_err(), "{values} was accepted");
        }
    }

    #[test]
    fn check_space_visits_every_point() {
        let hyper_model = hyper_model();
        let mut space = SearchSpace::new();
        space
            .choice("learning_rate", [0.1, 0.01])
            .unwrap()
            .choice("batch_size", [2i64, 16])
            .unwrap();

        assert!(matches!(
            hyper_model.check_space(&space),
            Err(HarnessErr::InvalidConfig(_))
        ));
    }

    #[test]
    fn trials_report_training_and_holdout_metrics() {
        let mut hyper_model = hyper_model();
        let mut trial = Trial::new(0, HyperValues::new(), &mut StdRng::seed_from_u64(1));

        let metrics = hyper_model
            .run_trial(&HyperValues::new(), &mut TrialRecorder::new(&mut trial))
            .unwrap();

        for name in ["loss", "val_loss", "val_mse", "val_psnr"] {
            assert!(metrics[name].is_finite(), "{name} = {}", metrics[name]);
        }

        let steps: Vec<usize> = trial.history().iter().map(|s| s.step).collect();
        assert_eq!(steps, [1, 2, 3]);
        assert!(trial.history()[0].metrics.contains_key("latent_norm"));
    }
}
