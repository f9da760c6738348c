use std::num::NonZeroUsize;

use machine_learning::{
    dataset::Dataset,
    specs::{
        ActFnSpec, EarlyStoppingSpec, EvaluationSpec, LatentSpec, LayerSpec, LossFnSpec,
        ModelSpec, OptimizerSpec, ParamGenSpec, ProjectionSpec, TrainerSpec,
    },
};
use rand::{SeedableRng, rngs::StdRng};

use super::{
    ActFnConfig, DatasetConfig, EarlyStoppingConfig, LatentConfig, LayerConfig, LossFnConfig,
    ModelConfig, OptimizerConfig, ParamGenConfig, ProjectionConfig, SearchConfig, SourceConfig,
    TrainingConfig,
};
use crate::HarnessErr;

/// Checks the configs read from disk and turns them into what the trainer is built from.
pub struct Adapter;

impl Adapter {
    pub fn new() -> Self {
        Self
    }

    /// Validates every config and adapts them.
    ///
    /// # Returns
    /// The trainer spec, the training images and the holdout images.
    pub fn adapt_configs(
        &self,
        model: &ModelConfig,
        training: &TrainingConfig,
        dataset: &DatasetConfig,
    ) -> Result<(TrainerSpec, Dataset, Dataset), HarnessErr> {
        self.validate_model(model)?;
        self.validate_training(training)?;
        self.validate_dataset(dataset)?;

        let spec = self.adapt_trainer(model, training)?;
        let (train, holdout) = self.adapt_dataset(dataset)?;
        self.validate_fit(&spec, &train)?;

        Ok((spec, train, holdout))
    }

    // -------------------------------------------------------------------------
    // Validation
    // -------------------------------------------------------------------------

    fn validate_model(&self, model: &ModelConfig) -> Result<(), HarnessErr> {
        let layers = model.layers();

        if layers.is_empty() {
            return Err(HarnessErr::InvalidConfig(
                "model must have at least one layer".into(),
            ));
        }

        for (i, layer) in layers.iter().enumerate() {
            let (n, m) = layer.dim();
            if n == 0 || m == 0 {
                return Err(HarnessErr::InvalidConfig(format!(
                    "layer {i}: dimensions must be greater than 0, got ({n}, {m})"
                )));
            }
        }

        Ok(())
    }

    fn validate_training(&self, training: &TrainingConfig) -> Result<(), HarnessErr> {
        if training.epochs == 0 {
            return Err(HarnessErr::InvalidConfig(
                "epochs must be greater than 0".into(),
            ));
        }

        if training.batch_size == 0 {
            return Err(HarnessErr::InvalidConfig(
                "batch_size must be greater than 0".into(),
            ));
        }

        let lrs = [
            ("optimizer lr", optimizer_lr(&training.optimizer)),
            ("latent lr", training.latent.lr),
            ("evaluation lr", training.evaluation.lr),
        ];

        for (what, lr) in lrs {
            check_learning_rate(what, lr)?;
        }

        match training.optimizer {
            OptimizerConfig::Adam { b1, b2, eps, .. } => {
                if !(0. ..1.).contains(&b1) || !(0. ..1.).contains(&b2) {
                    return Err(HarnessErr::InvalidConfig(format!(
                        "adam betas must be in [0, 1), got b1 = {b1} and b2 = {b2}"
                    )));
                }
                if !(eps.is_finite() && eps > 0.) {
                    return Err(HarnessErr::InvalidConfig(format!(
                        "adam eps must be positive, got {eps}"
                    )));
                }
            }
            OptimizerConfig::GradientDescentWithMomentum { mu, .. } if !(0. ..1.).contains(&mu) => {
                return Err(HarnessErr::InvalidConfig(format!(
                    "momentum must be in [0, 1), got {mu}"
                )));
            }
            _ => {}
        }

        let LatentConfig { dim, init_std, .. } = training.latent;

        if dim == 0 {
            return Err(HarnessErr::InvalidConfig(
                "latent dim must be greater than 0".into(),
            ));
        }

        if !init_std.is_finite() || init_std < 0. {
            return Err(HarnessErr::InvalidConfig(format!(
                "latent init_std must be a non negative number, got {init_std}"
            )));
        }

        if let Some(EarlyStoppingConfig {
            patience,
            min_delta,
        }) = training.early_stopping
        {
            if patience == 0 {
                return Err(HarnessErr::InvalidConfig(
                    "early stopping patience must be greater than 0".into(),
                ));
            }

            if !min_delta.is_finite() || min_delta < 0. {
                return Err(HarnessErr::InvalidConfig(format!(
                    "early stopping min_delta must be a non negative number, got {min_delta}"
                )));
            }
        }

        Ok(())
    }

    fn validate_dataset(&self, dataset: &DatasetConfig) -> Result<(), HarnessErr> {
        let size = dataset.shape.size();
        if size == 0 {
            return Err(HarnessErr::InvalidConfig(
                "image shape must have at least one value".into(),
            ));
        }

        let samples = match &dataset.source {
            SourceConfig::Synthetic { len, .. } => *len,
            SourceConfig::Inline { data } => {
                if data.len() % size != 0 {
                    return Err(HarnessErr::InvalidConfig(format!(
                        "dataset length ({}) is not divisible by the image size ({size})",
                        data.len()
                    )));
                }
                data.len() / size
            }
        };

        // At least one image on each side of the split
        if dataset.holdout == 0 || dataset.holdout >= samples {
            return Err(HarnessErr::InvalidConfig(format!(
                "holdout ({}) must be greater than 0 and less than the dataset size ({samples} images)",
                dataset.holdout
            )));
        }

        Ok(())
    }

    /// Checks that a trainer spec can be fitted to the given training images.
    ///
    /// Called again for every trial of a search, since the hyperparameters may override
    /// the batch size or the latent dimension.
    pub fn validate_fit(&self, spec: &TrainerSpec, train: &Dataset) -> Result<(), HarnessErr> {
        let layers = spec.model.layers();

        // Adjacent layers must have compatible dimensions: prev.m == next.n
        for i in 1..layers.len() {
            let (_, prev_m) = layers[i - 1].dim();
            let (curr_n, _) = layers[i].dim();
            if prev_m != curr_n {
                return Err(HarnessErr::InvalidConfig(format!(
                    "layer {i}: input size ({curr_n}) does not match \
                     previous layer output size ({prev_m})"
                )));
            }
        }

        if let Some(input) = spec.model.input_dim() {
            if input != spec.latent.dim {
                return Err(HarnessErr::InvalidConfig(format!(
                    "first layer input size ({input}) does not match latent dim ({})",
                    spec.latent.dim
                )));
            }
        }

        if let Some(output) = spec.model.output_dim() {
            if output != train.sample_size() {
                return Err(HarnessErr::InvalidConfig(format!(
                    "last layer output size ({output}) does not match image size ({})",
                    train.sample_size()
                )));
            }
        }

        if spec.batch_size.get() > train.len() {
            return Err(HarnessErr::InvalidConfig(format!(
                "batch_size ({}) exceeds training set size ({} images)",
                spec.batch_size,
                train.len()
            )));
        }

        Ok(())
    }

    pub fn validate_search(&self, search: &SearchConfig) -> Result<(), HarnessErr> {
        if search.max_trials == Some(0) {
            return Err(HarnessErr::InvalidConfig(
                "max_trials must be greater than 0".into(),
            ));
        }

        if search.objective.name.is_empty() {
            return Err(HarnessErr::InvalidConfig(
                "objective must name a metric".into(),
            ));
        }

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Adaptation
    // -------------------------------------------------------------------------

    fn adapt_trainer(
        &self,
        model: &ModelConfig,
        training: &TrainingConfig,
    ) -> Result<TrainerSpec, HarnessErr> {
        let epochs = NonZeroUsize::new(training.epochs)
            .ok_or_else(|| HarnessErr::InvalidConfig("epochs must be greater than 0".into()))?;
        let batch_size = NonZeroUsize::new(training.batch_size).ok_or_else(|| {
            HarnessErr::InvalidConfig("batch_size must be greater than 0".into())
        })?;

        let early_stopping = training
            .early_stopping
            .map(|es| {
                NonZeroUsize::new(es.patience)
                    .map(|patience| EarlyStoppingSpec {
                        patience,
                        min_delta: es.min_delta,
                    })
                    .ok_or_else(|| {
                        HarnessErr::InvalidConfig(
                            "early stopping patience must be greater than 0".into(),
                        )
                    })
            })
            .transpose()?;

        Ok(TrainerSpec {
            model: self.adapt_model(model),
            latent: self.adapt_latent(&training.latent),
            optimizer: self.adapt_optimizer(training.optimizer),
            loss: self.adapt_loss_fn(training.loss_fn),
            epochs,
            batch_size,
            early_stopping,
            evaluation: EvaluationSpec {
                steps: training.evaluation.steps,
                learning_rate: training.evaluation.lr,
            },
            seed: training.seed,
        })
    }

    fn adapt_dataset(&self, dataset: &DatasetConfig) -> Result<(Dataset, Dataset), HarnessErr> {
        let images = match &dataset.source {
            SourceConfig::Synthetic { len, seed } => {
                let mut rng = StdRng::seed_from_u64(*seed);
                Dataset::synthetic(*len, dataset.shape, &mut rng)?
            }
            SourceConfig::Inline { data } => Dataset::new(data.clone(), dataset.shape)?,
        };

        Ok(images.split(dataset.holdout)?)
    }

    fn adapt_latent(&self, latent: &LatentConfig) -> LatentSpec {
        let projection = match latent.projection {
            ProjectionConfig::Unconstrained => ProjectionSpec::Unconstrained,
            ProjectionConfig::UnitBall => ProjectionSpec::UnitBall,
            ProjectionConfig::UnitSphere => ProjectionSpec::UnitSphere,
        };

        LatentSpec {
            dim: latent.dim,
            learning_rate: latent.lr,
            init_std: latent.init_std,
            projection,
        }
    }

    fn adapt_loss_fn(&self, loss_fn: LossFnConfig) -> LossFnSpec {
        match loss_fn {
            LossFnConfig::Mse => LossFnSpec::Mse,
            LossFnConfig::Mae => LossFnSpec::Mae,
        }
    }

    fn adapt_optimizer(&self, optimizer: OptimizerConfig) -> OptimizerSpec {
        match optimizer {
            OptimizerConfig::Adam { lr, b1, b2, eps } => OptimizerSpec::Adam {
                learning_rate: lr,
                beta1: b1,
                beta2: b2,
                epsilon: eps,
            },
            OptimizerConfig::GradientDescent { lr } => {
                OptimizerSpec::GradientDescent { learning_rate: lr }
            }
            OptimizerConfig::GradientDescentWithMomentum { lr, mu } => {
                OptimizerSpec::GradientDescentWithMomentum {
                    learning_rate: lr,
                    momentum: mu,
                }
            }
        }
    }

    fn adapt_model(&self, model: &ModelConfig) -> ModelSpec {
        match model {
            ModelConfig::Sequential { layers } => ModelSpec::Sequential {
                layers: layers.iter().map(|layer| self.adapt_layer(layer)).collect(),
            },
        }
    }

    fn adapt_layer(&self, layer: &LayerConfig) -> LayerSpec {
        match *layer {
            LayerConfig::Dense { dim, init, act_fn } => LayerSpec::Dense {
                dim,
                act_fn: self.adapt_act_fn(act_fn.as_ref()),
                init: self.adapt_param_gen(init),
            },
        }
    }

    fn adapt_param_gen(&self, param_gen: ParamGenConfig) -> ParamGenSpec {
        match param_gen {
            ParamGenConfig::Const { value } => ParamGenSpec::Const { value },
            ParamGenConfig::Uniform { low, high } => ParamGenSpec::Uniform { low, high },
            ParamGenConfig::UniformInclusive { low, high } => {
                ParamGenSpec::UniformInclusive { low, high }
            }
            ParamGenConfig::XavierUniform => ParamGenSpec::XavierUniform,
            ParamGenConfig::LecunUniform => ParamGenSpec::LecunUniform,
            ParamGenConfig::Normal { mean, std_dev } => ParamGenSpec::Normal { mean, std_dev },
            ParamGenConfig::Kaiming => ParamGenSpec::Kaiming,
            ParamGenConfig::Xavier => ParamGenSpec::Xavier,
            ParamGenConfig::Lecun => ParamGenSpec::Lecun,
        }
    }

    fn adapt_act_fn(&self, act_fn: Option<&ActFnConfig>) -> Option<ActFnSpec> {
        match *act_fn? {
            ActFnConfig::Sigmoid { amp } => Some(ActFnSpec::Sigmoid { amp }),
            ActFnConfig::Relu => Some(ActFnSpec::Relu),
            ActFnConfig::LeakyRelu { alpha } => Some(ActFnSpec::LeakyRelu { alpha }),
            ActFnConfig::Tanh => Some(ActFnSpec::Tanh),
        }
    }
}

impl Default for Adapter {
    fn default() -> Self {
        Self::new()
    }
}

fn optimizer_lr(optimizer: &OptimizerConfig) -> f32 {
    match *optimizer {
        OptimizerConfig::Adam { lr, .. }
        | OptimizerConfig::GradientDescent { lr }
        | OptimizerConfig::GradientDescentWithMomentum { lr, .. } => lr,
    }
}

/// Learning rates must be positive and finite.
pub(crate) fn check_learning_rate(what: &str, lr: f32) -> Result<(), HarnessErr> {
    if !lr.is_finite() || lr <= 0. {
        return Err(HarnessErr::InvalidConfig(format!(
            "{what} must be positive, got {lr}"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use machine_learning::dataset::ImageShape;

    use super::*;

    const SHAPE: ImageShape = ImageShape {
        height: 2,
        width: 2,
        channels: 1,
    };

    fn model(dims: &[(usize, usize)]) -> ModelConfig {
        ModelConfig::Sequential {
            layers: dims
                .iter()
                .map(|&dim| LayerConfig::Dense {
                    dim,
                    init: ParamGenConfig::XavierUniform,
                    act_fn: Some(ActFnConfig::Tanh),
                })
                .collect(),
        }
    }

    fn training() -> TrainingConfig {
        TrainingConfig {
            optimizer: OptimizerConfig::Adam {
                lr: 0.01,
                b1: 0.9,
                b2: 0.999,
                eps: 1e-7,
            },
            loss_fn: LossFnConfig::Mse,
            latent: LatentConfig {
                dim: 3,
                lr: 0.05,
                init_std: 0.5,
                projection: ProjectionConfig::UnitBall,
            },
            epochs: 4,
            batch_size: 2,
            early_stopping: None,
            evaluation: Default::default(),
            seed: Some(0),
        }
    }

    fn dataset(len: usize, holdout: usize) -> DatasetConfig {
        DatasetConfig {
            shape: SHAPE,
            source: SourceConfig::Synthetic { len, seed: 1 },
            holdout,
        }
    }

    fn invalid(result: Result<(TrainerSpec, Dataset, Dataset), HarnessErr>) -> String {
        match result {
            Err(HarnessErr::InvalidConfig(msg)) => msg,
            Err(e) => panic!("expected an invalid config, got {e}"),
            Ok(_) => panic!("expected an invalid config"),
        }
    }

    #[test]
    fn valid_configs_are_adapted() {
        let adapter = Adapter::new();
        let (spec, train, holdout) = adapter
            .adapt_configs(&model(&[(3, 8), (8, 4)]), &training(), &dataset(10, 3))
            .unwrap();

        assert_eq!(train.len(), 7);
        assert_eq!(holdout.len(), 3);
        assert_eq!(spec.latent.learning_rate, 0.05);
        assert_eq!(spec.optimizer.learning_rate(), 0.01);
        assert_eq!(spec.batch_size.get(), 2);
        assert_eq!(spec.model.layers().len(), 2);
    }

    #[test]
    fn broken_layer_chain_is_rejected() {
        let msg = invalid(Adapter::new().adapt_configs(
            &model(&[(3, 8), (6, 4)]),
            &training(),
            &dataset(10, 3),
        ));

        assert!(msg.contains("layer 1"), "{msg}");
    }

    #[test]
    fn decoder_ends_must_match_latents_and_images() {
        let adapter = Adapter::new();

        let msg = invalid(adapter.adapt_configs(&model(&[(2, 4)]), &training(), &dataset(10, 3)));
        assert!(msg.contains("latent dim"), "{msg}");

        let msg = invalid(adapter.adapt_configs(&model(&[(3, 5)]), &training(), &dataset(10, 3)));
        assert!(msg.contains("image size"), "{msg}");
    }

    #[test]
    fn batch_size_is_bounded_by_the_training_images() {
        let mut training = training();
        training.batch_size = 8;

        let msg = invalid(Adapter::new().adapt_configs(
            &model(&[(3, 4)]),
            &training,
            &dataset(10, 3),
        ));

        assert!(msg.contains("batch_size"), "{msg}");
    }

    #[test]
    fn holdout_must_leave_images_on_both_sides() {
        let adapter = Adapter::new();

        for holdout in [0, 10] {
            let msg = invalid(adapter.adapt_configs(
                &model(&[(3, 4)]),
                &training(),
                &dataset(10, holdout),
            ));
            assert!(msg.contains("holdout"), "{msg}");
        }
    }

    #[test]
    fn bad_training_values_are_rejected() {
        let adapter = Adapter::new();
        let mut zero_epochs = training();
        zero_epochs.epochs = 0;
        let mut negative_lr = training();
        negative_lr.latent.lr = -1.;
        let mut no_patience = training();
        no_patience.early_stopping = Some(EarlyStoppingConfig {
            patience: 0,
            min_delta: 0.,
        });

        for training in [zero_epochs, negative_lr, no_patience] {
            invalid(adapter.adapt_configs(&model(&[(3, 4)]), &training, &dataset(10, 3)));
        }
    }

    #[test]
    fn optimizer_constants_are_bounded() {
        let adapter = Adapter::new();
        let adam = |b1, b2, eps| {
            let mut training = training();
            training.optimizer = OptimizerConfig::Adam {
                lr: 0.01,
                b1,
                b2,
                eps,
            };
            training
        };
        let momentum = |mu| {
            let mut training = training();
            training.optimizer = OptimizerConfig::GradientDescentWithMomentum { lr: 0.01, mu };
            training
        };

        let bad = [
            (adam(1., 0.999, 1e-7), "betas"),
            (adam(0.9, -0.1, 1e-7), "betas"),
            (adam(f32::NAN, 0.999, 1e-7), "betas"),
            (adam(0.9, 0.999, 0.), "eps"),
            (adam(0.9, 0.999, f32::NAN), "eps"),
            (adam(0.9, 0.999, f32::INFINITY), "eps"),
            (momentum(1.), "momentum"),
            (momentum(-0.5), "momentum"),
            (momentum(f32::NAN), "momentum"),
        ];

        for (training, what) in bad {
            let msg = invalid(adapter.adapt_configs(&model(&[(3, 4)]), &training, &dataset(10, 3)));
            assert!(msg.contains(what), "{msg}");
        }

        for training in [adam(0., 0.5, 1e-8), momentum(0.), momentum(0.95)] {
            assert!(
                adapter
                    .adapt_configs(&model(&[(3, 4)]), &training, &dataset(10, 3))
                    .is_ok()
            );
        }
    }

    #[test]
    fn min_delta_must_be_a_non_negative_number() {
        let adapter = Adapter::new();
        let with_min_delta = |min_delta| {
            let mut training = training();
            training.early_stopping = Some(EarlyStoppingConfig {
                patience: 2,
                min_delta,
            });
            training
        };

        for min_delta in [-0.1, f32::NAN, f32::INFINITY] {
            let training = with_min_delta(min_delta);
            let msg = invalid(adapter.adapt_configs(&model(&[(3, 4)]), &training, &dataset(10, 3)));
            assert!(msg.contains("min_delta"), "{msg}");
        }

        let (spec, ..) = adapter
            .adapt_configs(&model(&[(3, 4)]), &with_min_delta(0.01), &dataset(10, 3))
            .unwrap();
        assert!(spec.early_stopping.is_some());
    }

    #[test]
    fn projection_none_leaves_the_codes_unconstrained() {
        let latent: LatentConfig =
            serde_json::from_str(r#"{ "dim": 3, "lr": 0.05, "projection": "none" }"#).unwrap();
        assert_eq!(latent.projection, ProjectionConfig::Unconstrained);
        assert_eq!(
            serde_json::to_value(latent.projection).unwrap(),
            serde_json::json!("none")
        );

        let mut training = training();
        training.latent = latent;

        let (spec, ..) = Adapter::new()
            .adapt_configs(&model(&[(3, 4)]), &training, &dataset(10, 3))
            .unwrap();
        assert_eq!(spec.latent.projection, ProjectionSpec::Unconstrained);
    }

    #[test]
    fn inline_data_must_hold_whole_images() {
        let config = DatasetConfig {
            shape: SHAPE,
            source: SourceConfig::Inline {
                data: vec![0.5; 10],
            },
            holdout: 1,
        };

        let msg = invalid(Adapter::new().adapt_configs(&model(&[(3, 4)]), &training(), &config));
        assert!(msg.contains("divisible"), "{msg}");
    }
}
