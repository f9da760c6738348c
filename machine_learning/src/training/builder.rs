use std::{cell::RefCell, rc::Rc};

use log::debug;
use rand::{SeedableRng, rngs::StdRng};

use super::{ModelTrainer, Trainer};
use crate::{
    MlErr, Result,
    arch::{
        Model, Sequential,
        activations::ActFn,
        layers::Layer,
        loss::{LossFn, Mae, Mse},
    },
    dataset::Dataset,
    initialization::{ChainedParamGen, ConstParamGen, ParamGen, RandParamGen},
    optimization::{Adam, GradientDescent, GradientDescentWithMomentum, Optimizer},
    specs::{ActFnSpec, LayerSpec, LossFnSpec, ModelSpec, OptimizerSpec, ParamGenSpec, TrainerSpec},
};

/// Builds `Trainer`s given a specification.
#[derive(Default)]
pub struct TrainerBuilder;

impl TrainerBuilder {
    /// Creates a new `TrainerBuilder`.
    pub fn new() -> Self {
        Self
    }

    /// Builds a new `Trainer` following a spec.
    ///
    /// # Arguments
    /// * `spec` - The specification for the trainer.
    /// * `dataset` - The training images.
    ///
    /// # Returns
    /// The trainer or an error if the spec is invalid or doesn't fit the dataset.
    pub fn build(&self, spec: &TrainerSpec, dataset: Dataset) -> Result<Box<dyn Trainer>> {
        self.check_spec(spec)?;

        let mut rng = self.generate_rng(spec.seed);
        let init_rng = Rc::new(RefCell::new(StdRng::from_rng(&mut rng)));

        self.resolve_model(spec, dataset, init_rng, rng)
    }

    fn check_spec(&self, spec: &TrainerSpec) -> Result<()> {
        let lrs = [
            ("optimizer", spec.optimizer.learning_rate()),
            ("latent", spec.latent.learning_rate),
            ("evaluation", spec.evaluation.learning_rate),
        ];

        for (what, lr) in lrs {
            if !(lr.is_finite() && lr > 0.) {
                return Err(MlErr::InvalidSpec(format!(
                    "the {what} learning rate must be positive, got {lr}"
                )));
            }
        }

        Ok(())
    }

    fn resolve_model(
        &self,
        spec: &TrainerSpec,
        dataset: Dataset,
        init_rng: Rc<RefCell<StdRng>>,
        rng: StdRng,
    ) -> Result<Box<dyn Trainer>> {
        match &spec.model {
            ModelSpec::Sequential {
                layers: layer_specs,
            } => {
                if layer_specs.is_empty() {
                    return Err(MlErr::InvalidSpec("the model has no layers".into()));
                }

                for pair in layer_specs.windows(2) {
                    let ((_, out), (inp, _)) = (pair[0].dim(), pair[1].dim());

                    if out != inp {
                        return Err(MlErr::InvalidSpec(format!(
                            "a layer with {out} outputs can't feed a layer with {inp} inputs"
                        )));
                    }
                }

                let layers = layer_specs.iter().map(|ls| self.resolve_layer(*ls));
                let model = Sequential::new(layers);
                let params = self.resolve_params(layer_specs, init_rng)?;
                self.resolve_optimizer(spec, dataset, model, params, rng)
            }
        }
    }

    fn resolve_layer(&self, spec: LayerSpec) -> Layer {
        match spec {
            LayerSpec::Dense { dim, act_fn, .. } => {
                let factory = |act_fn| Layer::dense(dim, act_fn);
                self.resolve_act_fn(act_fn, factory)
            }
        }
    }

    fn resolve_act_fn<F>(&self, spec: Option<ActFnSpec>, layer_factory: F) -> Layer
    where
        F: FnOnce(Option<ActFn>) -> Layer,
    {
        let Some(act_fn) = spec else {
            return layer_factory(None);
        };

        let act_fn = match act_fn {
            ActFnSpec::Sigmoid { amp } => ActFn::sigmoid(amp),
            ActFnSpec::Relu => ActFn::relu(),
            ActFnSpec::LeakyRelu { alpha } => ActFn::leaky_relu(alpha),
            ActFnSpec::Tanh => ActFn::tanh(),
        };

        layer_factory(Some(act_fn))
    }

    /// Generates the initial parameters, each layer's weights follow its `init` spec and the
    /// biases start at zero.
    fn resolve_params(
        &self,
        layer_specs: &[LayerSpec],
        rng: Rc<RefCell<StdRng>>,
    ) -> Result<Vec<f32>> {
        let mut param_gens: Vec<Box<dyn ParamGen>> = Vec::with_capacity(layer_specs.len() * 2);

        for spec in layer_specs {
            let LayerSpec::Dense { dim, init, .. } = *spec;
            let (fan_in, fan_out) = dim;

            param_gens.push(self.resolve_param_gen(init, rng.clone(), fan_in, fan_out)?);
            param_gens.push(Box::new(ConstParamGen::zeros(fan_out)));
        }

        let size = layer_specs.iter().map(LayerSpec::size).sum();
        let params = ChainedParamGen::new(param_gens)
            .sample(size)
            .unwrap_or_default();

        if params.len() != size {
            return Err(MlErr::SizeMismatch {
                what: "initial parameters",
                got: params.len(),
                expected: size,
            });
        }

        Ok(params)
    }

    fn resolve_param_gen(
        &self,
        spec: ParamGenSpec,
        rng: Rc<RefCell<StdRng>>,
        fan_in: usize,
        fan_out: usize,
    ) -> Result<Box<dyn ParamGen>> {
        let limit = fan_in * fan_out;

        let param_gen: Box<dyn ParamGen> = match spec {
            ParamGenSpec::Const { value } => Box::new(ConstParamGen::new(value, limit)),
            ParamGenSpec::Uniform { low, high } => {
                Box::new(RandParamGen::uniform(rng, low, high, limit)?)
            }
            ParamGenSpec::UniformInclusive { low, high } => {
                Box::new(RandParamGen::uniform_inclusive(rng, low, high, limit)?)
            }
            ParamGenSpec::XavierUniform => {
                Box::new(RandParamGen::scaled_uniform(rng, 6., fan_in + fan_out, limit)?)
            }
            ParamGenSpec::LecunUniform => {
                Box::new(RandParamGen::scaled_uniform(rng, 3., fan_in, limit)?)
            }
            ParamGenSpec::Normal { mean, std_dev } => {
                Box::new(RandParamGen::normal(rng, mean, std_dev, limit)?)
            }
            ParamGenSpec::Kaiming => Box::new(RandParamGen::scaled_normal(rng, 2., fan_in, limit)?),
            ParamGenSpec::Xavier => {
                Box::new(RandParamGen::scaled_normal(rng, 2., fan_in + fan_out, limit)?)
            }
            ParamGenSpec::Lecun => Box::new(RandParamGen::scaled_normal(rng, 1., fan_in, limit)?),
        };

        Ok(param_gen)
    }

    fn resolve_optimizer<M>(
        &self,
        spec: &TrainerSpec,
        dataset: Dataset,
        model: M,
        params: Vec<f32>,
        rng: StdRng,
    ) -> Result<Box<dyn Trainer>>
    where
        M: Model + 'static,
    {
        let len = params.len();

        match spec.optimizer {
            OptimizerSpec::Adam {
                learning_rate,
                beta1,
                beta2,
                epsilon,
            } => {
                let optimizer = Adam::new(len, learning_rate, beta1, beta2, epsilon);
                self.resolve_loss(spec, dataset, model, params, optimizer, rng)
            }
            OptimizerSpec::GradientDescent { learning_rate } => {
                let optimizer = GradientDescent::new(learning_rate);
                self.resolve_loss(spec, dataset, model, params, optimizer, rng)
            }
            OptimizerSpec::GradientDescentWithMomentum {
                learning_rate,
                momentum,
            } => {
                let optimizer = GradientDescentWithMomentum::new(len, learning_rate, momentum);
                self.resolve_loss(spec, dataset, model, params, optimizer, rng)
            }
        }
    }

    fn resolve_loss<M, O>(
        &self,
        spec: &TrainerSpec,
        dataset: Dataset,
        model: M,
        params: Vec<f32>,
        optimizer: O,
        rng: StdRng,
    ) -> Result<Box<dyn Trainer>>
    where
        M: Model + 'static,
        O: Optimizer + 'static,
    {
        match spec.loss {
            LossFnSpec::Mse => {
                self.terminate_build(spec, dataset, model, params, optimizer, Mse::new(), rng)
            }
            LossFnSpec::Mae => {
                self.terminate_build(spec, dataset, model, params, optimizer, Mae::new(), rng)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn terminate_build<M, O, L>(
        &self,
        spec: &TrainerSpec,
        dataset: Dataset,
        model: M,
        params: Vec<f32>,
        optimizer: O,
        loss_fn: L,
        rng: StdRng,
    ) -> Result<Box<dyn Trainer>>
    where
        M: Model + 'static,
        O: Optimizer + 'static,
        L: LossFn + 'static,
    {
        debug!(
            params = params.len(),
            samples = dataset.len(),
            latent_dim = spec.latent.dim;
            "building trainer"
        );

        let trainer = ModelTrainer::new(model, params, optimizer, loss_fn, dataset, spec, rng)?;
        Ok(Box::new(trainer))
    }

    fn generate_rng(&self, seed: Option<u64>) -> StdRng {
        match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use super::*;
    use crate::{
        dataset::ImageShape,
        specs::{EvaluationSpec, LatentSpec, ProjectionSpec},
    };

    fn spec() -> TrainerSpec {
        TrainerSpec {
            model: ModelSpec::Sequential {
                layers: vec![
                    LayerSpec::Dense {
                        dim: (2, 4),
                        act_fn: Some(ActFnSpec::Tanh),
                        init: ParamGenSpec::XavierUniform,
                    },
                    LayerSpec::Dense {
                        dim: (4, 6),
                        act_fn: Some(ActFnSpec::Sigmoid { amp: 1. }),
                        init: ParamGenSpec::Const { value: 0.5 },
                    },
                ],
            },
            latent: LatentSpec {
                dim: 2,
                learning_rate: 0.05,
                init_std: 0.1,
                projection: ProjectionSpec::UnitBall,
            },
            optimizer: OptimizerSpec::GradientDescent { learning_rate: 0.5 },
            loss: LossFnSpec::Mse,
            epochs: NonZeroUsize::new(2).unwrap(),
            batch_size: NonZeroUsize::new(3).unwrap(),
            early_stopping: None,
            evaluation: EvaluationSpec::default(),
            seed: Some(3),
        }
    }

    fn dataset(len: usize) -> Dataset {
        let shape = ImageShape {
            height: 2,
            width: 3,
            channels: 1,
        };

        Dataset::synthetic(len, shape, &mut StdRng::seed_from_u64(0)).unwrap()
    }

    #[test]
    fn biases_start_at_zero_and_weights_follow_their_init() {
        let trainer = TrainerBuilder::new().build(&spec(), dataset(5)).unwrap();
        let params = trainer.params();

        assert_eq!(params.len(), 3 * 4 + 5 * 6);
        assert_eq!(&params[8..12], [0.; 4]);
        assert_eq!(&params[12..36], [0.5; 24]);
        assert_eq!(&params[36..], [0.; 6]);
        assert!(params[..8].iter().all(|w| w.abs() <= 1.));
    }

    #[test]
    fn same_seed_same_trainer() {
        let a = TrainerBuilder::new().build(&spec(), dataset(5)).unwrap();
        let b = TrainerBuilder::new().build(&spec(), dataset(5)).unwrap();

        assert_eq!(a.params(), b.params());
        assert_eq!(a.latents(), b.latents());
    }

    #[test]
    fn broken_layer_chain_fails() {
        let mut spec = spec();
        spec.model.layers_mut()[1] = LayerSpec::Dense {
            dim: (3, 6),
            act_fn: None,
            init: ParamGenSpec::default(),
        };

        let result = TrainerBuilder::new().build(&spec, dataset(5));
        assert!(matches!(result, Err(MlErr::InvalidSpec(_))));
    }

    #[test]
    fn output_must_match_the_images() {
        let mut spec = spec();
        spec.model.layers_mut()[1] = LayerSpec::Dense {
            dim: (4, 7),
            act_fn: None,
            init: ParamGenSpec::default(),
        };

        let result = TrainerBuilder::new().build(&spec, dataset(5));
        assert!(matches!(result, Err(MlErr::SizeMismatch { .. })));
    }

    #[test]
    fn non_positive_learning_rates_fail() {
        let mut spec = spec();
        spec.latent.learning_rate = 0.;

        assert!(TrainerBuilder::new().build(&spec, dataset(5)).is_err());
    }
}
