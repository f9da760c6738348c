#![cfg(test)]

use std::num::NonZeroUsize;

use rand::{SeedableRng, rngs::StdRng};

use crate::{
    MlErr,
    dataset::{Dataset, ImageShape},
    specs::{
        ActFnSpec, EarlyStoppingSpec, EvaluationSpec, LatentSpec, LayerSpec, LossFnSpec,
        ModelSpec, OptimizerSpec, ParamGenSpec, ProjectionSpec, TrainerSpec,
    },
    training::TrainerBuilder,
};

const SHAPE: ImageShape = ImageShape {
    height: 4,
    width: 4,
    channels: 1,
};

fn images(len: usize, seed: u64) -> Dataset {
    Dataset::synthetic(len, SHAPE, &mut StdRng::seed_from_u64(seed)).unwrap()
}

fn decoder_spec(epochs: usize) -> TrainerSpec {
    TrainerSpec {
        model: ModelSpec::Sequential {
            layers: vec![
                LayerSpec::Dense {
                    dim: (4, 16),
                    act_fn: Some(ActFnSpec::Tanh),
                    init: ParamGenSpec::XavierUniform,
                },
                LayerSpec::Dense {
                    dim: (16, 16),
                    act_fn: Some(ActFnSpec::Sigmoid { amp: 1. }),
                    init: ParamGenSpec::XavierUniform,
                },
            ],
        },
        latent: LatentSpec {
            dim: 4,
            learning_rate: 0.05,
            init_std: 0.3,
            projection: ProjectionSpec::UnitBall,
        },
        optimizer: OptimizerSpec::Adam {
            learning_rate: 0.01,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-7,
        },
        loss: LossFnSpec::Mse,
        epochs: NonZeroUsize::new(epochs).unwrap(),
        batch_size: NonZeroUsize::new(4).unwrap(),
        early_stopping: None,
        evaluation: EvaluationSpec {
            steps: 10,
            learning_rate: 0.05,
        },
        seed: Some(42),
    }
}

#[test]
fn joint_training_reduces_the_reconstruction_loss() {
    let mut trainer = TrainerBuilder::new()
        .build(&decoder_spec(60), images(16, 1))
        .unwrap();

    let history = trainer.fit().unwrap();
    let first = history.epochs()[0].loss;
    let last = history.last().unwrap().loss;

    assert_eq!(history.epochs().len(), 60);
    assert!(last < first, "loss went from {first} to {last}");
    assert!(history.epochs().iter().all(|m| m.latent_norm <= 1. + 1e-5));
}

#[test]
fn evaluation_leaves_the_decoder_untouched() {
    let mut trainer = TrainerBuilder::new()
        .build(&decoder_spec(5), images(12, 2))
        .unwrap();

    trainer.fit().unwrap();
    let params = trainer.params().to_vec();
    let latents = trainer.latents().to_vec();

    let evaluation = trainer.evaluate(&images(6, 3)).unwrap();

    assert_eq!(trainer.params(), params);
    assert_eq!(trainer.latents(), latents);
    assert_eq!(evaluation.steps, 10);
    assert!(evaluation.loss.is_finite() && evaluation.psnr > 0.);
}

#[test]
fn evaluation_without_steps_measures_the_initial_codes() {
    let mut spec = decoder_spec(2);
    spec.evaluation.steps = 0;

    let mut trainer = TrainerBuilder::new().build(&spec, images(8, 4)).unwrap();
    let evaluation = trainer.evaluate(&images(5, 5)).unwrap();

    assert_eq!(evaluation.steps, 0);
    assert!((evaluation.loss - evaluation.mse).abs() < 1e-6);
    assert!((evaluation.psnr - 10. * (1. / evaluation.mse).log10()).abs() < 1e-4);
}

#[test]
fn evaluation_rejects_images_of_another_shape() {
    let mut trainer = TrainerBuilder::new()
        .build(&decoder_spec(1), images(8, 6))
        .unwrap();

    let shape = ImageShape {
        height: 3,
        width: 3,
        channels: 1,
    };
    let other = Dataset::synthetic(2, shape, &mut StdRng::seed_from_u64(7)).unwrap();

    assert!(matches!(
        trainer.evaluate(&other),
        Err(MlErr::SizeMismatch { .. })
    ));
}

#[test]
fn early_stopping_cuts_training_short() {
    let mut spec = decoder_spec(20);
    spec.early_stopping = Some(EarlyStoppingSpec {
        patience: NonZeroUsize::new(1).unwrap(),
        min_delta: 1e9,
    });

    let mut trainer = TrainerBuilder::new().build(&spec, images(8, 8)).unwrap();
    let history = trainer.fit().unwrap();

    assert!(history.stopped_early());
    assert_eq!(history.epochs().len(), 2);
}

#[test]
fn exploding_training_is_reported() {
    let mut spec = decoder_spec(50);
    spec.model.layers_mut()[1] = LayerSpec::Dense {
        dim: (16, 16),
        act_fn: None,
        init: ParamGenSpec::XavierUniform,
    };
    spec.latent.projection = ProjectionSpec::Unconstrained;
    spec.optimizer = OptimizerSpec::GradientDescent { learning_rate: 1e6 };
    spec.batch_size = NonZeroUsize::new(1).unwrap();

    let mut trainer = TrainerBuilder::new().build(&spec, images(8, 9)).unwrap();

    assert!(matches!(trainer.fit(), Err(MlErr::Diverged { .. })));
}

#[test]
fn restored_trainer_reconstructs_the_same_images() {
    let dataset = images(8, 10);

    let mut trained = TrainerBuilder::new()
        .build(&decoder_spec(3), dataset.clone())
        .unwrap();
    trained.fit().unwrap();

    let mut spec = decoder_spec(3);
    spec.seed = Some(7);
    let mut restored = TrainerBuilder::new().build(&spec, dataset).unwrap();
    restored.restore(trained.checkpoint()).unwrap();

    let indices = [0, 3, 7];
    assert_eq!(
        trained.reconstruct(&indices).unwrap(),
        restored.reconstruct(&indices).unwrap()
    );
}
