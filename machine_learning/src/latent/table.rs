use std::{cell::RefCell, rc::Rc};

use ndarray::{Array2, ArrayView2};
use rand::{Rng, SeedableRng, rngs::StdRng};

use super::{Projection, projection::norm};
use crate::{
    MlErr, Result,
    initialization::{ParamGen, RandParamGen},
    optimization::Optimizer,
    specs::LatentSpec,
};

/// The per-sample latent codes, the input of the decoder and its second parameter group.
///
/// Every code owns its optimizer, so a code's optimizer state (momentum, step count) only advances
/// when the code takes part in a batch.
pub struct LatentTable<O: Optimizer> {
    dim: usize,
    codes: Vec<f32>,
    optimizers: Vec<O>,
    projection: Projection,
}

impl<O: Optimizer> LatentTable<O> {
    /// Creates a new `LatentTable` with codes drawn from a centered normal and then projected.
    ///
    /// # Arguments
    /// * `len` - The amount of codes, one per sample.
    /// * `spec` - The latent dimension, initialization and projection.
    /// * `prototype` - The optimizer every code's optimizer is spawned from.
    /// * `rng` - The generator the codes' own generator is seeded from.
    ///
    /// # Returns
    /// A new `LatentTable` instance or an error if the spec is invalid.
    pub fn new<R: Rng>(len: usize, spec: &LatentSpec, prototype: &O, rng: &mut R) -> Result<Self> {
        let count = len * spec.dim;
        let code_rng = Rc::new(RefCell::new(StdRng::from_rng(rng)));
        let codes = RandParamGen::normal(code_rng, 0., spec.init_std, count)?
            .sample(count)
            .unwrap_or_default();

        let mut table = Self::from_codes(codes, spec.dim, spec.projection.into(), prototype)?;
        let projection = table.projection;
        table.codes.chunks_exact_mut(spec.dim).for_each(|z| projection.apply(z));
        Ok(table)
    }

    /// Creates a new `LatentTable` from already existing codes, these are kept as they are.
    ///
    /// # Arguments
    /// * `codes` - The codes laid out one after the other.
    /// * `dim` - The dimension of each code.
    /// * `projection` - The constraint for the codes.
    /// * `prototype` - The optimizer every code's optimizer is spawned from.
    pub fn from_codes(
        codes: Vec<f32>,
        dim: usize,
        projection: Projection,
        prototype: &O,
    ) -> Result<Self> {
        if dim == 0 {
            return Err(MlErr::InvalidSpec(
                "the latent dimension must be greater than 0".into(),
            ));
        }

        if codes.len() % dim != 0 {
            return Err(MlErr::SizeMismatch {
                what: "latent codes",
                got: codes.len(),
                expected: codes.len().next_multiple_of(dim),
            });
        }

        let optimizers = (0..codes.len() / dim).map(|_| prototype.spawn(dim)).collect();

        Ok(Self {
            dim,
            codes,
            optimizers,
            projection,
        })
    }

    /// Returns the amount of codes.
    pub fn len(&self) -> usize {
        self.optimizers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.optimizers.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Returns every code, one after the other.
    pub fn as_slice(&self) -> &[f32] {
        &self.codes
    }

    /// Returns the `index`-th code.
    pub fn code(&self, index: usize) -> Result<&[f32]> {
        if index >= self.len() {
            return Err(MlErr::IndexOutOfBounds {
                what: "latent table",
                index,
                len: self.len(),
            });
        }

        Ok(&self.codes[index * self.dim..(index + 1) * self.dim])
    }

    /// Builds the decoder's input for a batch.
    ///
    /// # Arguments
    /// * `indices` - The samples in the batch.
    ///
    /// # Returns
    /// A matrix with the code of each sample as its rows, in the same order as `indices`.
    pub fn gather(&self, indices: &[usize]) -> Result<Array2<f32>> {
        let mut rows = Vec::with_capacity(indices.len() * self.dim);

        for &i in indices {
            rows.extend_from_slice(self.code(i)?);
        }

        Ok(Array2::from_shape_vec((indices.len(), self.dim), rows)?)
    }

    /// Updates the codes of a batch and projects them back.
    ///
    /// # Arguments
    /// * `indices` - The samples in the batch.
    /// * `grads` - The gradient of the loss with respect to each code, in the order of `indices`.
    pub fn step(&mut self, indices: &[usize], grads: ArrayView2<f32>) -> Result<()> {
        if grads.nrows() != indices.len() {
            return Err(MlErr::SizeMismatch {
                what: "latent gradient rows",
                got: grads.nrows(),
                expected: indices.len(),
            });
        }

        if grads.ncols() != self.dim {
            return Err(MlErr::SizeMismatch {
                what: "latent gradient columns",
                got: grads.ncols(),
                expected: self.dim,
            });
        }

        let (len, dim) = (self.len(), self.dim);

        for (&i, g) in indices.iter().zip(grads.rows()) {
            if i >= len {
                return Err(MlErr::IndexOutOfBounds {
                    what: "latent table",
                    index: i,
                    len,
                });
            }

            let z = &mut self.codes[i * dim..(i + 1) * dim];
            self.optimizers[i].update_params(z, &g.to_vec())?;
            self.projection.apply(z);
        }

        Ok(())
    }

    /// Returns the mean euclidean norm of the codes.
    pub fn mean_norm(&self) -> f32 {
        if self.is_empty() {
            return 0.;
        }

        let total: f32 = self.codes.chunks_exact(self.dim).map(norm).sum();
        total / self.len() as f32
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::{optimization::GradientDescent, specs::ProjectionSpec};

    fn spec(projection: ProjectionSpec) -> LatentSpec {
        LatentSpec {
            dim: 3,
            learning_rate: 0.1,
            init_std: 2.,
            projection,
        }
    }

    #[test]
    fn initial_codes_respect_the_projection() {
        let mut rng = StdRng::seed_from_u64(7);
        let prototype = GradientDescent::new(0.1);

        let ball = LatentTable::new(20, &spec(ProjectionSpec::UnitBall), &prototype, &mut rng).unwrap();
        let sphere =
            LatentTable::new(20, &spec(ProjectionSpec::UnitSphere), &prototype, &mut rng).unwrap();

        assert_eq!(ball.len(), 20);
        assert!(ball.as_slice().chunks(3).all(|z| norm(z) <= 1. + 1e-6));
        assert!(sphere.as_slice().chunks(3).all(|z| (norm(z) - 1.).abs() < 1e-5));
    }

    #[test]
    fn codes_are_drawn_with_the_configured_deviation() {
        let mut rng = StdRng::seed_from_u64(11);
        let prototype = GradientDescent::new(0.1);
        let spec = LatentSpec {
            dim: 4,
            learning_rate: 0.1,
            init_std: 0.,
            projection: ProjectionSpec::Unconstrained,
        };

        let table = LatentTable::new(5, &spec, &prototype, &mut rng).unwrap();
        assert_eq!(table.as_slice(), [0.; 20]);

        let empty = LatentTable::new(0, &spec, &prototype, &mut rng).unwrap();
        assert!(empty.is_empty());

        let bad = LatentSpec {
            init_std: f32::NAN,
            ..spec
        };
        assert!(matches!(
            LatentTable::new(5, &bad, &prototype, &mut rng),
            Err(MlErr::Rand(_))
        ));
    }

    #[test]
    fn gather_keeps_the_batch_order() {
        let codes = vec![0., 0.1, 1., 1.1, 2., 2.1];
        let table =
            LatentTable::from_codes(codes, 2, Projection::Unconstrained, &GradientDescent::new(1.))
                .unwrap();

        let batch = table.gather(&[2, 0]).unwrap();
        assert_eq!(batch, array![[2., 2.1], [0., 0.1]]);
        assert!(table.gather(&[3]).is_err());
    }

    #[test]
    fn step_only_moves_the_batch_codes() {
        let codes = vec![0., 0., 0.5, 0.5];
        let mut table =
            LatentTable::from_codes(codes, 2, Projection::UnitBall, &GradientDescent::new(1.))
                .unwrap();

        let grads = array![[-3., -4.]];
        table.step(&[1], grads.view()).unwrap();

        assert_eq!(table.code(0).unwrap(), [0., 0.]);
        assert!((norm(table.code(1).unwrap()) - 1.).abs() < 1e-6);
    }

    #[test]
    fn step_checks_the_gradient_shape() {
        let mut table =
            LatentTable::from_codes(vec![0.; 4], 2, Projection::UnitBall, &GradientDescent::new(1.))
                .unwrap();

        assert!(table.step(&[0, 1], array![[1., 1.]].view()).is_err());
        assert!(table.step(&[0], array![[1., 1., 1.]].view()).is_err());
        assert!(table.step(&[5], array![[1., 1.]].view()).is_err());
    }

    #[test]
    fn misaligned_codes_fail() {
        let table =
            LatentTable::from_codes(vec![0.; 5], 2, Projection::UnitBall, &GradientDescent::new(1.));

        assert!(table.is_err());
    }
}
