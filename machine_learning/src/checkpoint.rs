use std::{fs, path::Path};

use safetensors::tensor::{Dtype, SafeTensors, TensorView};

use crate::{MlErr, Result};

const PARAMS: &str = "decoder.params";
const LATENTS: &str = "latents";

/// The state of a trained decoder: its flat parameters and the training latent codes.
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    pub params: Vec<f32>,
    pub latents: Vec<f32>,
    pub latent_dim: usize,
}

impl Checkpoint {
    /// Writes the checkpoint as a safetensors file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        if self.latent_dim == 0 || self.latents.len() % self.latent_dim != 0 {
            return Err(MlErr::Checkpoint(format!(
                "{} latent values can't be split in codes of {}",
                self.latents.len(),
                self.latent_dim
            )));
        }

        let params = TensorView::new(
            Dtype::F32,
            vec![self.params.len()],
            bytemuck::cast_slice(&self.params),
        )?;

        let latents = TensorView::new(
            Dtype::F32,
            vec![self.latents.len() / self.latent_dim, self.latent_dim],
            bytemuck::cast_slice(&self.latents),
        )?;

        let tensors = [(PARAMS, &params), (LATENTS, &latents)];
        safetensors::serialize_to_file(tensors, &None, path.as_ref())?;
        Ok(())
    }

    /// Reads a checkpoint written by `save`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let buf = fs::read(path)?;
        let tensors = SafeTensors::deserialize(&buf)?;

        let (params, _) = read_f32(&tensors, PARAMS)?;
        let (latents, shape) = read_f32(&tensors, LATENTS)?;

        let &[_, latent_dim] = shape.as_slice() else {
            return Err(MlErr::Checkpoint(format!(
                "{LATENTS} should have 2 dimensions, found {}",
                shape.len()
            )));
        };

        Ok(Self {
            params,
            latents,
            latent_dim,
        })
    }
}

fn read_f32(tensors: &SafeTensors<'_>, name: &str) -> Result<(Vec<f32>, Vec<usize>)> {
    let view = tensors.tensor(name)?;

    if view.dtype() != Dtype::F32 {
        return Err(MlErr::Checkpoint(format!(
            "{name} has dtype {:?}, expected F32",
            view.dtype()
        )));
    }

    let values = bytemuck::pod_collect_to_vec::<u8, f32>(view.data());
    Ok((values, view.shape().to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saved_checkpoint_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("decoder.safetensors");

        let checkpoint = Checkpoint {
            params: vec![0.5, -1.25, 3.],
            latents: vec![0.1, 0.2, 0.3, 0.4],
            latent_dim: 2,
        };

        checkpoint.save(&path).unwrap();
        assert_eq!(Checkpoint::load(&path).unwrap(), checkpoint);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = Checkpoint::load(dir.path().join("nope.safetensors"));

        assert!(matches!(result, Err(MlErr::Io(_))));
    }

    #[test]
    fn misaligned_latents_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoint = Checkpoint {
            params: vec![],
            latents: vec![0.; 3],
            latent_dim: 2,
        };

        assert!(checkpoint.save(dir.path().join("bad.safetensors")).is_err());
    }

    #[test]
    fn foreign_tensors_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let doubles = [1f64, 2., 3., 4.];
        let floats = [1f32, 2., 3., 4.];

        let view = |dtype, bytes| TensorView::new(dtype, vec![4], bytes).unwrap();
        let f64_params = view(Dtype::F64, bytemuck::cast_slice(&doubles));
        let f32_params = view(Dtype::F32, bytemuck::cast_slice(&floats));
        let flat_latents = view(Dtype::F32, bytemuck::cast_slice(&floats));

        let wrong_dtype = dir.path().join("f64.safetensors");
        let tensors = [(PARAMS, &f64_params), (LATENTS, &flat_latents)];
        safetensors::serialize_to_file(tensors, &None, &wrong_dtype).unwrap();

        let wrong_rank = dir.path().join("flat.safetensors");
        let tensors = [(PARAMS, &f32_params), (LATENTS, &flat_latents)];
        safetensors::serialize_to_file(tensors, &None, &wrong_rank).unwrap();

        for path in [wrong_dtype, wrong_rank] {
            assert!(matches!(Checkpoint::load(&path), Err(MlErr::Checkpoint(_))));
        }
    }

    #[test]
    fn values_keep_their_bits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bits.safetensors");

        let checkpoint = Checkpoint {
            params: vec![-0., f32::MIN_POSITIVE, f32::MAX, 1e-30],
            latents: vec![f32::EPSILON, -7.5],
            latent_dim: 1,
        };

        checkpoint.save(&path).unwrap();
        let loaded = Checkpoint::load(&path).unwrap();

        let bits = |v: &[f32]| v.iter().map(|x| x.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&loaded.params), bits(&checkpoint.params));
        assert_eq!(bits(&loaded.latents), bits(&checkpoint.latents));
    }
}
