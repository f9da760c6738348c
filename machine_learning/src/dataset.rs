use ndarray::{Array2, ArrayView2};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{MlErr, Result};

/// The shape of every image in a `Dataset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageShape {
    pub height: usize,
    pub width: usize,
    #[serde(default = "default_channels")]
    pub channels: usize,
}

fn default_channels() -> usize {
    1
}

impl ImageShape {
    /// Returns the amount of values of a flattened image.
    pub fn size(&self) -> usize {
        self.height * self.width * self.channels
    }
}

/// A set of flattened images kept in memory, one image per row.
#[derive(Debug, Clone)]
pub struct Dataset {
    shape: ImageShape,
    len: usize,
    data: Vec<f32>,
}

impl Dataset {
    /// Creates a new `Dataset`.
    ///
    /// # Arguments
    /// * `data` - The images laid out one after the other.
    /// * `shape` - The shape of each image.
    ///
    /// # Returns
    /// A new `Dataset` or an error if `data` doesn't hold a positive amount of whole images.
    pub fn new(data: Vec<f32>, shape: ImageShape) -> Result<Self> {
        let size = shape.size();

        if size == 0 {
            return Err(MlErr::InvalidSpec(
                "the image shape must have a positive size".into(),
            ));
        }

        if data.is_empty() || data.len() % size != 0 {
            return Err(MlErr::SizeMismatch {
                what: "dataset",
                got: data.len(),
                expected: data.len().next_multiple_of(size).max(size),
            });
        }

        Ok(Self {
            shape,
            len: data.len() / size,
            data,
        })
    }

    /// Generates `len` smooth random images with values in `[0, 1]`.
    ///
    /// Each image is a sum of a linear gradient and a gaussian blob, per channel.
    pub fn synthetic<R: Rng>(len: usize, shape: ImageShape, rng: &mut R) -> Result<Self> {
        let ImageShape {
            height,
            width,
            channels,
        } = shape;

        let mut data = Vec::with_capacity(len * shape.size());
        let norm = |i: usize, n: usize| if n > 1 { i as f32 / (n - 1) as f32 } else { 0.5 };

        for _ in 0..len {
            let (cy, cx) = (rng.random::<f32>(), rng.random::<f32>());
            let sigma = rng.random_range(0.15..0.4f32);
            let (gy, gx) = (rng.random_range(-0.5..0.5f32), rng.random_range(-0.5..0.5f32));
            let tints: Vec<f32> = (0..channels).map(|_| rng.random_range(0.5..1.0)).collect();

            for i in 0..height {
                for j in 0..width {
                    let (y, x) = (norm(i, height), norm(j, width));
                    let d2 = (y - cy).powi(2) + (x - cx).powi(2);
                    let blob = (-d2 / (2. * sigma * sigma)).exp();
                    let ramp = 0.5 + gy * (y - 0.5) + gx * (x - 0.5);

                    for tint in &tints {
                        data.push((0.5 * ramp + 0.5 * tint * blob).clamp(0., 1.));
                    }
                }
            }
        }

        Self::new(data, shape)
    }

    /// Returns the amount of images.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn shape(&self) -> ImageShape {
        self.shape
    }

    /// Returns the amount of values of each flattened image.
    pub fn sample_size(&self) -> usize {
        self.shape.size()
    }

    /// Returns every image as the rows of a matrix.
    pub fn view(&self) -> Result<ArrayView2<'_, f32>> {
        Ok(ArrayView2::from_shape((self.len, self.sample_size()), &self.data)?)
    }

    /// Copies the selected images into a matrix, in the order of `indices`.
    pub fn select(&self, indices: &[usize]) -> Result<Array2<f32>> {
        let size = self.sample_size();
        let mut rows = Vec::with_capacity(indices.len() * size);

        for &i in indices {
            if i >= self.len {
                return Err(MlErr::IndexOutOfBounds {
                    what: "dataset",
                    index: i,
                    len: self.len,
                });
            }

            rows.extend_from_slice(&self.data[i * size..(i + 1) * size]);
        }

        Ok(Array2::from_shape_vec((indices.len(), size), rows)?)
    }

    /// Splits off the last `holdout` images into a second dataset.
    ///
    /// # Returns
    /// An error if either of the halves would end up empty.
    pub fn split(mut self, holdout: usize) -> Result<(Self, Self)> {
        if holdout == 0 || holdout >= self.len {
            return Err(MlErr::InvalidSpec(format!(
                "a holdout of {holdout} images can't split a dataset of {} images",
                self.len
            )));
        }

        let at = (self.len - holdout) * self.sample_size();
        let rest = self.data.split_off(at);

        Ok((Self::new(self.data, self.shape)?, Self::new(rest, self.shape)?))
    }
}
