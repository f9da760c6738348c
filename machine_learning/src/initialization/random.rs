use std::{cell::RefCell, rc::Rc};

use rand::Rng;
use rand_distr::{Distribution, Normal, Uniform};

use super::{ParamGen, RandErr, Result};

enum Sampler {
    Uniform(Uniform<f32>),
    Normal(Normal<f32>),
}

impl Sampler {
    fn draw<R: Rng>(&self, rng: &mut R) -> f32 {
        match self {
            Sampler::Uniform(d) => d.sample(rng),
            Sampler::Normal(d) => d.sample(rng),
        }
    }
}

/// Draws a fixed amount of values from a uniform or normal distribution.
///
/// The decoder's weights and the initial latent codes both come from one of these. Generators
/// built for the same model share their `rng`, so the draws of one layer shift the next.
pub struct RandParamGen<R: Rng> {
    rng: Rc<RefCell<R>>,
    sampler: Sampler,
    left: usize,
}

impl<R: Rng> RandParamGen<R> {
    fn with_sampler(rng: Rc<RefCell<R>>, sampler: Sampler, limit: usize) -> Self {
        Self {
            rng,
            sampler,
            left: limit,
        }
    }

    /// Samples from `[low, high)`.
    pub fn uniform(rng: Rc<RefCell<R>>, low: f32, high: f32, limit: usize) -> Result<Self> {
        if !(low.is_finite() && high.is_finite() && low < high) {
            return Err(RandErr::BadRange { low, high });
        }

        let d = Uniform::new(low, high).map_err(|_| RandErr::BadRange { low, high })?;
        Ok(Self::with_sampler(rng, Sampler::Uniform(d), limit))
    }

    /// Samples from `[low, high]`, a single point when both bounds match.
    pub fn uniform_inclusive(
        rng: Rc<RefCell<R>>,
        low: f32,
        high: f32,
        limit: usize,
    ) -> Result<Self> {
        if !(low.is_finite() && high.is_finite() && low <= high) {
            return Err(RandErr::BadRange { low, high });
        }

        let d = Uniform::new_inclusive(low, high).map_err(|_| RandErr::BadRange { low, high })?;
        Ok(Self::with_sampler(rng, Sampler::Uniform(d), limit))
    }

    pub fn normal(rng: Rc<RefCell<R>>, mean: f32, std_dev: f32, limit: usize) -> Result<Self> {
        let bad = RandErr::BadNormal { mean, std_dev };

        if !(mean.is_finite() && std_dev.is_finite() && std_dev >= 0.) {
            return Err(bad);
        }

        let d = Normal::new(mean, std_dev).map_err(|_| bad)?;
        Ok(Self::with_sampler(rng, Sampler::Normal(d), limit))
    }

    /// Samples from `[-r, r)` with `r = sqrt(gain / fan)`.
    ///
    /// Xavier uniform is a gain of 6 over `fan_in + fan_out`, LeCun uniform a gain of 3 over
    /// `fan_in`.
    pub fn scaled_uniform(
        rng: Rc<RefCell<R>>,
        gain: f32,
        fan: usize,
        limit: usize,
    ) -> Result<Self> {
        let r = scale(gain, fan)?;
        Self::uniform(rng, -r, r, limit)
    }

    /// Samples from a centered normal with deviation `sqrt(gain / fan)`.
    ///
    /// Kaiming is a gain of 2 over `fan_in`, Xavier a gain of 2 over `fan_in + fan_out` and
    /// LeCun a gain of 1 over `fan_in`.
    pub fn scaled_normal(
        rng: Rc<RefCell<R>>,
        gain: f32,
        fan: usize,
        limit: usize,
    ) -> Result<Self> {
        let std_dev = scale(gain, fan)?;
        Self::normal(rng, 0., std_dev, limit)
    }

    /// Returns how many values are left to draw.
    pub fn remaining(&self) -> usize {
        self.left
    }
}

fn scale(gain: f32, fan: usize) -> Result<f32> {
    if fan == 0 {
        return Err(RandErr::NoFan);
    }

    Ok((gain / fan as f32).sqrt())
}

impl<R: Rng> ParamGen for RandParamGen<R> {
    fn sample(&mut self, n: usize) -> Option<Vec<f32>> {
        if self.left == 0 {
            return None;
        }

        let n = n.min(self.left);
        self.left -= n;

        let mut rng = self.rng.borrow_mut();
        Some((0..n).map(|_| self.sampler.draw(&mut *rng)).collect())
    }
}
