#[derive(Clone, Copy, Debug, Default)]
pub struct Relu;

impl Relu {
    pub fn f(&self, z: f32) -> f32 {
        z.max(0.)
    }

    pub fn df(&self, z: f32) -> f32 {
        if z > 0. { 1. } else { 0. }
    }
}

/// A rectifier that lets a small slope through for negative inputs.
#[derive(Clone, Copy, Debug, Default)]
pub struct LeakyRelu {
    alpha: f32,
}

impl LeakyRelu {
    pub fn new(alpha: f32) -> Self {
        Self { alpha }
    }

    pub fn f(&self, z: f32) -> f32 {
        if z > 0. { z } else { self.alpha * z }
    }

    pub fn df(&self, z: f32) -> f32 {
        if z > 0. { 1. } else { self.alpha }
    }
}
