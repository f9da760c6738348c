use super::{LeakyRelu, Relu, Sigmoid, Tanh};

/// The activation function applied element-wise to a layer's pre-activation.
#[derive(Debug, Clone)]
pub enum ActFn {
    Sigmoid(Sigmoid),
    Relu(Relu),
    LeakyRelu(LeakyRelu),
    Tanh(Tanh),
}

impl ActFn {
    pub fn sigmoid(amp: f32) -> Self {
        ActFn::Sigmoid(Sigmoid::new(amp))
    }

    pub fn relu() -> Self {
        ActFn::Relu(Relu)
    }

    pub fn leaky_relu(alpha: f32) -> Self {
        ActFn::LeakyRelu(LeakyRelu::new(alpha))
    }

    pub fn tanh() -> Self {
        ActFn::Tanh(Tanh)
    }

    /// Evaluates the function at `z`.
    pub fn f(&self, z: f32) -> f32 {
        match self {
            ActFn::Sigmoid(a) => a.f(z),
            ActFn::Relu(a) => a.f(z),
            ActFn::LeakyRelu(a) => a.f(z),
            ActFn::Tanh(a) => a.f(z),
        }
    }

    /// Evaluates the derivative of the function at `z`.
    pub fn df(&self, z: f32) -> f32 {
        match self {
            ActFn::Sigmoid(a) => a.df(z),
            ActFn::Relu(a) => a.df(z),
            ActFn::LeakyRelu(a) => a.df(z),
            ActFn::Tanh(a) => a.df(z),
        }
    }
}
