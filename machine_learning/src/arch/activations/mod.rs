mod act_fn;
mod relu;
mod sigmoid;
mod tanh;

pub use act_fn::ActFn;
pub use relu::{LeakyRelu, Relu};
pub use sigmoid::Sigmoid;
pub use tanh::Tanh;
