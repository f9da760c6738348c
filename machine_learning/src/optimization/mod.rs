mod adam;
mod gradient_descent;
mod gradient_descent_with_momentum;
mod optimizer;

pub use adam::Adam;
pub use gradient_descent::GradientDescent;
pub use gradient_descent_with_momentum::GradientDescentWithMomentum;
pub use optimizer::Optimizer;

/// Buffers at least this long are updated in parallel, smaller ones (like a single latent code)
/// aren't worth the scheduling overhead.
const PARALLEL_MIN_LEN: usize = 1 << 14;
