pub mod arch;
pub mod checkpoint;
pub mod dataset;
pub mod error;
pub mod evaluation;
pub mod initialization;
pub mod latent;
pub mod optimization;
pub mod specs;
mod test;
pub mod training;

pub use error::{MlErr, Result};
