mod error;
pub mod hyperparameters;
pub mod oracle;
pub mod search;
pub mod trial;

pub use error::{Result, TunerErr};
pub use hyperparameters::{HyperParameter, HyperValues, SearchSpace, Value};
pub use oracle::{Direction, GridOracle, Objective};
pub use search::{HyperModel, TrialRecorder, Tuner};
pub use trial::{StepMetrics, Trial, TrialMetrics, TrialStatus};
