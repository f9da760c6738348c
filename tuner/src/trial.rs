use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::HyperValues;

/// Metric names mapped to their values.
pub type TrialMetrics = BTreeMap<String, f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrialStatus {
    Running,
    Completed,
    Failed,
}

/// The metrics a trial reported at some step, usually an epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepMetrics {
    pub step: usize,
    pub metrics: TrialMetrics,
}

/// A single run of the hyper-model on one grid point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    #[serde(rename = "trial_id")]
    id: String,
    index: usize,
    #[serde(rename = "hyperparameters")]
    values: HyperValues,
    status: TrialStatus,
    #[serde(default)]
    history: Vec<StepMetrics>,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    best_step: Option<usize>,
    #[serde(default)]
    message: Option<String>,
}

impl Trial {
    /// Creates a new running `Trial` with a random id of 32 hex characters.
    ///
    /// # Arguments
    /// * `index` - The position of `values` in the grid.
    /// * `values` - The hyperparameters of this trial.
    /// * `rng` - A random number generator.
    pub fn new<R: Rng>(index: usize, values: HyperValues, rng: &mut R) -> Self {
        Self {
            id: format!("{:032x}", rng.random::<u128>()),
            index,
            values,
            status: TrialStatus::Running,
            history: Vec::new(),
            score: None,
            best_step: None,
            message: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the position of this trial's values in the grid.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn values(&self) -> &HyperValues {
        &self.values
    }

    pub fn status(&self) -> TrialStatus {
        self.status
    }

    pub fn history(&self) -> &[StepMetrics] {
        &self.history
    }

    pub fn score(&self) -> Option<f64> {
        self.score
    }

    pub fn best_step(&self) -> Option<usize> {
        self.best_step
    }

    /// Returns why the trial failed, if it did.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Appends the metrics of a step to the trial's history.
    pub fn record(&mut self, step: usize, metrics: TrialMetrics) {
        self.history.push(StepMetrics { step, metrics });
    }

    pub fn complete(&mut self, score: f64, best_step: Option<usize>) {
        self.status = TrialStatus::Completed;
        self.score = Some(score);
        self.best_step = best_step;
    }

    pub fn fail<S: Into<String>>(&mut self, message: S) {
        self.status = TrialStatus::Failed;
        self.message = Some(message.into());
    }
}
