use std::{
    fmt::Display,
    path::{Path, PathBuf},
};

use log::{info, warn};
use rand::{SeedableRng, rngs::StdRng};

use crate::{GridOracle, HyperValues, Result, Trial, TrialMetrics, TrialStatus};

/// Something that can be trained and measured for a set of hyperparameters.
pub trait HyperModel {
    type Error: Display;

    /// Runs a single trial.
    ///
    /// # Arguments
    /// * `values` - The hyperparameters of this trial.
    /// * `recorder` - Collects the metrics of each step, to keep the trial's history.
    ///
    /// # Returns
    /// The final value of every metric the model measures.
    fn run_trial(
        &mut self,
        values: &HyperValues,
        recorder: &mut TrialRecorder<'_>,
    ) -> std::result::Result<TrialMetrics, Self::Error>;
}

/// The handle a `HyperModel` reports per step metrics through.
pub struct TrialRecorder<'t> {
    trial: &'t mut Trial,
}

impl<'t> TrialRecorder<'t> {
    pub fn new(trial: &'t mut Trial) -> Self {
        Self { trial }
    }

    pub fn trial_id(&self) -> &str {
        self.trial.id()
    }

    pub fn record(&mut self, step: usize, metrics: TrialMetrics) {
        self.trial.record(step, metrics);
    }
}

/// Drives a grid search, persisting its progress under a project directory.
pub struct Tuner {
    oracle: GridOracle,
    project_dir: PathBuf,
    rng: StdRng,
}

impl Tuner {
    /// Creates a new `Tuner` for a fresh search.
    ///
    /// # Arguments
    /// * `oracle` - The oracle handing out the grid points.
    /// * `project_dir` - Where the oracle and its trials get saved after every trial.
    pub fn new<P: Into<PathBuf>>(oracle: GridOracle, project_dir: P) -> Self {
        Self {
            oracle,
            project_dir: project_dir.into(),
            rng: StdRng::from_os_rng(),
        }
    }

    /// Continues the search saved under `project_dir`.
    pub fn resume<P: Into<PathBuf>>(project_dir: P) -> Result<Self> {
        let project_dir = project_dir.into();
        let oracle = GridOracle::load(&project_dir)?;

        info!(
            "resuming search with {} finished trials from {}",
            oracle.trials().len(),
            project_dir.display()
        );

        Ok(Self::new(oracle, project_dir))
    }

    /// Makes the trial ids reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn oracle(&self) -> &GridOracle {
        &self.oracle
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// Runs trials until the oracle has no more grid points to hand out.
    ///
    /// A trial that errors, or doesn't report a finite objective, is stored as failed and the
    /// search goes on.
    ///
    /// # Returns
    /// The amount of trials run by this call.
    pub fn search<H: HyperModel>(&mut self, hyper_model: &mut H) -> Result<usize> {
        self.oracle.save(&self.project_dir)?;
        let mut runs = 0;

        while let Some(mut trial) = self.oracle.create_trial(&mut self.rng) {
            let values = trial.values().clone();
            info!("trial {} started: {values}", trial.id());

            let outcome = hyper_model.run_trial(&values, &mut TrialRecorder::new(&mut trial));
            self.finish_trial(&mut trial, outcome);

            self.oracle.end_trial(trial)?;
            self.oracle.save(&self.project_dir)?;
            runs += 1;
        }

        info!("search finished after {runs} trials");
        Ok(runs)
    }

    fn finish_trial<E: Display>(
        &self,
        trial: &mut Trial,
        outcome: std::result::Result<TrialMetrics, E>,
    ) {
        let objective = self.oracle.objective();

        let metrics = match outcome {
            Ok(metrics) => metrics,
            Err(e) => {
                warn!("trial {} failed: {e}", trial.id());
                trial.fail(e.to_string());
                return;
            }
        };

        match metrics.get(&objective.name) {
            Some(&score) if score.is_finite() => {
                let best_step = trial
                    .history()
                    .iter()
                    .filter_map(|s| s.metrics.get(&objective.name).map(|&m| (s.step, m)))
                    .filter(|(_, m)| m.is_finite())
                    .min_by(|(_, a), (_, b)| objective.compare(*a, *b))
                    .map(|(step, _)| step);

                info!("trial {} completed: {} = {score}", trial.id(), objective.name);
                trial.complete(score, best_step);
            }
            Some(score) => {
                warn!("trial {} reported {} = {score}", trial.id(), objective.name);
                trial.fail(format!("{} is not finite", objective.name));
            }
            None => {
                warn!("trial {} didn't report {}", trial.id(), objective.name);
                trial.fail(format!("{} was not reported", objective.name));
            }
        }
    }

    /// Returns up to `n` completed trials, best first.
    pub fn results_summary(&self, n: usize) -> Vec<&Trial> {
        self.oracle.best_trials(n)
    }

    /// Returns the hyperparameters of the best completed trial.
    pub fn best_hyperparameters(&self) -> Option<&HyperValues> {
        self.oracle.best_trials(1).into_iter().next().map(Trial::values)
    }

    /// Returns the amount of completed trials and the amount of failed ones.
    pub fn counts(&self) -> (usize, usize) {
        let trials = self.oracle.trials();
        let completed = trials
            .iter()
            .filter(|t| t.status() == TrialStatus::Completed)
            .count();

        (completed, trials.len() - completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Objective, SearchSpace};

    /// Reports `val_loss = |lr - 0.01|` and fails for the largest learning rate.
    struct Quadratic {
        runs: usize,
    }

    impl HyperModel for Quadratic {
        type Error = String;

        fn run_trial(
            &mut self,
            values: &HyperValues,
            recorder: &mut TrialRecorder<'_>,
        ) -> std::result::Result<TrialMetrics, String> {
            self.runs += 1;
            let lr = values.float("learning_rate").map_err(|e| e.to_string())?;

            if lr >= 1. {
                return Err("diverged".into());
            }

            let loss = (lr - 0.01).abs();
            for step in 1..=3 {
                let val_loss = loss * (4 - step) as f64;
                recorder.record(step, TrialMetrics::from([("val_loss".into(), val_loss)]));
            }

            Ok(TrialMetrics::from([("val_loss".into(), loss)]))
        }
    }

    fn oracle() -> GridOracle {
        let mut space = SearchSpace::new();
        space.choice("learning_rate", [0.1, 0.01, 1.0, 0.001]).unwrap();

        GridOracle::new(space, Objective::min("val_loss"), None)
    }

    #[test]
    fn failed_trials_do_not_stop_the_search() {
        let dir = tempfile::tempdir().unwrap();
        let mut tuner = Tuner::new(oracle(), dir.path()).with_seed(0);
        let mut model = Quadratic { runs: 0 };

        assert_eq!(tuner.search(&mut model).unwrap(), 4);
        assert_eq!(tuner.counts(), (3, 1));

        let best = tuner.best_hyperparameters().unwrap();
        assert_eq!(best.float("learning_rate").unwrap(), 0.01);

        let summary = tuner.results_summary(10);
        assert_eq!(summary.len(), 3);
        assert_eq!(summary[0].best_step(), Some(1));
    }

    #[test]
    fn resumed_search_skips_finished_trials() {
        let dir = tempfile::tempdir().unwrap();
        let mut model = Quadratic { runs: 0 };

        let mut previous = GridOracle::new(oracle().space().clone(), Objective::min("val_loss"), None);
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..2 {
            let mut trial = previous.create_trial(&mut rng).unwrap();
            trial.complete(0.5, None);
            previous.end_trial(trial).unwrap();
        }
        previous.save(dir.path()).unwrap();

        let mut tuner = Tuner::resume(dir.path()).unwrap();
        assert_eq!(tuner.search(&mut model).unwrap(), 2);
        assert_eq!(model.runs, 2);
        assert_eq!(tuner.oracle().trials().len(), 4);
    }

    #[test]
    fn missing_objective_fails_the_trial() {
        struct Silent;

        impl HyperModel for Silent {
            type Error = String;

            fn run_trial(
                &mut self,
                _: &HyperValues,
                _: &mut TrialRecorder<'_>,
            ) -> std::result::Result<TrialMetrics, String> {
                Ok(TrialMetrics::from([("loss".into(), 1.)]))
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let mut tuner = Tuner::new(oracle(), dir.path());
        tuner.search(&mut Silent).unwrap();

        assert!(tuner.best_hyperparameters().is_none());
        assert!(
            tuner
                .oracle()
                .trials()
                .iter()
                .all(|t| t.message() == Some("val_loss was not reported"))
        );
    }
}
