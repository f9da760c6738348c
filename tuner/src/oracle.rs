use std::{
    cmp::Ordering,
    collections::HashSet,
    fs::{self, File},
    io::{BufReader, BufWriter},
    path::Path,
};

use log::{debug, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{Result, SearchSpace, Trial, TrialStatus, TunerErr};

const ORACLE_FILE: &str = "oracle.json";
const TRIAL_FILE: &str = "trial.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Min,
    Max,
}

/// The metric trials are ranked by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Objective {
    pub name: String,
    pub direction: Direction,
}

impl Objective {
    pub fn min<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            direction: Direction::Min,
        }
    }

    pub fn max<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            direction: Direction::Max,
        }
    }

    /// Orders two scores so that the better one comes first.
    pub fn compare(&self, a: f64, b: f64) -> Ordering {
        match self.direction {
            Direction::Min => a.total_cmp(&b),
            Direction::Max => b.total_cmp(&a),
        }
    }
}

/// What `oracle.json` holds, the trials live in their own directories.
#[derive(Serialize, Deserialize)]
struct OracleState {
    space: SearchSpace,
    objective: Objective,
    max_trials: Option<usize>,
    trials: Vec<String>,
}

/// Hands out the points of a `SearchSpace` grid in order, one trial per point.
#[derive(Debug, Clone)]
pub struct GridOracle {
    space: SearchSpace,
    objective: Objective,
    max_trials: Option<usize>,
    trials: Vec<Trial>,
}

impl GridOracle {
    /// Creates a new `GridOracle`.
    ///
    /// # Arguments
    /// * `space` - The hyperparameters to search over.
    /// * `objective` - The metric the trials are ranked by.
    /// * `max_trials` - An optional cap on the amount of trials, the grid size otherwise.
    pub fn new(space: SearchSpace, objective: Objective, max_trials: Option<usize>) -> Self {
        Self {
            space,
            objective,
            max_trials,
            trials: Vec::new(),
        }
    }

    pub fn space(&self) -> &SearchSpace {
        &self.space
    }

    pub fn objective(&self) -> &Objective {
        &self.objective
    }

    /// Returns every trial, in creation order.
    pub fn trials(&self) -> &[Trial] {
        &self.trials
    }

    /// Creates a trial for the first grid point that doesn't have one yet.
    ///
    /// # Returns
    /// The new running trial, or `None` if the grid is exhausted or `max_trials` was reached.
    pub fn create_trial<R: Rng>(&mut self, rng: &mut R) -> Option<Trial> {
        if self.max_trials.is_some_and(|max| self.trials.len() >= max) {
            return None;
        }

        let taken: HashSet<usize> = self.trials.iter().map(Trial::index).collect();
        let index = (0..self.space.grid_size()).find(|k| !taken.contains(k))?;
        let values = self.space.combination(index)?;

        let trial = loop {
            let trial = Trial::new(index, values.clone(), rng);

            if self.trials.iter().all(|t| t.id() != trial.id()) {
                break trial;
            }
        };

        debug!("created trial {} for grid point {index}", trial.id());
        self.trials.push(trial.clone());
        Some(trial)
    }

    /// Stores a finished trial in place of the running one.
    pub fn end_trial(&mut self, trial: Trial) -> Result<()> {
        let slot = self
            .trials
            .iter_mut()
            .find(|t| t.id() == trial.id())
            .ok_or_else(|| TunerErr::UnknownTrial(trial.id().to_string()))?;

        *slot = trial;
        Ok(())
    }

    /// Returns up to `n` completed trials, best first.
    pub fn best_trials(&self, n: usize) -> Vec<&Trial> {
        let mut completed: Vec<(&Trial, f64)> = self
            .trials
            .iter()
            .filter(|t| t.status() == TrialStatus::Completed)
            .filter_map(|t| t.score().map(|score| (t, score)))
            .collect();

        completed.sort_by(|(_, a), (_, b)| self.objective.compare(*a, *b));
        completed.into_iter().take(n).map(|(t, _)| t).collect()
    }

    /// Writes `oracle.json` and a `trial_<id>/trial.json` for every trial under `dir`.
    pub fn save<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        for trial in &self.trials {
            let trial_dir = dir.join(format!("trial_{}", trial.id()));
            fs::create_dir_all(&trial_dir)?;

            let file = File::create(trial_dir.join(TRIAL_FILE))?;
            serde_json::to_writer_pretty(BufWriter::new(file), trial)?;
        }

        let state = OracleState {
            space: self.space.clone(),
            objective: self.objective.clone(),
            max_trials: self.max_trials,
            trials: self.trials.iter().map(|t| t.id().to_string()).collect(),
        };

        let file = File::create(dir.join(ORACLE_FILE))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &state)?;
        Ok(())
    }

    /// Returns whether `dir` holds an oracle written by `save`.
    pub fn is_saved<P: AsRef<Path>>(dir: P) -> bool {
        dir.as_ref().join(ORACLE_FILE).is_file()
    }

    /// Reads an oracle written by `save`, trials that were still running are dropped so their
    /// grid points get handed out again.
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();

        let file = File::open(dir.join(ORACLE_FILE))?;
        let state: OracleState = serde_json::from_reader(BufReader::new(file))?;
        let grid_size = state.space.grid_size();

        let mut trials = Vec::with_capacity(state.trials.len());

        for id in state.trials {
            let path = dir.join(format!("trial_{id}")).join(TRIAL_FILE);
            let file = File::open(&path)?;
            let trial: Trial = serde_json::from_reader(BufReader::new(file))?;

            if trial.id() != id {
                return Err(TunerErr::Persistence(format!(
                    "{} holds trial {}",
                    path.display(),
                    trial.id()
                )));
            }

            if trial.index() >= grid_size {
                return Err(TunerErr::Persistence(format!(
                    "trial {id} points to grid point {} of {grid_size}",
                    trial.index()
                )));
            }

            if trial.status() == TrialStatus::Running {
                warn!("trial {id} never finished, it will run again");
                continue;
            }

            trials.push(trial);
        }

        Ok(Self {
            space: state.space,
            objective: state.objective,
            max_trials: state.max_trials,
            trials,
        })
    }
}
