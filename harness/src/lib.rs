pub mod configs;
mod error;
mod hypermodel;

use std::{fs::File, io::BufWriter};

use log::{info, warn};
use machine_learning::{
    evaluation::Evaluation,
    training::{History, TrainerBuilder},
};
use serde::Serialize;
use tuner::{GridOracle, Tuner};

use configs::{Adapter, HarnessConfig};

pub use error::HarnessErr;
pub use hypermodel::{DecoderHyperModel, HYPERPARAMETERS};

/// What a training run leaves behind.
#[derive(Debug, Clone, Serialize)]
pub struct TrainReport {
    pub history: History,
    /// The evaluation on the holdout images.
    pub evaluation: Evaluation,
}

/// Trains a decoder with the config's settings and evaluates it on the holdout images.
///
/// The checkpoint and the report are written wherever the config's `output` says.
///
/// # Errors
/// Returns a `HarnessErr` if the config is invalid, training diverges or the outputs can't be
/// written.
pub fn train(config: &HarnessConfig) -> Result<TrainReport, HarnessErr> {
    info!("adapting configs");
    let adapter = Adapter::new();
    let (spec, train, holdout) =
        adapter.adapt_configs(&config.model, &config.training, &config.dataset)?;

    info!(
        train = train.len(),
        holdout = holdout.len(),
        params = spec.model.layers().iter().map(|l| l.size()).sum::<usize>();
        "training decoder"
    );

    let mut trainer = TrainerBuilder::new().build(&spec, train)?;
    let history = trainer.fit()?;
    let evaluation = trainer.evaluate(&holdout)?;

    info!(
        loss = evaluation.loss,
        mse = evaluation.mse,
        psnr = evaluation.psnr;
        "holdout evaluated"
    );

    if let Some(path) = &config.output.checkpoint {
        trainer.checkpoint().save(path)?;
        info!("checkpoint written to {}", path.display());
    }

    let report = TrainReport {
        history,
        evaluation,
    };

    if let Some(path) = &config.output.report {
        serde_json::to_writer_pretty(BufWriter::new(File::create(path)?), &report)?;
        info!("report written to {}", path.display());
    }

    Ok(report)
}

/// Runs the grid search described by the config's `search` section.
///
/// A project directory that already holds a search is resumed when `resume` is set, its saved
/// space and objective win over the config's. Without `resume` such a directory is refused, so
/// trials of an earlier search never mix with a new one.
///
/// # Errors
/// Returns a `HarnessErr` if there is no `search` section, the config or any point of the space
/// is invalid, or the project directory can't be read or written. Failing trials don't stop the
/// search.
pub fn search(config: &HarnessConfig) -> Result<Tuner, HarnessErr> {
    let Some(search) = &config.search else {
        return Err(HarnessErr::InvalidConfig(
            "a search needs a `search` section".into(),
        ));
    };

    let saved = GridOracle::is_saved(&search.project_dir);
    if saved && !search.resume {
        return Err(HarnessErr::InvalidConfig(format!(
            "{} already holds a search, set resume to continue it or pick another project_dir",
            search.project_dir.display()
        )));
    }

    info!("adapting configs");
    let adapter = Adapter::new();
    adapter.validate_search(search)?;
    let (spec, train, holdout) =
        adapter.adapt_configs(&config.model, &config.training, &config.dataset)?;

    let mut hyper_model = DecoderHyperModel::new(spec, train, holdout);

    let mut tuner = if saved {
        let tuner = Tuner::resume(&search.project_dir)?;

        if tuner.oracle().space() != &search.space {
            warn!(
                "the search saved in {} has a different space than the config, keeping the saved one",
                search.project_dir.display()
            );
        }

        tuner
    } else {
        let oracle = GridOracle::new(
            search.space.clone(),
            search.objective.clone(),
            search.max_trials,
        );
        Tuner::new(oracle, &search.project_dir)
    };

    hyper_model.check_space(tuner.oracle().space())?;

    if let Some(seed) = search.seed {
        tuner = tuner.with_seed(seed);
    }

    tuner.search(&mut hyper_model)?;

    let (completed, failed) = tuner.counts();
    info!(completed = completed, failed = failed; "search done");

    Ok(tuner)
}
