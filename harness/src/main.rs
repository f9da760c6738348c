use std::env;

use anyhow::{Context, Result, bail};
use harness::configs::HarnessConfig;
use log::info;

const USAGE: &str = "usage: harness <train|search> <config.json>";

fn main() -> Result<()> {
    env_logger::init();

    let mut args = env::args().skip(1);
    let (Some(command), Some(path)) = (args.next(), args.next()) else {
        bail!(USAGE);
    };

    let config =
        HarnessConfig::from_file(&path).with_context(|| format!("failed to load {path}"))?;

    match command.as_str() {
        "train" => {
            let report = harness::train(&config).context("training failed")?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        "search" => {
            let tuner = harness::search(&config).context("search failed")?;
            let summary = config.search.as_ref().map_or(0, |s| s.summary);

            for (rank, trial) in tuner.results_summary(summary).iter().enumerate() {
                info!(
                    "#{} trial {} scored {:?}: {}",
                    rank + 1,
                    trial.id(),
                    trial.score(),
                    trial.values()
                );
                println!(
                    "{}\t{}\t{}",
                    trial.id(),
                    trial.score().unwrap_or(f64::NAN),
                    trial.values()
                );
            }
        }
        other => bail!("unknown command {other}, {USAGE}"),
    }

    Ok(())
}
