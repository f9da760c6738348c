use serde::Serialize;

/// What a single training epoch left behind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EpochMetrics {
    pub epoch: usize,
    /// The mean of the epoch's batch losses.
    pub loss: f32,
    /// The mean norm of the latent codes at the end of the epoch.
    pub latent_norm: f32,
}

/// The per epoch metrics of a `fit` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct History {
    epochs: Vec<EpochMetrics>,
    stopped_early: bool,
}

impl History {
    pub fn push(&mut self, metrics: EpochMetrics) {
        self.epochs.push(metrics);
    }

    /// Marks the training as cut short by early stopping.
    pub fn stop_early(&mut self) {
        self.stopped_early = true;
    }

    pub fn epochs(&self) -> &[EpochMetrics] {
        &self.epochs
    }

    pub fn last(&self) -> Option<&EpochMetrics> {
        self.epochs.last()
    }

    /// Returns the epoch with the lowest loss, the first one on ties.
    pub fn best(&self) -> Option<&EpochMetrics> {
        self.epochs
            .iter()
            .reduce(|best, m| if m.loss < best.loss { m } else { best })
    }

    pub fn stopped_early(&self) -> bool {
        self.stopped_early
    }
}
