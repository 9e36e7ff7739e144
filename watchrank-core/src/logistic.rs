/// Logistic pairwise scores.
///
/// Every adjacent comparison becomes a one-hot difference vector (+1 for the
/// current title, -1 for the previous one) labelled with whether the current
/// title won. A single sigmoid unit without bias is fitted on those vectors,
/// so each learned weight reads directly as that title's latent strength.
///
/// Feature construction is deterministic. Training shuffles, so scores vary
/// slightly between runs unless `LogisticConfig::seed` is set.
use std::collections::HashMap;

use crate::constants::{DEFAULT_BATCH_SIZE, DEFAULT_DENSE_LIMIT_BYTES, DEFAULT_EPOCHS, DEFAULT_LEARNING_RATE};
use crate::fitter::{Backend, FitError, fitter_chain};
use crate::types::{RatingVector, TitleIndex, WatchEvent, sorted_by_order};

/// One training row: `+1` at `positive`, `-1` at `negative`, zero elsewhere.
/// `label` is 1.0 when the `positive` title won.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingSample {
    pub positive: usize,
    pub negative: usize,
    pub label: f64,
}

impl TrainingSample {
    /// Dense difference vector of length `num_titles`.
    pub fn features(&self, num_titles: usize) -> Vec<f64> {
        let mut row = vec![0.0; num_titles];
        row[self.positive] = 1.0;
        row[self.negative] = -1.0;
        row
    }

    /// Same comparison seen from the other side: signs and label flipped.
    pub fn complement(&self) -> Self {
        TrainingSample {
            positive: self.negative,
            negative: self.positive,
            label: 1.0 - self.label,
        }
    }
}

/// Difference vectors for every usable comparison, plus their complements.
#[derive(Debug, Clone)]
pub struct TrainingSet {
    titles: TitleIndex,
    samples: Vec<TrainingSample>,
    /// Real comparisons (before complementing) and how many the later title won.
    comparisons: usize,
    later_title_wins: usize,
}

impl TrainingSet {
    /// The previous event is the one whose `order` is `order - 1`. Events with
    /// no such neighbour, no outcome, or the same title as their neighbour are
    /// skipped.
    pub fn from_history(events: &[WatchEvent]) -> Self {
        let titles = TitleIndex::sorted(events);
        let sorted = sorted_by_order(events);

        let mut by_order: HashMap<i64, &WatchEvent> = HashMap::with_capacity(sorted.len());
        for &event in &sorted {
            by_order.entry(event.order).or_insert(event);
        }

        let mut samples = Vec::new();
        let mut comparisons = 0;
        let mut later_title_wins = 0;

        for curr in sorted {
            let Some(curr_won) = curr.better_than_previous else {
                continue;
            };
            let Some(prev) = curr.order.checked_sub(1).and_then(|o| by_order.get(&o)) else {
                continue;
            };
            if prev.title == curr.title {
                continue;
            }
            let (Some(positive), Some(negative)) = (titles.index_of(&curr.title), titles.index_of(&prev.title)) else {
                continue;
            };

            let sample = TrainingSample {
                positive,
                negative,
                label: if curr_won { 1.0 } else { 0.0 },
            };
            samples.push(sample);
            samples.push(sample.complement());

            comparisons += 1;
            if curr_won {
                later_title_wins += 1;
            }
        }

        TrainingSet {
            titles,
            samples,
            comparisons,
            later_title_wins,
        }
    }

    pub fn titles(&self) -> &TitleIndex {
        &self.titles
    }

    pub fn num_titles(&self) -> usize {
        self.titles.len()
    }

    pub fn samples(&self) -> &[TrainingSample] {
        &self.samples
    }

    /// Number of real comparisons; `samples().len()` is twice this.
    pub fn comparisons(&self) -> usize {
        self.comparisons
    }

    /// True when the observed outcomes give the model nothing to separate:
    /// no comparisons at all, or every one went the same way.
    pub fn is_single_class(&self) -> bool {
        self.later_title_wins == 0 || self.later_title_wins == self.comparisons
    }
}

/// Training knobs for the logistic solver.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LogisticConfig {
    pub learning_rate: f64,
    pub epochs: usize,
    pub batch_size: usize,
    /// Reshuffle sample order every epoch.
    pub shuffle: bool,
    /// Fraction of samples (taken from the tail, before shuffling) held out
    /// and only used to log a validation loss. 0.0 disables it.
    pub validation_split: f64,
    pub backend: Backend,
    /// Largest dense design matrix the `Auto` backend may allocate.
    pub dense_limit_bytes: usize,
    /// Fixed RNG seed for reproducible scores. `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for LogisticConfig {
    fn default() -> Self {
        LogisticConfig {
            learning_rate: DEFAULT_LEARNING_RATE,
            epochs: DEFAULT_EPOCHS,
            batch_size: DEFAULT_BATCH_SIZE,
            shuffle: true,
            validation_split: 0.0,
            backend: Backend::Auto,
            dense_limit_bytes: DEFAULT_DENSE_LIMIT_BYTES,
            seed: None,
        }
    }
}

impl LogisticConfig {
    pub fn validate(&self) -> Result<(), FitError> {
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(FitError::InvalidConfig(format!(
                "learning_rate must be a positive number, got {}",
                self.learning_rate
            )));
        }
        if self.batch_size == 0 {
            return Err(FitError::InvalidConfig("batch_size must be at least 1".to_string()));
        }
        if !(0.0..1.0).contains(&self.validation_split) {
            return Err(FitError::InvalidConfig(format!(
                "validation_split must be in [0, 1), got {}",
                self.validation_split
            )));
        }
        Ok(())
    }
}

/// Score every title in `events` with the logistic pairwise model.
///
/// Returns all-zero scores when the outcomes are single-class, and an empty
/// map when fitting fails on every backend. Never panics on bad input.
pub fn calculate_logistic_ratings(events: &[WatchEvent], config: &LogisticConfig) -> RatingVector {
    let set = TrainingSet::from_history(events);
    if set.num_titles() == 0 {
        return RatingVector::new();
    }

    if set.is_single_class() {
        tracing::debug!(
            comparisons = set.comparisons(),
            "single-class outcomes, returning zero logistic scores"
        );
        return set.titles().to_rating_vector(&vec![0.0; set.num_titles()]);
    }

    match fit_scores(&set, config) {
        Ok(weights) => set.titles().to_rating_vector(&weights),
        Err(e) => {
            tracing::warn!(error = %e, "logistic fitting failed on every backend");
            RatingVector::new()
        }
    }
}

/// Run the fitter chain for `config.backend`, returning the first success.
pub fn fit_scores(set: &TrainingSet, config: &LogisticConfig) -> Result<Vec<f64>, FitError> {
    config.validate()?;

    let mut last_err = FitError::EmptyTrainingSet;
    for fitter in fitter_chain(set, config) {
        match fitter.fit(set, config) {
            Ok(weights) => {
                tracing::debug!(backend = fitter.name(), titles = weights.len(), "logistic weights extracted");
                return Ok(weights);
            }
            Err(e) => {
                tracing::warn!(backend = fitter.name(), error = %e, "logistic backend failed");
                last_err = e;
            }
        }
    }
    Err(last_err)
}
