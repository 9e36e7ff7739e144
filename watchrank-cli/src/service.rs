/// Rating service: load history, run both solvers, merge, cache.
///
/// The Bradley-Terry pass and the logistic pass are CPU-bound and independent,
/// so they run side by side on the blocking pool. Neither solver's failure
/// mode leaks past this module except a broken history or a crashed
/// Bradley-Terry task, which surface as `ServiceError`.
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use reqwest::Client;
use thiserror::Error;
use tokio::task::{JoinError, spawn_blocking};
use watchrank_core::{
    Backend, LogisticConfig, RatingResult, RatingVector, WatchEvent, calculate_logistic_ratings, calculate_ratings,
    view_counts,
};

use crate::cache::{CachedRatingsSnapshot, ScoredWatch, SnapshotCache};
use crate::history::{HistoryError, HistorySource};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("could not load watch history: {0}")]
    History(#[from] HistoryError),

    #[error("bradley-terry task failed: {0}")]
    Task(#[from] JoinError),
}

pub struct RatingService {
    source: HistorySource,
    cache: SnapshotCache,
    logistic: LogisticConfig,
    client: Client,
}

impl RatingService {
    pub fn new(source: HistorySource, cache: SnapshotCache, logistic: LogisticConfig) -> Self {
        RatingService {
            source,
            cache,
            logistic,
            client: Client::new(),
        }
    }

    pub fn cache(&self) -> &SnapshotCache {
        &self.cache
    }

    /// Valid cached snapshot, or a freshly computed one stored in the cache.
    pub async fn ratings(&self) -> Result<Arc<CachedRatingsSnapshot>, ServiceError> {
        let now = Instant::now();
        if let Some(snapshot) = self.cache.get_valid(now) {
            tracing::debug!("serving cached ratings");
            return Ok(snapshot);
        }

        let snapshot = self.compute(now).await?;
        Ok(self.cache.set(snapshot))
    }

    /// Compute a snapshot without touching the cache. `now` becomes its timestamp.
    pub async fn compute(&self, now: Instant) -> Result<CachedRatingsSnapshot, ServiceError> {
        let events: Arc<[WatchEvent]> = self.source.load(&self.client).await?.into();

        let bt_events = events.clone();
        let bt_task = spawn_blocking(move || calculate_ratings(&bt_events));
        let logistic_task = spawn_logistic(events.clone(), self.logistic.clone());
        let (bt, logistic) = tokio::join!(bt_task, logistic_task);

        let bt = bt?;
        let logistic = self.logistic_with_fallback(logistic, &events).await;

        tracing::info!(
            events = events.len(),
            titles = bt.ratings.len(),
            bt_iterations = bt.iterations,
            bt_termination = ?bt.termination,
            logistic_scores = logistic.len(),
            elapsed_ms = now.elapsed().as_millis() as u64,
            source = %self.source.describe(),
            "ratings computed"
        );

        let counts = view_counts(&events);
        let movies = merge_scores(&events, &bt, &logistic, &counts);
        Ok(CachedRatingsSnapshot {
            movies,
            graph: bt.graph,
            computed_at: now,
        })
    }

    /// Keep the primary logistic result unless it panicked or came back empty.
    /// The fallback runs the stock configuration on the sparse backend; if that
    /// fails too, scores stay empty and the merge reports them as null.
    async fn logistic_with_fallback(
        &self,
        primary: Result<RatingVector, JoinError>,
        events: &Arc<[WatchEvent]>,
    ) -> RatingVector {
        match primary {
            Ok(scores) if !scores.is_empty() || events.is_empty() => return scores,
            Ok(_) => tracing::warn!("logistic solver returned no scores, falling back to sparse defaults"),
            Err(e) => tracing::warn!(error = %e, "logistic solver crashed, falling back to sparse defaults"),
        }

        let fallback = LogisticConfig {
            backend: Backend::Sparse,
            seed: self.logistic.seed,
            ..LogisticConfig::default()
        };
        match spawn_logistic(events.clone(), fallback).await {
            Ok(scores) => scores,
            Err(e) => {
                tracing::error!(error = %e, "logistic fallback crashed, scores will be null");
                RatingVector::new()
            }
        }
    }
}

async fn spawn_logistic(events: Arc<[WatchEvent]>, config: LogisticConfig) -> Result<RatingVector, JoinError> {
    spawn_blocking(move || calculate_logistic_ratings(&events, &config)).await
}

/// One output row per watch event, in history order.
pub fn merge_scores(
    events: &[WatchEvent],
    bt: &RatingResult,
    logistic: &RatingVector,
    counts: &HashMap<String, u32>,
) -> Vec<ScoredWatch> {
    events
        .iter()
        .map(|event| ScoredWatch {
            event: event.clone(),
            btscore: 100.0 * bt.ratings.get(&event.title).copied().unwrap_or(0.0),
            view_count: counts.get(&event.title).copied().unwrap_or(0),
            logistic_score: logistic.get(&event.title).copied(),
        })
        .collect()
}
