/// Time-boxed, whole-value snapshot cache for computed ratings.
///
/// Readers never block: the slot is an `ArcSwapOption`, replaced wholesale
/// on recomputation and never mutated in place. Concurrent cache misses may
/// each recompute; the last writer wins.
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwapOption;
use serde::Serialize;
use watchrank_core::{DisplayGraph, WatchEvent};

/// Default validity window for a computed snapshot (1 hour).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// One watch event with every score attached.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredWatch {
    #[serde(flatten)]
    pub event: WatchEvent,
    /// Bradley-Terry rating scaled to 0..100.
    pub btscore: f64,
    pub view_count: u32,
    /// `None` when the logistic solver produced nothing for this title.
    pub logistic_score: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct CachedRatingsSnapshot {
    pub movies: Vec<ScoredWatch>,
    pub graph: DisplayGraph,
    pub computed_at: Instant,
}

pub struct SnapshotCache {
    ttl: Duration,
    slot: ArcSwapOption<CachedRatingsSnapshot>,
}

impl SnapshotCache {
    pub fn new(ttl: Duration) -> Self {
        SnapshotCache {
            ttl,
            slot: ArcSwapOption::const_empty(),
        }
    }

    /// Current snapshot regardless of age.
    pub fn get(&self) -> Option<Arc<CachedRatingsSnapshot>> {
        self.slot.load_full()
    }

    /// Replace the snapshot. Returns the stored value.
    pub fn set(&self, snapshot: CachedRatingsSnapshot) -> Arc<CachedRatingsSnapshot> {
        let snapshot = Arc::new(snapshot);
        self.slot.store(Some(snapshot.clone()));
        snapshot
    }

    /// True when a snapshot exists and is younger than the TTL at `now`.
    pub fn is_valid(&self, now: Instant) -> bool {
        self.get_valid(now).is_some()
    }

    /// The snapshot, if it is still valid at `now`.
    pub fn get_valid(&self, now: Instant) -> Option<Arc<CachedRatingsSnapshot>> {
        self.get()
            .filter(|snapshot| now.saturating_duration_since(snapshot.computed_at) < self.ttl)
    }
}

impl Default for SnapshotCache {
    fn default() -> Self {
        SnapshotCache::new(DEFAULT_CACHE_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(at: Instant, title: &str) -> CachedRatingsSnapshot {
        CachedRatingsSnapshot {
            movies: vec![ScoredWatch {
                event: WatchEvent::new(1, title, "2024-9-7", None),
                btscore: 100.0,
                view_count: 1,
                logistic_score: Some(0.0),
            }],
            graph: DisplayGraph::default(),
            computed_at: at,
        }
    }

    #[test]
    fn test_empty_cache_is_invalid() {
        let cache = SnapshotCache::default();
        assert!(cache.get().is_none());
        assert!(!cache.is_valid(Instant::now()));
    }

    #[test]
    fn test_expiry_window() {
        let cache = SnapshotCache::new(Duration::from_secs(60));
        let t0 = Instant::now();
        cache.set(snapshot(t0, "Heat"));

        assert!(cache.is_valid(t0));
        assert!(cache.is_valid(t0 + Duration::from_secs(59)));
        assert!(!cache.is_valid(t0 + Duration::from_secs(60)));
        // Expired snapshots are still readable, just not valid.
        assert!(cache.get().is_some());
    }

    #[test]
    fn test_set_replaces_wholesale() {
        let cache = SnapshotCache::default();
        let t0 = Instant::now();
        let first = cache.set(snapshot(t0, "Heat"));
        let second = cache.set(snapshot(t0, "Alien"));

        let current = cache.get().unwrap();
        assert!(Arc::ptr_eq(&current, &second));
        // Earlier readers keep their own copy untouched.
        assert_eq!(first.movies[0].event.title, "Heat");
        assert_eq!(current.movies[0].event.title, "Alien");
    }

    #[test]
    fn test_scored_watch_json_shape() {
        let watch = ScoredWatch {
            event: WatchEvent::new(1, "The Fall Guy", "2024-9-7", None),
            btscore: 12.5,
            view_count: 2,
            logistic_score: None,
        };
        let json = serde_json::to_value(&watch).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "order": 1,
                "title": "The Fall Guy",
                "dateWatched": "2024-9-7",
                "betterThanPrevious": null,
                "btscore": 12.5,
                "viewCount": 2,
                "logisticScore": null,
            })
        );
    }
}
