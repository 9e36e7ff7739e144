use std::collections::HashMap;

/// One row of viewing history.
///
/// `order` drives adjacency: the event at `order` is compared against the
/// event at `order - 1`. `date_watched` is carried through untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct WatchEvent {
    pub order: i64,
    pub title: String,
    pub date_watched: String,
    /// `Some(true)`: this title beat the previous one. `Some(false)`: the
    /// previous one won. `None`: no comparison was made.
    #[cfg_attr(feature = "serde", serde(default))]
    pub better_than_previous: Option<bool>,
}

impl WatchEvent {
    pub fn new(order: i64, title: &str, date_watched: &str, better_than_previous: Option<bool>) -> Self {
        WatchEvent {
            order,
            title: title.to_string(),
            date_watched: date_watched.to_string(),
            better_than_previous,
        }
    }
}

/// Title -> rating.
pub type RatingVector = HashMap<String, f64>;

/// Graph node for the comparison graph view.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GraphNode {
    pub id: String,
    pub rating: f64,
}

/// "`source` beat `target`, `weight` times."
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GraphLink {
    pub source: String,
    pub target: String,
    pub weight: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DisplayGraph {
    pub nodes: Vec<GraphNode>,
    pub links: Vec<GraphLink>,
}

/// Why the Bradley-Terry solver stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Termination {
    /// No comparisons at all: every title got 1/N.
    Uniform,
    Converged,
    /// The diff stopped shrinking for `STALL_LIMIT` sweeps in a row.
    Stalled,
    MaxIterations,
}

/// Result of a full Bradley-Terry rating pass.
#[derive(Debug, Clone)]
pub struct RatingResult {
    /// Normalized ratings, summing to 1.
    pub ratings: RatingVector,
    pub graph: DisplayGraph,
    /// Number of sweeps adopted.
    pub iterations: usize,
    pub termination: Termination,
}

/// Maps between title strings and internal 0..N indices.
///
/// Same job as a database id map: callers speak in titles, solvers index
/// flat vectors.
#[derive(Debug, Clone, Default)]
pub struct TitleIndex {
    titles: Vec<String>,
    title_to_idx: HashMap<String, usize>,
}

impl TitleIndex {
    /// Titles in order of first appearance in `events` (callers sort first).
    pub fn first_seen<'a>(events: impl IntoIterator<Item = &'a WatchEvent>) -> Self {
        let mut index = TitleIndex::default();
        for event in events {
            index.insert(&event.title);
        }
        index
    }

    /// Titles in lexicographic order, so indices don't depend on history order.
    pub fn sorted(events: &[WatchEvent]) -> Self {
        let mut titles: Vec<&str> = events.iter().map(|e| e.title.as_str()).collect();
        titles.sort_unstable();
        titles.dedup();

        let mut index = TitleIndex::default();
        for title in titles {
            index.insert(title);
        }
        index
    }

    fn insert(&mut self, title: &str) -> usize {
        if let Some(&idx) = self.title_to_idx.get(title) {
            return idx;
        }
        let idx = self.titles.len();
        self.titles.push(title.to_string());
        self.title_to_idx.insert(title.to_string(), idx);
        idx
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }

    pub fn index_of(&self, title: &str) -> Option<usize> {
        self.title_to_idx.get(title).copied()
    }

    pub fn title(&self, idx: usize) -> &str {
        &self.titles[idx]
    }

    pub fn titles(&self) -> &[String] {
        &self.titles
    }

    /// Zip a per-index vector back into a title-keyed map.
    pub fn to_rating_vector(&self, values: &[f64]) -> RatingVector {
        self.titles
            .iter()
            .zip(values.iter())
            .map(|(title, &value)| (title.clone(), value))
            .collect()
    }
}

/// Sort a copy of `events` by `order`, keeping input order for ties.
pub(crate) fn sorted_by_order(events: &[WatchEvent]) -> Vec<&WatchEvent> {
    let mut sorted: Vec<&WatchEvent> = events.iter().collect();
    sorted.sort_by_key(|e| e.order);
    sorted
}
