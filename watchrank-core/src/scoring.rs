/// Unified Bradley-Terry rating pass.
///
/// One function: watch history in, ratings and display graph out. Pure
/// function with no IO and no state.
use std::collections::HashMap;

use crate::bradley_terry::BradleyTerry;
use crate::graph::ComparisonGraph;
use crate::types::{DisplayGraph, GraphNode, RatingResult, WatchEvent};

/// Rate every title in `events` with Bradley-Terry over the transitively
/// closed comparison graph.
///
/// Ratings sum to 1. Display links are the direct comparisons only; inferred
/// edges feed the solver but are not drawn.
pub fn calculate_ratings(events: &[WatchEvent]) -> RatingResult {
    let direct = ComparisonGraph::from_history(events);
    let closed = direct.transitive_closure();

    let mut bt = BradleyTerry::new(&closed);
    let termination = bt.calculate_ratings();
    let iterations = bt.iterations();

    let titles = closed.titles();
    let nodes = titles
        .titles()
        .iter()
        .enumerate()
        .map(|(idx, title)| GraphNode {
            id: title.clone(),
            rating: bt.get_rating(idx),
        })
        .collect();

    RatingResult {
        ratings: titles.to_rating_vector(&bt.ratings),
        graph: DisplayGraph {
            nodes,
            links: direct.display_links(),
        },
        iterations,
        termination,
    }
}

/// Occurrences of each title in the history.
pub fn view_counts(events: &[WatchEvent]) -> HashMap<String, u32> {
    let mut counts = HashMap::new();
    for event in events {
        *counts.entry(event.title.clone()).or_insert(0) += 1;
    }
    counts
}
