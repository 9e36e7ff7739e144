/// Comparison graph built from an ordered watch history.
///
/// Adjacency arena indexed by `TitleIndex::first_seen`: directed win edges
/// ("a beat b, n times"), symmetric match counts, and per-title win tallies.
use std::collections::BTreeMap;

use crate::types::{GraphLink, TitleIndex, WatchEvent, sorted_by_order};

#[derive(Debug, Clone)]
pub struct ComparisonGraph {
    titles: TitleIndex,
    /// edges[a][b] = number of times a beat b.
    edges: Vec<BTreeMap<usize, u32>>,
    /// matches[a][b] = number of comparisons between a and b. Always symmetric.
    matches: Vec<BTreeMap<usize, u32>>,
    /// wins[a] = sum of edges[a][*].
    wins: Vec<u32>,
}

impl ComparisonGraph {
    /// Build direct "better-than" edges from consecutive events.
    ///
    /// Events are sorted by `order` first. A pair contributes nothing when both
    /// events share a title or the later one carries no outcome.
    pub fn from_history(events: &[WatchEvent]) -> Self {
        let sorted = sorted_by_order(events);
        let titles = TitleIndex::first_seen(sorted.iter().copied());
        let n = titles.len();

        let mut graph = ComparisonGraph {
            titles,
            edges: vec![BTreeMap::new(); n],
            matches: vec![BTreeMap::new(); n],
            wins: vec![0; n],
        };

        for pair in sorted.windows(2) {
            let (prev, curr) = (pair[0], pair[1]);
            if prev.title == curr.title {
                continue;
            }
            let Some(curr_won) = curr.better_than_previous else {
                continue;
            };
            let (Some(p), Some(c)) = (graph.titles.index_of(&prev.title), graph.titles.index_of(&curr.title)) else {
                continue;
            };

            graph.record_match(p, c);
            if curr_won {
                graph.add_win(c, p, 1);
            } else {
                graph.add_win(p, c, 1);
            }
        }

        graph
    }

    fn record_match(&mut self, a: usize, b: usize) {
        *self.matches[a].entry(b).or_insert(0) += 1;
        *self.matches[b].entry(a).or_insert(0) += 1;
    }

    fn add_win(&mut self, winner: usize, loser: usize, count: u32) {
        *self.edges[winner].entry(loser).or_insert(0) += count;
        self.wins[winner] += count;
    }

    /// Infer "a beat c" from "a beat b" and "b beat c", into a new graph.
    ///
    /// For every intermediate `b` (index order) and every `a` that beats `b`
    /// in the graph being built, each direct edge `b -> c` adds
    /// `min(a->b, b->c)` to `a -> c` and to `a`'s wins, plus one match between
    /// `a` and `c`. Direct edges are read from `self`, so inferred edges only
    /// feed later intermediates through the `a -> b` side.
    ///
    /// This is one sweep, not a fixed point: chains longer than two hops can
    /// be under-counted depending on title order.
    pub fn transitive_closure(&self) -> ComparisonGraph {
        let n = self.titles.len();
        let mut closed = self.clone();

        for b in 0..n {
            for a in 0..n {
                if a == b {
                    continue;
                }
                let a_to_b = closed.win_count(a, b);
                if a_to_b == 0 {
                    continue;
                }
                for (&c, &b_to_c) in &self.edges[b] {
                    if c == a || c == b {
                        continue;
                    }
                    let inferred = a_to_b.min(b_to_c);
                    if inferred > 0 {
                        closed.add_win(a, c, inferred);
                        closed.record_match(a, c);
                    }
                }
            }
        }

        closed
    }

    pub fn titles(&self) -> &TitleIndex {
        &self.titles
    }

    pub fn num_titles(&self) -> usize {
        self.titles.len()
    }

    /// Times `a` beat `b` (by index).
    pub fn win_count(&self, a: usize, b: usize) -> u32 {
        self.edges[a].get(&b).copied().unwrap_or(0)
    }

    /// Comparisons between `a` and `b` (by index).
    pub fn match_count(&self, a: usize, b: usize) -> u32 {
        self.matches[a].get(&b).copied().unwrap_or(0)
    }

    /// Opponents of `a` with their match counts.
    pub fn opponents(&self, a: usize) -> impl Iterator<Item = (usize, u32)> + '_ {
        self.matches[a].iter().map(|(&b, &n)| (b, n))
    }

    pub fn wins_at(&self, a: usize) -> u32 {
        self.wins[a]
    }

    /// Total wins for a title; unknown titles have none.
    pub fn wins(&self, title: &str) -> u32 {
        self.titles.index_of(title).map_or(0, |idx| self.wins[idx])
    }

    /// Times `winner` beat `loser`, by title. Unknown titles read as zero.
    pub fn edge(&self, winner: &str, loser: &str) -> u32 {
        match (self.titles.index_of(winner), self.titles.index_of(loser)) {
            (Some(w), Some(l)) => self.win_count(w, l),
            _ => 0,
        }
    }

    /// Comparisons between two titles. Unknown titles read as zero.
    pub fn matches_between(&self, a: &str, b: &str) -> u32 {
        match (self.titles.index_of(a), self.titles.index_of(b)) {
            (Some(a), Some(b)) => self.match_count(a, b),
            _ => 0,
        }
    }

    /// Total matches for a title across all opponents.
    pub fn total_matches_at(&self, a: usize) -> u32 {
        self.matches[a].values().sum()
    }

    /// Number of distinct comparisons (each counted once, not per side).
    pub fn total_comparisons(&self) -> u32 {
        let doubled: u32 = (0..self.num_titles()).map(|a| self.total_matches_at(a)).sum();
        doubled / 2
    }

    /// Every positive directed edge, ordered by source then target index.
    pub fn display_links(&self) -> Vec<GraphLink> {
        let mut links = Vec::new();
        for (source, targets) in self.edges.iter().enumerate() {
            for (&target, &weight) in targets {
                if weight > 0 {
                    links.push(GraphLink {
                        source: self.titles.title(source).to_string(),
                        target: self.titles.title(target).to_string(),
                        weight,
                    });
                }
            }
        }
        links
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn watch(order: i64, title: &str, better: Option<bool>) -> WatchEvent {
        WatchEvent::new(order, title, "2024-1-1", better)
    }

    fn assert_symmetric(graph: &ComparisonGraph) {
        let n = graph.num_titles();
        for a in 0..n {
            for b in 0..n {
                assert_eq!(graph.match_count(a, b), graph.match_count(b, a), "matches[{a}][{b}] not symmetric");
            }
        }
    }

    fn assert_wins_match_edges(graph: &ComparisonGraph) {
        for a in 0..graph.num_titles() {
            let edge_sum: u32 = (0..graph.num_titles()).map(|b| graph.win_count(a, b)).sum();
            assert_eq!(graph.wins_at(a), edge_sum);
        }
    }

    #[test]
    fn test_empty_and_single_event() {
        let empty = ComparisonGraph::from_history(&[]);
        assert_eq!(empty.num_titles(), 0);
        assert_eq!(empty.total_comparisons(), 0);
        assert!(empty.display_links().is_empty());

        let single = ComparisonGraph::from_history(&[watch(1, "Heat", Some(true))]);
        assert_eq!(single.num_titles(), 1);
        assert_eq!(single.total_comparisons(), 0);
    }

    #[test]
    fn test_single_comparison_yields_one_edge() {
        let graph = ComparisonGraph::from_history(&[watch(1, "Heat", None), watch(2, "Alien", Some(false))]);
        assert_eq!(graph.edge("Heat", "Alien"), 1);
        assert_eq!(graph.edge("Alien", "Heat"), 0);
        assert_eq!(graph.matches_between("Heat", "Alien"), 1);
        assert_eq!(graph.matches_between("Alien", "Heat"), 1);
        assert_eq!(graph.total_comparisons(), 1);
        assert_eq!(graph.display_links().len(), 1);
    }

    #[test]
    fn test_skips_null_and_self_comparisons() {
        let graph = ComparisonGraph::from_history(&[
            watch(1, "Heat", None),
            watch(2, "Heat", Some(true)),   // same title
            watch(3, "Alien", None),        // no outcome
            watch(4, "Brazil", Some(true)), // Brazil > Alien
        ]);
        assert_eq!(graph.total_comparisons(), 1);
        assert_eq!(graph.edge("Brazil", "Alien"), 1);
        assert_eq!(graph.wins("Heat"), 0);
    }

    #[test]
    fn test_sorts_by_order_before_pairing() {
        let graph = ComparisonGraph::from_history(&[
            watch(2, "Alien", Some(true)),
            watch(1, "Heat", None),
        ]);
        assert_eq!(graph.edge("Alien", "Heat"), 1);
        assert_eq!(graph.titles().title(0), "Heat");
    }

    #[test]
    fn test_unknown_titles_read_as_zero() {
        let graph = ComparisonGraph::from_history(&[watch(1, "Heat", None), watch(2, "Alien", Some(true))]);
        assert_eq!(graph.wins("Brazil"), 0);
        assert_eq!(graph.edge("Brazil", "Heat"), 0);
        assert_eq!(graph.matches_between("Heat", "Brazil"), 0);
    }

    #[test]
    fn test_transitive_inference_chain() {
        // B beats A, then C beats B: infer C beats A.
        let direct = ComparisonGraph::from_history(&[
            watch(1, "A", None),
            watch(2, "B", Some(true)),
            watch(3, "C", Some(true)),
        ]);
        assert_eq!(direct.edge("B", "A"), 1);
        assert_eq!(direct.edge("C", "B"), 1);
        assert_eq!(direct.edge("C", "A"), 0);
        assert_eq!(direct.wins("C"), 1);

        let closed = direct.transitive_closure();
        assert_eq!(closed.edge("C", "A"), 1);
        assert_eq!(closed.wins("C"), 2);
        assert_eq!(closed.matches_between("C", "A"), 1);
        assert_eq!(closed.matches_between("A", "C"), 1);

        // Direct graph is untouched.
        assert_eq!(direct.edge("C", "A"), 0);
    }

    #[test]
    fn test_inferred_weight_is_min_of_both_legs() {
        // A beats B twice, B beats C once.
        let direct = ComparisonGraph::from_history(&[
            watch(1, "B", None),
            watch(2, "A", Some(true)),
            watch(3, "B", Some(false)),
            watch(4, "C", Some(false)),
        ]);
        assert_eq!(direct.edge("A", "B"), 2);
        assert_eq!(direct.edge("B", "C"), 1);

        let closed = direct.transitive_closure();
        assert_eq!(closed.edge("A", "C"), 1);
        assert_eq!(closed.wins("A"), 3);
    }

    #[test]
    fn test_closure_is_single_pass() {
        // Chain D > C > B > A, watched so that first-seen order is A, B, C, D.
        let direct = ComparisonGraph::from_history(&[
            watch(1, "A", None),
            watch(2, "B", Some(true)),
            watch(3, "C", Some(true)),
            watch(4, "D", Some(true)),
        ]);
        let closed = direct.transitive_closure();

        // Two-hop inferences are present.
        assert_eq!(closed.edge("C", "A"), 1);
        assert_eq!(closed.edge("D", "B"), 1);
        // D > A would need D>B (inferred at b=C) to be visited as a = D at b=B,
        // which already happened. Three hops are missed.
        assert_eq!(closed.edge("D", "A"), 0);
    }

    #[test]
    fn test_symmetry_and_win_tally_invariants() {
        let events = vec![
            watch(1, "A", None),
            watch(2, "B", Some(true)),
            watch(3, "C", Some(false)),
            watch(4, "A", Some(true)),
            watch(5, "D", Some(false)),
            watch(6, "B", Some(true)),
            watch(7, "C", Some(true)),
        ];
        let direct = ComparisonGraph::from_history(&events);
        assert_symmetric(&direct);
        assert_wins_match_edges(&direct);

        let closed = direct.transitive_closure();
        assert_symmetric(&closed);
        assert_wins_match_edges(&closed);
    }
}
