/// Iterative Maximum Likelihood Estimation for the Bradley-Terry model.
///
/// Damped fixed-point iteration with a Laplace-style prior (virtual 50/50
/// matches) and stall detection, tuned for sparse, noisy watch histories.
/// Internal module: operates on graph indices, not titles.
use crate::constants::{
    CONVERGENCE_THRESHOLD, DAMPING, MAX_ITERATIONS, PRIOR_STRENGTH, PRIOR_WIN_RATE, RATING_FLOOR,
    STALL_LIMIT,
};
use crate::graph::ComparisonGraph;
use crate::types::Termination;

pub struct BradleyTerry<'g> {
    graph: &'g ComparisonGraph,
    /// Current ratings, indexed like the graph's titles. Sum to 1 once calculated.
    pub ratings: Vec<f64>,
    iterations: usize,
}

impl<'g> BradleyTerry<'g> {
    pub fn new(graph: &'g ComparisonGraph) -> Self {
        let n = graph.num_titles();
        let initial = if n == 0 { Vec::new() } else { vec![1.0 / n as f64; n] };
        BradleyTerry {
            graph,
            ratings: initial,
            iterations: 0,
        }
    }

    /// Starting point: empirical win rate per title, normalized and floored.
    fn initial_ratings(&self) -> Vec<f64> {
        let n = self.graph.num_titles();
        let mut ratings: Vec<f64> = (0..n)
            .map(|i| {
                let total = self.graph.total_matches_at(i);
                if total > 0 {
                    self.graph.wins_at(i) as f64 / total as f64
                } else {
                    PRIOR_WIN_RATE
                }
            })
            .collect();

        let total: f64 = ratings.iter().sum();
        if total > 0.0 {
            for r in &mut ratings {
                *r /= total;
            }
        }
        for r in &mut ratings {
            if *r < RATING_FLOOR {
                *r = RATING_FLOOR;
            }
        }
        ratings
    }

    /// One damped fixed-point sweep from `ratings`, normalized.
    fn run_iteration(&self, ratings: &[f64]) -> Vec<f64> {
        let n = self.graph.num_titles();
        let mut new_ratings = vec![0.0; n];

        for i in 0..n {
            let numerator = self.graph.wins_at(i) as f64 + PRIOR_WIN_RATE * PRIOR_STRENGTH;

            let rating_i = ratings[i];
            let mut denominator = PRIOR_STRENGTH;
            for (j, n_ij) in self.graph.opponents(i) {
                let rating_j = ratings[j];
                denominator += n_ij as f64 * rating_j / (rating_i + rating_j);
            }

            let updated = numerator / denominator;
            new_ratings[i] = (1.0 - DAMPING) * rating_i + DAMPING * updated;
        }

        normalize(&mut new_ratings);
        new_ratings
    }

    /// Run the solver to convergence, stall, or the iteration cap.
    pub fn calculate_ratings(&mut self) -> Termination {
        let n = self.graph.num_titles();
        self.iterations = 0;

        if n == 0 || self.graph.total_comparisons() == 0 {
            self.ratings = if n == 0 { Vec::new() } else { vec![1.0 / n as f64; n] };
            return Termination::Uniform;
        }

        let (ratings, iterations, termination) = iterate(self.initial_ratings(), |r| self.run_iteration(r));
        self.ratings = ratings;
        self.iterations = iterations;
        termination
    }

    /// Get rating for a specific title by index.
    pub fn get_rating(&self, idx: usize) -> f64 {
        self.ratings[idx]
    }

    /// Number of sweeps adopted by the last `calculate_ratings` call.
    pub fn iterations(&self) -> usize {
        self.iterations
    }
}

/// Drive `sweep` from `start` until convergence, stall, or the iteration cap.
///
/// A sweep whose total change is not smaller than the previous one counts as
/// non-improving; after `STALL_LIMIT` of those in a row the loop stops and the
/// stalling sweep is discarded. Returns the last adopted ratings and how many
/// sweeps were adopted.
fn iterate(start: Vec<f64>, mut sweep: impl FnMut(&[f64]) -> Vec<f64>) -> (Vec<f64>, usize, Termination) {
    let mut ratings = start;
    let mut adopted = 0usize;
    let mut last_diff = f64::INFINITY;
    let mut non_improvement = 0usize;

    for iteration in 0..MAX_ITERATIONS {
        let new_ratings = sweep(&ratings);

        let diff: f64 = new_ratings
            .iter()
            .zip(ratings.iter())
            .map(|(new, old)| (new - old).abs())
            .sum();

        if diff >= last_diff {
            non_improvement += 1;
            if non_improvement >= STALL_LIMIT {
                tracing::debug!(iteration, diff, "bradley-terry stalled: no improvement for {STALL_LIMIT} sweeps");
                return (ratings, adopted, Termination::Stalled);
            }
        } else {
            non_improvement = 0;
        }

        last_diff = diff;
        ratings = new_ratings;
        adopted += 1;

        if diff < CONVERGENCE_THRESHOLD {
            tracing::debug!(iteration, diff, "bradley-terry converged");
            return (ratings, adopted, Termination::Converged);
        }
    }

    tracing::debug!(iterations = MAX_ITERATIONS, diff = last_diff, "bradley-terry hit the iteration cap");
    (ratings, adopted, Termination::MaxIterations)
}

fn normalize(values: &mut [f64]) {
    let total: f64 = values.iter().sum();
    if total > 0.0 {
        for v in values.iter_mut() {
            *v /= total;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WatchEvent;

    fn watch(order: i64, title: &str, better: Option<bool>) -> WatchEvent {
        WatchEvent::new(order, title, "2024-1-1", better)
    }

    fn solve(events: &[WatchEvent]) -> (ComparisonGraph, Vec<f64>, Termination) {
        let graph = ComparisonGraph::from_history(events).transitive_closure();
        let mut bt = BradleyTerry::new(&graph);
        let termination = bt.calculate_ratings();
        let ratings = bt.ratings.clone();
        (graph, ratings, termination)
    }

    #[test]
    fn test_basic_ranking() {
        // C > B > A, each seen twice in different orders.
        let events = vec![
            watch(1, "A", None),
            watch(2, "B", Some(true)),
            watch(3, "C", Some(true)),
            watch(4, "A", Some(false)),
            watch(5, "C", Some(true)),
            watch(6, "B", Some(false)),
        ];
        let (graph, ratings, _) = solve(&events);
        let idx = |t: &str| graph.titles().index_of(t).unwrap();

        assert!(ratings[idx("C")] > ratings[idx("B")]);
        assert!(ratings[idx("B")] > ratings[idx("A")]);
    }

    #[test]
    fn test_no_comparisons_equal_ratings() {
        let events = vec![
            watch(1, "A", None),
            watch(2, "B", None),
            watch(3, "C", None),
            watch(4, "D", None),
        ];
        let (_, ratings, termination) = solve(&events);
        assert_eq!(termination, Termination::Uniform);
        assert_eq!(ratings.len(), 4);
        for r in ratings {
            assert_eq!(r, 0.25);
        }
    }

    #[test]
    fn test_empty_graph() {
        let (_, ratings, termination) = solve(&[]);
        assert!(ratings.is_empty());
        assert_eq!(termination, Termination::Uniform);
    }

    #[test]
    fn test_single_title_gets_everything() {
        let (_, ratings, _) = solve(&[watch(1, "A", None), watch(2, "A", Some(true))]);
        assert_eq!(ratings, vec![1.0]);
    }

    #[test]
    fn test_ratings_sum_to_one_and_stay_positive() {
        // One title never wins; its empirical start is 0 and must be floored.
        let events = vec![
            watch(1, "Loser", None),
            watch(2, "A", Some(true)),
            watch(3, "Loser", Some(false)),
            watch(4, "B", Some(true)),
            watch(5, "A", Some(false)),
            watch(6, "C", Some(true)),
            watch(7, "Loser", Some(false)),
        ];
        let (_, ratings, termination) = solve(&events);

        let sum: f64 = ratings.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6, "ratings should sum to 1, got {sum}");
        for r in &ratings {
            assert!(*r >= RATING_FLOOR, "rating {r} below floor");
        }
        assert_ne!(termination, Termination::Uniform);
    }

    #[test]
    fn test_initial_ratings_floor_zero_win_titles() {
        let events = vec![watch(1, "A", None), watch(2, "B", Some(true))];
        let graph = ComparisonGraph::from_history(&events);
        let bt = BradleyTerry::new(&graph);
        let initial = bt.initial_ratings();
        let a = graph.titles().index_of("A").unwrap();
        let b = graph.titles().index_of("B").unwrap();
        assert_eq!(initial[a], RATING_FLOOR);
        assert_eq!(initial[b], 1.0);
    }

    #[test]
    fn test_cycle_terminates() {
        // A > B > C > A: no consistent order, solver must still stop.
        let events = vec![
            watch(1, "A", None),
            watch(2, "B", Some(false)),
            watch(3, "C", Some(false)),
            watch(4, "A", Some(true)),
        ];
        let graph = ComparisonGraph::from_history(&events).transitive_closure();
        let mut bt = BradleyTerry::new(&graph);
        let termination = bt.calculate_ratings();
        assert_ne!(termination, Termination::MaxIterations);
        assert!(bt.iterations() > 0);
        let sum: f64 = bt.ratings.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_growing_steps_stall_without_adopting_last_sweep() {
        // Triangular numbers: each step is larger than the one before.
        let mut k = 0.0;
        let (ratings, adopted, termination) = iterate(vec![0.0], |r| {
            k += 1.0;
            vec![r[0] + k]
        });
        assert_eq!(termination, Termination::Stalled);
        // Sweeps 1..=5 adopted (0 -> 1 -> 3 -> 6 -> 10 -> 15); the sixth sweep
        // is the fifth non-improving one and is thrown away.
        assert_eq!(adopted, 5);
        assert_eq!(ratings, vec![15.0]);
    }

    #[test]
    fn test_improvement_resets_stall_counter() {
        // Four growing steps, one shrinking step, then growth again.
        let steps = [1.0, 2.0, 3.0, 4.0, 5.0, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0];
        let mut next = steps.iter();
        let (ratings, adopted, termination) = iterate(vec![0.0], |r| vec![r[0] + next.next().copied().unwrap_or(0.0)]);
        assert_eq!(termination, Termination::Stalled);
        // 1..5 adopted (stall count 4), 0.5 resets, 0.6..0.9 adopted, 1.0 stalls.
        assert_eq!(adopted, 10);
        assert!((ratings[0] - 18.5).abs() < 1e-9, "{ratings:?}");
    }

    #[test]
    fn test_shrinking_steps_run_to_the_cap() {
        // Strictly smaller steps that never drop under the threshold.
        let mut k = 0.0;
        let (_, adopted, termination) = iterate(vec![0.0], |r| {
            k += 1.0;
            vec![r[0] + 1.0 / k]
        });
        assert_eq!(termination, Termination::MaxIterations);
        assert_eq!(adopted, MAX_ITERATIONS);
    }

    #[test]
    fn test_halving_steps_converge() {
        let (ratings, adopted, termination) = iterate(vec![1.0], |r| vec![r[0] / 2.0]);
        assert_eq!(termination, Termination::Converged);
        assert!(ratings[0] < CONVERGENCE_THRESHOLD);
        assert!(adopted < MAX_ITERATIONS);
    }
}
