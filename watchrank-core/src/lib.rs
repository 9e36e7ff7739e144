/// watchrank-core: Pure-computation rating engine for watch histories.
///
/// "Was this better than the last thing I watched?" judgments → comparison
/// graph → two independent title scores:
///
/// - Bradley-Terry strengths over the transitively closed graph, normalized
///   to sum to 1 (`calculate_ratings`).
/// - Bias-free logistic regression weights over pairwise difference vectors
///   (`calculate_logistic_ratings`).
///
/// No IO, no HTTP, no filesystem. Just math. Titles are the identifiers;
/// the crate maps them to flat indices internally.
pub mod bradley_terry;
pub mod constants;
pub mod fitter;
pub mod graph;
pub mod logistic;
pub mod model;
pub mod scoring;
pub mod types;

// Re-export primary public API at crate root.
pub use fitter::{Backend, DenseFitter, FitError, PairwiseFitter, SparseFitter, fitter_chain};
pub use graph::ComparisonGraph;
pub use logistic::{LogisticConfig, TrainingSample, TrainingSet, calculate_logistic_ratings};
pub use scoring::{calculate_ratings, view_counts};
pub use types::{
    DisplayGraph, GraphLink, GraphNode, RatingResult, RatingVector, Termination, TitleIndex, WatchEvent,
};
