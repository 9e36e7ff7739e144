/// Virtual win rate every title starts from before any real comparison.
pub const PRIOR_WIN_RATE: f64 = 0.5;

/// Weight of the prior, measured in virtual matches.
/// 2.0 is equivalent to two 50/50 matches against an average opponent.
pub const PRIOR_STRENGTH: f64 = 2.0;

/// Blend between the previous rating and the fixed-point update (0.5 = halfway).
pub const DAMPING: f64 = 0.5;

/// Hard cap on Bradley-Terry sweeps.
pub const MAX_ITERATIONS: usize = 1000;

/// Sum of absolute rating changes below which a sweep counts as converged.
pub const CONVERGENCE_THRESHOLD: f64 = 1e-6;

/// Consecutive sweeps without a smaller diff before the solver gives up.
pub const STALL_LIMIT: usize = 5;

/// Smallest rating any title may start with.
pub const RATING_FLOOR: f64 = 1e-10;

pub const DEFAULT_LEARNING_RATE: f64 = 0.01;
pub const DEFAULT_EPOCHS: usize = 100;
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Adam moment decay rates and denominator epsilon (burn's optimizer config is f32).
pub const ADAM_BETA1: f32 = 0.9;
pub const ADAM_BETA2: f32 = 0.999;
pub const ADAM_EPSILON: f32 = 1e-7;

/// Predicted probabilities are clipped to [eps, 1 - eps] before taking logs.
pub const BCE_EPSILON: f64 = 1e-7;

/// Largest dense design matrix (in bytes) the `Auto` backend will allocate.
///
/// One f64 per (sample, title) cell: 64 MiB covers roughly 2,000 titles
/// against 4,000 samples. Past that the sparse backend does the same math
/// touching only the two non-zero cells per sample.
pub const DEFAULT_DENSE_LIMIT_BYTES: usize = 64 * 1024 * 1024;
