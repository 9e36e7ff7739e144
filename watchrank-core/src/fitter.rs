/// Fitting backends for the logistic pairwise model.
///
/// Both backends train the same burn model (`model::PairwiseModel`) with Adam
/// and clipped binary cross-entropy; they differ only in how feature rows
/// reach it. `fitter_chain` picks between them with a memory probe.
use burn::backend::ndarray::NdArrayDevice;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::{Int, Tensor, TensorData};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use crate::constants::{ADAM_BETA1, ADAM_BETA2, ADAM_EPSILON};
use crate::logistic::{LogisticConfig, TrainingSample, TrainingSet};
use crate::model::{PairwiseModel, TrainBackend, binary_cross_entropy};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FitError {
    #[error("could not allocate a {rows}x{cols} design matrix")]
    Allocation { rows: usize, cols: usize },

    #[error("training set has no samples to fit")]
    EmptyTrainingSet,

    #[error("weights diverged: non-finite value for title index {index}")]
    Diverged { index: usize },

    #[error("invalid logistic config: {0}")]
    InvalidConfig(String),

    #[error("could not read fitted weights: {0}")]
    Readback(String),
}

/// Which design representation to fit with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Backend {
    /// Dense when the design matrix fits the memory limit, sparse otherwise
    /// and as fallback.
    #[default]
    Auto,
    Dense,
    Sparse,
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Backend::Auto),
            "dense" => Ok(Backend::Dense),
            "sparse" => Ok(Backend::Sparse),
            other => Err(format!("unknown backend \"{other}\" (expected auto, dense or sparse)")),
        }
    }
}

/// Strategy interface: training set in, one weight per title out.
pub trait PairwiseFitter: Send + Sync {
    fn name(&self) -> &'static str;
    fn fit(&self, set: &TrainingSet, config: &LogisticConfig) -> Result<Vec<f64>, FitError>;
}

/// Materializes the full `samples x titles` difference matrix as one tensor.
pub struct DenseFitter;

/// Builds each mini-batch from the two non-zero cells of its samples.
/// Same rows reach the same model as with `DenseFitter`, so equal seeds give
/// equal weights.
pub struct SparseFitter;

impl PairwiseFitter for DenseFitter {
    fn name(&self) -> &'static str {
        "dense"
    }

    fn fit(&self, set: &TrainingSet, config: &LogisticConfig) -> Result<Vec<f64>, FitError> {
        let device = NdArrayDevice::default();
        let design = DenseDesign::build(set, &device)?;
        let weights = train(&design, set, config, &device);
        // Release the matrix as soon as the weights are out.
        drop(design);
        weights
    }
}

impl PairwiseFitter for SparseFitter {
    fn name(&self) -> &'static str {
        "sparse"
    }

    fn fit(&self, set: &TrainingSet, config: &LogisticConfig) -> Result<Vec<f64>, FitError> {
        let device = NdArrayDevice::default();
        let design = SparseDesign {
            samples: set.samples(),
            cols: set.num_titles(),
        };
        train(&design, set, config, &device)
    }
}

/// Bytes a dense design matrix for `set` would take, if representable.
pub fn dense_matrix_bytes(set: &TrainingSet) -> Option<usize> {
    set.samples()
        .len()
        .checked_mul(set.num_titles())?
        .checked_mul(std::mem::size_of::<f64>())
}

/// Ordered list of backends to try for `config.backend`.
///
/// `Auto` probes the dense matrix size against `dense_limit_bytes`: under the
/// limit it tries dense then sparse, over it only sparse.
pub fn fitter_chain(set: &TrainingSet, config: &LogisticConfig) -> Vec<Box<dyn PairwiseFitter>> {
    match config.backend {
        Backend::Dense => vec![Box::new(DenseFitter)],
        Backend::Sparse => vec![Box::new(SparseFitter)],
        Backend::Auto => {
            let fits = dense_matrix_bytes(set).is_some_and(|bytes| bytes <= config.dense_limit_bytes);
            if fits {
                vec![Box::new(DenseFitter), Box::new(SparseFitter)]
            } else {
                tracing::debug!(
                    samples = set.samples().len(),
                    titles = set.num_titles(),
                    limit = config.dense_limit_bytes,
                    "dense design over memory limit, using sparse backend"
                );
                vec![Box::new(SparseFitter)]
            }
        }
    }
}

/// Feature rows for a batch, shaped `[rows.len(), num_titles]`.
trait Design {
    fn batch(&self, rows: &[usize], device: &NdArrayDevice) -> Tensor<TrainBackend, 2>;
}

struct DenseDesign {
    matrix: Tensor<TrainBackend, 2>,
}

impl DenseDesign {
    fn build(set: &TrainingSet, device: &NdArrayDevice) -> Result<Self, FitError> {
        let rows = set.samples().len();
        let cols = set.num_titles();
        let cells = rows.checked_mul(cols).ok_or(FitError::Allocation { rows, cols })?;

        let mut matrix = Vec::new();
        matrix
            .try_reserve_exact(cells)
            .map_err(|_| FitError::Allocation { rows, cols })?;
        for sample in set.samples() {
            matrix.extend_from_slice(&sample.features(cols));
        }

        let matrix = Tensor::from_data(TensorData::new(matrix, [rows, cols]), device);
        Ok(DenseDesign { matrix })
    }
}

impl Design for DenseDesign {
    fn batch(&self, rows: &[usize], device: &NdArrayDevice) -> Tensor<TrainBackend, 2> {
        let indices: Vec<i64> = rows.iter().map(|&row| row as i64).collect();
        let indices = Tensor::<TrainBackend, 1, Int>::from_data(TensorData::new(indices, [rows.len()]), device);
        self.matrix.clone().select(0, indices)
    }
}

/// Builds each batch on demand; only `batch_size x titles` cells ever exist.
struct SparseDesign<'a> {
    samples: &'a [TrainingSample],
    cols: usize,
}

impl Design for SparseDesign<'_> {
    fn batch(&self, rows: &[usize], device: &NdArrayDevice) -> Tensor<TrainBackend, 2> {
        let mut cells = vec![0.0; rows.len() * self.cols];
        for (i, &row) in rows.iter().enumerate() {
            let s = &self.samples[row];
            cells[i * self.cols + s.positive] = 1.0;
            cells[i * self.cols + s.negative] = -1.0;
        }
        Tensor::from_data(TensorData::new(cells, [rows.len(), self.cols]), device)
    }
}

fn labels(samples: &[TrainingSample], rows: &[usize], device: &NdArrayDevice) -> Tensor<TrainBackend, 2> {
    let values: Vec<f64> = rows.iter().map(|&row| samples[row].label).collect();
    Tensor::from_data(TensorData::new(values, [rows.len(), 1]), device)
}

fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

/// Rows used for training when `validation_split` is held out from the tail.
///
/// Samples come in (comparison, complement) pairs, so the cut is made on a
/// comparison boundary and the training rows stay exactly balanced.
pub(crate) fn training_rows(rows: usize, validation_split: f64) -> usize {
    let comparisons = rows / 2;
    ((comparisons as f64) * (1.0 - validation_split)).floor() as usize * 2
}

/// Mini-batch training loop shared by every backend.
fn train(
    design: &impl Design,
    set: &TrainingSet,
    config: &LogisticConfig,
    device: &NdArrayDevice,
) -> Result<Vec<f64>, FitError> {
    let num_titles = set.num_titles();
    let rows = set.samples().len();
    if rows == 0 || num_titles == 0 {
        return Err(FitError::EmptyTrainingSet);
    }

    let train_rows = training_rows(rows, config.validation_split);
    if train_rows == 0 {
        return Err(FitError::EmptyTrainingSet);
    }
    let validation: Vec<usize> = (train_rows..rows).collect();

    let mut rng = make_rng(config.seed);

    // Glorot uniform for a [num_titles, 1] kernel, drawn from our own seeded RNG.
    let limit = (6.0 / (num_titles as f64 + 1.0)).sqrt();
    let initial: Vec<f64> = (0..num_titles).map(|_| rng.random_range(-limit..limit)).collect();
    let mut model = PairwiseModel::<TrainBackend>::new(initial, device);
    let mut optim = AdamConfig::new()
        .with_beta_1(ADAM_BETA1)
        .with_beta_2(ADAM_BETA2)
        .with_epsilon(ADAM_EPSILON)
        .init();

    let samples = set.samples();
    let mut order: Vec<usize> = (0..train_rows).collect();
    let tracing_epochs = tracing::enabled!(tracing::Level::TRACE);

    for epoch in 0..config.epochs {
        if config.shuffle {
            order.shuffle(&mut rng);
        }

        let mut epoch_loss = 0.0;
        for batch in order.chunks(config.batch_size) {
            let probs = model.forward(design.batch(batch, device));
            let loss = binary_cross_entropy(probs, labels(samples, batch, device));
            if tracing_epochs {
                epoch_loss += loss.clone().into_scalar() * batch.len() as f64;
            }
            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optim.step(config.learning_rate, model, grads);
        }

        if tracing_epochs {
            let loss = epoch_loss / train_rows as f64;
            if validation.is_empty() {
                tracing::trace!(epoch = epoch + 1, loss, "epoch finished");
            } else {
                let probs = model.forward(design.batch(&validation, device));
                let val_loss = binary_cross_entropy(probs, labels(samples, &validation, device)).into_scalar();
                tracing::trace!(epoch = epoch + 1, loss, val_loss, "epoch finished");
            }
        }
    }

    let weights = model.weights()?;
    if let Some(index) = weights.iter().position(|w| !w.is_finite()) {
        return Err(FitError::Diverged { index });
    }
    Ok(weights)
}
