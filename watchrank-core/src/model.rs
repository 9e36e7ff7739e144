/// Pairwise logistic model: one linear unit, no bias, sigmoid output.
///
/// The unit's kernel holds one weight per title; after training those
/// weights are the logistic scores.
use burn::backend::{Autodiff, NdArray};
use burn::module::Param;
use burn::nn::{Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::activation::sigmoid;

use crate::constants::BCE_EPSILON;
use crate::fitter::FitError;

/// CPU autodiff backend used for fitting.
pub type TrainBackend = Autodiff<NdArray<f64>>;

#[derive(Module, Debug)]
pub struct PairwiseModel<B: Backend> {
    scores: Linear<B>,
}

impl<B: Backend> PairwiseModel<B> {
    /// Build the unit with a caller-supplied kernel (one value per title).
    pub fn new(initial: Vec<f64>, device: &B::Device) -> Self {
        let num_titles = initial.len();
        let mut scores = LinearConfig::new(num_titles, 1).with_bias(false).init(device);
        let kernel = Tensor::<B, 2>::from_data(TensorData::new(initial, [num_titles, 1]), device).require_grad();
        scores.weight = Param::from_tensor(kernel);
        PairwiseModel { scores }
    }

    /// Win probability for each row of `features` ([rows, titles] -> [rows, 1]).
    pub fn forward(&self, features: Tensor<B, 2>) -> Tensor<B, 2> {
        sigmoid(self.scores.forward(features))
    }

    /// Current kernel, one weight per title.
    pub fn weights(&self) -> Result<Vec<f64>, FitError> {
        self.scores
            .weight
            .val()
            .into_data()
            .convert::<f64>()
            .to_vec::<f64>()
            .map_err(|e| FitError::Readback(format!("{e:?}")))
    }
}

/// Mean binary cross-entropy with probabilities clipped away from 0 and 1.
pub fn binary_cross_entropy<B: Backend>(probs: Tensor<B, 2>, labels: Tensor<B, 2>) -> Tensor<B, 1> {
    let probs = probs.clamp(BCE_EPSILON, 1.0 - BCE_EPSILON);
    let positive = labels.clone() * probs.clone().log();
    let negative = labels.neg().add_scalar(1.0) * probs.neg().add_scalar(1.0).log();
    (positive + negative).neg().mean()
}
