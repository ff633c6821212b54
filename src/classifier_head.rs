//! Small trainable network stacked on top of the frozen feature extractor.

use crate::error::{Error, Result};
use burn::backend::{Autodiff, NdArray};
use burn::module::Module;
use burn::nn::{self, Initializer};
use burn::prelude::Backend;
use burn::tensor::activation::{relu, softmax};
use burn::tensor::{Tensor, TensorData};

/// CPU backend used for inference.
pub type InferenceBackend = NdArray<f32>;

/// CPU backend with gradient tracking used for training.
pub type TrainingBackend = Autodiff<InferenceBackend>;

/// Layer sizes of the head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifierHeadConfig {
    /// Width of a flattened activation.
    pub input_dim: usize,
    /// Units in the hidden dense layer.
    pub hidden_units: usize,
    /// One output unit per label.
    pub num_classes: usize,
}

impl ClassifierHeadConfig {
    pub fn new(input_dim: usize, hidden_units: usize, num_classes: usize) -> Self {
        Self {
            input_dim,
            hidden_units,
            num_classes,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.input_dim == 0 || self.hidden_units == 0 || self.num_classes == 0 {
            return Err(Error::InvalidOptions(format!(
                "classifier head needs positive sizes, got {:?}",
                self
            )));
        }
        Ok(())
    }
}

/// Flatten -> dense(relu, bias) -> dense(softmax, no bias).
///
/// Both dense layers use variance scaling (fan-in, normal, scale 1) for their kernels.
#[derive(Debug, Module)]
pub struct ClassifierHead<B: Backend> {
    hidden: nn::Linear<B>,
    output: nn::Linear<B>,
}

impl<B: Backend> ClassifierHead<B> {
    pub fn new(config: ClassifierHeadConfig, device: &B::Device) -> Self {
        let variance_scaling = Initializer::KaimingNormal {
            gain: 1.0,
            fan_out_only: false,
        };

        let hidden = nn::LinearConfig::new(config.input_dim, config.hidden_units)
            .with_bias(true)
            .with_initializer(variance_scaling.clone())
            .init(device);
        let output = nn::LinearConfig::new(config.hidden_units, config.num_classes)
            .with_bias(false)
            .with_initializer(variance_scaling)
            .init(device);

        Self { hidden, output }
    }

    pub fn config(&self) -> ClassifierHeadConfig {
        let [input_dim, hidden_units] = self.hidden.weight.val().dims();
        let [_, num_classes] = self.output.weight.val().dims();
        ClassifierHeadConfig {
            input_dim,
            hidden_units,
            num_classes,
        }
    }

    /// Maps a batch of activations (any rank, batch first) to class probabilities `[batch, classes]`.
    pub fn forward<const D: usize>(&self, input: Tensor<B, D>) -> Tensor<B, 2> {
        let x: Tensor<B, 2> = input.flatten(1, D - 1);
        let x = relu(self.hidden.forward(x));
        softmax(self.output.forward(x), 1)
    }

    /// Probabilities for one flattened activation.
    pub fn predict(&self, activation: &[f32], device: &B::Device) -> Result<Vec<f32>> {
        let input_dim = self.config().input_dim;
        if activation.len() != input_dim {
            return Err(Error::shape_mismatch(&[input_dim], &[activation.len()]));
        }

        let input = Tensor::<B, 2>::from_data(
            TensorData::new(activation.to_vec(), [1, input_dim]),
            device,
        );
        self.forward(input)
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| Error::inference(format!("{:?}", e)))
    }
}

/// Index of the highest probability. Ties keep the lowest index.
pub fn argmax(probabilities: &[f32]) -> Option<usize> {
    probabilities
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, &p)| match best {
            Some((_, best_p)) if best_p >= p => best,
            _ => Some((i, p)),
        })
        .map(|(i, _)| i)
}
