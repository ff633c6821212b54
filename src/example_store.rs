use crate::activation::Activation;
use crate::error::{Error, Result};
use burn::prelude::Backend;
use burn::tensor::{Tensor, TensorData};

/// Labeled training examples: stacked activations (`xs`) and one-hot labels (`ys`).
///
/// The class count is fixed at creation. The activation shape is fixed by the first
/// example added. Rows are only ever appended; shrinking means building a new store.
#[derive(Debug, Clone, PartialEq)]
pub struct ExampleStore {
    num_classes: usize,
    activation_shape: Option<Vec<usize>>,
    xs: Vec<f32>,
    ys: Vec<f32>,
    labels: Vec<usize>,
}

impl ExampleStore {
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes,
            activation_shape: None,
            xs: Vec::new(),
            ys: Vec::new(),
            labels: Vec::new(),
        }
    }

    /// Appends one example. Either both buffers grow by one row or nothing changes.
    pub fn add_example(&mut self, activation: &Activation, label_index: usize) -> Result<usize> {
        if label_index >= self.num_classes {
            return Err(Error::InvalidLabel {
                index: label_index,
                num_classes: self.num_classes,
            });
        }

        if let Some(shape) = &self.activation_shape {
            if shape.as_slice() != activation.shape() {
                return Err(Error::shape_mismatch(shape, activation.shape()));
            }
        }

        if self.activation_shape.is_none() {
            self.activation_shape = Some(activation.shape().to_vec());
        }
        self.xs.extend_from_slice(activation.data());
        self.ys
            .extend((0..self.num_classes).map(|i| if i == label_index { 1.0 } else { 0.0 }));
        self.labels.push(label_index);

        Ok(self.labels.len())
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn activation_shape(&self) -> Option<&[usize]> {
        self.activation_shape.as_deref()
    }

    /// Width of one flattened activation row, 0 while empty.
    pub fn feature_len(&self) -> usize {
        self.activation_shape
            .as_ref()
            .map(|shape| shape.iter().product())
            .unwrap_or(0)
    }

    pub fn xs(&self) -> &[f32] {
        &self.xs
    }

    pub fn ys(&self) -> &[f32] {
        &self.ys
    }

    pub fn label_at(&self, row: usize) -> Option<usize> {
        self.labels.get(row).copied()
    }

    pub fn activation_row(&self, row: usize) -> Option<&[f32]> {
        let width = self.feature_len();
        if row >= self.len() {
            return None;
        }
        Some(&self.xs[row * width..(row + 1) * width])
    }

    pub fn one_hot_row(&self, row: usize) -> Option<&[f32]> {
        if row >= self.len() {
            return None;
        }
        Some(&self.ys[row * self.num_classes..(row + 1) * self.num_classes])
    }

    pub fn counts_per_label(&self) -> Vec<usize> {
        let mut counts = vec![0; self.num_classes];
        for &label in &self.labels {
            counts[label] += 1;
        }
        counts
    }

    /// Copies the buffers into `[rows, features]` and `[rows, classes]` tensors.
    pub fn to_tensors<B: Backend>(&self, device: &B::Device) -> Result<(Tensor<B, 2>, Tensor<B, 2>)> {
        if self.is_empty() {
            return Err(Error::EmptyDataset);
        }

        let rows = self.len();
        let xs = Tensor::<B, 2>::from_data(
            TensorData::new(self.xs.clone(), [rows, self.feature_len()]),
            device,
        );
        let ys = Tensor::<B, 2>::from_data(
            TensorData::new(self.ys.clone(), [rows, self.num_classes]),
            device,
        );
        Ok((xs, ys))
    }
}
