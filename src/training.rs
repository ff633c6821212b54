//! Resumable training of the classifier head on a snapshot of the example store.
//!
//! A [`TrainingJob`] runs exactly one batch per [`TrainingJob::step`] call so the caller
//! can hand control back to the host between batches.

use crate::classifier_head::{ClassifierHead, ClassifierHeadConfig};
use crate::error::{Error, Result};
use crate::example_store::ExampleStore;
use burn::optim::adaptor::OptimizerAdaptor;
use burn::optim::{Adam, AdamConfig, GradientsParams, Optimizer};
use burn::prelude::Backend;
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::{ElementConversion, Int, Tensor, TensorData};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainOptions {
    pub learning_rate: f64,
    /// Batch size as a fraction of the whole dataset.
    pub batch_size_fraction: f64,
    pub epochs: usize,
    pub hidden_units: usize,
    /// Fixes the shuffle order when set.
    pub seed: Option<u64>,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            learning_rate: 1e-4,
            batch_size_fraction: 0.4,
            epochs: 20,
            hidden_units: 100,
            seed: None,
        }
    }
}

impl TrainOptions {
    pub fn validate(&self) -> Result<()> {
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(Error::InvalidOptions(format!(
                "learning rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.epochs == 0 {
            return Err(Error::InvalidOptions("epochs must be at least 1".to_string()));
        }
        if self.hidden_units == 0 {
            return Err(Error::InvalidOptions(
                "hidden units must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// `floor(dataset_size * fraction)`, rejected when it is not a positive integer.
pub fn compute_batch_size(dataset_size: usize, fraction: f64) -> Result<usize> {
    if dataset_size == 0 {
        return Err(Error::EmptyDataset);
    }

    let batch_size = (dataset_size as f64 * fraction).floor();
    if !(batch_size >= 1.0) {
        return Err(Error::InvalidBatchSize {
            dataset_size,
            fraction,
        });
    }

    Ok(batch_size as usize)
}

/// Mean over the batch of `-sum(targets * ln(probabilities))`.
pub fn categorical_cross_entropy<B: Backend>(
    probabilities: Tensor<B, 2>,
    targets: Tensor<B, 2>,
) -> Tensor<B, 1> {
    let eps = 1e-7;
    let log_probabilities = probabilities.clamp(eps, 1.0 - eps).log();
    (targets * log_probabilities).sum_dim(1).mean().neg()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainingPlan {
    pub dataset_size: usize,
    pub batch_size: usize,
    pub batches_per_epoch: usize,
    pub epochs: usize,
}

impl TrainingPlan {
    pub fn total_batches(&self) -> usize {
        self.batches_per_epoch * self.epochs
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchReport {
    /// Zero-based epoch the batch belonged to.
    pub epoch: usize,
    /// Zero-based batch within the epoch.
    pub batch: usize,
    pub loss: f32,
    pub finished: bool,
}

pub struct TrainingJob<B: AutodiffBackend> {
    model: ClassifierHead<B>,
    optimizer: OptimizerAdaptor<Adam, ClassifierHead<B>, B>,
    xs: Tensor<B, 2>,
    ys: Tensor<B, 2>,
    plan: TrainingPlan,
    learning_rate: f64,
    order: Vec<i64>,
    epoch: usize,
    batch: usize,
    rng: StdRng,
    device: B::Device,
}

impl<B: AutodiffBackend> TrainingJob<B> {
    /// Snapshots the store and prepares the head. `head` is reused when its layer sizes match.
    pub fn new(
        store: &ExampleStore,
        head: Option<ClassifierHead<B>>,
        options: &TrainOptions,
        device: &B::Device,
    ) -> Result<Self> {
        options.validate()?;
        if store.is_empty() {
            return Err(Error::EmptyDataset);
        }
        let batch_size = compute_batch_size(store.len(), options.batch_size_fraction)?;

        let config =
            ClassifierHeadConfig::new(store.feature_len(), options.hidden_units, store.num_classes());
        config.validate()?;
        let model = match head {
            Some(head) if head.config() == config => head,
            _ => ClassifierHead::new(config, device),
        };

        let (xs, ys) = store.to_tensors::<B>(device)?;

        let mut rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let mut order: Vec<i64> = (0..store.len() as i64).collect();
        order.shuffle(&mut rng);

        let plan = TrainingPlan {
            dataset_size: store.len(),
            batch_size,
            batches_per_epoch: store.len().div_ceil(batch_size),
            epochs: options.epochs,
        };

        Ok(Self {
            model,
            optimizer: AdamConfig::new().with_epsilon(1e-7).init(),
            xs,
            ys,
            plan,
            learning_rate: options.learning_rate,
            order,
            epoch: 0,
            batch: 0,
            rng,
            device: device.clone(),
        })
    }

    pub fn plan(&self) -> TrainingPlan {
        self.plan
    }

    pub fn is_finished(&self) -> bool {
        self.epoch >= self.plan.epochs
    }

    pub fn model(&self) -> &ClassifierHead<B> {
        &self.model
    }

    pub fn into_model(self) -> ClassifierHead<B> {
        self.model
    }

    /// Runs one optimizer step on the next batch of the current shuffled epoch.
    pub fn step(&mut self) -> Result<BatchReport> {
        if self.is_finished() {
            return Err(Error::InvalidOptions("training already finished".to_string()));
        }

        let start = self.batch * self.plan.batch_size;
        let end = (start + self.plan.batch_size).min(self.plan.dataset_size);
        let rows = self.order[start..end].to_vec();
        let indices =
            Tensor::<B, 1, Int>::from_data(TensorData::new(rows, [end - start]), &self.device);

        let inputs = self.xs.clone().select(0, indices.clone());
        let targets = self.ys.clone().select(0, indices);

        let probabilities = self.model.forward(inputs);
        let loss = categorical_cross_entropy(probabilities, targets);
        let loss_value: f32 = loss.clone().into_scalar().elem();

        let grads = GradientsParams::from_grads(loss.backward(), &self.model);
        self.model = self
            .optimizer
            .step(self.learning_rate, self.model.clone(), grads);

        let report = BatchReport {
            epoch: self.epoch,
            batch: self.batch,
            loss: loss_value,
            finished: false,
        };

        self.batch += 1;
        if self.batch == self.plan.batches_per_epoch {
            self.batch = 0;
            self.epoch += 1;
            self.order.shuffle(&mut self.rng);
        }

        Ok(BatchReport {
            finished: self.is_finished(),
            ..report
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::Activation;
    use crate::classifier_head::{argmax, InferenceBackend, TrainingBackend};
    use burn::module::AutodiffModule;

    fn store_with(examples: usize, num_classes: usize) -> ExampleStore {
        let mut store = ExampleStore::new(num_classes);
        for i in 0..examples {
            let label = i % num_classes;
            let value = if label == 0 { 1.0 } else { -1.0 };
            let activation = Activation::new(vec![4, 4, 3], vec![value; 48]).unwrap();
            store.add_example(&activation, label).unwrap();
        }
        store
    }

    fn job(store: &ExampleStore, options: TrainOptions) -> Result<TrainingJob<TrainingBackend>> {
        TrainingJob::new(store, None, &options, &Default::default())
    }

    #[test]
    fn test_compute_batch_size() {
        assert!(matches!(
            compute_batch_size(2, 0.4),
            Err(Error::InvalidBatchSize {
                dataset_size: 2,
                ..
            })
        ));
        assert_eq!(compute_batch_size(10, 0.4).unwrap(), 4);
        assert_eq!(compute_batch_size(10, 0.7).unwrap(), 7);
        assert_eq!(compute_batch_size(5, 1.0).unwrap(), 5);
        assert!(matches!(compute_batch_size(0, 0.4), Err(Error::EmptyDataset)));
        assert!(compute_batch_size(10, f64::NAN).is_err());
        assert!(compute_batch_size(10, -0.5).is_err());
    }

    #[test]
    fn test_cross_entropy_of_uniform_guess() {
        let device = Default::default();
        let probabilities =
            Tensor::<InferenceBackend, 2>::from_data([[0.5, 0.5], [0.5, 0.5]], &device);
        let targets = Tensor::<InferenceBackend, 2>::from_data([[1.0, 0.0], [0.0, 1.0]], &device);

        let loss: f32 = categorical_cross_entropy(probabilities, targets)
            .into_scalar()
            .elem();

        assert!((loss - std::f32::consts::LN_2).abs() < 1e-5);
    }

    #[test]
    fn test_empty_store_is_rejected() {
        let store = ExampleStore::new(2);
        assert!(matches!(
            job(&store, TrainOptions::default()),
            Err(Error::EmptyDataset)
        ));
    }

    #[test]
    fn test_tiny_dataset_has_invalid_batch_size() {
        let store = store_with(2, 2);
        assert!(matches!(
            job(&store, TrainOptions::default()),
            Err(Error::InvalidBatchSize { .. })
        ));
    }

    #[test]
    fn test_invalid_options_are_rejected() {
        let store = store_with(10, 2);
        let options = TrainOptions {
            epochs: 0,
            ..TrainOptions::default()
        };
        assert!(matches!(job(&store, options), Err(Error::InvalidOptions(_))));
    }

    #[test]
    fn test_plan_for_ten_examples() {
        let store = store_with(10, 2);
        let job = job(&store, TrainOptions::default()).unwrap();

        assert_eq!(
            job.plan(),
            TrainingPlan {
                dataset_size: 10,
                batch_size: 4,
                batches_per_epoch: 3,
                epochs: 20,
            }
        );
        assert_eq!(job.plan().total_batches(), 60);
        assert_eq!(job.model().config().num_classes, 2);
        assert_eq!(job.model().config().input_dim, 48);
    }

    #[test]
    fn test_steps_until_finished() {
        let store = store_with(10, 2);
        let options = TrainOptions {
            epochs: 2,
            seed: Some(7),
            ..TrainOptions::default()
        };
        let mut job = job(&store, options).unwrap();

        let mut reports = Vec::new();
        while !job.is_finished() {
            reports.push(job.step().unwrap());
        }

        assert_eq!(reports.len(), 6);
        assert_eq!((reports[0].epoch, reports[0].batch), (0, 0));
        assert_eq!((reports[3].epoch, reports[3].batch), (1, 0));
        assert!(reports.iter().all(|r| r.loss.is_finite()));
        assert!(reports[..5].iter().all(|r| !r.finished));
        assert!(reports[5].finished);
        assert!(job.step().is_err());
    }

    #[test]
    fn test_training_separates_classes() {
        let store = store_with(10, 2);
        let options = TrainOptions {
            learning_rate: 1e-2,
            epochs: 10,
            seed: Some(1),
            ..TrainOptions::default()
        };
        let mut job = job(&store, options).unwrap();

        let first = job.step().unwrap().loss;
        let mut last = first;
        while !job.is_finished() {
            last = job.step().unwrap().loss;
        }
        assert!(last < first);

        let head = job.into_model().valid();
        let device = Default::default();
        let up = head.predict(store.activation_row(0).unwrap(), &device).unwrap();
        let down = head.predict(store.activation_row(1).unwrap(), &device).unwrap();
        assert_eq!(argmax(&up), Some(0));
        assert_eq!(argmax(&down), Some(1));
    }

    #[test]
    fn test_matching_head_is_reused_and_mismatched_replaced() {
        let device = Default::default();
        let store = store_with(10, 2);
        let options = TrainOptions::default();

        let wrong = ClassifierHead::<TrainingBackend>::new(ClassifierHeadConfig::new(48, 100, 3), &device);
        let job = TrainingJob::new(&store, Some(wrong), &options, &device).unwrap();
        assert_eq!(job.model().config().num_classes, 2);

        let right = ClassifierHead::<TrainingBackend>::new(ClassifierHeadConfig::new(48, 100, 2), &device);
        let probe = store.activation_row(0).unwrap().to_vec();
        let before = right.valid().predict(&probe, &device).unwrap();
        let job = TrainingJob::new(&store, Some(right), &options, &device).unwrap();
        let after = job.model().valid().predict(&probe, &device).unwrap();
        assert_eq!(before, after);
    }
}
