use crate::activation::Activation;
use crate::classifier_head::{ClassifierHead, InferenceBackend, TrainingBackend};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::example_store::ExampleStore;
use crate::feature_extractor::interface::FeatureExtractor;
use crate::frame_source::impl_image_files::load_frame;
use crate::frame_source::interface::FrameSource;
use crate::library::logger::interface::Logger;
use crate::session::core::{Effect, Event};
use crate::training::{BatchReport, TrainOptions, TrainingJob, TrainingPlan};
use burn::backend::ndarray::NdArrayDevice;
use burn::module::AutodiffModule;
use std::path::Path;
use std::sync::mpsc::Sender;
use std::sync::Arc;

/// Owns the collaborators and the mutable ML state, and turns effects into events.
///
/// Every effect runs to completion on the caller's thread; the resulting event is
/// queued and picked up by the next session step.
pub struct RunEffect {
    config: Config,
    logger: Arc<dyn Logger + Send + Sync>,
    frame_source: Box<dyn FrameSource>,
    feature_extractor: Box<dyn FeatureExtractor>,
    store: Option<ExampleStore>,
    head: Option<ClassifierHead<TrainingBackend>>,
    inference_head: Option<ClassifierHead<InferenceBackend>>,
    job: Option<TrainingJob<TrainingBackend>>,
    device: NdArrayDevice,
    event_sender: Sender<Event>,
}

impl RunEffect {
    pub fn new(
        config: Config,
        logger: Arc<dyn Logger + Send + Sync>,
        frame_source: Box<dyn FrameSource>,
        feature_extractor: Box<dyn FeatureExtractor>,
        event_sender: Sender<Event>,
    ) -> Self {
        Self {
            config,
            logger: logger.with_namespace("effects"),
            frame_source,
            feature_extractor,
            store: None,
            head: None,
            inference_head: None,
            job: None,
            device: NdArrayDevice::default(),
            event_sender,
        }
    }

    pub fn example_store(&self) -> Option<&ExampleStore> {
        self.store.as_ref()
    }

    pub fn classifier(&self) -> Option<&ClassifierHead<InferenceBackend>> {
        self.inference_head.as_ref()
    }

    pub fn run_effect(&mut self, effect: Effect) {
        match effect {
            Effect::Setup => {
                let result = self.setup();
                let _ = self.event_sender.send(Event::SetupDone(result));
            }
            Effect::CreateDataset { num_classes } => {
                let _ = self
                    .logger
                    .info(&format!("Creating dataset with {} classes", num_classes));
                self.store = Some(ExampleStore::new(num_classes));
            }
            Effect::DiscardDataset => {
                let _ = self.logger.info("Discarding dataset and classifier");
                self.store = None;
                self.head = None;
                self.inference_head = None;
                self.job = None;
            }
            Effect::CaptureExample { label, cycle } => {
                let result = self
                    .capture_activation()
                    .and_then(|activation| self.add_example(&activation, label));
                let _ = self.event_sender.send(Event::ExampleAdded {
                    cycle: Some(cycle),
                    label,
                    result,
                });
            }
            Effect::RecordImage { path, label } => {
                let result = self
                    .image_activation(&path)
                    .and_then(|activation| self.add_example(&activation, label));
                let _ = self.event_sender.send(Event::ExampleAdded {
                    cycle: None,
                    label,
                    result,
                });
            }
            Effect::StartTraining { options } => {
                let result = self.start_training(&options);
                let _ = self.event_sender.send(Event::TrainingStarted(result));
            }
            Effect::TrainBatch => {
                let result = self.train_batch();
                let _ = self.event_sender.send(Event::BatchDone(result));
            }
            Effect::PredictFrame { cycle } => {
                let result = self.predict_frame();
                let _ = self
                    .event_sender
                    .send(Event::PredictionDone { cycle, result });
            }
            Effect::Notify(_) => {}
        }
    }

    /// Starts the camera and pushes one frame through the extractor so the first real
    /// capture does not pay for lazy initialization.
    fn setup(&mut self) -> Result<Vec<usize>> {
        let _ = self.logger.info("Setting up frame source...");
        self.frame_source.setup().map_err(into_load_failure("frame source"))?;

        let _ = self.logger.info("Warming up feature extractor...");
        let activation = self
            .capture_activation()
            .map_err(into_load_failure("feature extractor warm-up"))?;

        let _ = self
            .logger
            .info(&format!("Ready, activation shape {:?}", activation.shape()));
        Ok(activation.shape().to_vec())
    }

    fn capture_activation(&mut self) -> Result<Activation> {
        let frame = self.frame_source.capture()?;
        self.feature_extractor.extract(&frame)
    }

    fn image_activation(&self, path: &Path) -> Result<Activation> {
        let frame = load_frame(
            path,
            self.feature_extractor.input_size(),
            self.config.resize_policy,
        )?;
        self.feature_extractor.extract(&frame)
    }

    fn add_example(&mut self, activation: &Activation, label: usize) -> Result<Vec<usize>> {
        let store = self
            .store
            .as_mut()
            .ok_or_else(|| Error::NotReady("no dataset to record into".to_string()))?;
        let total = store.add_example(activation, label)?;
        let _ = self
            .logger
            .info(&format!("Added example for label {} ({} total)", label, total));
        Ok(store.counts_per_label())
    }

    fn start_training(&mut self, options: &TrainOptions) -> Result<TrainingPlan> {
        let store = self.store.as_ref().ok_or(Error::EmptyDataset)?;
        let job = TrainingJob::new(store, self.head.clone(), options, &self.device)?;
        let plan = job.plan();
        let _ = self.logger.info(&format!(
            "Training on {} examples, batch size {}, {} epochs",
            plan.dataset_size, plan.batch_size, plan.epochs
        ));
        self.job = Some(job);
        Ok(plan)
    }

    fn train_batch(&mut self) -> Result<BatchReport> {
        let job = self
            .job
            .as_mut()
            .ok_or_else(|| Error::InvalidOptions("no training in progress".to_string()))?;
        let report = job.step()?;
        let _ = self.logger.info(&format!("Loss: {:.5}", report.loss));

        if report.finished {
            if let Some(job) = self.job.take() {
                let model = job.into_model();
                self.inference_head = Some(model.valid());
                self.head = Some(model);
            }
            let _ = self.logger.info("Training finished");
        }

        Ok(report)
    }

    fn predict_frame(&mut self) -> Result<Vec<f32>> {
        let activation = self.capture_activation()?;
        let head = self.inference_head.as_ref().ok_or(Error::NotTrained)?;
        head.predict(activation.data(), &self.device)
    }
}

fn into_load_failure(resource: &'static str) -> impl Fn(Error) -> Error {
    move |err| match err {
        Error::ExternalLoadFailure { .. } => err,
        other => Error::external_load(resource, other),
    }
}
