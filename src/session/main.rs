use crate::classifier_head::{ClassifierHead, InferenceBackend};
use crate::config::Config;
use crate::display::interface::StatusDisplay;
use crate::error::{Error, Result};
use crate::example_store::ExampleStore;
use crate::feature_extractor::interface::FeatureExtractor;
use crate::frame_source::interface::FrameSource;
use crate::library::logger::interface::Logger;
use crate::session::core::{
    check, init, transition, Activity, Effect, Event, Notification, Prediction, State,
};
use crate::session::render::Render;
use crate::session::run_effect::RunEffect;
use crate::training::TrainOptions;
use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::sync::Arc;

/// Single-threaded driver: host calls and effect completions all go through one queue,
/// and each [`Session::step`] handles exactly one queued event.
///
/// Returning from `step` is the yield point. A recording or prediction loop queues its
/// next cycle only when the previous one completes, so the host gets control back
/// between every capture, prediction and training batch.
pub struct Session {
    state: State,
    event_receiver: Receiver<Event>,
    logger: Arc<dyn Logger + Send + Sync>,
    run_effect: RunEffect,
    render: Render,
    subscribers: Vec<Sender<Notification>>,
    fatal: Option<Error>,
}

impl Session {
    pub fn new(
        config: Config,
        logger: Arc<dyn Logger + Send + Sync>,
        frame_source: Box<dyn FrameSource>,
        feature_extractor: Box<dyn FeatureExtractor>,
        display: Box<dyn StatusDisplay>,
    ) -> Self {
        let (event_sender, event_receiver) = channel();
        let logger = logger.with_namespace("session");
        let run_effect = RunEffect::new(
            config,
            logger.clone(),
            frame_source,
            feature_extractor,
            event_sender,
        );

        Self {
            state: State::default(),
            event_receiver,
            logger,
            run_effect,
            render: Render::new(display),
            subscribers: Vec::new(),
            fatal: None,
        }
    }

    /// Sets up the frame source and warms up the extractor. A failure here is fatal:
    /// the error is returned and every later operation is rejected.
    pub fn start(&mut self) -> Result<()> {
        if let Err(e) = self.render.init() {
            let _ = self.logger.error(&format!("Display init failed: {}", e));
        }

        let (state, effects) = init();
        self.state = state;
        self.render_state();
        self.run_effects(effects);

        while self.state.activity == Activity::Starting && self.step() {}

        match self.fatal.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub fn add_label(&mut self, name: &str) -> Result<usize> {
        self.dispatch(Event::AddLabel {
            name: name.to_string(),
        })?;
        Ok(self.state.labels.len() - 1)
    }

    pub fn start_recording(&mut self, label: usize) -> Result<()> {
        self.dispatch(Event::StartRecording { label })
    }

    /// No-op when nothing is recording.
    pub fn stop_recording(&mut self) {
        let _ = self.dispatch(Event::StopRecording);
    }

    /// Queues one example from an image file. Decode failures arrive as a `Rejected` notification.
    pub fn record_image(&mut self, path: impl Into<PathBuf>, label: usize) -> Result<()> {
        self.dispatch(Event::RecordImage {
            path: path.into(),
            label,
        })
    }

    /// Starts training. Inference, if running, is stopped first.
    ///
    /// The batch size is checked against every example already captured, including
    /// those whose `ExampleAdded` event is still queued.
    pub fn train(&mut self, options: TrainOptions) -> Result<()> {
        let dataset_size = self
            .run_effect
            .example_store()
            .map(ExampleStore::len)
            .unwrap_or(0);
        self.dispatch(Event::Train {
            options,
            dataset_size,
        })
    }

    /// Starts or stops the inference loop and returns whether it is now running.
    pub fn toggle_predict(&mut self) -> Result<bool> {
        self.dispatch(Event::TogglePredict)?;
        Ok(self.state.is_predicting())
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn prediction(&self) -> Option<&Prediction> {
        self.state.prediction.as_ref()
    }

    pub fn is_training(&self) -> bool {
        self.state.is_training()
    }

    pub fn is_predicting(&self) -> bool {
        self.state.is_predicting()
    }

    pub fn example_store(&self) -> Option<&ExampleStore> {
        self.run_effect.example_store()
    }

    pub fn classifier(&self) -> Option<&ClassifierHead<InferenceBackend>> {
        self.run_effect.classifier()
    }

    pub fn subscribe(&mut self) -> Receiver<Notification> {
        let (sender, receiver) = channel();
        self.subscribers.push(sender);
        receiver
    }

    /// Handles one queued event. Returns false when nothing was pending.
    pub fn step(&mut self) -> bool {
        match self.event_receiver.try_recv() {
            Ok(event) => {
                self.process(event);
                true
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => false,
        }
    }

    /// Steps until the queue is empty or `max_steps` events were handled.
    pub fn run_until_idle(&mut self, max_steps: usize) -> usize {
        let mut steps = 0;
        while steps < max_steps && self.step() {
            steps += 1;
        }
        steps
    }

    /// Steps until `done` holds for the state. Gives up when the queue runs dry or after `max_steps`.
    pub fn run_until(&mut self, max_steps: usize, done: impl Fn(&State) -> bool) -> bool {
        for _ in 0..max_steps {
            if done(&self.state) {
                return true;
            }
            if !self.step() {
                break;
            }
        }
        done(&self.state)
    }

    fn dispatch(&mut self, event: Event) -> Result<()> {
        let checked = check(&self.state, &event);
        self.process(event);
        checked
    }

    fn process(&mut self, event: Event) {
        let _ = self
            .logger
            .info(&format!("event: {}", event.to_display_string()));

        if let Event::SetupDone(Err(err)) = &event {
            self.fatal = Some(err.clone());
        }

        let state = std::mem::take(&mut self.state);
        let (state, effects) = transition(state, event);
        self.state = state;

        self.render_state();
        self.run_effects(effects);
    }

    fn run_effects(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Notify(notification) => self.notify(notification),
                effect => self.run_effect.run_effect(effect),
            }
        }
    }

    fn notify(&mut self, notification: Notification) {
        match &notification {
            Notification::Rejected(message) => {
                let _ = self.logger.error(&format!("Rejected: {}", message));
            }
            Notification::LabelAdded(label) => {
                let _ = self
                    .logger
                    .info(&format!("Label {} added as {}", label.name, label.index));
            }
            Notification::DatasetReset { num_classes } => {
                let _ = self.logger.info(&format!(
                    "Dataset reset, {} classes now, record again",
                    num_classes
                ));
            }
            _ => {}
        }

        self.subscribers
            .retain(|subscriber| subscriber.send(notification.clone()).is_ok());
    }

    fn render_state(&mut self) {
        if let Err(e) = self.render.render(&self.state) {
            let _ = self.logger.error(&format!("Render failed: {}", e));
        }
    }
}
