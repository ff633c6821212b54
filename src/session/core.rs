use crate::classifier_head::argmax;
use crate::error::{Error, Result};
use crate::training::{compute_batch_size, BatchReport, TrainOptions, TrainingPlan};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub index: usize,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingProgress {
    pub plan: TrainingPlan,
    pub completed_batches: usize,
    pub epoch: usize,
}

/// What the session is doing. Recording and predicting loops carry the id of the
/// cycle chain they belong to; completions from any other chain are stale.
#[derive(Debug, Clone, PartialEq)]
pub enum Activity {
    Starting,
    Idle,
    Recording { label: usize, cycle: u64 },
    Training { progress: Option<TrainingProgress> },
    Predicting { cycle: u64 },
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetStatus {
    pub num_classes: usize,
    pub counts: Vec<usize>,
}

impl DatasetStatus {
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes,
            counts: vec![0; num_classes],
        }
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: usize,
    pub name: String,
    pub probabilities: Vec<f32>,
}

impl Prediction {
    pub fn confidence(&self) -> f32 {
        self.probabilities.get(self.label).copied().unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub activity: Activity,
    pub labels: Vec<Label>,
    pub activation_shape: Option<Vec<usize>>,
    /// Present from the first recording until the class count changes.
    pub dataset: Option<DatasetStatus>,
    /// Class count of the trained head, if any.
    pub trained_classes: Option<usize>,
    pub prediction: Option<Prediction>,
    pub last_loss: Option<f32>,
    pub last_error: Option<String>,
    pub next_cycle: u64,
    /// Cycle of the most recently started inference loop. Its in-flight result still
    /// counts after the loop is stopped.
    pub predict_cycle: Option<u64>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            activity: Activity::Starting,
            labels: Vec::new(),
            activation_shape: None,
            dataset: None,
            trained_classes: None,
            prediction: None,
            last_loss: None,
            last_error: None,
            next_cycle: 0,
            predict_cycle: None,
        }
    }
}

impl State {
    pub fn is_training(&self) -> bool {
        matches!(self.activity, Activity::Training { .. })
    }

    pub fn is_predicting(&self) -> bool {
        matches!(self.activity, Activity::Predicting { .. })
    }

    pub fn is_recording(&self) -> bool {
        matches!(self.activity, Activity::Recording { .. })
    }

    pub fn example_count(&self) -> usize {
        self.dataset.as_ref().map(DatasetStatus::total).unwrap_or(0)
    }

    pub fn label_name(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(|label| label.name.as_str())
    }
}

#[derive(Debug)]
pub enum Event {
    AddLabel {
        name: String,
    },
    StartRecording {
        label: usize,
    },
    StopRecording,
    RecordImage {
        path: PathBuf,
        label: usize,
    },
    /// `dataset_size` is the row count of the example store itself. It can run ahead of
    /// `DatasetStatus`, whose counts wait for queued `ExampleAdded` events.
    Train {
        options: TrainOptions,
        dataset_size: usize,
    },
    TogglePredict,

    SetupDone(Result<Vec<usize>>),
    /// `Ok` carries the per-label example counts after the add.
    ExampleAdded {
        cycle: Option<u64>,
        label: usize,
        result: Result<Vec<usize>>,
    },
    TrainingStarted(Result<TrainingPlan>),
    BatchDone(Result<BatchReport>),
    PredictionDone {
        cycle: u64,
        result: Result<Vec<f32>>,
    },
}

impl Event {
    pub fn to_display_string(&self) -> String {
        match self {
            Event::PredictionDone {
                cycle,
                result: Ok(probabilities),
            } => format!("PredictionDone {{ cycle: {}, argmax: {:?} }}", cycle, argmax(probabilities)),
            event => format!("{:?}", event),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    ActivityChanged(Activity),
    LabelAdded(Label),
    DatasetReset { num_classes: usize },
    ExampleAdded { label: usize, total: usize },
    BatchLoss { epoch: usize, batch: usize, loss: f32 },
    TrainingFinished { loss: f32 },
    Prediction(Prediction),
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Setup,
    CreateDataset { num_classes: usize },
    DiscardDataset,
    CaptureExample { label: usize, cycle: u64 },
    RecordImage { path: PathBuf, label: usize },
    StartTraining { options: TrainOptions },
    TrainBatch,
    PredictFrame { cycle: u64 },
    Notify(Notification),
}

pub fn init() -> (State, Vec<Effect>) {
    (State::default(), vec![Effect::Setup])
}

/// Rejects host requests the current state cannot honor. Effect completions always pass.
pub fn check(state: &State, event: &Event) -> Result<()> {
    let is_host_request = matches!(
        event,
        Event::AddLabel { .. }
            | Event::StartRecording { .. }
            | Event::RecordImage { .. }
            | Event::Train { .. }
            | Event::TogglePredict
    );
    if !is_host_request {
        return Ok(());
    }

    match &state.activity {
        Activity::Starting => return Err(Error::NotReady("still starting up".to_string())),
        Activity::Failed { message } => return Err(Error::NotReady(message.clone())),
        _ => {}
    }

    match event {
        Event::AddLabel { name } => {
            if state.is_training() {
                return Err(Error::Busy("cannot add a label while training".to_string()));
            }
            if name.trim().is_empty() {
                return Err(Error::InvalidOptions("label name must not be empty".to_string()));
            }
        }
        Event::StartRecording { label } | Event::RecordImage { label, .. } => {
            if state.is_training() {
                return Err(Error::Busy("cannot record while training".to_string()));
            }
            if *label >= state.labels.len() {
                return Err(Error::InvalidLabel {
                    index: *label,
                    num_classes: state.labels.len(),
                });
            }
        }
        Event::Train {
            options,
            dataset_size,
        } => {
            if state.is_training() {
                return Err(Error::Busy("already training".to_string()));
            }
            options.validate()?;
            compute_batch_size(*dataset_size, options.batch_size_fraction)?;
        }
        Event::TogglePredict => {
            if state.is_predicting() {
                return Ok(());
            }
            if state.is_training() {
                return Err(Error::Busy("cannot predict while training".to_string()));
            }
            if state.trained_classes.is_none() {
                return Err(Error::NotTrained);
            }
        }
        _ => {}
    }

    Ok(())
}

pub fn transition(state: State, event: Event) -> (State, Vec<Effect>) {
    if let Err(err) = check(&state, &event) {
        return reject(state, err);
    }

    let mut state = state;
    let mut effects = Vec::new();

    match event {
        Event::SetupDone(Ok(shape)) => {
            if state.activity == Activity::Starting {
                state.activation_shape = Some(shape);
                set_activity(&mut state, Activity::Idle, &mut effects);
            }
        }
        Event::SetupDone(Err(err)) => {
            if state.activity == Activity::Starting {
                let message = err.to_string();
                state.last_error = Some(message.clone());
                set_activity(&mut state, Activity::Failed { message }, &mut effects);
            }
        }

        Event::AddLabel { name } => {
            let label = Label {
                index: state.labels.len(),
                name: name.trim().to_string(),
            };
            state.labels.push(label.clone());
            effects.push(Effect::Notify(Notification::LabelAdded(label)));

            // the one-hot width is fixed per dataset, a new class invalidates it
            if state.dataset.take().is_some() {
                state.trained_classes = None;
                state.prediction = None;
                state.predict_cycle = None;
                effects.push(Effect::DiscardDataset);
                effects.push(Effect::Notify(Notification::DatasetReset {
                    num_classes: state.labels.len(),
                }));
                set_activity(&mut state, Activity::Idle, &mut effects);
            }
        }

        Event::StartRecording { label } => {
            ensure_dataset(&mut state, &mut effects);
            match state.activity {
                Activity::Recording { cycle, .. } => {
                    set_activity(&mut state, Activity::Recording { label, cycle }, &mut effects);
                }
                _ => {
                    let cycle = next_cycle(&mut state);
                    set_activity(&mut state, Activity::Recording { label, cycle }, &mut effects);
                    effects.push(Effect::CaptureExample { label, cycle });
                }
            }
        }

        Event::StopRecording => {
            if state.is_recording() {
                set_activity(&mut state, Activity::Idle, &mut effects);
            }
        }

        Event::RecordImage { path, label } => {
            ensure_dataset(&mut state, &mut effects);
            effects.push(Effect::RecordImage { path, label });
        }

        Event::Train { options, .. } => {
            set_activity(
                &mut state,
                Activity::Training { progress: None },
                &mut effects,
            );
            effects.push(Effect::StartTraining { options });
        }

        Event::TogglePredict => {
            if state.is_predicting() {
                set_activity(&mut state, Activity::Idle, &mut effects);
            } else {
                let cycle = next_cycle(&mut state);
                state.predict_cycle = Some(cycle);
                set_activity(&mut state, Activity::Predicting { cycle }, &mut effects);
                effects.push(Effect::PredictFrame { cycle });
            }
        }

        Event::ExampleAdded {
            cycle,
            label,
            result: Ok(counts),
        } => {
            // counts from a discarded dataset have the old class count
            match state.dataset.as_mut() {
                Some(dataset) if counts.len() == dataset.num_classes => {
                    dataset.counts = counts;
                    effects.push(Effect::Notify(Notification::ExampleAdded {
                        label,
                        total: dataset.total(),
                    }));
                }
                _ => {}
            }

            if let (Some(done), Activity::Recording { label, cycle }) = (cycle, &state.activity) {
                if done == *cycle {
                    effects.push(Effect::CaptureExample {
                        label: *label,
                        cycle: *cycle,
                    });
                }
            }
        }
        Event::ExampleAdded {
            cycle,
            result: Err(err),
            ..
        } => {
            let (mut state, mut rejected) = reject(state, err);
            if cycle.is_some() && current_cycle(&state) == cycle && state.is_recording() {
                set_activity(&mut state, Activity::Idle, &mut rejected);
            }
            return (state, rejected);
        }

        Event::TrainingStarted(Ok(plan)) => {
            if state.activity == (Activity::Training { progress: None }) {
                let progress = TrainingProgress {
                    plan,
                    completed_batches: 0,
                    epoch: 0,
                };
                set_activity(
                    &mut state,
                    Activity::Training {
                        progress: Some(progress),
                    },
                    &mut effects,
                );
                effects.push(Effect::TrainBatch);
            }
        }
        Event::TrainingStarted(Err(err)) | Event::BatchDone(Err(err)) => {
            let (mut state, mut rejected) = reject(state, err);
            if state.is_training() {
                set_activity(&mut state, Activity::Idle, &mut rejected);
            }
            return (state, rejected);
        }

        Event::BatchDone(Ok(report)) => {
            if let Activity::Training {
                progress: Some(mut progress),
            } = state.activity.clone()
            {
                progress.completed_batches += 1;
                progress.epoch = report.epoch;
                state.last_loss = Some(report.loss);
                effects.push(Effect::Notify(Notification::BatchLoss {
                    epoch: report.epoch,
                    batch: report.batch,
                    loss: report.loss,
                }));

                if report.finished {
                    state.trained_classes = state.dataset.as_ref().map(|d| d.num_classes);
                    effects.push(Effect::Notify(Notification::TrainingFinished {
                        loss: report.loss,
                    }));
                    set_activity(&mut state, Activity::Idle, &mut effects);
                } else {
                    state.activity = Activity::Training {
                        progress: Some(progress),
                    };
                    effects.push(Effect::TrainBatch);
                }
            }
        }

        Event::PredictionDone { cycle, result } => {
            if state.predict_cycle != Some(cycle) {
                return (state, effects);
            }
            let running = state.activity == (Activity::Predicting { cycle });
            match result {
                Ok(probabilities) => {
                    if let Some(label) = argmax(&probabilities) {
                        let prediction = Prediction {
                            label,
                            name: state.label_name(label).unwrap_or_default().to_string(),
                            probabilities,
                        };
                        state.prediction = Some(prediction.clone());
                        effects.push(Effect::Notify(Notification::Prediction(prediction)));
                    }
                    if running {
                        effects.push(Effect::PredictFrame { cycle });
                    }
                }
                Err(err) => {
                    let (mut state, mut rejected) = reject(state, err);
                    if running {
                        set_activity(&mut state, Activity::Idle, &mut rejected);
                    }
                    return (state, rejected);
                }
            }
        }
    }

    (state, effects)
}

fn reject(mut state: State, err: Error) -> (State, Vec<Effect>) {
    let message = err.to_string();
    state.last_error = Some(message.clone());
    (state, vec![Effect::Notify(Notification::Rejected(message))])
}

fn set_activity(state: &mut State, activity: Activity, effects: &mut Vec<Effect>) {
    if state.activity != activity {
        state.activity = activity.clone();
        effects.push(Effect::Notify(Notification::ActivityChanged(activity)));
    }
}

fn ensure_dataset(state: &mut State, effects: &mut Vec<Effect>) {
    if state.dataset.is_none() {
        let num_classes = state.labels.len();
        state.dataset = Some(DatasetStatus::new(num_classes));
        effects.push(Effect::CreateDataset { num_classes });
    }
}

fn next_cycle(state: &mut State) -> u64 {
    let cycle = state.next_cycle;
    state.next_cycle += 1;
    cycle
}

fn current_cycle(state: &State) -> Option<u64> {
    match state.activity {
        Activity::Recording { cycle, .. } | Activity::Predicting { cycle } => Some(cycle),
        _ => None,
    }
}
