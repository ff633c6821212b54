use crate::display::interface::StatusDisplay;
use crate::session::core::{Activity, State};
use std::error::Error;

/// The two status lines for a state.
pub fn status_lines(state: &State) -> [String; 2] {
    match &state.activity {
        Activity::Starting => ["Starting camera...".to_string(), String::new()],
        Activity::Failed { message } => [format!("Error: {}", message), String::new()],
        Activity::Idle => [
            if state.trained_classes.is_some() {
                "Ready (trained)".to_string()
            } else {
                "Ready".to_string()
            },
            label_counts(state),
        ],
        Activity::Recording { label, .. } => {
            let count = state
                .dataset
                .as_ref()
                .and_then(|dataset| dataset.counts.get(*label).copied())
                .unwrap_or(0);
            [
                format!("Recording {}", state.label_name(*label).unwrap_or("?")),
                format!("{} examples", count),
            ]
        }
        Activity::Training { progress } => match progress {
            None => ["Training...".to_string(), String::new()],
            Some(progress) => [
                format!(
                    "Training {}/{}",
                    progress.completed_batches,
                    progress.plan.total_batches()
                ),
                state
                    .last_loss
                    .map(|loss| format!("Loss: {:.5}", loss))
                    .unwrap_or_default(),
            ],
        },
        Activity::Predicting { .. } => [
            "Predicting".to_string(),
            state
                .prediction
                .as_ref()
                .map(|p| format!("{} ({:.0}%)", p.name, p.confidence() * 100.0))
                .unwrap_or_else(|| "...".to_string()),
        ],
    }
}

fn label_counts(state: &State) -> String {
    state
        .labels
        .iter()
        .map(|label| {
            let count = state
                .dataset
                .as_ref()
                .and_then(|dataset| dataset.counts.get(label.index).copied())
                .unwrap_or(0);
            format!("{}:{}", label.name, count)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub struct Render {
    display: Box<dyn StatusDisplay>,
}

impl Render {
    pub fn new(display: Box<dyn StatusDisplay>) -> Self {
        Self { display }
    }

    pub fn init(&mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.display.init()
    }

    pub fn render(&mut self, state: &State) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.display.clear()?;
        for (line, text) in status_lines(state).iter().enumerate() {
            self.display.write_line(line as u8, text)?;
        }
        self.display.flush()
    }
}
