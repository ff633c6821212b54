use crate::feature_extractor::model_config::{InputLayout, ModelConfig};
use crate::frame_source::normalize::ResizePolicy;
use crate::training::TrainOptions;
use chrono::Offset;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayKind {
    Console,
    Gui,
    None,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub logger_timezone: chrono::FixedOffset,
    /// Side of the square frame handed to the feature extractor.
    pub frame_size: u32,
    pub resize_policy: ResizePolicy,
    /// Cells per side used by the pooling extractor when no model is configured.
    pub pooling_grid: usize,
    pub train_options: TrainOptions,
    pub display: DisplayKind,
    pub model: Option<ModelConfig>,
    pub frames_dir: Option<PathBuf>,
    pub fake_frame_noise: f32,
    pub idle_poll: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logger_timezone: chrono::Utc.fix(),
            frame_size: 224,
            resize_policy: ResizePolicy::CenterCrop,
            pooling_grid: 16,
            train_options: TrainOptions::default(),
            display: DisplayKind::Console,
            model: None,
            frames_dir: None,
            fake_frame_noise: 0.05,
            idle_poll: Duration::from_millis(16),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Overlays `TRANSFER_CAM_*` variables on the defaults. Unparseable values are ignored.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(offset) = var("TRANSFER_CAM_UTC_OFFSET_HOURS")
            .and_then(|hours| hours.parse::<i32>().ok())
            .and_then(|hours| chrono::FixedOffset::east_opt(hours * 3600))
        {
            config.logger_timezone = offset;
        }

        if let Some(policy) = var("TRANSFER_CAM_RESIZE").and_then(|v| ResizePolicy::parse(&v)) {
            config.resize_policy = policy;
        }

        if let Some(display) = var("TRANSFER_CAM_DISPLAY") {
            match display.to_lowercase().as_str() {
                "console" => config.display = DisplayKind::Console,
                "gui" => config.display = DisplayKind::Gui,
                "none" => config.display = DisplayKind::None,
                _ => {}
            }
        }

        if let Some(epochs) = var("TRANSFER_CAM_EPOCHS").and_then(|v| v.parse().ok()) {
            config.train_options.epochs = epochs;
        }

        if let Some(seed) = var("TRANSFER_CAM_SEED").and_then(|v| v.parse().ok()) {
            config.train_options.seed = Some(seed);
        }

        if let Some(path) = var("TRANSFER_CAM_MODEL") {
            let layout = var("TRANSFER_CAM_MODEL_LAYOUT")
                .and_then(|v| InputLayout::parse(&v))
                .unwrap_or(InputLayout::Nchw);
            config.model = Some(ModelConfig {
                onnx_model_path: PathBuf::from(path),
                input_size: config.frame_size,
                layout,
                output_name: var("TRANSFER_CAM_MODEL_OUTPUT"),
            });
        }

        config.frames_dir = var("TRANSFER_CAM_FRAMES_DIR").map(PathBuf::from);

        config
    }
}
