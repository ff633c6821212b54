use crate::activation::Activation;
use crate::error::{Error, Result};
use crate::feature_extractor::interface::FeatureExtractor;
use crate::feature_extractor::model_config::{InputLayout, ModelConfig};
use crate::frame_source::frame::{Frame, CHANNELS};
use crate::library::logger::interface::Logger;
use std::sync::Arc;
use tract_onnx::prelude::*;

/// Pretrained ONNX network (e.g. MobileNet) read up to an internal layer.
pub struct FeatureExtractorTractOnnx {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>, TypedModel>,
    config: ModelConfig,
}

impl FeatureExtractorTractOnnx {
    pub fn new(config: ModelConfig, logger: Arc<dyn Logger + Send + Sync>) -> Result<Self> {
        let logger = logger.with_namespace("feature_extractor");
        let resource = config.onnx_model_path.display().to_string();
        logger.info(&format!("Loading {}", resource)).ok();

        let shape = config.layout.input_shape(config.input_size as usize);
        let load = || -> TractResult<SimplePlan<TypedFact, Box<dyn TypedOp>, TypedModel>> {
            let mut model = tract_onnx::onnx()
                .model_for_path(&config.onnx_model_path)?
                .with_input_fact(0, f32::fact(shape).into())?;
            if let Some(output_name) = &config.output_name {
                model.set_output_names([output_name.as_str()])?;
            }
            model.into_optimized()?.into_runnable()
        };

        let model = load().map_err(|e| Error::external_load(resource.clone(), e))?;
        logger.info(&format!("Loaded {}", resource)).ok();

        Ok(Self { model, config })
    }

    fn frame_to_tensor(&self, frame: &Frame) -> Tensor {
        let size = self.config.input_size as usize;
        match self.config.layout {
            InputLayout::Nchw => {
                tract_ndarray::Array4::from_shape_fn((1, CHANNELS, size, size), |(_, c, y, x)| {
                    frame.pixel(y, x).map_or(0.0, |rgb| rgb[c])
                })
                .into_tensor()
            }
            InputLayout::Nhwc => {
                tract_ndarray::Array4::from_shape_fn((1, size, size, CHANNELS), |(_, y, x, c)| {
                    frame.pixel(y, x).map_or(0.0, |rgb| rgb[c])
                })
                .into_tensor()
            }
        }
    }
}

impl FeatureExtractor for FeatureExtractorTractOnnx {
    fn input_size(&self) -> u32 {
        self.config.input_size
    }

    fn extract(&self, frame: &Frame) -> Result<Activation> {
        let size = self.config.input_size as usize;
        if frame.shape() != [size, size, CHANNELS] {
            return Err(Error::shape_mismatch(&[size, size, CHANNELS], &frame.shape()));
        }

        let input = self.frame_to_tensor(frame);
        let outputs = self
            .model
            .run(tvec!(input.into_tvalue()))
            .map_err(Error::inference)?;
        let output = outputs
            .first()
            .ok_or_else(|| Error::inference("model produced no output"))?
            .to_array_view::<f32>()
            .map_err(Error::inference)?;

        // drop the batch dimension
        let shape: Vec<usize> = output.shape().iter().skip(1).copied().collect();
        Activation::new(shape, output.iter().copied().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::logger::impl_console::LoggerConsole;
    use chrono::Offset;
    use std::path::PathBuf;

    #[test]
    fn test_missing_model_is_a_load_failure() {
        let config = ModelConfig {
            onnx_model_path: PathBuf::from("/no/such/mobilenet.onnx"),
            input_size: 224,
            layout: InputLayout::Nchw,
            output_name: None,
        };
        let logger = Arc::new(LoggerConsole::new(chrono::Utc.fix()));

        let result = FeatureExtractorTractOnnx::new(config, logger);

        match result {
            Err(err) => assert!(err.is_fatal()),
            Ok(_) => panic!("expected a load failure"),
        }
    }
}
