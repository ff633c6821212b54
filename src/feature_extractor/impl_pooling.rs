use crate::activation::Activation;
use crate::error::{Error, Result};
use crate::feature_extractor::interface::FeatureExtractor;
use crate::frame_source::frame::{Frame, CHANNELS};

/// Average-pools the frame into a `grid x grid x 3` activation.
///
/// Stands in for a pretrained network when no model file is configured: it keeps
/// coarse color and layout information, which is enough to separate distinct scenes.
pub struct FeatureExtractorPooling {
    input_size: u32,
    grid: usize,
}

impl FeatureExtractorPooling {
    pub fn new(input_size: u32, grid: usize) -> Result<Self> {
        if grid == 0 || grid > input_size as usize {
            return Err(Error::InvalidOptions(format!(
                "pooling grid {} must be between 1 and the frame size {}",
                grid, input_size
            )));
        }
        Ok(Self { input_size, grid })
    }

    pub fn activation_shape(&self) -> [usize; 3] {
        [self.grid, self.grid, CHANNELS]
    }
}

impl FeatureExtractor for FeatureExtractorPooling {
    fn input_size(&self) -> u32 {
        self.input_size
    }

    fn extract(&self, frame: &Frame) -> Result<Activation> {
        let size = self.input_size as usize;
        if frame.shape() != [size, size, CHANNELS] {
            return Err(Error::shape_mismatch(&[size, size, CHANNELS], &frame.shape()));
        }

        let g = self.grid;
        let mut data = vec![0.0f32; g * g * CHANNELS];
        for gy in 0..g {
            let (y0, y1) = (gy * size / g, (gy + 1) * size / g);
            for gx in 0..g {
                let (x0, x1) = (gx * size / g, (gx + 1) * size / g);
                let count = ((y1 - y0) * (x1 - x0)) as f32;
                let cell = &mut data[(gy * g + gx) * CHANNELS..(gy * g + gx + 1) * CHANNELS];
                for y in y0..y1 {
                    let row = &frame.data()[(y * size + x0) * CHANNELS..(y * size + x1) * CHANNELS];
                    for pixel in row.chunks(CHANNELS) {
                        for (sum, value) in cell.iter_mut().zip(pixel) {
                            *sum += value;
                        }
                    }
                }
                for value in cell.iter_mut() {
                    *value /= count;
                }
            }
        }

        Activation::new(self.activation_shape().to_vec(), data)
    }
}
