use crate::error::{Error, Result};

pub const CHANNELS: usize = 3;

/// One captured image, height x width x RGB, values in `[-1, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    height: usize,
    width: usize,
    data: Vec<f32>,
}

impl Frame {
    pub fn new(height: usize, width: usize, data: Vec<f32>) -> Result<Self> {
        if height == 0 || width == 0 || data.len() != height * width * CHANNELS {
            return Err(Error::ShapeMismatch {
                expected: format!("[{}, {}, {}]", height, width, CHANNELS),
                actual: format!("{} values", data.len()),
            });
        }
        Ok(Self {
            height,
            width,
            data,
        })
    }

    pub fn filled(height: usize, width: usize, rgb: [f32; 3]) -> Self {
        let data = (0..height * width).flat_map(|_| rgb).collect();
        Self {
            height,
            width,
            data,
        }
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn shape(&self) -> [usize; 3] {
        [self.height, self.width, CHANNELS]
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// RGB at row `y`, column `x`, `None` outside the frame.
    pub fn pixel(&self, y: usize, x: usize) -> Option<[f32; 3]> {
        if y >= self.height || x >= self.width {
            return None;
        }
        let i = (y * self.width + x) * CHANNELS;
        Some([self.data[i], self.data[i + 1], self.data[i + 2]])
    }
}
