use crate::error::{Error, Result};

/// Output of the frozen feature extractor for one frame, without the batch dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct Activation {
    shape: Vec<usize>,
    data: Vec<f32>,
}

impl Activation {
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if shape.is_empty() || expected != data.len() {
            return Err(Error::ShapeMismatch {
                expected: format!("{:?} ({} values)", shape, expected),
                actual: format!("{} values", data.len()),
            });
        }
        Ok(Self { shape, data })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Number of values once flattened.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
