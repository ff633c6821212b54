use thiserror::Error;

/// Every way an operation on the session or one of its collaborators can be rejected.
#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("add some examples before training")]
    EmptyDataset,

    #[error(
        "batch size is 0 for {dataset_size} examples with fraction {fraction}, choose a larger fraction"
    )]
    InvalidBatchSize { dataset_size: usize, fraction: f64 },

    #[error("shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    #[error("invalid label {index}: expected an index below {num_classes}")]
    InvalidLabel { index: usize, num_classes: usize },

    #[error("failed to load {resource}: {reason}")]
    ExternalLoadFailure { resource: String, reason: String },

    #[error("session is not ready: {0}")]
    NotReady(String),

    #[error("busy: {0}")]
    Busy(String),

    #[error("no trained classifier, train before predicting")]
    NotTrained,

    #[error("invalid options: {0}")]
    InvalidOptions(String),

    #[error("capture failed: {0}")]
    Capture(String),

    #[error("inference failed: {0}")]
    Inference(String),
}

impl Error {
    pub fn shape_mismatch(expected: &[usize], actual: &[usize]) -> Self {
        Self::ShapeMismatch {
            expected: format!("{:?}", expected),
            actual: format!("{:?}", actual),
        }
    }

    pub fn external_load(resource: impl Into<String>, reason: impl ToString) -> Self {
        Self::ExternalLoadFailure {
            resource: resource.into(),
            reason: reason.to_string(),
        }
    }

    pub fn capture(reason: impl ToString) -> Self {
        Self::Capture(reason.to_string())
    }

    pub fn inference(reason: impl ToString) -> Self {
        Self::Inference(reason.to_string())
    }

    /// Fatal errors end the session; everything else only rejects one operation.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ExternalLoadFailure { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_mismatch_lists_both_shapes() {
        let err = Error::shape_mismatch(&[7, 7, 256], &[7, 7, 3]);
        assert!(err.to_string().contains("[7, 7, 256]"));
        assert!(err.to_string().contains("[7, 7, 3]"));
    }

    #[test]
    fn only_load_failures_are_fatal() {
        assert!(Error::external_load("model.onnx", "not found").is_fatal());
        assert!(!Error::EmptyDataset.is_fatal());
        assert!(!Error::capture("camera unplugged").is_fatal());
    }

    #[test]
    fn invalid_batch_size_mentions_fraction() {
        let err = Error::InvalidBatchSize {
            dataset_size: 2,
            fraction: 0.4,
        };
        assert!(err.to_string().contains("0.4"));
        assert!(err.to_string().contains("2 examples"));
    }
}
