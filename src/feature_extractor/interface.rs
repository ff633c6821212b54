use crate::activation::Activation;
use crate::error::Result;
use crate::frame_source::frame::Frame;

/// A frozen, forward-only network turning a frame into an activation.
pub trait FeatureExtractor {
    /// Side of the square frame this extractor accepts.
    fn input_size(&self) -> u32;
    fn extract(&self, frame: &Frame) -> Result<Activation>;
}
