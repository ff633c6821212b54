use crate::error::Result;
use crate::frame_source::frame::Frame;

pub trait FrameSource {
    /// Must succeed before any `capture` is valid.
    fn setup(&mut self) -> Result<()>;
    /// Most recent frame, already normalized to the extractor's square input size.
    fn capture(&mut self) -> Result<Frame>;
}
