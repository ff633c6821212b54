use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputLayout {
    /// `[1, 3, size, size]`
    Nchw,
    /// `[1, size, size, 3]`
    Nhwc,
}

impl InputLayout {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "nchw" => Some(Self::Nchw),
            "nhwc" => Some(Self::Nhwc),
            _ => None,
        }
    }

    pub fn input_shape(&self, size: usize) -> [usize; 4] {
        match self {
            Self::Nchw => [1, 3, size, size],
            Self::Nhwc => [1, size, size, 3],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub onnx_model_path: PathBuf,
    pub input_size: u32,
    pub layout: InputLayout,
    /// Internal node to read the activation from, e.g. the last pointwise conv.
    pub output_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_shape_per_layout() {
        assert_eq!(InputLayout::Nchw.input_shape(224), [1, 3, 224, 224]);
        assert_eq!(InputLayout::Nhwc.input_shape(224), [1, 224, 224, 3]);
    }

    #[test]
    fn test_parse_layout() {
        assert_eq!(InputLayout::parse("NCHW"), Some(InputLayout::Nchw));
        assert_eq!(InputLayout::parse("nhwc"), Some(InputLayout::Nhwc));
        assert_eq!(InputLayout::parse("chw"), None);
    }
}
