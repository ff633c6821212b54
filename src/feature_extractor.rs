pub mod impl_pooling;
pub mod impl_tract_onnx;
pub mod interface;
pub mod model_config;
