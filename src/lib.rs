pub mod activation;
pub mod classifier_head;
pub mod config;
pub mod display;
pub mod error;
pub mod example_store;
pub mod feature_extractor;
pub mod frame_source;
pub mod host;
pub mod library;
pub mod session;
pub mod training;
