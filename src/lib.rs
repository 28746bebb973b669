pub mod anchor;
pub mod camera;
pub mod config;
pub mod control;
pub mod controller;
pub mod detector;
pub mod error;
pub mod geometry;
#[cfg(feature = "onnx")]
pub mod inference;
pub mod landmarks;
pub mod output;
pub mod overlays;
pub mod pipeline;
pub mod scene;
pub mod stats;
pub mod types;
