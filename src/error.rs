use thiserror::Error;

use crate::controller::LoopState;

/// Failures from the video capture boundary.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CaptureError {
    #[error("camera permission denied: {0}")]
    PermissionDenied(String),
    #[error("camera device unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("failed to grab frame: {0}")]
    Frame(String),
}

#[derive(Debug, Clone, Error, PartialEq)]
#[error("failed to load landmark model: {0}")]
pub struct ModelLoadError(pub String);

#[derive(Debug, Clone, Error, PartialEq)]
#[error("landmark inference failed: {0}")]
pub struct InferenceError(pub String);

/// Fatal failures while bringing the pipeline up. The loop moves to
/// `Stopped` and reports the error once.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SetupError {
    #[error(transparent)]
    Camera(#[from] CaptureError),
    #[error(transparent)]
    ModelLoad(#[from] ModelLoadError),
    #[error("pipeline cannot start from state {0:?}")]
    InvalidState(LoopState),
}

/// Failures confined to a single tick. The loop keeps running.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TickError {
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error("tick requested while pipeline is {0:?}")]
    NotRunning(LoopState),
}

/// A landmark source produced fewer points than an overlay or anchor
/// references. The offending item is disabled for the rest of the run.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{item} needs landmark index {required} but prediction has {available} points")]
pub struct ContractViolation {
    pub item: String,
    pub required: usize,
    pub available: usize,
}
