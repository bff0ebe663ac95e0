//! Error types for the engine and its collaborators.

use thiserror::Error;

/// Errors raised while reducing a keypoint set.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HandError {
    #[error("hand needs exactly {expected} keypoints, got {found}")]
    KeypointCount { expected: usize, found: usize },
}

/// A failed or rejected pose estimation. Recoverable: the detection loop keeps going.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EstimatorError {
    #[error("hand estimation failed: {0}")]
    Failed(String),

    #[error("detection worker is gone")]
    Disconnected,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum RecordingError {
    #[error("failed to read recording: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed recording: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("recording has fps {0}, expected a positive value")]
    InvalidFps(f64),
}
