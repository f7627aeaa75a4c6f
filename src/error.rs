use std::path::PathBuf;
use std::process::ExitStatus;

/// Errors surfaced by dataset preparation, training and detection.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("training process exited unsuccessfully ({status})")]
    TrainingFailed { status: ExitStatus },
    #[error("detection process exited unsuccessfully ({status}): {stderr}")]
    DetectionFailed { status: ExitStatus, stderr: String },
    #[error("weights file not found: {}", .0.display())]
    MissingWeights(PathBuf),
    #[error("invalid class schema: {0}")]
    InvalidSchema(String),
    #[error("malformed detection line {line:?}: {reason}")]
    MalformedDetection { line: String, reason: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
