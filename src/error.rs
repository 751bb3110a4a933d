use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::parser::PlanParseError;
use crate::request::FieldViolation;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid bind address '{0}'")]
    BindAddress(String),

    #[error("Rate limit must allow at least one request per window")]
    ZeroRateLimit,

    #[error("Rate limit window must be longer than zero")]
    ZeroWindow,

    #[error("Rate limit sweep interval must be longer than zero")]
    ZeroSweepInterval,

    #[error("Unsupported config version {0} (expected {1})")]
    UnsupportedVersion(u32, u32),

    #[error("Worker timeout must be longer than zero")]
    ZeroTimeout,
}

/// Failures raised while talking to a worker process. These never escape the
/// worker module directly; they are folded into an `InvocationResult`.
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Worker script not found: {}", .0.display())]
    ScriptNotFound(PathBuf),

    #[error("Model artifact not found: {}", .0.display())]
    ArtifactNotFound(PathBuf),

    #[error("Failed to start worker process: {0}")]
    Spawn(std::io::Error),

    #[error("Failed to write worker input: {0}")]
    Stdin(std::io::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    /// True when the worker (or its model) is simply not installed.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            WorkerError::ScriptNotFound(_) | WorkerError::ArtifactNotFound(_)
        )
    }
}

/// Every way a prediction can fail, as seen by the caller.
#[derive(Error, Debug)]
pub enum PredictionError {
    #[error("Validation failed")]
    InvalidInput(Vec<FieldViolation>),

    #[error("Too many requests from this client, please try again later")]
    RateLimited,

    #[error("Prediction worker unavailable: {reason}")]
    WorkerUnavailable { reason: String, not_found: bool },

    #[error("Prediction process failed with exit code {exit_code}: {stderr}")]
    WorkerFailed { exit_code: i32, stderr: String },

    #[error("Prediction process timed out after {0:?}")]
    WorkerTimeout(Duration),

    #[error("Prediction was cancelled before the worker finished")]
    Cancelled,

    #[error("Error parsing prediction output: {}", summarize(.errors))]
    MalformedOutput {
        errors: Vec<PlanParseError>,
        raw_output: String,
    },
}

fn summarize(errors: &[PlanParseError]) -> String {
    match errors {
        [] => "no output received from prediction worker".to_string(),
        [only] => only.to_string(),
        [first, rest @ ..] => format!("{} (and {} more)", first, rest.len()),
    }
}
