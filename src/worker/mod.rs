mod process;
mod setup;

pub use process::ProcessWorker;
pub use setup::{check_setup, SetupReport};

use crate::config::WorkerConfig;
use crate::error::WorkerError;
use crate::request::{PredictionRequest, Season};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Outcome of a single worker invocation
#[derive(Debug, Clone, PartialEq)]
pub enum InvocationResult {
    /// Exit code 0; stdout as text
    Success { raw_text: String },
    /// Non-zero exit (or killed by a signal, reported as -1)
    ProcessError { exit_code: i32, stderr_text: String },
    /// The process could not be started at all
    SpawnFailure { reason: String, not_found: bool },
    TimedOut { after: Duration },
    Cancelled,
}

impl InvocationResult {
    pub fn spawn_failure(err: WorkerError) -> Self {
        InvocationResult::SpawnFailure {
            not_found: err.is_not_found(),
            reason: err.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InvokeOptions {
    pub timeout: Duration,
    pub cancel: Option<CancellationToken>,
}

impl InvokeOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            cancel: None,
        }
    }
}

#[async_trait]
pub trait Worker: Send + Sync {
    fn name(&self) -> &str;

    /// Run one prediction. Never pools or reuses processes.
    async fn invoke(&self, request: &PredictionRequest, options: &InvokeOptions)
        -> InvocationResult;
}

pub fn process_worker(config: &WorkerConfig, season: Season) -> ProcessWorker {
    ProcessWorker {
        name: season.to_string(),
        interpreter: config.interpreter.clone(),
        script: config.script_path(season),
        artifacts: config.season(season).artifacts.clone(),
    }
}

/// Create the process-backed worker for a season
pub fn create_worker(config: &WorkerConfig, season: Season) -> Arc<dyn Worker> {
    Arc::new(process_worker(config, season))
}
