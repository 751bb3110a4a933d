use super::{InvocationResult, InvokeOptions, Worker};
use crate::error::WorkerError;
use crate::request::PredictionRequest;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::{ChildStdin, Command};
use tokio::time::timeout as tokio_timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Runs `interpreter script` in the script's own directory and speaks the
/// five-line stdin protocol.
pub struct ProcessWorker {
    pub name: String,
    pub interpreter: PathBuf,
    pub script: PathBuf,
    /// Relative paths are resolved against the script's directory
    pub artifacts: Vec<PathBuf>,
}

#[async_trait]
impl Worker for ProcessWorker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(
        &self,
        request: &PredictionRequest,
        options: &InvokeOptions,
    ) -> InvocationResult {
        match self.run(request, options).await {
            Ok(result) => result,
            Err(e) => {
                warn!("Worker {} could not be started: {}", self.name, e);
                InvocationResult::spawn_failure(e)
            }
        }
    }
}

impl ProcessWorker {
    /// Script and artifact paths that do not exist on disk
    pub fn missing_files(&self) -> Vec<PathBuf> {
        let mut missing = Vec::new();
        if !self.script.is_file() {
            missing.push(self.script.clone());
        }
        let dir = script_dir(&self.script);
        for artifact in &self.artifacts {
            let path = dir.join(artifact);
            if !path.exists() {
                missing.push(path);
            }
        }
        missing
    }

    fn preflight(&self) -> Result<PathBuf, WorkerError> {
        let script = std::fs::canonicalize(&self.script)
            .map_err(|_| WorkerError::ScriptNotFound(self.script.clone()))?;
        if !script.is_file() {
            return Err(WorkerError::ScriptNotFound(self.script.clone()));
        }

        let dir = script_dir(&script);
        for artifact in &self.artifacts {
            let path = dir.join(artifact);
            if !path.exists() {
                return Err(WorkerError::ArtifactNotFound(path));
            }
        }

        Ok(script)
    }

    async fn run(
        &self,
        request: &PredictionRequest,
        options: &InvokeOptions,
    ) -> Result<InvocationResult, WorkerError> {
        let script = self.preflight()?;
        let working_dir = script_dir(&script);

        let mut cmd = command_for(&self.interpreter);
        cmd.arg(&script)
            .current_dir(&working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let start = std::time::Instant::now();
        let mut child = cmd.spawn().map_err(WorkerError::Spawn)?;
        debug!(
            "Worker {} started (pid {:?}) in {}",
            self.name,
            child.id(),
            working_dir.display()
        );

        if let Some(mut stdin) = child.stdin.take() {
            match write_protocol(&mut stdin, &request.protocol_lines()).await {
                Ok(()) => {}
                // The worker may exit before reading its input; its exit status tells the story
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                    debug!("Worker {} closed stdin early", self.name);
                }
                Err(e) => return Err(WorkerError::Stdin(e)),
            }
        }

        let output = tokio::select! {
            waited = tokio_timeout(options.timeout, child.wait_with_output()) => match waited {
                Ok(output) => output?,
                Err(_) => {
                    warn!("Worker {} timed out after {:?}", self.name, options.timeout);
                    return Ok(InvocationResult::TimedOut { after: options.timeout });
                }
            },
            _ = cancelled(options.cancel.as_ref()) => {
                info!("Worker {} cancelled", self.name);
                return Ok(InvocationResult::Cancelled);
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let exit_code = output.status.code().unwrap_or(-1);

        debug!(
            "Worker {} exited with code {} in {:?}",
            self.name,
            exit_code,
            start.elapsed()
        );
        debug!("Worker {} stdout: {}", self.name, stdout);
        if !stderr.is_empty() {
            debug!("Worker {} stderr: {}", self.name, stderr);
        }

        if output.status.success() {
            Ok(InvocationResult::Success { raw_text: stdout })
        } else {
            Ok(InvocationResult::ProcessError {
                exit_code,
                stderr_text: stderr,
            })
        }
    }
}

/// Write the protocol lines, then close the stream so the worker sees EOF
async fn write_protocol(stdin: &mut ChildStdin, lines: &[String]) -> std::io::Result<()> {
    for line in lines {
        stdin.write_all(line.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
    }
    stdin.shutdown().await
}

async fn cancelled(token: Option<&CancellationToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}

fn script_dir(script: &Path) -> PathBuf {
    match script.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Use the path as-is when it has a separator, else let the OS search PATH
fn command_for(binary: &Path) -> Command {
    let binary_str = binary.to_string_lossy();
    if binary_str.contains('/') || binary_str.contains('\\') {
        Command::new(binary)
    } else {
        Command::new(binary_str.as_ref())
    }
}

/// Run `interpreter --version` and return what it printed
pub async fn probe_interpreter(
    interpreter: &Path,
    timeout: Duration,
) -> Result<String, WorkerError> {
    let output = tokio_timeout(
        timeout,
        command_for(interpreter)
            .arg("--version")
            .kill_on_drop(true)
            .output(),
    )
    .await
    .map_err(|_| {
        WorkerError::Io(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "interpreter version check timed out",
        ))
    })?
    .map_err(WorkerError::Spawn)?;

    // Older interpreters print their version on stderr
    let text = if output.stdout.is_empty() {
        output.stderr
    } else {
        output.stdout
    };
    Ok(String::from_utf8_lossy(&text).trim().to_string())
}
