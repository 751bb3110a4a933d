use crate::config::WorkerConfig;
use crate::request::Season;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

use super::process::probe_interpreter;
use super::process_worker;

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Serialize)]
pub struct InterpreterStatus {
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeasonStatus {
    pub season: Season,
    pub script: PathBuf,
    pub ready: bool,
    pub missing: Vec<PathBuf>,
}

/// Whether the configured workers can run on this host
#[derive(Debug, Clone, Serialize)]
pub struct SetupReport {
    pub status: &'static str,
    pub interpreter: InterpreterStatus,
    pub workers: Vec<SeasonStatus>,
}

impl SetupReport {
    pub fn all_ready(&self) -> bool {
        self.interpreter.version.is_some() && self.workers.iter().all(|w| w.ready)
    }

    /// Strip filesystem paths and interpreter diagnostics
    pub fn redacted(&self) -> Self {
        Self {
            status: self.status,
            interpreter: InterpreterStatus {
                path: PathBuf::new(),
                version: self.interpreter.version.clone(),
                error: self
                    .interpreter
                    .error
                    .as_ref()
                    .map(|_| "interpreter not available".to_string()),
            },
            workers: self
                .workers
                .iter()
                .map(|w| SeasonStatus {
                    season: w.season,
                    script: PathBuf::new(),
                    ready: w.ready,
                    missing: Vec::new(),
                })
                .collect(),
        }
    }
}

/// Probe the interpreter and look for each season's script and artifacts
pub async fn check_setup(config: &WorkerConfig) -> SetupReport {
    let interpreter = match probe_interpreter(&config.interpreter, PROBE_TIMEOUT).await {
        Ok(version) => InterpreterStatus {
            path: config.interpreter.clone(),
            version: Some(version),
            error: None,
        },
        Err(e) => InterpreterStatus {
            path: config.interpreter.clone(),
            version: None,
            error: Some(e.to_string()),
        },
    };

    let workers = Season::ALL
        .into_iter()
        .map(|season| {
            let worker = process_worker(config, season);
            let missing = worker.missing_files();
            SeasonStatus {
                season,
                script: worker.script,
                ready: missing.is_empty(),
                missing,
            }
        })
        .collect();

    let mut report = SetupReport {
        status: "success",
        interpreter,
        workers,
    };
    if !report.all_ready() {
        report.status = "error";
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_interpreter_and_scripts() {
        let dir = TempDir::new().unwrap();
        let config = WorkerConfig {
            interpreter: PathBuf::from("/nonexistent/python-interpreter"),
            models_dir: dir.path().to_path_buf(),
            ..WorkerConfig::default()
        };

        let report = check_setup(&config).await;
        assert!(!report.all_ready());
        assert_eq!(report.status, "error");
        assert!(report.interpreter.error.is_some());
        assert_eq!(report.workers.len(), 2);
        // script plus two artifacts per season
        assert!(report.workers.iter().all(|w| w.missing.len() == 3));

        let redacted = serde_json::to_string(&report.redacted()).unwrap();
        assert!(!redacted.contains("nonexistent"));
        assert!(!redacted.contains(&dir.path().display().to_string()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_ready_when_everything_exists() {
        let dir = TempDir::new().unwrap();
        for season in Season::ALL {
            let season_config = WorkerConfig::default().season(season).clone();
            let script = dir.path().join(&season_config.script);
            let script_dir = script.parent().unwrap();
            std::fs::create_dir_all(script_dir).unwrap();
            std::fs::write(&script, "print('ok')\n").unwrap();
            for artifact in &season_config.artifacts {
                std::fs::write(script_dir.join(artifact), b"x").unwrap();
            }
        }
        let config = WorkerConfig {
            interpreter: PathBuf::from("sh"),
            models_dir: dir.path().to_path_buf(),
            ..WorkerConfig::default()
        };

        let report = check_setup(&config).await;
        assert!(report.workers.iter().all(|w| w.ready), "{:?}", report);
    }
}
