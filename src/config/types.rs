use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::defaults::*;

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,

    /// Deployment mode; `production` redacts worker diagnostics from responses
    #[serde(default)]
    pub environment: Environment,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    pub worker: WorkerConfig,

    #[serde(default)]
    pub parser: ParserConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    pub fn is_hardened(self) -> bool {
        self == Environment::Production
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            _ => Err(format!("Unknown environment: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Origins allowed by CORS outside development mode
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct RateLimitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Admissions allowed per client inside one window
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,

    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    /// How often idle clients are evicted from the counter store
    #[serde(default = "default_sweep_interval_sec")]
    pub sweep_interval_sec: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: default_max_requests(),
            window_ms: default_window_ms(),
            sweep_interval_sec: default_sweep_interval_sec(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct WorkerConfig {
    /// Program used to run the worker scripts (PATH lookup for bare names)
    #[serde(default = "default_interpreter")]
    pub interpreter: PathBuf,

    /// Base directory that season scripts are resolved against
    #[serde(default = "default_models_dir")]
    pub models_dir: PathBuf,

    #[serde(default = "default_timeout_sec")]
    pub timeout_sec: u64,

    #[serde(default = "SeasonWorkerConfig::kharif")]
    pub kharif: SeasonWorkerConfig,

    #[serde(default = "SeasonWorkerConfig::rabi")]
    pub rabi: SeasonWorkerConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            models_dir: default_models_dir(),
            timeout_sec: default_timeout_sec(),
            kharif: SeasonWorkerConfig::kharif(),
            rabi: SeasonWorkerConfig::rabi(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct SeasonWorkerConfig {
    /// Script path, relative to `models_dir` unless absolute
    pub script: PathBuf,

    /// Files the script loads at startup, relative to the script's directory
    #[serde(default)]
    pub artifacts: Vec<PathBuf>,
}

impl SeasonWorkerConfig {
    pub fn kharif() -> Self {
        Self {
            script: default_kharif_script(),
            artifacts: default_kharif_artifacts(),
        }
    }

    pub fn rabi() -> Self {
        Self {
            script: default_rabi_script(),
            artifacts: default_rabi_artifacts(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
pub struct ParserConfig {
    /// Reject the whole output when any plan or record fails to parse
    #[serde(default)]
    pub strict: bool,
}
