pub mod check;
pub mod parse;
pub mod predict;
pub mod schema;
pub mod serve;

use crate::config::{Config, Environment};
use crate::request::Season;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;

pub const DEFAULT_CONFIG: &str = "cropbridge.yaml";

#[derive(Parser)]
#[command(name = "cropbridge")]
#[command(
    author,
    version,
    about = "HTTP bridge to crop-rotation prediction workers"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose/debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the prediction API over HTTP
    Serve(ServeArgs),

    /// Run one prediction through a worker and print the JSON envelope
    Predict(PredictArgs),

    /// Parse captured worker output (file or stdin) into plans
    Parse(ParseArgs),

    /// Check that the interpreter, scripts and model artifacts are present
    Check(CheckArgs),

    /// Print JSON Schema for config validation
    Schema,
}

#[derive(Parser, Clone)]
pub struct ServeArgs {
    /// Path to config file (default: cropbridge.yaml if present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override listen port
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Override bind address
    #[arg(long, env = "BIND_ADDRESS")]
    pub bind: Option<String>,

    /// Allowed CORS origins in production (comma-separated)
    #[arg(long, env = "ALLOWED_ORIGINS", value_delimiter = ',')]
    pub allowed_origins: Option<Vec<String>>,

    /// Override admissions per client per window
    #[arg(long, env = "MAX_REQUESTS_PER_IP")]
    pub max_requests: Option<u32>,

    /// Override rate-limit window in milliseconds
    #[arg(long, env = "RATE_LIMIT_WINDOW_MS")]
    pub window_ms: Option<u64>,

    /// Override deployment environment (development | production)
    #[arg(long, env = "DEPLOY_ENV")]
    pub environment: Option<Environment>,

    /// Override worker timeout in seconds
    #[arg(long, env = "WORKER_TIMEOUT_SEC")]
    pub timeout: Option<u64>,

    /// Override directory holding the worker scripts
    #[arg(long)]
    pub models_dir: Option<PathBuf>,
}

#[derive(Parser, Clone)]
pub struct PredictArgs {
    /// kharif or rabi
    pub season: Season,

    /// Nitrogen (0-500)
    #[arg(short = 'n', long)]
    pub n_value: f64,

    /// Phosphorus (0-500)
    #[arg(short = 'p', long)]
    pub p_value: f64,

    /// Potassium (0-500)
    #[arg(short = 'k', long)]
    pub k_value: f64,

    /// Region name, e.g. Bangalore
    #[arg(short, long)]
    pub region: String,

    /// Field area in hectares
    #[arg(short, long)]
    pub area: f64,

    /// Path to config file (default: cropbridge.yaml if present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override worker timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

#[derive(Parser, Clone)]
pub struct ParseArgs {
    /// File with captured worker stdout (reads stdin when omitted)
    #[arg(value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Fail if any record is malformed
    #[arg(long)]
    pub strict: bool,
}

#[derive(Parser, Clone)]
pub struct CheckArgs {
    /// Path to config file (default: cropbridge.yaml if present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Load the explicit config, or `cropbridge.yaml` when present, or defaults
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let default_path = Path::new(DEFAULT_CONFIG);
    let config = Config::load_or_default(path, default_path)?;
    match path {
        Some(p) => info!("Loaded config from {:?}", p),
        None if default_path.exists() => info!("Loaded config from {}", DEFAULT_CONFIG),
        None => info!("No {} found, using defaults", DEFAULT_CONFIG),
    }
    Ok(config)
}
