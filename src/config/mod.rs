mod defaults;
mod types;

pub use types::*;

use crate::error::ConfigError;
use crate::request::Season;
use defaults::*;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            environment: Environment::default(),
            server: ServerConfig::default(),
            rate_limit: RateLimitConfig::default(),
            worker: WorkerConfig::default(),
            parser: ParserConfig::default(),
        }
    }
}

impl Config {
    /// Load config from a YAML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load from `path` when given, else from `default_path` if present, else defaults
    pub fn load_or_default(path: Option<&Path>, default_path: &Path) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load(p),
            None if default_path.exists() => Self::load(default_path),
            None => Ok(Self::default()),
        }
    }

    /// Validate the config
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != CONFIG_VERSION {
            return Err(ConfigError::UnsupportedVersion(self.version, CONFIG_VERSION));
        }
        self.socket_addr()?;

        if self.rate_limit.enabled {
            if self.rate_limit.max_requests == 0 {
                return Err(ConfigError::ZeroRateLimit);
            }
            if self.rate_limit.window_ms == 0 {
                return Err(ConfigError::ZeroWindow);
            }
            if self.rate_limit.sweep_interval_sec == 0 {
                return Err(ConfigError::ZeroSweepInterval);
            }
        }

        if self.worker.timeout_sec == 0 {
            return Err(ConfigError::ZeroTimeout);
        }

        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.server.bind, self.server.port);
        addr.parse().map_err(|_| ConfigError::BindAddress(addr))
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

impl WorkerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_sec)
    }

    pub fn season(&self, season: Season) -> &SeasonWorkerConfig {
        match season {
            Season::Kharif => &self.kharif,
            Season::Rabi => &self.rabi,
        }
    }

    /// Absolute-or-relative path of the season's script, resolved against `models_dir`
    pub fn script_path(&self, season: Season) -> PathBuf {
        let script = &self.season(season).script;
        if script.is_absolute() {
            script.clone()
        } else {
            self.models_dir.join(script)
        }
    }
}
