use crate::cli::{load_config, ServeArgs};
use crate::config::Config;
use crate::server;
use tracing::info;

pub async fn execute(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    apply_overrides(&mut config, args);
    config.validate()?;

    info!(
        "Workers: {} (timeout {}s), rate limit {}",
        config.worker.interpreter.display(),
        config.worker.timeout_sec,
        if config.rate_limit.enabled {
            format!(
                "{} per {}ms",
                config.rate_limit.max_requests, config.rate_limit.window_ms
            )
        } else {
            "disabled".to_string()
        }
    );
    server::run_serve(config).await
}

/// Flags and environment variables win over the config file
fn apply_overrides(config: &mut Config, args: ServeArgs) {
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(origins) = args.allowed_origins {
        config.server.allowed_origins = origins
            .into_iter()
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();
    }
    if let Some(max) = args.max_requests {
        config.rate_limit.max_requests = max;
    }
    if let Some(window_ms) = args.window_ms {
        config.rate_limit.window_ms = window_ms;
    }
    if let Some(environment) = args.environment {
        config.environment = environment;
    }
    if let Some(timeout) = args.timeout {
        config.worker.timeout_sec = timeout;
    }
    if let Some(models_dir) = args.models_dir {
        config.worker.models_dir = models_dir;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: ServeArgs,
    }

    #[test]
    fn test_flags_override_config() {
        let harness = Harness::parse_from([
            "serve",
            "--port",
            "8080",
            "--allowed-origins",
            "https://a.example, https://b.example,",
            "--environment",
            "prod",
            "--timeout",
            "30",
        ]);
        let mut config = Config::default();
        apply_overrides(&mut config, harness.args);

        assert_eq!(config.server.port, 8080);
        assert_eq!(
            config.server.allowed_origins,
            vec!["https://a.example", "https://b.example"]
        );
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.worker.timeout_sec, 30);
        // untouched values keep their defaults
        assert_eq!(config.rate_limit.max_requests, 100);
    }
}
