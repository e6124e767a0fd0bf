use anyhow::Context;
use ferrous_query_domain::{CliOverrides, Config};
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub fn load_config(path: Option<&str>, overrides: CliOverrides) -> anyhow::Result<Config> {
    let config = Config::load(path, overrides).context("Failed to load configuration")?;
    debug!(
        timeout_ms = config.query.timeout_ms,
        udp_port = config.query.udp_port,
        tls_port = config.query.tls_port,
        "Configuration loaded"
    );
    Ok(config)
}

/// Logs go to stderr so the answer on stdout stays clean for scripts.
/// `RUST_LOG` wins over the configured level when set.
pub fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_config_applies_overrides_over_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[query]\ntimeout_ms = 1500\nudp_port = 5353\n\n[logging]\nlevel = \"warn\""
        )
        .unwrap();

        let overrides = CliOverrides {
            timeout_ms: Some(250),
            log_level: Some("debug".to_string()),
            ..Default::default()
        };
        let config = load_config(file.path().to_str(), overrides).unwrap();

        assert_eq!(config.query.timeout_ms, 250);
        assert_eq!(config.query.udp_port, 5353);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_load_config_missing_file_fails() {
        let result = load_config(Some("/nonexistent/ferrous-query.toml"), CliOverrides::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_rejects_zero_port() {
        let overrides = CliOverrides {
            port: Some(0),
            ..Default::default()
        };
        let file = tempfile::NamedTempFile::new().unwrap();
        let result = load_config(file.path().to_str(), overrides);
        assert!(result.is_err());
    }
}
