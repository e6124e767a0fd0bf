use serde::{Deserialize, Serialize};

use super::errors::ConfigError;
use super::logging::LoggingConfig;
use super::query::QueryConfig;
use super::tls::TlsConfig;

/// Main configuration structure for ferrous-query
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// Exchange parameters (timeout, ports, source binding)
    #[serde(default)]
    pub query: QueryConfig,

    /// DNS-over-TLS settings
    #[serde(default)]
    pub tls: TlsConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file or use defaults
    ///
    /// Priority order:
    /// 1. Explicitly provided path
    /// 2. ferrous-query.toml in current directory
    /// 3. Default configuration
    pub fn load(path: Option<&str>, cli_overrides: CliOverrides) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = path {
            Self::from_file(path)?
        } else if std::path::Path::new("ferrous-query.toml").exists() {
            Self::from_file("ferrous-query.toml")?
        } else {
            Self::default()
        };

        config.apply_cli_overrides(cli_overrides);
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(path.to_string(), e.to_string()))?;
        toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    fn apply_cli_overrides(&mut self, overrides: CliOverrides) {
        if let Some(port) = overrides.port {
            self.query.udp_port = port;
            self.query.tcp_port = port;
            self.query.tls_port = port;
        }
        if let Some(timeout_ms) = overrides.timeout_ms {
            self.query.timeout_ms = timeout_ms;
        }
        if let Some(source) = overrides.source {
            self.query.source = Some(source);
        }
        if let Some(hostname) = overrides.tls_hostname {
            self.tls.server_hostname = Some(hostname);
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, port) in [
            ("udp_port", self.query.udp_port),
            ("tcp_port", self.query.tcp_port),
            ("tls_port", self.query.tls_port),
        ] {
            if port == 0 {
                return Err(ConfigError::Validation(format!("{} cannot be 0", name)));
            }
        }

        if let Some(hostname) = &self.tls.server_hostname {
            if hostname.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "tls.server_hostname cannot be empty".to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// Command-line overrides for configuration
#[derive(Debug, Default)]
pub struct CliOverrides {
    pub port: Option<u16>,
    pub timeout_ms: Option<u64>,
    pub source: Option<std::net::IpAddr>,
    pub tls_hostname: Option<String>,
    pub log_level: Option<String>,
}
