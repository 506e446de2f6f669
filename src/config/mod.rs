/// Configuration management for tandem

use crate::client::{ConnectionOptions, PairOptions};
pub use crate::error::ConfigError;
use crate::utils;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Main tandem configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Servers to talk to
    pub servers: ServersConfig,
    /// Dial and reconnect settings
    pub connection: ConnectionConfig,
    /// Replica-pair master probing
    pub pair: PairConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Server list: one host for a single connection, two for a replica pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServersConfig {
    /// `host[:port]`, `[v6addr]:port` or an absolute socket path
    pub hosts: Vec<String>,
}

/// Connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Re-dial failed connections on the next operation
    pub auto_reconnect: bool,
    /// Minimum time between reconnect attempts in milliseconds
    pub reconnect_interval_ms: u64,
    /// Dial timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// Socket read/write timeout in milliseconds, 0 for none
    pub socket_timeout_ms: u64,
}

/// Replica-pair configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairConfig {
    /// Number of times both sides are probed before giving up
    pub probe_rounds: u32,
    /// Pause between probe rounds in milliseconds
    pub probe_retry_delay_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Log format (json, text)
    pub format: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            servers: ServersConfig {
                hosts: vec!["127.0.0.1:27017".to_string()],
            },
            connection: ConnectionConfig {
                auto_reconnect: false,
                reconnect_interval_ms: 2000,
                connect_timeout_ms: 5000,
                socket_timeout_ms: 0,
            },
            pair: PairConfig {
                probe_rounds: 2,
                probe_retry_delay_ms: 1000,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "text".to_string(),
            },
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        fs::write(path, content)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.servers.hosts.len() {
            1 | 2 => {}
            n => {
                return Err(ConfigError::ValidationError(format!(
                    "servers.hosts must list one host or a pair, got {}",
                    n
                )))
            }
        }

        for host in &self.servers.hosts {
            utils::parse_server(host).map_err(|e| {
                ConfigError::ValidationError(format!("Invalid server '{}': {}", host, e))
            })?;
        }

        if self.connection.connect_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "connect_timeout_ms must be greater than 0".to_string(),
            ));
        }

        if self.pair.probe_rounds == 0 {
            return Err(ConfigError::ValidationError(
                "probe_rounds must be greater than 0".to_string(),
            ));
        }

        match self.logging.level.as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => {}
            _ => return Err(ConfigError::ValidationError(
                format!("Invalid log level: {}", self.logging.level)
            )),
        }

        match self.logging.format.as_str() {
            "json" | "text" => {}
            _ => return Err(ConfigError::ValidationError(
                format!("Invalid log format: {}", self.logging.format)
            )),
        }

        Ok(())
    }

    /// True when two hosts are configured
    pub fn is_pair(&self) -> bool {
        self.servers.hosts.len() == 2
    }

    pub fn connection_options(&self) -> ConnectionOptions {
        let socket_timeout = match self.connection.socket_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };
        ConnectionOptions::new()
            .with_auto_reconnect(self.connection.auto_reconnect)
            .with_reconnect_interval(Duration::from_millis(self.connection.reconnect_interval_ms))
            .with_connect_timeout(Duration::from_millis(self.connection.connect_timeout_ms))
            .with_socket_timeout(socket_timeout)
    }

    pub fn pair_options(&self) -> PairOptions {
        PairOptions::new()
            .with_probe_rounds(self.pair.probe_rounds)
            .with_probe_retry_delay(Duration::from_millis(self.pair.probe_retry_delay_ms))
    }

    /// Create example configuration file for a single server or a pair
    pub fn create_example_config<P: AsRef<Path>>(path: P, mode: &str) -> Result<(), ConfigError> {
        let config = match mode {
            "single" => Config {
                servers: ServersConfig {
                    hosts: vec!["10.0.1.10:27017".to_string()],
                },
                ..Default::default()
            },
            "pair" => Config {
                servers: ServersConfig {
                    hosts: vec![
                        "10.0.1.10:27017".to_string(),
                        "10.0.1.11:27017".to_string(),
                    ],
                },
                connection: ConnectionConfig {
                    auto_reconnect: true,
                    ..Default::default()
                },
                ..Default::default()
            },
            _ => return Err(ConfigError::ValidationError(
                "Mode must be 'single' or 'pair'".to_string(),
            )),
        };

        config.save_to_file(path)
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Config::default().connection
    }
}
