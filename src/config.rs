//! Configuration module for echo-probe.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Command-line arguments for the echo client
#[derive(Parser, Debug)]
#[command(name = "echo-probe")]
#[command(author = "echo-probe authors")]
#[command(version)]
#[command(
    about = "Soak-tests a TCP echo server: sends a probe, verifies the echoed block, reports throughput",
    long_about = None,
    after_help = "Type 'x' (or Escape) followed by Enter to stop a running test."
)]
pub struct CliArgs {
    /// Dotted decimal IPv4 address of the echo server
    pub server: Option<String>,

    /// Echo server's TCP port number
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Echo block size in 32-bit records (4096 = 16 KiB)
    #[arg(short, long)]
    pub block_count: Option<u32>,

    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub target: TargetConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Echo server location and block size
#[derive(Debug, Deserialize)]
pub struct TargetConfig {
    /// Dotted decimal IPv4 address
    #[serde(default = "default_server")]
    pub server: String,
    /// TCP port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Records expected back per phase
    #[serde(default = "default_block_count")]
    pub block_count: u32,
    /// Connect timeout in milliseconds; absent means the OS default
    pub connect_timeout_ms: Option<u64>,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            server: default_server(),
            port: default_port(),
            block_count: default_block_count(),
            connect_timeout_ms: None,
        }
    }
}

/// Receive phase timing
#[derive(Debug, Deserialize)]
pub struct TimingConfig {
    /// Elapsed time after which a phase counts as slow
    #[serde(default = "default_soft_timeout_ms")]
    pub soft_timeout_ms: u64,
    /// Elapsed time after which a phase is aborted
    #[serde(default = "default_hard_timeout_ms")]
    pub hard_timeout_ms: u64,
    /// Pause after a receive that would block
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Emit a throughput sample every N phases
    #[serde(default = "default_report_interval")]
    pub report_interval: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            soft_timeout_ms: default_soft_timeout_ms(),
            hard_timeout_ms: default_hard_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            report_interval: default_report_interval(),
        }
    }
}

/// Probe sequence and receive sizing
#[derive(Debug, Deserialize)]
pub struct ProbeConfig {
    /// Seed value; the first probe sent is `initial_seed + 1`
    #[serde(default = "default_initial_seed")]
    pub initial_seed: u32,
    /// Maximum bytes requested per receive call
    #[serde(default = "default_read_chunk")]
    pub read_chunk: usize,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            initial_seed: default_initial_seed(),
            read_chunk: default_read_chunk(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_server() -> String {
    "192.168.30.32".to_string()
}

fn default_port() -> u16 {
    7 // well-known echo port
}

fn default_block_count() -> u32 {
    0x1000 // 16 KiB
}

fn default_soft_timeout_ms() -> u64 {
    1000
}

fn default_hard_timeout_ms() -> u64 {
    5000
}

fn default_poll_interval_ms() -> u64 {
    2
}

fn default_report_interval() -> u64 {
    100
}

fn default_initial_seed() -> u32 {
    0x555
}

fn default_read_chunk() -> usize {
    2000
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server: String,
    pub port: u16,
    pub block_count: u32,
    pub connect_timeout: Option<Duration>,
    pub soft_timeout: Duration,
    pub hard_timeout: Duration,
    pub poll_interval: Duration,
    pub report_interval: u64,
    pub initial_seed: u32,
    pub read_chunk: usize,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::merge(CliArgs::empty(), TomlConfig::default())
    }
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_args(CliArgs::parse())
    }

    /// Resolve already-parsed CLI args against the optional TOML file.
    pub fn from_args(cli: CliArgs) -> Result<Self, ConfigError> {
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        let config = Self::merge(cli, toml_config);
        config.validate()?;
        Ok(config)
    }

    fn merge(cli: CliArgs, toml_config: TomlConfig) -> Self {
        Config {
            server: cli.server.unwrap_or(toml_config.target.server),
            port: cli.port.unwrap_or(toml_config.target.port),
            block_count: cli.block_count.unwrap_or(toml_config.target.block_count),
            connect_timeout: toml_config
                .target
                .connect_timeout_ms
                .map(Duration::from_millis),
            soft_timeout: Duration::from_millis(toml_config.timing.soft_timeout_ms),
            hard_timeout: Duration::from_millis(toml_config.timing.hard_timeout_ms),
            poll_interval: Duration::from_millis(toml_config.timing.poll_interval_ms),
            report_interval: toml_config.timing.report_interval,
            initial_seed: toml_config.probe.initial_seed,
            read_chunk: toml_config.probe.read_chunk,
            log_level: if cli.log_level != "info" {
                cli.log_level
            } else {
                toml_config.logging.level
            },
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.block_count == 0 {
            return Err(ConfigError::Invalid("block count must be non-zero"));
        }
        if self.hard_timeout <= self.soft_timeout {
            return Err(ConfigError::Invalid(
                "hard timeout must exceed soft timeout",
            ));
        }
        if self.read_chunk < crate::protocols::echo::RECORD_LEN {
            return Err(ConfigError::Invalid("read chunk must hold one record"));
        }
        if self.report_interval == 0 {
            return Err(ConfigError::Invalid("report interval must be non-zero"));
        }
        Ok(())
    }

    /// Bytes the echo server returns for one probe.
    pub fn expected_block_bytes(&self) -> usize {
        self.block_count as usize * crate::protocols::echo::RECORD_LEN
    }
}

impl CliArgs {
    fn empty() -> Self {
        Self {
            server: None,
            port: None,
            block_count: None,
            config: None,
            log_level: default_log_level(),
        }
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {}", .0.display(), .1)]
    FileRead(PathBuf, #[source] std::io::Error),
    #[error("Failed to parse config file '{}': {}", .0.display(), .1)]
    TomlParse(PathBuf, #[source] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TomlConfig::default();
        assert_eq!(config.target.server, "192.168.30.32");
        assert_eq!(config.target.port, 7);
        assert_eq!(config.target.block_count, 4096);
        assert_eq!(config.timing.soft_timeout_ms, 1000);
        assert_eq!(config.timing.hard_timeout_ms, 5000);
        assert_eq!(config.probe.initial_seed, 0x555);
    }

    #[test]
    fn test_toml_parsing() {
        let toml_str = r#"
            [target]
            server = "10.49.38.60"
            port = 8007
            block_count = 7000

            [timing]
            hard_timeout_ms = 2500

            [logging]
            level = "debug"
        "#;

        let config: TomlConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.target.server, "10.49.38.60");
        assert_eq!(config.target.port, 8007);
        assert_eq!(config.target.block_count, 7000);
        assert_eq!(config.timing.hard_timeout_ms, 2500);
        assert_eq!(config.timing.soft_timeout_ms, 1000);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_cli_overrides_toml() {
        let toml_config: TomlConfig = toml::from_str(
            r#"
            [target]
            server = "10.0.0.1"
            port = 7
        "#,
        )
        .unwrap();

        let cli = CliArgs::parse_from(["echo-probe", "10.0.0.2", "--port", "8007", "-b", "16"]);
        let config = Config::merge(cli, toml_config);

        assert_eq!(config.server, "10.0.0.2");
        assert_eq!(config.port, 8007);
        assert_eq!(config.block_count, 16);
        assert_eq!(config.expected_block_bytes(), 64);
    }

    #[test]
    fn test_default_expected_block() {
        let config = Config::default();
        assert_eq!(config.expected_block_bytes(), 16 * 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_block_count() {
        let cli = CliArgs::parse_from(["echo-probe", "-b", "0"]);
        assert!(matches!(
            Config::from_args(cli),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_rejects_inverted_timeouts() {
        let toml_config: TomlConfig = toml::from_str(
            r#"
            [timing]
            soft_timeout_ms = 3000
            hard_timeout_ms = 2000
        "#,
        )
        .unwrap();
        let config = Config::merge(CliArgs::empty(), toml_config);
        assert!(config.validate().is_err());
    }
}
