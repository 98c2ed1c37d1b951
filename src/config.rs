//! Configuration management for the load balancer core
//!
//! Covers the fuse size, phase count, overcurrent mode, and hysteresis
//! window inputs, plus the ambient logging and balancer-tuning knobs,
//! loaded from and validated against a YAML file.

use crate::error::{LoadBalancerError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_hysteresis_minutes() -> u32 {
    15
}

fn default_overcurrent_mode() -> String {
    "conservative".to_string()
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Main fuse rating in amperes, per live phase (mandatory)
    pub fuse_size: u32,

    /// Number of live phases: 1 or 3 (mandatory)
    pub phase_count: u8,

    /// Overcurrent handling mode: "conservative" or "optimised"
    #[serde(default = "default_overcurrent_mode")]
    pub overcurrent_mode: String,

    /// Minimum time between a decrease and a subsequent increase dispatch
    #[serde(default = "default_hysteresis_minutes")]
    pub charge_limit_hysteresis_minutes: u32,

    /// Options-level override of `fuse_size`, if the host exposes one
    #[serde(default)]
    pub fuse_size_override: Option<u32>,

    /// Sliding-window overcurrent tolerance settings (Optimised mode only)
    #[serde(default)]
    pub balancer: BalancerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Sliding-window overcurrent tolerance settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BalancerConfig {
    /// Width of the sliding window used to integrate overcurrent excess, in seconds
    pub window_seconds: u64,
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self { window_seconds: 60 }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Directory to write rotated log files into
    pub directory: String,

    /// Number of rotated log files to keep
    pub backup_count: u32,

    /// Whether to log to console in addition to file
    pub console_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            directory: "/tmp/evse-load-balancer".to_string(),
            backup_count: 5,
            console_output: true,
            json_format: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fuse_size: 25,
            phase_count: 3,
            overcurrent_mode: default_overcurrent_mode(),
            charge_limit_hysteresis_minutes: default_hysteresis_minutes(),
            fuse_size_override: None,
            balancer: BalancerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration, falling back to defaults if no config file exists
    /// at any of the default locations
    pub fn load() -> Result<Self> {
        let default_paths = [
            "evse_load_balancer.yaml",
            "/data/evse_load_balancer.yaml",
            "/etc/evse-load-balancer/config.yaml",
        ];

        for path in &default_paths {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        Ok(Config::default())
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// The effective fuse size: an options-level override takes precedence
    /// over the value supplied at initial setup.
    pub fn effective_fuse_size(&self) -> u32 {
        self.fuse_size_override.unwrap_or(self.fuse_size)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.fuse_size == 0 {
            return Err(LoadBalancerError::validation(
                "fuse_size",
                "Must be greater than 0",
            ));
        }

        if self.phase_count != 1 && self.phase_count != 3 {
            return Err(LoadBalancerError::validation(
                "phase_count",
                "Must be 1 or 3",
            ));
        }

        if self.overcurrent_mode != "conservative" && self.overcurrent_mode != "optimised" {
            return Err(LoadBalancerError::validation(
                "overcurrent_mode",
                "Must be 'conservative' or 'optimised'",
            ));
        }

        if self.balancer.window_seconds == 0 {
            return Err(LoadBalancerError::validation(
                "balancer.window_seconds",
                "Must be greater than 0",
            ));
        }

        Ok(())
    }
}
