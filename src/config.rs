// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! Configuration file handling.
//!
//! Everything has a built-in default; the TOML file only needs the values
//! it changes. Environment variables are applied on top.
//! Default path: `/etc/nofan/config.toml`

use crate::curve::{self, Breakpoint};
use crate::{history, slot};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Default config file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/nofan/config.toml";

/// Default directory holding the daemon socket.
pub const DEFAULT_SOCKET_DIR: &str = "/run/nofan";

/// Socket file name inside the socket directory.
pub const SOCKET_NAME: &str = "nofan.sock";

/// Default daemon log file.
pub const DEFAULT_LOG_PATH: &str = "/var/log/nofan.log";

/// Default tick period in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

pub const ENV_SOCKET_DIR: &str = "NOFAN_SOCKET_DIR";
pub const ENV_DRYRUN: &str = "NOFAN_DRYRUN";
pub const ENV_LOG_CON: &str = "LOG_CON";

// ---------------------------------------------------------------------------
// Config types
// ---------------------------------------------------------------------------

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,

    #[serde(default)]
    pub control: ControlConfig,

    #[serde(default)]
    pub actuator: ActuatorConfig,

    /// Fan curve breakpoints, ascending by temperature.
    #[serde(default = "curve::default_breakpoints")]
    pub breakpoints: Vec<Breakpoint>,

    /// Mirror log lines to stderr. Set from `LOG_CON`.
    #[serde(skip)]
    pub log_console: bool,
}

/// Daemon-specific settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Directory for the Unix domain socket.
    #[serde(default = "default_socket_dir")]
    pub socket_dir: PathBuf,

    /// Append-only log file.
    #[serde(default = "default_log_path")]
    pub log_path: PathBuf,

    /// Control loop tick period, in milliseconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Whether to hand the fan back to the firmware on daemon exit.
    #[serde(default = "default_true")]
    pub restore_on_exit: bool,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            socket_dir: default_socket_dir(),
            log_path: default_log_path(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            restore_on_exit: true,
        }
    }
}

/// Control algorithm tunables. Counts are in ticks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Number of samples kept in the history window.
    pub history_len: usize,
    /// Number of newest samples forming the recent mean.
    pub recent_len: usize,
    /// Ticks between slot evaluations.
    pub update_interval: u64,
    /// Hysteresis margin around slot bounds, in degrees.
    pub temp_margin: f64,
    /// Minimum speed change, in percentage points, before a new command.
    pub speed_dead_band: u8,
    /// Minimum ticks in a slot before moving down.
    pub min_down_ticks: u64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            history_len: history::DEFAULT_CAPACITY,
            recent_len: history::DEFAULT_RECENT,
            update_interval: 4,
            temp_margin: slot::DEFAULT_MARGIN_C,
            speed_dead_band: 4,
            min_down_ticks: slot::DEFAULT_MIN_DOWN_TICKS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActuatorConfig {
    /// Executable used to talk to the embedded controller.
    pub program: String,
    /// Log fan commands instead of running them.
    pub dry_run: bool,
}

impl Default for ActuatorConfig {
    fn default() -> Self {
        Self {
            program: crate::actuator::DEFAULT_PROGRAM.to_string(),
            dry_run: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            daemon: DaemonConfig::default(),
            control: ControlConfig::default(),
            actuator: ActuatorConfig::default(),
            breakpoints: curve::default_breakpoints(),
            log_console: false,
        }
    }
}

impl Config {
    /// Full path of the daemon socket.
    pub fn socket_path(&self) -> PathBuf {
        self.daemon.socket_dir.join(SOCKET_NAME)
    }

    /// Apply `NOFAN_SOCKET_DIR`, `NOFAN_DRYRUN` and `LOG_CON` through `lookup`.
    /// Empty values count as unset.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(dir) = get(ENV_SOCKET_DIR) {
            self.daemon.socket_dir = PathBuf::from(dir);
        }
        if get(ENV_DRYRUN).is_some() {
            self.actuator.dry_run = true;
        }
        if get(ENV_LOG_CON).is_some() {
            self.log_console = true;
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        let c = &self.control;
        if c.recent_len == 0 || c.recent_len >= c.history_len {
            return Err(format!(
                "control.recent_len must be between 1 and history_len - 1 (got {} of {})",
                c.recent_len, c.history_len
            ));
        }
        if c.update_interval == 0 {
            return Err("control.update_interval must be at least 1".to_string());
        }
        if c.temp_margin.is_nan() || c.temp_margin < 0.0 {
            return Err("control.temp_margin must be non-negative".to_string());
        }
        if self.daemon.poll_interval_ms == 0 {
            return Err("daemon.poll_interval_ms must be at least 1".to_string());
        }
        curve::validate(&self.breakpoints)
    }
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Load and validate config from a TOML file, or return the default if the
/// file doesn't exist.
pub fn load_config(path: &Path) -> io::Result<Config> {
    if !path.exists() {
        log::info!("No config file at {}, using defaults", path.display());
        return Ok(Config::default());
    }

    let contents = fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents).map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Failed to parse config: {e}"),
        )
    })?;

    config.validate().map_err(|e| {
        io::Error::new(io::ErrorKind::InvalidData, format!("Invalid config: {e}"))
    })?;

    log::info!("Loaded config from {}", path.display());
    Ok(config)
}

/// Load the file config and apply the process environment.
pub fn resolve(path: &Path) -> io::Result<Config> {
    let mut config = load_config(path)?;
    config.apply_env(|key| std::env::var(key).ok());
    Ok(config)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn default_socket_dir() -> PathBuf {
    PathBuf::from(DEFAULT_SOCKET_DIR)
}

fn default_log_path() -> PathBuf {
    PathBuf::from(DEFAULT_LOG_PATH)
}

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_true() -> bool {
    true
}
