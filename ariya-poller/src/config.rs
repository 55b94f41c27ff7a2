use log::{debug, warn, LevelFilter};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::transport::Endpoint;

/// Refresh cadence when no scan interval is configured
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Upper bound for the connect and probe timeouts
pub const MAX_TIMEOUT_MS: u64 = 10_000;

/// Below this the adapter has usually not finished sending its reply
pub const MIN_SETTLE_DELAY_MS: u64 = 50;

/// Longest accepted scan interval (one day)
pub const MAX_SCAN_INTERVAL_MINUTES: u64 = 24 * 60;

/// Configurable log level
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
}

impl LogLevel {
    #[must_use]
    pub const fn as_level_filter(self) -> LevelFilter {
        match self {
            Self::Off => LevelFilter::Off,
            Self::Error => LevelFilter::Error,
            Self::Warn => LevelFilter::Warn,
            Self::Info => LevelFilter::Info,
            Self::Debug => LevelFilter::Debug,
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "error" => Ok(Self::Error),
            "warn" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            other => Err(format!("unknown log level '{other}'")),
        }
    }
}

/// Timeouts and delays of one polling session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timing {
    /// Reachability probe connect timeout (ms)
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    /// Working connection connect and read timeout (ms)
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Wait after each command before the single read (ms)
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    /// Pause between session control and tester present (ms)
    #[serde(default = "default_wakeup_pause_ms")]
    pub wakeup_pause_ms: u64,
}

const fn default_probe_timeout_ms() -> u64 {
    1000
}

const fn default_connect_timeout_ms() -> u64 {
    2000
}

const fn default_settle_delay_ms() -> u64 {
    300
}

const fn default_wakeup_pause_ms() -> u64 {
    200
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            probe_timeout_ms: default_probe_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            wakeup_pause_ms: default_wakeup_pause_ms(),
        }
    }
}

impl Timing {
    pub const fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub const fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub const fn wakeup_pause(&self) -> Duration {
        Duration::from_millis(self.wakeup_pause_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// IP address or host name of the ELM327 WiFi adapter
    pub elm_ip: String,
    /// TCP port of the adapter
    #[serde(default = "default_elm_port")]
    pub elm_port: u16,
    /// Minutes between refreshes (60 seconds when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_interval_minutes: Option<u64>,
    #[serde(default)]
    pub log_level: LogLevel,
    #[serde(default)]
    pub timing: Timing,
}

const fn default_elm_port() -> u16 {
    35000
}

impl Config {
    /// Defaults for everything but the adapter address, which has none
    pub fn new(elm_ip: impl Into<String>) -> Self {
        Self {
            elm_ip: elm_ip.into(),
            elm_port: default_elm_port(),
            scan_interval_minutes: None,
            log_level: LogLevel::default(),
            timing: Timing::default(),
        }
    }

    /// Clamp values to valid ranges and fix invalid values
    ///
    /// Fails only when the adapter address is blank, since there is nothing
    /// sensible to fall back to.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        let host = self.elm_ip.trim();
        if host.is_empty() {
            return Err(ConfigError::MissingHost);
        }
        if host.len() != self.elm_ip.len() {
            self.elm_ip = host.to_string();
        }
        if self.elm_port == 0 {
            warn!("Adapter port is 0, resetting to {}", default_elm_port());
            self.elm_port = default_elm_port();
        }
        if self.scan_interval_minutes == Some(0) {
            warn!("Scan interval of 0 minutes ignored, using default");
            self.scan_interval_minutes = None;
        }
        if let Some(minutes) = self.scan_interval_minutes {
            if minutes > MAX_SCAN_INTERVAL_MINUTES {
                warn!("Clamping scan_interval_minutes from {minutes} to {MAX_SCAN_INTERVAL_MINUTES}");
                self.scan_interval_minutes = Some(MAX_SCAN_INTERVAL_MINUTES);
            }
        }
        let timing = &mut self.timing;
        if timing.probe_timeout_ms > MAX_TIMEOUT_MS {
            warn!("Clamping probe_timeout_ms from {} to {MAX_TIMEOUT_MS}", timing.probe_timeout_ms);
            timing.probe_timeout_ms = MAX_TIMEOUT_MS;
        }
        if timing.connect_timeout_ms > MAX_TIMEOUT_MS {
            warn!("Clamping connect_timeout_ms from {} to {MAX_TIMEOUT_MS}", timing.connect_timeout_ms);
            timing.connect_timeout_ms = MAX_TIMEOUT_MS;
        }
        if timing.probe_timeout_ms == 0 {
            timing.probe_timeout_ms = default_probe_timeout_ms();
        }
        if timing.connect_timeout_ms == 0 {
            timing.connect_timeout_ms = default_connect_timeout_ms();
        }
        if timing.settle_delay_ms < MIN_SETTLE_DELAY_MS {
            warn!("Raising settle_delay_ms from {} to {MIN_SETTLE_DELAY_MS}", timing.settle_delay_ms);
            timing.settle_delay_ms = MIN_SETTLE_DELAY_MS;
        }
        Ok(())
    }

    /// The adapter this configuration points at
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.elm_ip.clone(), self.elm_port)
    }

    /// Time between scheduled refreshes
    pub fn poll_interval(&self) -> Duration {
        self.scan_interval_minutes.map_or(DEFAULT_POLL_INTERVAL, |minutes| {
            Duration::from_secs(minutes.saturating_mul(60))
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        debug!("Loading config from {}", path.display());
        let json = std::fs::read(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Config =
            serde_json::from_slice(&json).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        debug!("Config parsed: adapter {}, interval {:?}", config.endpoint(), config.poll_interval());
        Ok(config)
    }
}
