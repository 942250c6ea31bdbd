// src/models/entry.rs
use std::fmt;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::config::{
    DEFAULT_DISCOVERY_INTERVAL, DEFAULT_SCAN_INTERVAL, DISCOVERY_INTERVAL_RANGE,
    SCAN_INTERVAL_RANGE, SCAN_PORT_MAX, SCAN_PORT_MIN,
};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServerIdentity {
    pub host: String,
    pub port: u16,
}

impl ServerIdentity {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port }
    }

    pub fn unique_id(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for ServerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidPortRange { port_min: u16, port_max: u16 },
    OutOfRange { field: &'static str, value: u64, min: u64, max: u64 },
    EmptyHost,
}

impl ConfigError {
    /// Stable error key reported to API clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidPortRange { .. } => "invalid_port_range",
            Self::OutOfRange { .. } => "out_of_range",
            Self::EmptyHost => "invalid_host",
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPortRange { port_min, port_max } => {
                write!(f, "port_min ({}) must not exceed port_max ({})", port_min, port_max)
            }
            Self::OutOfRange { field, value, min, max } => {
                write!(f, "{} must be between {} and {}, got {}", field, min, max, value)
            }
            Self::EmptyHost => write!(f, "Host must not be empty"),
        }
    }
}

impl std::error::Error for ConfigError {}

fn check_range(field: &'static str, value: u64, (min, max): (u64, u64)) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::OutOfRange { field, value, min, max });
    }
    Ok(())
}

fn check_port(field: &'static str, value: u16) -> Result<(), ConfigError> {
    check_range(field, value as u64, (1, 65535))
}

/// Polling and discovery settings shared by the user flow, entries and options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSettings {
    pub scan_interval: u64,
    pub discovery_interval: u64,
    pub port_min: u16,
    pub port_max: u16,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            scan_interval: DEFAULT_SCAN_INTERVAL,
            discovery_interval: DEFAULT_DISCOVERY_INTERVAL,
            port_min: SCAN_PORT_MIN,
            port_max: SCAN_PORT_MAX,
        }
    }
}

impl ScanSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("scan_interval", self.scan_interval, SCAN_INTERVAL_RANGE)?;
        check_range("discovery_interval", self.discovery_interval, DISCOVERY_INTERVAL_RANGE)?;
        check_port("port_min", self.port_min)?;
        check_port("port_max", self.port_max)?;
        if self.port_min > self.port_max {
            return Err(ConfigError::InvalidPortRange {
                port_min: self.port_min,
                port_max: self.port_max,
            });
        }
        Ok(())
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval)
    }
}

/// Persisted configuration of one server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryData {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_scan_interval")]
    pub scan_interval: u64,
    #[serde(default = "default_discovery_interval")]
    pub discovery_interval: u64,
    #[serde(default = "default_port_min")]
    pub port_min: u16,
    #[serde(default = "default_port_max")]
    pub port_max: u16,
    pub server_name: Option<String>,
}

fn default_scan_interval() -> u64 {
    DEFAULT_SCAN_INTERVAL
}

fn default_discovery_interval() -> u64 {
    DEFAULT_DISCOVERY_INTERVAL
}

fn default_port_min() -> u16 {
    SCAN_PORT_MIN
}

fn default_port_max() -> u16 {
    SCAN_PORT_MAX
}

impl EntryData {
    pub fn new(identity: &ServerIdentity, settings: ScanSettings, server_name: Option<String>) -> Self {
        Self {
            host: identity.host.clone(),
            port: identity.port,
            scan_interval: settings.scan_interval,
            discovery_interval: settings.discovery_interval,
            port_min: settings.port_min,
            port_max: settings.port_max,
            server_name,
        }
    }

    pub fn identity(&self) -> ServerIdentity {
        ServerIdentity::new(self.host.clone(), self.port)
    }

    pub fn settings(&self) -> ScanSettings {
        ScanSettings {
            scan_interval: self.scan_interval,
            discovery_interval: self.discovery_interval,
            port_min: self.port_min,
            port_max: self.port_max,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        check_port("port", self.port)?;
        self.settings().validate()
    }
}

/// User overrides layered on top of [`EntryData`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryOptions {
    pub scan_interval: Option<u64>,
    pub discovery_interval: Option<u64>,
    pub port_min: Option<u16>,
    pub port_max: Option<u16>,
}

impl EntryOptions {
    pub fn apply(&self, base: ScanSettings) -> ScanSettings {
        ScanSettings {
            scan_interval: self.scan_interval.unwrap_or(base.scan_interval),
            discovery_interval: self.discovery_interval.unwrap_or(base.discovery_interval),
            port_min: self.port_min.unwrap_or(base.port_min),
            port_max: self.port_max.unwrap_or(base.port_max),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntrySource {
    User,
    Discovery,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub entry_id: String,
    pub title: String,
    pub source: EntrySource,
    pub data: EntryData,
    #[serde(default)]
    pub options: EntryOptions,
}

impl ConfigEntry {
    pub fn new(title: String, source: EntrySource, data: EntryData) -> Self {
        Self {
            entry_id: uuid::Uuid::new_v4().to_string(),
            title,
            source,
            data,
            options: EntryOptions::default(),
        }
    }

    pub fn identity(&self) -> ServerIdentity {
        self.data.identity()
    }

    /// Options first, then data.
    pub fn effective_settings(&self) -> ScanSettings {
        self.options.apply(self.data.settings())
    }
}

pub fn default_server_name(identity: &ServerIdentity) -> String {
    format!("Minecraft Server ({})", identity)
}
