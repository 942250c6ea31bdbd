// src/coordinator/discovery.rs
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use log::{debug, warn};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::task::{JoinError, JoinSet};
use crate::config::DOMAIN;
use crate::protocol::{QueryError, StatusQuery};
use super::{unix_now, Listener, Listeners, Refresh};

#[derive(Debug)]
pub enum ScanError {
    InvalidRange { port_min: u16, port_max: u16 },
    Resolve(QueryError),
    Task(JoinError),
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRange { port_min, port_max } => {
                write!(f, "Invalid port range {}-{}", port_min, port_max)
            }
            Self::Resolve(e) => write!(f, "Could not resolve host: {}", e),
            Self::Task(e) => write!(f, "Port check task failed: {}", e),
        }
    }
}

impl std::error::Error for ScanError {}

/// Queries every port in `port_min..=port_max` at once and returns the ports that
/// answered a status query, sorted.
pub async fn scan_ports(
    query: Arc<dyn StatusQuery>,
    host: &str,
    port_min: u16,
    port_max: u16,
    timeout: Duration,
) -> Result<Vec<u16>, ScanError> {
    if port_min == 0 || port_min > port_max {
        return Err(ScanError::InvalidRange { port_min, port_max });
    }
    query.resolve(host).await.map_err(ScanError::Resolve)?;

    let mut checks = JoinSet::new();
    for port in port_min..=port_max {
        let query = query.clone();
        let host = host.to_string();
        checks.spawn(async move {
            match query.status(&host, port, timeout).await {
                Ok(_) => Some(port),
                Err(_) => None,
            }
        });
    }

    let mut open = Vec::new();
    while let Some(result) = checks.join_next().await {
        if let Some(port) = result.map_err(ScanError::Task)? {
            open.push(port);
        }
    }
    open.sort_unstable();
    open.dedup();
    debug!("Scan of {} ports {}-{} found {:?}", host, port_min, port_max, open);
    Ok(open)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DiscoverySettings {
    pub port_min: u16,
    pub port_max: u16,
    pub interval_secs: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryState {
    pub host: String,
    pub settings: DiscoverySettings,
    pub open_ports: Option<Vec<u16>>,
    pub updated_at: Option<u64>,
}

/// Open ports on one host, shared by every entry configured for that host.
pub struct DiscoveryCoordinator {
    host: String,
    settings: RwLock<DiscoverySettings>,
    timeout: Duration,
    query: Arc<dyn StatusQuery>,
    data: RwLock<Option<Vec<u16>>>,
    updated_at: RwLock<Option<u64>>,
    listeners: Listeners<Vec<u16>>,
}

impl DiscoveryCoordinator {
    pub fn new(host: String, settings: DiscoverySettings, timeout: Duration, query: Arc<dyn StatusQuery>) -> Self {
        Self {
            host,
            settings: RwLock::new(settings),
            timeout,
            query,
            data: RwLock::new(None),
            updated_at: RwLock::new(None),
            listeners: Listeners::default(),
        }
    }

    /// Open ports at the last successful scan, `None` before the first one.
    pub fn data(&self) -> Option<Vec<u16>> {
        self.data.read().clone()
    }

    pub fn settings(&self) -> DiscoverySettings {
        *self.settings.read()
    }

    pub fn update_settings(&self, settings: DiscoverySettings) {
        let mut current = self.settings.write();
        if *current != settings {
            debug!("Discovery settings for {} changed: {:?} -> {:?}", self.host, *current, settings);
            *current = settings;
        }
    }

    pub fn add_listener(&self, listener: Listener<Vec<u16>>) {
        self.listeners.add(listener);
    }

    pub fn state(&self) -> DiscoveryState {
        DiscoveryState {
            host: self.host.clone(),
            settings: self.settings(),
            open_ports: self.data(),
            updated_at: *self.updated_at.read(),
        }
    }
}

#[async_trait]
impl Refresh for DiscoveryCoordinator {
    fn name(&self) -> String {
        format!("{}_discovery_{}", DOMAIN, self.host)
    }

    fn update_interval(&self) -> Duration {
        Duration::from_secs(self.settings.read().interval_secs)
    }

    async fn refresh(&self) {
        let settings = self.settings();
        match scan_ports(self.query.clone(), &self.host, settings.port_min, settings.port_max, self.timeout).await {
            Ok(ports) => {
                *self.data.write() = Some(ports.clone());
                *self.updated_at.write() = Some(unix_now());
                self.listeners.notify(&ports);
            }
            Err(e) => {
                // Keep the previous result
                warn!("Discovery scan failed for {}: {}", self.host, e);
            }
        }
    }
}
