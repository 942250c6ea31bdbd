// src/flows/mod.rs
//! Setup flows: prompts that end in a new configuration entry.

pub mod discovery;
pub mod user;

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use dashmap::DashMap;
use log::{debug, info};
use serde::Serialize;
use crate::coordinator::unix_now;
use crate::models::entry::{ConfigError, ScanSettings, ServerIdentity};
use crate::protocol::StatusQuery;
use crate::storage::entries::EntryStore;
use crate::storage::StoreError;

/// User flows left unanswered this long are dropped.
pub const USER_FLOW_TTL_SECS: u64 = 3600;

#[derive(Debug)]
pub enum FlowError {
    NotFound(String),
    WrongStep { flow_id: String, expected: FlowStep },
    AlreadyConfigured(String),
    AlreadyInProgress(String),
    Ignored(String),
    CannotConnect(String),
    NoServersSelected,
    Invalid(ConfigError),
    Store(StoreError),
}

impl FlowError {
    /// Stable error key reported to API clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "unknown_flow",
            Self::WrongStep { .. } => "unknown_step",
            Self::AlreadyConfigured(_) => "already_configured",
            Self::AlreadyInProgress(_) => "already_in_progress",
            Self::Ignored(_) => "ignored",
            Self::CannotConnect(_) => "cannot_connect",
            Self::NoServersSelected => "no_servers_selected",
            Self::Invalid(e) => e.code(),
            Self::Store(StoreError::AlreadyConfigured(_)) => "already_configured",
            Self::Store(_) => "storage_error",
        }
    }
}

impl fmt::Display for FlowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "No setup flow with id {}", id),
            Self::WrongStep { flow_id, expected } => {
                write!(f, "Flow {} is not at step {:?}", flow_id, expected)
            }
            Self::AlreadyConfigured(id) => write!(f, "{} is already configured", id),
            Self::AlreadyInProgress(id) => write!(f, "A setup flow for {} is already in progress", id),
            Self::Ignored(id) => write!(f, "{} was dismissed earlier", id),
            Self::CannotConnect(host) => write!(f, "No Minecraft server answered on {}", host),
            Self::NoServersSelected => write!(f, "No servers were selected"),
            Self::Invalid(e) => write!(f, "{}", e),
            Self::Store(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for FlowError {}

impl From<ConfigError> for FlowError {
    fn from(e: ConfigError) -> Self {
        Self::Invalid(e)
    }
}

impl From<StoreError> for FlowError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::AlreadyConfigured(id) => Self::AlreadyConfigured(id),
            StoreError::Invalid(e) => Self::Invalid(e),
            other => Self::Store(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowSource {
    User,
    Discovery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowStep {
    SelectServers,
    DiscoveryConfirm,
}

#[derive(Debug, Clone, Serialize)]
pub struct SetupFlow {
    pub flow_id: String,
    pub source: FlowSource,
    pub step: FlowStep,
    pub host: String,
    pub port: Option<u16>,
    pub found_ports: Vec<u16>,
    pub settings: ScanSettings,
    /// Suggested server name per port.
    pub suggested_names: BTreeMap<u16, String>,
    pub title_placeholders: BTreeMap<String, String>,
    pub created_at: u64,
}

impl SetupFlow {
    fn new(source: FlowSource, step: FlowStep, host: String, settings: ScanSettings) -> Self {
        Self {
            flow_id: uuid::Uuid::new_v4().to_string(),
            source,
            step,
            host,
            port: None,
            found_ports: Vec::new(),
            settings,
            suggested_names: BTreeMap::new(),
            title_placeholders: BTreeMap::new(),
            created_at: unix_now(),
        }
    }

    /// `(host, port)` of a discovery flow, read back from its title placeholders.
    fn discovered_identity(&self) -> Option<ServerIdentity> {
        if self.source != FlowSource::Discovery {
            return None;
        }
        let host = self.title_placeholders.get("host")?;
        let port = self.title_placeholders.get("port")?.parse().ok()?;
        Some(ServerIdentity::new(host.clone(), port))
    }
}

/// Starts setup prompts for discovered servers.
pub trait FlowInitiator: Send + Sync {
    /// Ports on `host` that already have a discovery prompt open.
    fn pending_discovery_ports(&self, host: &str) -> HashSet<u16>;
    fn init_discovery_flow(&self, identity: ServerIdentity) -> Result<String, FlowError>;
}

pub struct FlowManager {
    entries: Arc<EntryStore>,
    query: Arc<dyn StatusQuery>,
    scan_timeout: Duration,
    flows: DashMap<String, SetupFlow>,
    // unique id -> flow id, for discovery flows
    in_progress: DashMap<String, String>,
    dismissed: DashMap<String, ()>,
}

impl FlowManager {
    pub fn new(entries: Arc<EntryStore>, query: Arc<dyn StatusQuery>, scan_timeout: Duration) -> Self {
        Self {
            entries,
            query,
            scan_timeout,
            flows: DashMap::new(),
            in_progress: DashMap::new(),
            dismissed: DashMap::new(),
        }
    }

    pub fn get(&self, flow_id: &str) -> Option<SetupFlow> {
        self.expire_user_flows(unix_now());
        self.flows.get(flow_id).map(|r| r.value().clone())
    }

    pub fn flows(&self) -> Vec<SetupFlow> {
        self.expire_user_flows(unix_now());
        let mut flows: Vec<SetupFlow> = self.flows.iter().map(|r| r.value().clone()).collect();
        flows.sort_by_key(|f| f.created_at);
        flows
    }

    fn expect_step(&self, flow_id: &str, expected: FlowStep) -> Result<SetupFlow, FlowError> {
        let flow = self.get(flow_id).ok_or_else(|| FlowError::NotFound(flow_id.to_string()))?;
        if flow.step != expected {
            return Err(FlowError::WrongStep { flow_id: flow_id.to_string(), expected });
        }
        Ok(flow)
    }

    fn finish(&self, flow: &SetupFlow) {
        self.flows.remove(&flow.flow_id);
        if let Some(identity) = flow.discovered_identity() {
            self.in_progress.remove(&identity.unique_id());
        }
    }

    /// Aborts a flow. A dismissed discovery is not proposed again.
    pub fn dismiss(&self, flow_id: &str) -> Result<SetupFlow, FlowError> {
        let flow = self.get(flow_id).ok_or_else(|| FlowError::NotFound(flow_id.to_string()))?;
        if let Some(identity) = flow.discovered_identity() {
            info!("Dismissed discovered server {}", identity);
            self.dismissed.insert(identity.unique_id(), ());
        }
        self.finish(&flow);
        Ok(flow)
    }

    /// Removes user flows opened more than `USER_FLOW_TTL_SECS` before `now`. Discovery
    /// prompts stay until answered.
    fn expire_user_flows(&self, now: u64) {
        self.flows.retain(|flow_id, flow| {
            let expired = flow.source == FlowSource::User
                && now.saturating_sub(flow.created_at) > USER_FLOW_TTL_SECS;
            if expired {
                debug!("User flow {} for {} expired", flow_id, flow.host);
            }
            !expired
        });
    }

    /// Drops discovery prompts whose server got configured through another path.
    pub fn prune_configured(&self) {
        let stale: Vec<SetupFlow> = self
            .flows
            .iter()
            .filter(|r| {
                r.value()
                    .discovered_identity()
                    .map(|identity| self.entries.contains(&identity))
                    .unwrap_or(false)
            })
            .map(|r| r.value().clone())
            .collect();
        for flow in stale {
            self.finish(&flow);
        }
    }
}
