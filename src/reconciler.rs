// src/reconciler.rs
use std::collections::HashSet;
use std::sync::Arc;
use log::{debug, warn};
use crate::flows::{FlowError, FlowInitiator};
use crate::models::entry::ServerIdentity;
use crate::storage::entries::EntryStore;

/// Discovered ports that are neither configured nor already prompted, in scan order.
pub fn new_ports(discovered: &[u16], configured: &HashSet<u16>, pending: &HashSet<u16>) -> Vec<u16> {
    let mut seen = HashSet::new();
    discovered
        .iter()
        .copied()
        .filter(|port| !configured.contains(port) && !pending.contains(port))
        .filter(|port| seen.insert(*port))
        .collect()
}

/// Turns discovery results into setup prompts.
pub struct Reconciler {
    entries: Arc<EntryStore>,
    flows: Arc<dyn FlowInitiator>,
}

impl Reconciler {
    pub fn new(entries: Arc<EntryStore>, flows: Arc<dyn FlowInitiator>) -> Self {
        Self { entries, flows }
    }

    /// Returns the ports a prompt was started for.
    pub fn on_discovery_update(&self, host: &str, discovered: &[u16]) -> Vec<u16> {
        let configured = self.entries.configured_ports(host);
        let pending = self.flows.pending_discovery_ports(host);

        let mut prompted = Vec::new();
        for port in new_ports(discovered, &configured, &pending) {
            match self.flows.init_discovery_flow(ServerIdentity::new(host, port)) {
                Ok(_) => prompted.push(port),
                Err(e @ (FlowError::Ignored(_) | FlowError::AlreadyConfigured(_) | FlowError::AlreadyInProgress(_))) => {
                    debug!("Not prompting for {}:{}: {}", host, port, e);
                }
                Err(e) => warn!("Could not start setup for {}:{}: {}", host, port, e),
            }
        }
        prompted
    }
}
