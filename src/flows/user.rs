// src/flows/user.rs
use std::collections::HashMap;
use log::{debug, info, warn};
use crate::coordinator::discovery::scan_ports;
use crate::models::entry::{
    default_server_name, ConfigEntry, ConfigError, EntryData, EntrySource, ScanSettings, ServerIdentity,
};
use crate::storage::StoreError;
use super::{FlowError, FlowManager, FlowSource, FlowStep, SetupFlow};

impl FlowManager {
    /// Scans `host` and opens a flow listing the servers found, to be named and selected.
    pub async fn start_user_flow(&self, host: &str, settings: ScanSettings) -> Result<SetupFlow, FlowError> {
        let host = host.trim().to_string();
        if host.is_empty() {
            return Err(ConfigError::EmptyHost.into());
        }
        settings.validate()?;

        let ports = match scan_ports(self.query.clone(), &host, settings.port_min, settings.port_max, self.scan_timeout).await {
            Ok(ports) => ports,
            Err(e) => {
                warn!("Scan of {} failed: {}", host, e);
                Vec::new()
            }
        };
        if ports.is_empty() {
            return Err(FlowError::CannotConnect(host));
        }

        let mut flow = SetupFlow::new(FlowSource::User, FlowStep::SelectServers, host.clone(), settings);
        for port in &ports {
            flow.suggested_names.insert(*port, default_server_name(&ServerIdentity::new(host.clone(), *port)));
        }
        flow.title_placeholders.insert("host".into(), host.clone());
        flow.title_placeholders.insert("count".into(), ports.len().to_string());
        flow.found_ports = ports;

        debug!("User flow {} found {:?} on {}", flow.flow_id, flow.found_ports, host);
        self.expire_user_flows(flow.created_at);
        self.flows.insert(flow.flow_id.clone(), flow.clone());
        Ok(flow)
    }

    /// Creates one entry per found port given a non-empty name. Ports configured in the
    /// meantime are skipped.
    pub fn select_servers(&self, flow_id: &str, names: &HashMap<u16, String>) -> Result<Vec<ConfigEntry>, FlowError> {
        let flow = self.expect_step(flow_id, FlowStep::SelectServers)?;

        let mut created = Vec::new();
        for port in &flow.found_ports {
            let Some(name) = names.get(port).map(|n| n.trim()).filter(|n| !n.is_empty()) else {
                continue;
            };
            let identity = ServerIdentity::new(flow.host.clone(), *port);
            if self.entries.contains(&identity) {
                debug!("Skipping {}, already configured", identity);
                continue;
            }

            // The first entry belongs to this flow, the rest are created alongside it
            let source = if created.is_empty() { EntrySource::User } else { EntrySource::Internal };
            let entry = ConfigEntry::new(
                name.to_string(),
                source,
                EntryData::new(&identity, flow.settings, Some(name.to_string())),
            );
            match self.entries.add_entry(entry.clone()) {
                Ok(()) => created.push(entry),
                Err(StoreError::AlreadyConfigured(_)) => continue,
                Err(e) if created.is_empty() => return Err(e.into()),
                Err(e) => {
                    // Entries already written stand; the rest can be added by a new flow
                    warn!("Could not add {}: {}", identity, e);
                    break;
                }
            }
        }

        if created.is_empty() {
            return Err(FlowError::NoServersSelected);
        }
        self.finish(&flow);
        info!("User flow for {} created {} entries", flow.host, created.len());
        Ok(created)
    }
}
