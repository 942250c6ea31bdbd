// src/flows/discovery.rs
use std::collections::HashSet;
use dashmap::mapref::entry::Entry;
use log::info;
use crate::models::entry::{
    default_server_name, ConfigEntry, EntryData, EntrySource, ScanSettings, ServerIdentity,
};
use super::{FlowError, FlowInitiator, FlowManager, FlowSource, FlowStep, SetupFlow};

impl FlowInitiator for FlowManager {
    fn pending_discovery_ports(&self, host: &str) -> HashSet<u16> {
        self.flows
            .iter()
            .filter_map(|r| r.value().discovered_identity())
            .filter(|identity| identity.host == host)
            .map(|identity| identity.port)
            .collect()
    }

    fn init_discovery_flow(&self, identity: ServerIdentity) -> Result<String, FlowError> {
        let unique_id = identity.unique_id();
        if self.entries.contains(&identity) {
            return Err(FlowError::AlreadyConfigured(unique_id));
        }
        if self.dismissed.contains_key(&unique_id) {
            return Err(FlowError::Ignored(unique_id));
        }

        let flow_id = match self.in_progress.entry(unique_id.clone()) {
            Entry::Occupied(_) => return Err(FlowError::AlreadyInProgress(unique_id)),
            Entry::Vacant(vacant) => {
                let mut flow = SetupFlow::new(
                    FlowSource::Discovery,
                    FlowStep::DiscoveryConfirm,
                    identity.host.clone(),
                    self.inherited_settings(&identity.host),
                );
                flow.port = Some(identity.port);
                flow.found_ports = vec![identity.port];
                flow.suggested_names.insert(identity.port, default_server_name(&identity));
                flow.title_placeholders.insert("host".into(), identity.host.clone());
                flow.title_placeholders.insert("port".into(), identity.port.to_string());

                let flow_id = flow.flow_id.clone();
                vacant.insert(flow_id.clone());
                self.flows.insert(flow_id.clone(), flow);
                flow_id
            }
        };

        info!("Discovered new Minecraft server on {}", identity);
        Ok(flow_id)
    }
}

impl FlowManager {
    /// Settings of an existing entry on `host`, or the defaults.
    fn inherited_settings(&self, host: &str) -> ScanSettings {
        self.entries
            .entries_for_host(host)
            .first()
            .map(ConfigEntry::effective_settings)
            .unwrap_or_default()
    }

    /// Accepts a discovery prompt and creates the entry for it.
    pub fn confirm_discovery(&self, flow_id: &str, server_name: &str) -> Result<ConfigEntry, FlowError> {
        let flow = self.expect_step(flow_id, FlowStep::DiscoveryConfirm)?;
        let identity = flow
            .discovered_identity()
            .ok_or_else(|| FlowError::NotFound(flow_id.to_string()))?;

        let name = match server_name.trim() {
            "" => default_server_name(&identity),
            trimmed => trimmed.to_string(),
        };
        let settings = self.inherited_settings(&identity.host);
        let entry = ConfigEntry::new(
            name.clone(),
            EntrySource::Discovery,
            EntryData::new(&identity, settings, Some(name)),
        );

        let result = self.entries.add_entry(entry.clone());
        // The prompt is over either way
        self.finish(&flow);
        result?;
        Ok(entry)
    }
}
