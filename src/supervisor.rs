// src/supervisor.rs
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::{debug, info};
use serde::Serialize;
use crate::config::Config;
use crate::coordinator::discovery::{DiscoveryCoordinator, DiscoverySettings, DiscoveryState};
use crate::coordinator::status::StatusCoordinator;
use crate::coordinator::{Refresh, Schedule};
use crate::flows::{FlowError, FlowManager};
use crate::models::entity::{device_info, render_all, DeviceInfo, EntityState};
use crate::models::entry::{ConfigEntry, EntryOptions, ScanSettings};
use crate::models::snapshot::ServerSnapshot;
use crate::protocol::StatusQuery;
use crate::reconciler::Reconciler;
use crate::storage::entries::EntryStore;
use crate::storage::StoreError;

struct Poller {
    coordinator: Arc<StatusCoordinator>,
    _schedule: Schedule,
}

struct Scanner {
    coordinator: Arc<DiscoveryCoordinator>,
    _schedule: Schedule,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerView {
    #[serde(flatten)]
    pub entry: ConfigEntry,
    pub snapshot: ServerSnapshot,
    pub updated_at: Option<u64>,
    pub device: DeviceInfo,
    pub entities: Vec<EntityState>,
}

/// Owns every running poller (keyed by entry id) and scanner (keyed by host).
/// A host's scanner lives from its first entry's setup until its last entry's unload.
pub struct Supervisor {
    config: Config,
    entries: Arc<EntryStore>,
    flows: Arc<FlowManager>,
    reconciler: Arc<Reconciler>,
    query: Arc<dyn StatusQuery>,
    pollers: DashMap<String, Poller>,
    scanners: DashMap<String, Scanner>,
}

impl Supervisor {
    pub fn new(config: Config, entries: Arc<EntryStore>, query: Arc<dyn StatusQuery>) -> Self {
        let flows = Arc::new(FlowManager::new(entries.clone(), query.clone(), config.scan_timeout()));
        let reconciler = Arc::new(Reconciler::new(entries.clone(), flows.clone()));
        Self {
            config,
            entries,
            flows,
            reconciler,
            query,
            pollers: DashMap::new(),
            scanners: DashMap::new(),
        }
    }

    pub fn entries(&self) -> &Arc<EntryStore> {
        &self.entries
    }

    pub fn flows(&self) -> &Arc<FlowManager> {
        &self.flows
    }

    pub async fn setup_all(&self) {
        for entry in self.entries.entries() {
            self.setup_entry(&entry).await;
        }
    }

    pub async fn setup_entry(&self, entry: &ConfigEntry) {
        let settings = entry.effective_settings();
        let identity = entry.identity();

        let coordinator = Arc::new(StatusCoordinator::new(
            identity.clone(),
            settings.scan_interval(),
            self.config.status_timeout(),
            self.query.clone(),
        ));
        let was_online = AtomicBool::new(false);
        let label = entry.title.clone();
        coordinator.add_listener(Arc::new(move |snapshot: &ServerSnapshot| {
            if was_online.swap(snapshot.online, Ordering::Relaxed) != snapshot.online {
                info!("{} is {}", label, if snapshot.online { "online" } else { "offline" });
            }
        }));
        // Registered before the first poll so an unload during it finds the poller.
        // Replacing a poller drops and aborts the old schedule.
        let poller = Poller {
            _schedule: Schedule::spawn(coordinator.clone()),
            coordinator: coordinator.clone(),
        };
        self.pollers.insert(entry.entry_id.clone(), poller);
        coordinator.refresh().await;

        if !self.is_current(&entry.entry_id, &coordinator) {
            debug!("{} was unloaded during setup", entry.title);
            self.drop_poller(&entry.entry_id, &coordinator);
            return;
        }
        info!("Set up {} ({})", entry.title, identity);

        self.flows.prune_configured();
        self.start_discovery(&identity.host, settings).await;
        if !self.is_current(&entry.entry_id, &coordinator) {
            self.drop_poller(&entry.entry_id, &coordinator);
        }
    }

    /// Removes `coordinator` if it is still registered, then frees an unused scanner.
    fn drop_poller(&self, entry_id: &str, coordinator: &Arc<StatusCoordinator>) {
        self.pollers
            .remove_if(entry_id, |_, poller| Arc::ptr_eq(&poller.coordinator, coordinator));
        self.release_scanner(&coordinator.identity().host);
    }

    /// Whether `coordinator` is still the registered poller of a stored entry.
    fn is_current(&self, entry_id: &str, coordinator: &Arc<StatusCoordinator>) -> bool {
        let registered = self
            .pollers
            .get(entry_id)
            .map(|poller| Arc::ptr_eq(&poller.coordinator, coordinator))
            .unwrap_or(false);
        registered && self.entries.get(entry_id).is_some()
    }

    /// Stops the scanner of `host` once no poller uses it.
    fn release_scanner(&self, host: &str) {
        let in_use = self
            .pollers
            .iter()
            .any(|r| r.value().coordinator.identity().host == host);
        if !in_use && self.scanners.remove(host).is_some() {
            debug!("Stopped discovery for {}", host);
        }
    }

    /// Starts the shared scanner for `host`, or updates the running one in place.
    async fn start_discovery(&self, host: &str, settings: ScanSettings) {
        let discovery = DiscoverySettings {
            port_min: settings.port_min,
            port_max: settings.port_max,
            interval_secs: settings.discovery_interval,
        };

        let coordinator = match self.scanners.entry(host.to_string()) {
            Entry::Occupied(existing) => {
                existing.get().coordinator.update_settings(discovery);
                return;
            }
            Entry::Vacant(vacant) => {
                let coordinator = Arc::new(DiscoveryCoordinator::new(
                    host.to_string(),
                    discovery,
                    self.config.scan_timeout(),
                    self.query.clone(),
                ));
                let reconciler = self.reconciler.clone();
                let scanned_host = host.to_string();
                coordinator.add_listener(Arc::new(move |ports: &Vec<u16>| {
                    reconciler.on_discovery_update(&scanned_host, ports);
                }));
                vacant.insert(Scanner {
                    coordinator: coordinator.clone(),
                    _schedule: Schedule::spawn(coordinator.clone()),
                });
                coordinator
            }
        };

        debug!("Started discovery for {}", host);
        coordinator.refresh().await;
    }

    /// Stops the poller of an entry, and its host's scanner if no other entry uses it.
    pub fn unload_entry(&self, entry_id: &str) -> bool {
        let Some((_, poller)) = self.pollers.remove(entry_id) else {
            return false;
        };
        let host = poller.coordinator.identity().host.clone();
        drop(poller);
        self.release_scanner(&host);
        true
    }

    pub async fn reload_entry(&self, entry_id: &str) -> Result<(), StoreError> {
        let entry = self
            .entries
            .get(entry_id)
            .ok_or_else(|| StoreError::NotFound(entry_id.to_string()))?;
        self.unload_entry(entry_id);
        self.setup_entry(&entry).await;
        Ok(())
    }

    pub fn remove_entry(&self, entry_id: &str) -> Result<ConfigEntry, StoreError> {
        let entry = self.entries.remove(entry_id)?;
        self.unload_entry(entry_id);
        Ok(entry)
    }

    /// Stores new options and reloads the entry so they take effect.
    pub async fn update_options(&self, entry_id: &str, options: EntryOptions) -> Result<ConfigEntry, StoreError> {
        let entry = self.entries.update_options(entry_id, options)?;
        self.reload_entry(entry_id).await?;
        Ok(entry)
    }

    pub async fn confirm_discovery(&self, flow_id: &str, server_name: &str) -> Result<ConfigEntry, FlowError> {
        let entry = self.flows.confirm_discovery(flow_id, server_name)?;
        self.setup_entry(&entry).await;
        Ok(entry)
    }

    pub async fn select_servers(&self, flow_id: &str, names: &HashMap<u16, String>) -> Result<Vec<ConfigEntry>, FlowError> {
        let created = self.flows.select_servers(flow_id, names)?;
        for entry in &created {
            self.setup_entry(entry).await;
        }
        Ok(created)
    }

    pub fn server_view(&self, entry_id: &str) -> Option<ServerView> {
        let entry = self.entries.get(entry_id)?;
        let (snapshot, updated_at) = match self.pollers.get(entry_id) {
            Some(poller) => (poller.coordinator.data(), poller.coordinator.updated_at()),
            None => (ServerSnapshot::offline(), None),
        };
        let identity = entry.identity();
        let name = entry.data.server_name.as_deref();
        Some(ServerView {
            device: device_info(&identity, name),
            entities: render_all(&identity, name, &snapshot),
            snapshot,
            updated_at,
            entry,
        })
    }

    pub fn server_views(&self) -> Vec<ServerView> {
        self.entries
            .entries()
            .iter()
            .filter_map(|entry| self.server_view(&entry.entry_id))
            .collect()
    }

    pub fn discovery_states(&self) -> Vec<DiscoveryState> {
        let mut states: Vec<DiscoveryState> = self
            .scanners
            .iter()
            .map(|r| r.value().coordinator.state())
            .collect();
        states.sort_by(|a, b| a.host.cmp(&b.host));
        states
    }

    pub fn shutdown(&self) {
        self.pollers.clear();
        self.scanners.clear();
        info!("Stopped all pollers and scanners");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::time::Duration;
    use crate::flows::FlowInitiator;
    use crate::models::entry::{EntryData, EntrySource, ServerIdentity};
    use crate::protocol::testing::FakeQuery;

    const HOST: &str = "127.0.0.1";

    fn supervisor(open: &[u16]) -> (Arc<FakeQuery>, Supervisor) {
        let query = Arc::new(FakeQuery::with_ports(open));
        let supervisor = Supervisor::new(Config::default(), Arc::new(EntryStore::in_memory()), query.clone());
        (query, supervisor)
    }

    fn add(supervisor: &Supervisor, port: u16, settings: ScanSettings) -> ConfigEntry {
        let identity = ServerIdentity::new(HOST, port);
        let entry = ConfigEntry::new(format!("srv {}", port), EntrySource::User, EntryData::new(&identity, settings, None));
        supervisor.entries().add_entry(entry.clone()).unwrap();
        entry
    }

    #[tokio::test]
    async fn setup_polls_and_prompts_for_new_ports() {
        let (_, supervisor) = supervisor(&[25565, 25566]);
        let entry = add(&supervisor, 25565, ScanSettings::default());
        supervisor.setup_entry(&entry).await;

        let view = supervisor.server_view(&entry.entry_id).unwrap();
        assert!(view.snapshot.online);
        assert_eq!(view.entities.len(), 7);

        let states = supervisor.discovery_states();
        assert_eq!(states.len(), 1);
        assert_eq!(states[0].open_ports, Some(vec![25565, 25566]));
        assert_eq!(supervisor.flows().pending_discovery_ports(HOST), HashSet::from([25566]));
    }

    #[tokio::test]
    async fn second_entry_updates_the_host_scanner_in_place() {
        let (_, supervisor) = supervisor(&[25565, 25566]);
        let first = add(&supervisor, 25565, ScanSettings::default());
        supervisor.setup_entry(&first).await;

        let faster = ScanSettings { discovery_interval: 120, ..ScanSettings::default() };
        let second = add(&supervisor, 25566, faster);
        supervisor.setup_entry(&second).await;

        let states = supervisor.discovery_states();
        assert_eq!(states.len(), 1);
        assert_eq!(states[0].settings.interval_secs, 120);
    }

    #[tokio::test]
    async fn scanner_lives_until_last_entry_goes() {
        let (_, supervisor) = supervisor(&[25565, 25566]);
        let first = add(&supervisor, 25565, ScanSettings::default());
        let second = add(&supervisor, 25566, ScanSettings::default());
        supervisor.setup_entry(&first).await;
        supervisor.setup_entry(&second).await;

        supervisor.remove_entry(&first.entry_id).unwrap();
        assert_eq!(supervisor.discovery_states().len(), 1);
        assert!(supervisor.server_view(&first.entry_id).is_none());

        supervisor.remove_entry(&second.entry_id).unwrap();
        assert!(supervisor.discovery_states().is_empty());
        assert!(supervisor.server_views().is_empty());
    }

    #[tokio::test]
    async fn confirming_a_prompt_starts_polling() {
        let (_, supervisor) = supervisor(&[25565, 25566]);
        let entry = add(&supervisor, 25565, ScanSettings::default());
        supervisor.setup_entry(&entry).await;

        let flow = supervisor.flows().flows().pop().unwrap();
        let created = supervisor.confirm_discovery(&flow.flow_id, "Creative").await.unwrap();
        let view = supervisor.server_view(&created.entry_id).unwrap();
        assert!(view.snapshot.online);
        assert_eq!(view.entities[0].name, "Creative Players Online");
        assert!(supervisor.flows().flows().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn removal_during_first_poll_leaves_nothing_running() {
        let (query, supervisor) = supervisor(&[25565]);
        *query.delay.lock() = Duration::from_secs(5);
        let entry = add(&supervisor, 25565, ScanSettings::default());

        let removal = async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            supervisor.remove_entry(&entry.entry_id).unwrap();
        };
        tokio::join!(supervisor.setup_entry(&entry), removal);

        assert!(supervisor.pollers.is_empty());
        assert!(supervisor.discovery_states().is_empty());
        assert!(supervisor.server_view(&entry.entry_id).is_none());
    }

    #[tokio::test]
    async fn options_reload_the_poller() {
        let (_, supervisor) = supervisor(&[25565]);
        let entry = add(&supervisor, 25565, ScanSettings::default());
        supervisor.setup_entry(&entry).await;

        let options = EntryOptions { discovery_interval: Some(900), ..EntryOptions::default() };
        let updated = supervisor.update_options(&entry.entry_id, options).await.unwrap();
        assert_eq!(updated.effective_settings().discovery_interval, 900);
        assert_eq!(supervisor.discovery_states()[0].settings.interval_secs, 900);

        let bad = EntryOptions { port_min: Some(30000), ..EntryOptions::default() };
        assert!(supervisor.update_options(&entry.entry_id, bad).await.is_err());
    }

    #[tokio::test]
    async fn offline_server_still_renders() {
        let (query, supervisor) = supervisor(&[]);
        let entry = add(&supervisor, 25565, ScanSettings::default());
        supervisor.setup_entry(&entry).await;
        assert!(!supervisor.server_view(&entry.entry_id).unwrap().snapshot.online);
        assert_eq!(supervisor.discovery_states()[0].open_ports, Some(vec![]));
        assert!(!query.calls.lock().is_empty());

        supervisor.shutdown();
        assert!(supervisor.discovery_states().is_empty());
    }
}
