// src/storage/entries.rs
use std::collections::HashSet;
use std::path::PathBuf;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::{debug, info, warn};
use parking_lot::Mutex;
use crate::models::entry::{ConfigEntry, EntryOptions, ServerIdentity};
use super::{read_json, write_json, StoreError};

/// Configuration entries, unique by `host:port`.
pub struct EntryStore {
    entries: DashMap<String, ConfigEntry>,
    // unique id -> entry id
    by_identity: DashMap<String, String>,
    path: Option<PathBuf>,
    persist_lock: Mutex<()>,
}

impl EntryStore {
    pub fn in_memory() -> Self {
        Self {
            entries: DashMap::new(),
            by_identity: DashMap::new(),
            path: None,
            persist_lock: Mutex::new(()),
        }
    }

    pub fn load(path: PathBuf) -> Result<Self, StoreError> {
        let mut store = Self::in_memory();
        let stored: Vec<ConfigEntry> = read_json(&path)?.unwrap_or_default();
        for entry in stored {
            if let Err(e) = store.insert(entry) {
                // A hand-edited file may contain duplicates; keep the first one
                warn!("Skipping stored entry: {}", e);
            }
        }
        info!("Loaded {} entries from {}", store.entries.len(), path.display());
        store.path = Some(path);
        Ok(store)
    }

    fn insert(&self, entry: ConfigEntry) -> Result<(), StoreError> {
        entry.data.validate()?;
        let unique_id = entry.identity().unique_id();
        match self.by_identity.entry(unique_id) {
            Entry::Occupied(occupied) => Err(StoreError::AlreadyConfigured(occupied.key().clone())),
            Entry::Vacant(vacant) => {
                vacant.insert(entry.entry_id.clone());
                self.entries.insert(entry.entry_id.clone(), entry);
                Ok(())
            }
        }
    }

    /// Adds an entry; nothing is kept when it cannot be written to disk.
    pub fn add_entry(&self, entry: ConfigEntry) -> Result<(), StoreError> {
        let description = format!("{} ({})", entry.title, entry.identity());
        let entry_id = entry.entry_id.clone();
        let unique_id = entry.identity().unique_id();
        self.insert(entry)?;
        if let Err(e) = self.persist() {
            self.entries.remove(&entry_id);
            self.by_identity.remove(&unique_id);
            return Err(e);
        }
        info!("Added entry {}", description);
        Ok(())
    }

    pub fn update_options(&self, entry_id: &str, options: EntryOptions) -> Result<ConfigEntry, StoreError> {
        let (updated, previous) = {
            let mut entry = self
                .entries
                .get_mut(entry_id)
                .ok_or_else(|| StoreError::NotFound(entry_id.to_string()))?;
            options.apply(entry.data.settings()).validate()?;
            let previous = std::mem::replace(&mut entry.options, options);
            (entry.clone(), previous)
        };
        if let Err(e) = self.persist() {
            if let Some(mut entry) = self.entries.get_mut(entry_id) {
                entry.options = previous;
            }
            return Err(e);
        }
        debug!("Updated options for {}", updated.identity());
        Ok(updated)
    }

    pub fn remove(&self, entry_id: &str) -> Result<ConfigEntry, StoreError> {
        let (_, entry) = self
            .entries
            .remove(entry_id)
            .ok_or_else(|| StoreError::NotFound(entry_id.to_string()))?;
        let unique_id = entry.identity().unique_id();
        self.by_identity.remove(&unique_id);
        if let Err(e) = self.persist() {
            self.by_identity.insert(unique_id, entry.entry_id.clone());
            self.entries.insert(entry.entry_id.clone(), entry);
            return Err(e);
        }
        info!("Removed entry {} ({})", entry.title, entry.identity());
        Ok(entry)
    }

    pub fn get(&self, entry_id: &str) -> Option<ConfigEntry> {
        self.entries.get(entry_id).map(|r| r.value().clone())
    }

    pub fn contains(&self, identity: &ServerIdentity) -> bool {
        self.by_identity.contains_key(&identity.unique_id())
    }

    pub fn entries(&self) -> Vec<ConfigEntry> {
        let mut entries: Vec<ConfigEntry> = self.entries.iter().map(|r| r.value().clone()).collect();
        entries.sort_by(|a, b| (&a.data.host, a.data.port).cmp(&(&b.data.host, b.data.port)));
        entries
    }

    pub fn entries_for_host(&self, host: &str) -> Vec<ConfigEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.data.host == host)
            .collect()
    }

    pub fn configured_ports(&self, host: &str) -> HashSet<u16> {
        self.entries
            .iter()
            .filter(|r| r.value().data.host == host)
            .map(|r| r.value().data.port)
            .collect()
    }

    fn persist(&self) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let _guard = self.persist_lock.lock();
        write_json(path, &self.entries())
    }
}
