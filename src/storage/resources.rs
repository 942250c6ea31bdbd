// src/storage/resources.rs
use std::path::PathBuf;
use dashmap::DashMap;
use log::info;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use super::{read_json, write_json, StoreError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardResource {
    pub id: String,
    #[serde(rename = "type")]
    pub res_type: String,
    pub url: String,
}

/// The dashboard resource collection the card registers itself in.
pub trait ResourceRegistry: Send + Sync {
    fn items(&self) -> Result<Vec<DashboardResource>, StoreError>;
    fn create_item(&self, res_type: &str, url: &str) -> Result<DashboardResource, StoreError>;
    fn delete_item(&self, id: &str) -> Result<(), StoreError>;
}

pub struct ResourceStore {
    items: DashMap<String, DashboardResource>,
    path: Option<PathBuf>,
    persist_lock: Mutex<()>,
}

impl ResourceStore {
    pub fn in_memory() -> Self {
        Self {
            items: DashMap::new(),
            path: None,
            persist_lock: Mutex::new(()),
        }
    }

    pub fn load(path: PathBuf) -> Result<Self, StoreError> {
        let mut store = Self::in_memory();
        let stored: Vec<DashboardResource> = read_json(&path)?.unwrap_or_default();
        for item in stored {
            store.items.insert(item.id.clone(), item);
        }
        store.path = Some(path);
        Ok(store)
    }

    fn sorted(&self) -> Vec<DashboardResource> {
        let mut items: Vec<DashboardResource> = self.items.iter().map(|r| r.value().clone()).collect();
        items.sort_by(|a, b| a.url.cmp(&b.url));
        items
    }

    fn persist(&self) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let _guard = self.persist_lock.lock();
        write_json(path, &self.sorted())
    }
}

impl ResourceRegistry for ResourceStore {
    fn items(&self) -> Result<Vec<DashboardResource>, StoreError> {
        Ok(self.sorted())
    }

    fn create_item(&self, res_type: &str, url: &str) -> Result<DashboardResource, StoreError> {
        let item = DashboardResource {
            id: uuid::Uuid::new_v4().simple().to_string(),
            res_type: res_type.to_string(),
            url: url.to_string(),
        };
        self.items.insert(item.id.clone(), item.clone());
        self.persist()?;
        info!("Created dashboard resource {}", url);
        Ok(item)
    }

    fn delete_item(&self, id: &str) -> Result<(), StoreError> {
        self.items
            .remove(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        self.persist()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn items_persist_across_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resources.json");

        let store = ResourceStore::load(path.clone()).unwrap();
        let created = store.create_item("module", "/local/card.js").unwrap();
        store.create_item("module", "/local/other.js").unwrap();
        store.delete_item(&created.id).unwrap();

        let reloaded = ResourceStore::load(path).unwrap();
        let items = reloaded.items().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].url, "/local/other.js");
        assert!(reloaded.delete_item("nope").is_err());
    }
}
