// src/coordinator/mod.rs
//! Periodically refreshed data holders with pull and push access.

pub mod discovery;
pub mod status;

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use async_trait::async_trait;
use log::debug;
use parking_lot::Mutex;
use tokio::task::JoinHandle;

pub type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

pub struct Listeners<T> {
    inner: Mutex<Vec<Listener<T>>>,
}

impl<T> Default for Listeners<T> {
    fn default() -> Self {
        Self { inner: Mutex::new(Vec::new()) }
    }
}

impl<T> Listeners<T> {
    pub fn add(&self, listener: Listener<T>) {
        self.inner.lock().push(listener);
    }

    /// Calls every listener on the current task. The lock is released first so a
    /// listener may register further listeners.
    pub fn notify(&self, value: &T) {
        let listeners: Vec<Listener<T>> = self.inner.lock().clone();
        for listener in listeners {
            listener(value);
        }
    }
}

#[async_trait]
pub trait Refresh: Send + Sync + 'static {
    fn name(&self) -> String;
    /// Re-read before every sleep so interval changes apply on the next cycle.
    fn update_interval(&self) -> Duration;
    async fn refresh(&self);
}

/// A spawned refresh loop, aborted when dropped.
#[derive(Debug)]
pub struct Schedule {
    name: String,
    handle: JoinHandle<()>,
}

impl Schedule {
    pub fn spawn<R: Refresh>(coordinator: Arc<R>) -> Self {
        let name = coordinator.name();
        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(coordinator.update_interval()).await;
                coordinator.refresh().await;
            }
        });
        debug!("Scheduled {}", name);
        Self { name, handle }
    }
}

impl Drop for Schedule {
    fn drop(&mut self) {
        self.handle.abort();
        debug!("Stopped {}", self.name);
    }
}

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
