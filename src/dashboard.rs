// src/dashboard.rs
use std::sync::Arc;
use std::time::Duration;
use lazy_static::lazy_static;
use log::{debug, info, warn};
use crate::config::DOMAIN;
use crate::storage::resources::ResourceRegistry;
use crate::storage::StoreError;

pub const CARD_JS: &str = "mc-server-stats-card.js";
pub const CARD_SOURCE: &str = include_str!("../www/mc-server-stats-card.js");

lazy_static! {
    pub static ref CARD_STATIC_PATH: String = format!("/hacsfiles/{}", DOMAIN);
    pub static ref CARD_URL: String = format!("{}/{}", *CARD_STATIC_PATH, CARD_JS);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    AlreadyRegistered,
    Created,
}

/// Makes sure the card is a dashboard module, replacing urls left by older layouts.
pub fn register_card_resource(resources: &dyn ResourceRegistry) -> Result<Registration, StoreError> {
    let card_url = CARD_URL.as_str();
    for item in resources.items()? {
        if item.url == card_url || item.url.starts_with(&format!("{}?", card_url)) {
            debug!("Dashboard resource already registered: {}", item.url);
            return Ok(Registration::AlreadyRegistered);
        }
        if item.url.contains(CARD_JS) && !item.url.starts_with(card_url) {
            match resources.delete_item(&item.id) {
                Ok(()) => info!("Removed outdated dashboard resource: {}", item.url),
                Err(e) => debug!("Could not remove outdated resource {}: {}", item.url, e),
            }
        }
    }

    resources.create_item("module", card_url)?;
    info!("Registered dashboard resource: {}", card_url);
    Ok(Registration::Created)
}

/// Retries registration a fixed number of times. Never fails the caller.
pub async fn register_with_retry(resources: Arc<dyn ResourceRegistry>, attempts: u32, delay: Duration) {
    for attempt in 1..=attempts.max(1) {
        match register_card_resource(resources.as_ref()) {
            Ok(_) => return,
            Err(e) => {
                debug!("Card registration attempt {} failed: {}", attempt, e);
                if attempt < attempts {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
    warn!(
        "Could not register the dashboard card. Add {} manually as a dashboard resource (type: module).",
        *CARD_URL
    );
}
