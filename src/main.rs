// src/main.rs
mod config;
mod coordinator;
mod dashboard;
mod flows;
mod handlers;
mod models;
mod protocol;
mod reconciler;
mod storage;
mod supervisor;
mod utils;

use std::sync::Arc;
use actix_web::{web, App, HttpServer};
use env_logger::Env;
use log::{error, info};
use crate::config::Config;
use crate::protocol::JavaPinger;
use crate::storage::entries::EntryStore;
use crate::storage::resources::{ResourceRegistry, ResourceStore};
use crate::supervisor::Supervisor;
use crate::utils::IpRateLimiter;

fn startup_error(what: &str, e: impl std::fmt::Display) -> std::io::Error {
    error!("Failed to load {}: {}", what, e);
    std::io::Error::new(std::io::ErrorKind::Other, format!("Failed to load {}: {}", what, e))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let config = Config::from_env();
    let bind = format!("{}:{}", config.bind_address, config.port);

    let entries = EntryStore::load(config.entries_path()).map_err(|e| startup_error("entries", e))?;
    let resources = Arc::new(
        ResourceStore::load(config.resources_path()).map_err(|e| startup_error("dashboard resources", e))?,
    );

    let supervisor = web::Data::new(Supervisor::new(config.clone(), Arc::new(entries), Arc::new(JavaPinger)));
    supervisor.setup_all().await;

    let registry: Arc<dyn ResourceRegistry> = resources.clone();
    tokio::spawn(dashboard::register_with_retry(
        registry,
        config.card_register_attempts,
        config.card_register_delay(),
    ));

    let rate_limiter = web::Data::new(IpRateLimiter::keyed(config.api_quota()));
    let resources = web::Data::from(resources);
    let app_config = web::Data::new(config);

    info!("Starting server on {}", bind);
    let server_supervisor = supervisor.clone();
    let result = HttpServer::new(move || {
        App::new()
            .app_data(server_supervisor.clone())
            .app_data(app_config.clone())
            .app_data(resources.clone())
            .app_data(rate_limiter.clone())
            .configure(|cfg| handlers::configure(cfg, &app_config))
    })
        .bind(&bind)?
        .run().await;

    supervisor.shutdown();
    result
}
