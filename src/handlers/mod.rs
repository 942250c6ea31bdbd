// src/handlers/mod.rs
pub mod card;
pub mod discovery;
pub mod flows;
pub mod resources;
pub mod servers;

use actix_web::web;
use crate::config::Config;
use crate::dashboard::CARD_STATIC_PATH;
use crate::utils::api_cors;

/// Registers every route. Shared state (`Supervisor`, `Config`, `ResourceStore`,
/// `IpRateLimiter`) must already be attached as app data.
pub fn configure(cfg: &mut web::ServiceConfig, config: &Config) {
    cfg.service(
        web::scope("/api")
            .wrap(api_cors(config))
            .route("/servers", web::get().to(servers::list_servers))
            .route("/servers/{entry_id}", web::get().to(servers::get_server))
            .route("/servers/{entry_id}", web::delete().to(servers::delete_server))
            .route("/servers/{entry_id}/options", web::put().to(servers::update_options))
            .route("/discovery", web::get().to(discovery::list_scanners))
            .route("/flows", web::get().to(flows::list_flows))
            .route("/flows/user", web::post().to(flows::start_user_flow))
            .route("/flows/{flow_id}/select", web::post().to(flows::select_servers))
            .route("/flows/{flow_id}/confirm", web::post().to(flows::confirm_discovery))
            .route("/flows/{flow_id}/dismiss", web::post().to(flows::dismiss_flow))
            .route("/resources", web::get().to(resources::list_resources)),
    )
    .route(&format!("{}/{{file}}", *CARD_STATIC_PATH), web::get().to(card::serve_card));
}
