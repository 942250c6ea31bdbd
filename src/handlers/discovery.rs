// src/handlers/discovery.rs
use actix_web::{web, HttpRequest, HttpResponse};
use crate::config::Config;
use crate::supervisor::Supervisor;
use crate::utils::{trusted_client, RequestError};

pub async fn list_scanners(
    req: HttpRequest,
    supervisor: web::Data<Supervisor>,
    config: web::Data<Config>,
) -> Result<HttpResponse, RequestError> {
    trusted_client(&req, &config.trusted_networks)?;
    Ok(HttpResponse::Ok().json(supervisor.discovery_states()))
}

#[cfg(test)]
mod tests {
    use actix_web::test;
    use serde_json::{json, Value};
    use crate::config::Config;
    use crate::handlers::testing::{app, lan, state};
    use crate::models::entry::{ConfigEntry, EntryData, EntrySource, ScanSettings, ServerIdentity};

    #[actix_web::test]
    async fn one_scanner_per_host() {
        let state = state(&[25565, 25566], Config::default());
        for port in [25565, 25566] {
            let identity = ServerIdentity::new("127.0.0.1", port);
            let entry = ConfigEntry::new("x".into(), EntrySource::User, EntryData::new(&identity, ScanSettings::default(), None));
            state.supervisor.entries().add_entry(entry.clone()).unwrap();
            state.supervisor.setup_entry(&entry).await;
        }
        let app = app!(state).await;

        let req = test::TestRequest::get().uri("/api/discovery").peer_addr(lan()).to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["host"], "127.0.0.1");
        assert_eq!(body[0]["open_ports"], json!([25565, 25566]));
        assert_eq!(body[0]["settings"]["interval_secs"], 300);
    }
}
