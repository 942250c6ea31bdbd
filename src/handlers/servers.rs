// src/handlers/servers.rs
use actix_web::{web, HttpRequest, HttpResponse};
use log::info;
use crate::config::Config;
use crate::models::entry::EntryOptions;
use crate::supervisor::Supervisor;
use crate::utils::{check_rate_limit, trusted_client, IpRateLimiter, RequestError};

pub async fn list_servers(
    req: HttpRequest,
    supervisor: web::Data<Supervisor>,
    config: web::Data<Config>,
) -> Result<HttpResponse, RequestError> {
    trusted_client(&req, &config.trusted_networks)?;
    Ok(HttpResponse::Ok().json(supervisor.server_views()))
}

pub async fn get_server(
    req: HttpRequest,
    path: web::Path<String>,
    supervisor: web::Data<Supervisor>,
    config: web::Data<Config>,
) -> Result<HttpResponse, RequestError> {
    trusted_client(&req, &config.trusted_networks)?;
    let entry_id = path.into_inner();
    match supervisor.server_view(&entry_id) {
        Some(view) => Ok(HttpResponse::Ok().json(view)),
        None => Err(RequestError::NotFound(entry_id)),
    }
}

pub async fn update_options(
    req: HttpRequest,
    path: web::Path<String>,
    options: web::Json<EntryOptions>,
    supervisor: web::Data<Supervisor>,
    config: web::Data<Config>,
    rate_limiter: web::Data<IpRateLimiter>,
) -> Result<HttpResponse, RequestError> {
    let client_ip = trusted_client(&req, &config.trusted_networks)?;
    check_rate_limit(&rate_limiter, client_ip)?;

    let entry_id = path.into_inner();
    let entry = supervisor.update_options(&entry_id, options.into_inner()).await?;
    info!("Updated options of {} from {}", entry.title, client_ip);
    Ok(HttpResponse::Ok().json(entry))
}

pub async fn delete_server(
    req: HttpRequest,
    path: web::Path<String>,
    supervisor: web::Data<Supervisor>,
    config: web::Data<Config>,
    rate_limiter: web::Data<IpRateLimiter>,
) -> Result<HttpResponse, RequestError> {
    let client_ip = trusted_client(&req, &config.trusted_networks)?;
    check_rate_limit(&rate_limiter, client_ip)?;

    let entry = supervisor.remove_entry(&path.into_inner())?;
    info!("Removed {} ({}) from {}", entry.title, entry.identity(), client_ip);
    Ok(HttpResponse::Ok().json(entry))
}

#[cfg(test)]
mod tests {
    use actix_web::http::{header, Method, StatusCode};
    use actix_web::test;
    use serde_json::{json, Value};
    use crate::config::Config;
    use crate::handlers::testing::{app, lan, state};
    use crate::models::entry::{ConfigEntry, EntryData, EntrySource, ScanSettings, ServerIdentity};

    fn add(state: &crate::handlers::testing::TestState, port: u16) -> ConfigEntry {
        let identity = ServerIdentity::new("127.0.0.1", port);
        let entry = ConfigEntry::new("Survival".into(), EntrySource::User, EntryData::new(&identity, ScanSettings::default(), Some("Survival".into())));
        state.supervisor.entries().add_entry(entry.clone()).unwrap();
        entry
    }

    #[actix_web::test]
    async fn lists_servers_with_snapshot_and_title() {
        let state = state(&[25565], Config::default());
        let entry = add(&state, 25565);
        state.supervisor.setup_entry(&entry).await;
        let app = app!(state).await;

        let req = test::TestRequest::get().uri("/api/servers").peer_addr(lan()).to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body[0]["title"], "Survival");
        assert_eq!(body[0]["snapshot"]["online"], true);
        assert_eq!(body[0]["snapshot"]["player_names"], json!(["Alex"]));
        assert_eq!(body[0]["entities"].as_array().unwrap().len(), 7);
    }

    #[actix_web::test]
    async fn dashboard_origins_get_cors_headers() {
        let state = state(&[], Config::default());
        let app = app!(state).await;

        let req = test::TestRequest::get()
            .uri("/api/servers")
            .peer_addr(lan())
            .insert_header((header::ORIGIN, "http://192.168.1.20:8123"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "http://192.168.1.20:8123"
        );

        let req = test::TestRequest::default()
            .method(Method::OPTIONS)
            .uri("/api/servers/abc")
            .peer_addr(lan())
            .insert_header((header::ORIGIN, "http://192.168.1.20:8123"))
            .insert_header((header::ACCESS_CONTROL_REQUEST_METHOD, "DELETE"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());

        let req = test::TestRequest::get()
            .uri("/api/servers")
            .peer_addr(lan())
            .insert_header((header::ORIGIN, "https://evil.example"))
            .to_request();
        if let Ok(resp) = test::try_call_service(&app, req).await {
            assert!(resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
        }
    }

    #[actix_web::test]
    async fn untrusted_clients_get_forbidden() {
        let state = state(&[], Config::default());
        let app = app!(state).await;
        let req = test::TestRequest::get()
            .uri("/api/servers")
            .peer_addr("8.8.8.8:1234".parse().unwrap())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn unknown_entry_is_not_found() {
        let state = state(&[], Config::default());
        let app = app!(state).await;
        let req = test::TestRequest::get().uri("/api/servers/nope").peer_addr(lan()).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::delete().uri("/api/servers/nope").peer_addr(lan()).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn invalid_options_are_rejected() {
        let state = state(&[25565], Config::default());
        let entry = add(&state, 25565);
        state.supervisor.setup_entry(&entry).await;
        let app = app!(state).await;

        let req = test::TestRequest::put()
            .uri(&format!("/api/servers/{}/options", entry.entry_id))
            .peer_addr(lan())
            .set_json(json!({"port_min": 25600, "port_max": 25500}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "invalid_port_range");

        let req = test::TestRequest::put()
            .uri(&format!("/api/servers/{}/options", entry.entry_id))
            .peer_addr(lan())
            .set_json(json!({"scan_interval": 120}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["options"]["scan_interval"], 120);
    }

    #[actix_web::test]
    async fn delete_removes_entry_and_scanner() {
        let state = state(&[25565], Config::default());
        let entry = add(&state, 25565);
        state.supervisor.setup_entry(&entry).await;
        let app = app!(state).await;

        let req = test::TestRequest::delete()
            .uri(&format!("/api/servers/{}", entry.entry_id))
            .peer_addr(lan())
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
        assert!(state.supervisor.discovery_states().is_empty());
        assert!(state.supervisor.entries().entries().is_empty());
    }

    #[actix_web::test]
    async fn mutating_routes_are_rate_limited() {
        let config = Config { api_burst_limit: 1, api_period_secs: 3600, ..Config::default() };
        let state = state(&[], config);
        let app = app!(state).await;

        let req = test::TestRequest::delete().uri("/api/servers/a").peer_addr(lan()).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
        let req = test::TestRequest::delete().uri("/api/servers/a").peer_addr(lan()).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
