// src/handlers/flows.rs
use std::collections::HashMap;
use actix_web::{web, HttpRequest, HttpResponse};
use log::info;
use serde::Deserialize;
use crate::config::Config;
use crate::models::entry::{EntryOptions, ScanSettings};
use crate::supervisor::Supervisor;
use crate::utils::{check_rate_limit, trusted_client, IpRateLimiter, RequestError};

#[derive(Deserialize)]
pub struct UserFlowRequest {
    host: String,
    #[serde(flatten)]
    settings: EntryOptions,
}

#[derive(Deserialize)]
pub struct SelectRequest {
    /// Port to server name; blank names leave the port out.
    names: HashMap<u16, String>,
}

#[derive(Deserialize)]
pub struct ConfirmRequest {
    #[serde(default)]
    server_name: String,
}

pub async fn list_flows(
    req: HttpRequest,
    supervisor: web::Data<Supervisor>,
    config: web::Data<Config>,
) -> Result<HttpResponse, RequestError> {
    trusted_client(&req, &config.trusted_networks)?;
    Ok(HttpResponse::Ok().json(supervisor.flows().flows()))
}

pub async fn start_user_flow(
    req: HttpRequest,
    body: web::Json<UserFlowRequest>,
    supervisor: web::Data<Supervisor>,
    config: web::Data<Config>,
    rate_limiter: web::Data<IpRateLimiter>,
) -> Result<HttpResponse, RequestError> {
    let client_ip = trusted_client(&req, &config.trusted_networks)?;
    check_rate_limit(&rate_limiter, client_ip)?;

    let settings = body.settings.apply(ScanSettings::default());
    let flow = supervisor.flows().start_user_flow(&body.host, settings).await?;
    info!("{} started a setup flow for {}", client_ip, flow.host);
    Ok(HttpResponse::Created().json(flow))
}

pub async fn select_servers(
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<SelectRequest>,
    supervisor: web::Data<Supervisor>,
    config: web::Data<Config>,
    rate_limiter: web::Data<IpRateLimiter>,
) -> Result<HttpResponse, RequestError> {
    let client_ip = trusted_client(&req, &config.trusted_networks)?;
    check_rate_limit(&rate_limiter, client_ip)?;

    let created = supervisor.select_servers(&path.into_inner(), &body.names).await?;
    Ok(HttpResponse::Created().json(created))
}

pub async fn confirm_discovery(
    req: HttpRequest,
    path: web::Path<String>,
    body: Option<web::Json<ConfirmRequest>>,
    supervisor: web::Data<Supervisor>,
    config: web::Data<Config>,
    rate_limiter: web::Data<IpRateLimiter>,
) -> Result<HttpResponse, RequestError> {
    let client_ip = trusted_client(&req, &config.trusted_networks)?;
    check_rate_limit(&rate_limiter, client_ip)?;

    let server_name = body.map(|b| b.into_inner().server_name).unwrap_or_default();
    let entry = supervisor.confirm_discovery(&path.into_inner(), &server_name).await?;
    Ok(HttpResponse::Created().json(entry))
}

pub async fn dismiss_flow(
    req: HttpRequest,
    path: web::Path<String>,
    supervisor: web::Data<Supervisor>,
    config: web::Data<Config>,
    rate_limiter: web::Data<IpRateLimiter>,
) -> Result<HttpResponse, RequestError> {
    let client_ip = trusted_client(&req, &config.trusted_networks)?;
    check_rate_limit(&rate_limiter, client_ip)?;

    let flow = supervisor.flows().dismiss(&path.into_inner())?;
    Ok(HttpResponse::Ok().json(flow))
}
