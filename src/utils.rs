// src/utils.rs
use actix_cors::Cors;
use actix_web::http::{header, StatusCode};
use actix_web::{HttpRequest, HttpResponse, ResponseError};
use governor::clock::DefaultClock;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::RateLimiter;
use ipnetwork::IpNetwork;
use log::{debug, warn};
use serde_json::json;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use crate::config::Config;
use crate::flows::FlowError;
use crate::storage::StoreError;

pub type IpRateLimiter = RateLimiter<IpAddr, DefaultKeyedStateStore<IpAddr>, DefaultClock>;

#[derive(Debug)]
pub enum RequestError {
    MissingPeerIP,
    UntrustedIP(IpAddr),
    RateLimitExceeded,
    NotFound(String),
    Flow(FlowError),
    Store(StoreError),
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingPeerIP => write!(f, "Failed to extract client IP"),
            Self::UntrustedIP(ip) => write!(f, "Request from untrusted IP: {}", ip),
            Self::RateLimitExceeded => write!(f, "Rate limit exceeded"),
            Self::NotFound(what) => write!(f, "Not found: {}", what),
            Self::Flow(e) => write!(f, "{}", e),
            Self::Store(e) => write!(f, "{}", e),
        }
    }
}

impl From<FlowError> for RequestError {
    fn from(e: FlowError) -> Self {
        Self::Flow(e)
    }
}

impl From<StoreError> for RequestError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

fn store_code(e: &StoreError) -> &'static str {
    match e {
        StoreError::AlreadyConfigured(_) => "already_configured",
        StoreError::NotFound(_) => "not_found",
        StoreError::Invalid(inner) => inner.code(),
        StoreError::Io(_) | StoreError::Json(_) => "storage_error",
    }
}

fn store_status(e: &StoreError) -> StatusCode {
    match e {
        StoreError::AlreadyConfigured(_) => StatusCode::CONFLICT,
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::Invalid(_) => StatusCode::BAD_REQUEST,
        StoreError::Io(_) | StoreError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl RequestError {
    /// Stable error key sent alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingPeerIP => "missing_peer_ip",
            Self::UntrustedIP(_) => "forbidden",
            Self::RateLimitExceeded => "rate_limited",
            Self::NotFound(_) => "not_found",
            Self::Flow(e) => e.code(),
            Self::Store(e) => store_code(e),
        }
    }
}

impl ResponseError for RequestError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingPeerIP => StatusCode::BAD_REQUEST,
            Self::UntrustedIP(_) => StatusCode::FORBIDDEN,
            Self::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Flow(e) => match e {
                FlowError::NotFound(_) => StatusCode::NOT_FOUND,
                FlowError::AlreadyConfigured(_)
                | FlowError::AlreadyInProgress(_)
                | FlowError::Ignored(_) => StatusCode::CONFLICT,
                FlowError::Store(inner) => store_status(inner),
                FlowError::WrongStep { .. }
                | FlowError::CannotConnect(_)
                | FlowError::NoServersSelected
                | FlowError::Invalid(_) => StatusCode::BAD_REQUEST,
            },
            Self::Store(e) => store_status(e),
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "error": self.code(),
            "message": self.to_string(),
        }))
    }
}

/// The connection's peer address. A local reverse proxy may name the real client in
/// `X-Forwarded-For`; the header is ignored from any other peer.
pub fn extract_client_ip(req: &HttpRequest) -> Result<IpAddr, RequestError> {
    let peer_ip = match req.peer_addr() {
        Some(addr) => addr.ip(),
        None => return Err(RequestError::MissingPeerIP),
    };
    if !peer_ip.is_loopback() {
        return Ok(peer_ip);
    }

    if let Some(forwarded_for) = req.headers().get("X-Forwarded-For") {
        if let Ok(ip_str) = forwarded_for.to_str() {
            if let Some(first_ip) = ip_str.split(',').next() {
                if let Ok(ip) = first_ip.trim().parse::<IpAddr>() {
                    debug!("Using X-Forwarded-For {} from local proxy", ip);
                    return Ok(ip);
                }
            }
        }
    }
    Ok(peer_ip)
}

pub fn is_trusted(ip: IpAddr, networks: &[IpNetwork]) -> bool {
    networks.iter().any(|network| network.contains(ip))
}

/// Client IP of a request, rejected unless it falls in a trusted network.
pub fn trusted_client(req: &HttpRequest, networks: &[IpNetwork]) -> Result<IpAddr, RequestError> {
    let ip = extract_client_ip(req)?;
    if !is_trusted(ip, networks) {
        warn!("Rejected API request from {}", ip);
        return Err(RequestError::UntrustedIP(ip));
    }
    Ok(ip)
}

/// Whether a browser origin may call the API: listed explicitly, or an address on a
/// trusted network.
pub fn origin_allowed(origin: &str, allowed: &[String], networks: &[IpNetwork]) -> bool {
    if allowed.iter().any(|a| a == origin) {
        return true;
    }
    let Some((_, authority)) = origin.split_once("://") else {
        return false;
    };
    let host = match authority.strip_prefix('[') {
        Some(rest) => rest.split(']').next().unwrap_or_default(),
        None => authority.split(':').next().unwrap_or_default(),
    };
    let ip = if host.eq_ignore_ascii_case("localhost") {
        Some(IpAddr::V4(Ipv4Addr::LOCALHOST))
    } else {
        host.parse::<IpAddr>().ok()
    };
    ip.map(|ip| is_trusted(ip, networks)).unwrap_or(false)
}

/// CORS policy for `/api`, so the card can be loaded from another origin.
pub fn api_cors(config: &Config) -> Cors {
    let allowed = config.cors_origins.clone();
    let networks = config.trusted_networks.clone();
    Cors::default()
        .allowed_origin_fn(move |origin, _head| {
            origin
                .to_str()
                .map(|origin| origin_allowed(origin, &allowed, &networks))
                .unwrap_or(false)
        })
        .allowed_methods(vec!["GET", "POST", "PUT", "DELETE"])
        .allowed_header(header::CONTENT_TYPE)
        .max_age(3600)
}

pub fn check_rate_limit(limiter: &IpRateLimiter, ip: IpAddr) -> Result<(), RequestError> {
    if limiter.check_key(&ip).is_err() {
        warn!("Rate limit exceeded for {}", ip);
        return Err(RequestError::RateLimitExceeded);
    }
    Ok(())
}
