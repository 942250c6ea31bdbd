// src/handlers/card.rs
use actix_web::http::header;
use actix_web::{web, HttpResponse};
use log::debug;
use crate::dashboard::{CARD_JS, CARD_SOURCE};
use crate::utils::RequestError;

/// Serves the bundled dashboard card. Not behind the trusted-network check since
/// browsers load it directly.
pub async fn serve_card(path: web::Path<String>) -> Result<HttpResponse, RequestError> {
    let file = path.into_inner();
    if file != CARD_JS {
        debug!("Unknown static file requested: {}", file);
        return Err(RequestError::NotFound(file));
    }
    Ok(HttpResponse::Ok()
        .content_type("application/javascript")
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .body(CARD_SOURCE))
}
