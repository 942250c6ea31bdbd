// src/handlers/resources.rs
use actix_web::{web, HttpRequest, HttpResponse};
use crate::config::Config;
use crate::storage::resources::{ResourceRegistry, ResourceStore};
use crate::utils::{trusted_client, RequestError};

pub async fn list_resources(
    req: HttpRequest,
    resources: web::Data<ResourceStore>,
    config: web::Data<Config>,
) -> Result<HttpResponse, RequestError> {
    trusted_client(&req, &config.trusted_networks)?;
    Ok(HttpResponse::Ok().json(resources.items()?))
}

#[cfg(test)]
mod tests {
    use actix_web::test;
    use serde_json::Value;
    use crate::config::Config;
    use crate::dashboard::{register_card_resource, CARD_URL};
    use crate::handlers::testing::{app, lan, state};

    #[actix_web::test]
    async fn lists_registered_card() {
        let state = state(&[], Config::default());
        register_card_resource(state.resources.get_ref()).unwrap();
        let app = app!(state).await;

        let req = test::TestRequest::get().uri("/api/resources").peer_addr(lan()).to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body[0]["url"], CARD_URL.as_str());
        assert_eq!(body[0]["type"], "module");
    }
}
