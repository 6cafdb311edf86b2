//! `GET /` — service identification for operators poking the router.

use actix_web::HttpResponse;
use serde::Serialize;

#[derive(Serialize)]
struct ServiceInfo {
    name: &'static str,
    version: &'static str,
    endpoints: Endpoints,
}

#[derive(Serialize)]
struct Endpoints {
    forward: [&'static str; 3],
    introspection: [&'static str; 3],
}

pub async fn index() -> HttpResponse {
    HttpResponse::Ok().json(ServiceInfo {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        endpoints: Endpoints {
            forward: ["/v1/chat/completions", "/v1/completions", "/v1/embeddings"],
            introspection: ["/health", "/load-stats", "/v1/models"],
        },
    })
}
