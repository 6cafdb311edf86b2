//! `GET /v1/models` — the union of every healthy upstream's model set.

use actix_web::{web, HttpResponse};
use serde::Serialize;

use crate::server::state::AppState;

#[derive(Serialize)]
struct ModelEntry {
    id: String,
    object: &'static str,
}

#[derive(Serialize)]
struct ModelsResponse {
    object: &'static str,
    data: Vec<ModelEntry>,
}

pub async fn list_models(state: web::Data<AppState>) -> HttpResponse {
    let fleet = state.router.fleet();

    let mut ids: Vec<String> = fleet
        .upstreams
        .iter()
        .filter(|u| u.is_healthy())
        .flat_map(|u| u.models())
        .collect();
    ids.sort();
    ids.dedup();

    let data = ids
        .into_iter()
        .map(|id| ModelEntry { id, object: "model" })
        .collect();

    HttpResponse::Ok().json(ModelsResponse { object: "list", data })
}
