//! `GET /health` — fleet-wide liveness summary plus per-upstream detail.

use actix_web::{web, HttpResponse};
use serde::Serialize;

use crate::server::state::AppState;

#[derive(Serialize)]
struct ServerHealth {
    url: String,
    healthy: bool,
    last_scrape_at: Option<chrono::DateTime<chrono::Utc>>,
    success_rate: f64,
    mean_response_time_ms: f64,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    total_servers: usize,
    healthy_servers: usize,
    servers: Vec<ServerHealth>,
}

pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    let fleet = state.router.fleet();

    let servers: Vec<ServerHealth> = fleet
        .upstreams
        .iter()
        .map(|u| {
            let snap = u.snapshot();
            ServerHealth {
                url: snap.url,
                healthy: snap.healthy,
                last_scrape_at: snap.last_scrape_at,
                success_rate: snap.success_rate,
                mean_response_time_ms: snap.mean_response_time_ms,
            }
        })
        .collect();

    let healthy_servers = servers.iter().filter(|s| s.healthy).count();
    let status = if healthy_servers > 0 { "healthy" } else { "unhealthy" };

    HttpResponse::Ok().json(HealthResponse {
        status,
        total_servers: servers.len(),
        healthy_servers,
        servers,
    })
}
