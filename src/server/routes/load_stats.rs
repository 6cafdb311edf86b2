//! `GET /load-stats` — per-upstream live load plus a fleet-wide summary.

use actix_web::{web, HttpResponse};
use serde::Serialize;

use crate::server::state::AppState;

#[derive(Serialize)]
struct ServerLoad {
    url: String,
    current_load: u64,
    waiting: u64,
    max_capacity: u32,
    available_capacity: i64,
    utilization_percent: f64,
}

#[derive(Serialize)]
struct FleetSummary {
    total_servers: usize,
    healthy_servers: usize,
    total_running: u64,
    total_waiting: u64,
}

#[derive(Serialize)]
struct LoadStatsResponse {
    servers: Vec<ServerLoad>,
    summary: FleetSummary,
}

pub async fn load_stats(state: web::Data<AppState>) -> HttpResponse {
    let fleet = state.router.fleet();

    let servers: Vec<ServerLoad> = fleet
        .upstreams
        .iter()
        .map(|u| {
            let snap = u.snapshot();
            let utilization_percent = if snap.max_concurrent_requests == 0 {
                0.0
            } else {
                (snap.running as f64 / snap.max_concurrent_requests as f64) * 100.0
            };
            ServerLoad {
                url: snap.url,
                current_load: snap.running,
                waiting: snap.waiting,
                max_capacity: snap.max_concurrent_requests,
                available_capacity: snap.available_capacity(),
                utilization_percent,
            }
        })
        .collect();

    let summary = FleetSummary {
        total_servers: servers.len(),
        healthy_servers: fleet.healthy_count(),
        total_running: servers.iter().map(|s| s.current_load).sum(),
        total_waiting: servers.iter().map(|s| s.waiting).sum(),
    };

    HttpResponse::Ok().json(LoadStatsResponse { servers, summary })
}
