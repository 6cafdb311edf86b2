//! HTTP route handlers.

pub mod forward;
pub mod health;
pub mod load_stats;
pub mod models;
pub mod root;

use actix_web::web;

/// Wire every route onto the application.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(root::index))
        .route("/health", web::get().to(health::health))
        .route("/load-stats", web::get().to(load_stats::load_stats))
        .route("/v1/models", web::get().to(models::list_models))
        .route("/v1/chat/completions", web::post().to(forward::chat_completions))
        .route("/v1/completions", web::post().to(forward::completions))
        .route("/v1/embeddings", web::post().to(forward::embeddings));
}
