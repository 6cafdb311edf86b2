//! Forward-mode handlers: proxy an OpenAI-compatible request to the best
//! available upstream.

use actix_web::{web, HttpRequest, HttpResponse};

use crate::core::forwarder;
use crate::server::state::AppState;
use crate::utils::error::Result;

async fn forward_to(state: &AppState, req: &HttpRequest, path: &str, body: web::Bytes) -> Result<HttpResponse> {
    forwarder::forward(&state.router, req.method().clone(), path, req.headers(), body).await
}

pub async fn chat_completions(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    forward_to(&state, &req, "/v1/chat/completions", body).await
}

pub async fn completions(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    forward_to(&state, &req, "/v1/completions", body).await
}

pub async fn embeddings(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    forward_to(&state, &req, "/v1/embeddings", body).await
}
