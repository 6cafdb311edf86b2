//! Per-request forwarding pipeline: select an upstream, proxy the HTTP
//! transaction, relay the (possibly streamed) response, and retry on a
//! different upstream when an attempt fails before any bytes were sent to
//! the client.

use std::collections::HashSet;
use std::time::Duration;

use actix_web::http::header::{HeaderMap, HeaderName, HeaderValue};
use actix_web::web::Bytes;
use actix_web::HttpResponse;
use futures_util::StreamExt;
use tracing::{debug, warn};

use crate::core::health;
use crate::core::router::Router;
use crate::core::selector::{self, SelectionError};
use crate::core::upstream::UpstreamSnapshot;
use crate::utils::error::{Result, RouterError};

const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
    "host",
];

/// Pull the `model` field out of a JSON request body, if present and
/// non-empty. Used to restrict selection to upstreams serving that model.
pub fn extract_model(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    value
        .get("model")
        .and_then(|m| m.as_str())
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}

/// Forward an incoming request to the best available upstream at `path`,
/// retrying on a different upstream while attempts fail before any response
/// bytes reach the caller.
pub async fn forward(
    router: &Router,
    method: actix_web::http::Method,
    path: &str,
    incoming_headers: &HeaderMap,
    body: Bytes,
) -> Result<HttpResponse> {
    let model_id = extract_model(&body);
    let tuning = router.fleet().tuning.clone();
    let per_attempt_timeout = tuning.request_timeout();
    let max_attempts = tuning.max_retries + 1;

    let mut excluded = HashSet::new();
    let mut last_error: Option<String> = None;

    for attempt in 1..=max_attempts {
        let fleet = router.fleet();

        let candidate = match selector::select(&fleet, model_id.as_deref(), &excluded) {
            Ok(candidate) => candidate,
            Err(SelectionError::NoHealthyUpstream) => return Err(RouterError::NoHealthyUpstream),
            Err(SelectionError::NoUpstreamServesModel(model)) => {
                return Err(RouterError::NoUpstreamServesModel(model));
            }
            Err(SelectionError::AllAtCapacity(candidate)) => {
                debug!(url = candidate.url, "all upstreams at capacity, attempting anyway");
                candidate
            }
        };

        match try_once(router, &candidate, &method, path, incoming_headers, &body, per_attempt_timeout).await {
            Ok(response) => return Ok(response),
            Err(e) => {
                warn!(url = candidate.url, attempt, error = %e, "forwarding attempt failed");
                record_failure(router, &candidate);
                last_error = Some(e.to_string());
                excluded.insert(candidate.url.clone());

                if attempt < max_attempts {
                    tokio::time::sleep(tuning.retry_delay()).await;
                }
            }
        }
    }

    Err(RouterError::UpstreamUnavailable(
        last_error.unwrap_or_else(|| "no attempts were made".to_string()),
    ))
}

/// Run a single attempt against `candidate`. Returns `Ok` only once the
/// response is fully committed to being relayed to the client — from that
/// point there is no going back to try another upstream.
async fn try_once(
    router: &Router,
    candidate: &UpstreamSnapshot,
    method: &actix_web::http::Method,
    path: &str,
    incoming_headers: &HeaderMap,
    body: &Bytes,
    timeout: Duration,
) -> std::result::Result<HttpResponse, String> {
    let url = format!("{}{}", candidate.url, path);
    let reqwest_method =
        reqwest::Method::from_bytes(method.as_str().as_bytes()).map_err(|e| e.to_string())?;

    let mut builder = router.http_client().request(reqwest_method, &url).timeout(timeout).body(body.clone());

    for (name, value) in incoming_headers.iter() {
        if HOP_BY_HOP.contains(&name.as_str().to_ascii_lowercase().as_str()) {
            continue;
        }
        builder = builder.header(name.as_str(), value.as_bytes());
    }

    let upstream_response = builder.send().await.map_err(|e| e.to_string())?;

    let status = upstream_response.status();

    if status.is_server_error() {
        return Err(format!("upstream returned {status}"));
    }

    record_success(router, candidate);

    let mut response_builder = HttpResponse::build(
        actix_web::http::StatusCode::from_u16(status.as_u16())
            .unwrap_or(actix_web::http::StatusCode::BAD_GATEWAY),
    );

    for (name, value) in upstream_response.headers().iter() {
        if HOP_BY_HOP.contains(&name.as_str().to_ascii_lowercase().as_str()) {
            continue;
        }
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_str().as_bytes()),
            HeaderValue::from_bytes(value.as_bytes()),
        ) {
            response_builder.insert_header((name, value));
        }
    }

    let byte_stream = upstream_response
        .bytes_stream()
        .map(|chunk| chunk.map_err(|e| actix_web::error::ErrorBadGateway(e.to_string())));

    Ok(response_builder.streaming(byte_stream))
}

fn record_success(router: &Router, candidate: &UpstreamSnapshot) {
    if let Some(upstream) = router.fleet().find(&candidate.url) {
        upstream.record_outcome(true, None);
    }
}

fn record_failure(router: &Router, candidate: &UpstreamSnapshot) {
    let fleet = router.fleet();
    if let Some(upstream) = fleet.find(&candidate.url) {
        upstream.record_outcome(false, None);
        health::record_passive_failure(upstream, &fleet.tuning);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_model_field() {
        let body = br#"{"model": "llama-3", "messages": []}"#;
        assert_eq!(extract_model(body).as_deref(), Some("llama-3"));
    }

    #[test]
    fn missing_model_field_is_none() {
        let body = br#"{"messages": []}"#;
        assert_eq!(extract_model(body), None);
    }

    #[test]
    fn empty_model_field_is_none() {
        let body = br#"{"model": ""}"#;
        assert_eq!(extract_model(body), None);
    }

    #[test]
    fn malformed_body_is_none() {
        assert_eq!(extract_model(b"not json"), None);
    }
}
