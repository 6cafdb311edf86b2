//! Error types for the router.

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde::Serialize;
use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RouterError>;

/// Main error type for the router.
#[derive(Error, Debug)]
pub enum RouterError {
    /// Config file could not be parsed.
    #[error("config parse error: {0}")]
    ConfigParse(String),

    /// Config failed structural validation.
    #[error("config error: {0}")]
    Config(String),

    /// No healthy upstream remained after filtering.
    #[error("no healthy upstream")]
    NoHealthyUpstream,

    /// No healthy upstream advertises the requested model.
    #[error("model {0} not available")]
    NoUpstreamServesModel(String),

    /// All retries (or all attempted upstreams) failed.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The client disconnected before a response could be produced.
    #[error("client disconnected")]
    ClientDisconnected,

    /// HTTP client errors talking to an upstream.
    #[error("http client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// JSON (de)serialization errors.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem I/O errors.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Catch-all for invariants that should not be reachable.
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ResponseError for RouterError {
    fn status_code(&self) -> StatusCode {
        match self {
            RouterError::NoHealthyUpstream => StatusCode::SERVICE_UNAVAILABLE,
            RouterError::NoUpstreamServesModel(_) => StatusCode::NOT_FOUND,
            RouterError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            RouterError::ClientDisconnected => StatusCode::BAD_REQUEST,
            RouterError::ConfigParse(_) | RouterError::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            RouterError::HttpClient(_)
            | RouterError::Serialization(_)
            | RouterError::Io(_)
            | RouterError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: self.to_string(),
        })
    }
}
