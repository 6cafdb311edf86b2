//! Shared application state handed to every actix-web handler.

use std::sync::Arc;

use crate::core::router::Router;

/// Thin wrapper so handlers depend on the `Router` type rather than on
/// `web::Data<Arc<Router>>` directly.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<Router>,
}

impl AppState {
    pub fn new(router: Arc<Router>) -> Self {
        Self { router }
    }
}
