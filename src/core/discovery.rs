//! Periodic model-list discovery against each upstream's `/v1/models`.

use std::collections::HashSet;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::core::upstream::Upstream;

#[derive(Debug, Deserialize)]
struct ModelsEnvelope {
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

/// Fetch and store the model set for a single upstream. On any failure the
/// upstream's previously discovered set is left untouched.
pub async fn discover_one(client: &reqwest::Client, upstream: &Upstream, timeout: std::time::Duration) {
    let url = format!("{}/v1/models", upstream.url());

    let response = match client.get(&url).timeout(timeout).send().await {
        Ok(resp) => resp,
        Err(e) => {
            warn!(url = upstream.url(), error = %e, "model discovery request failed");
            return;
        }
    };

    if !response.status().is_success() {
        warn!(url = upstream.url(), status = %response.status(), "model discovery returned non-success status");
        return;
    }

    match response.json::<ModelsEnvelope>().await {
        Ok(envelope) => {
            let models: HashSet<String> = envelope.data.into_iter().map(|m| m.id).collect();
            debug!(url = upstream.url(), count = models.len(), "discovered models");
            upstream.set_models(models);
        }
        Err(e) => {
            warn!(url = upstream.url(), error = %e, "model discovery response was not parseable");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_upstream_keeps_previous_set() {
        let upstream = Upstream::new("http://127.0.0.1:1".into(), 4);
        upstream.set_models(HashSet::from(["kept".to_string()]));
        let client = reqwest::Client::new();
        discover_one(&client, &upstream, std::time::Duration::from_millis(50)).await;
        assert!(upstream.serves_model("kept"));
    }
}
