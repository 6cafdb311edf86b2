//! Periodic load-scraper / active-health-check loop.
//!
//! Scraping and active health checking share one tick: both need the same
//! per-upstream probe, so they are driven by one task rather than two
//! independent timers racing each other's HTTP connections.

use std::time::Instant;

use tracing::{debug, warn};

use crate::core::health;
use crate::core::metrics_parser;
use crate::core::router::Router;

/// Probe every upstream in the current fleet snapshot in parallel.
pub async fn tick(router: &Router) {
    let fleet = router.fleet();
    let client = router.http_client();
    let tuning = fleet.tuning.clone();

    let probes = fleet.upstreams.iter().map(|upstream| {
        let client = client.clone();
        let timeout = tuning.health_check_timeout();
        let track_outcome = tuning.enable_active_health_check;
        async move {
            probe_one(&client, upstream, timeout, track_outcome).await;
            if track_outcome {
                health::evaluate_active(upstream, &tuning);
            }
        }
    });

    futures::future::join_all(probes).await;
}

/// Scrape one upstream's `/metrics`. `track_outcome` gates whether the probe
/// result feeds `record_outcome`'s shared consecutive-failure counter: with
/// active health checks disabled, a flaky scrape must not also inflate the
/// counter that passive forwarding failures use to trip liveness.
async fn probe_one(
    client: &reqwest::Client,
    upstream: &crate::core::upstream::Upstream,
    timeout: std::time::Duration,
    track_outcome: bool,
) {
    let url = format!("{}/metrics", upstream.url());
    let started = Instant::now();

    let response = match client.get(&url).timeout(timeout).send().await {
        Ok(resp) => resp,
        Err(e) => {
            warn!(url = upstream.url(), error = %e, "metrics scrape request failed");
            upstream.mark_scrape_failed();
            if track_outcome {
                upstream.record_outcome(false, None);
            }
            return;
        }
    };

    if !response.status().is_success() {
        warn!(url = upstream.url(), status = %response.status(), "metrics scrape returned non-success status");
        upstream.mark_scrape_failed();
        if track_outcome {
            upstream.record_outcome(false, None);
        }
        return;
    }

    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => {
            warn!(url = upstream.url(), error = %e, "metrics scrape body read failed");
            upstream.mark_scrape_failed();
            if track_outcome {
                upstream.record_outcome(false, None);
            }
            return;
        }
    };

    match metrics_parser::parse(&body) {
        Ok(load) => {
            let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
            upstream.set_load(
                load.num_requests_running as u64,
                load.num_requests_waiting as u64,
                load.gpu_cache_usage_perc,
            );
            if track_outcome {
                upstream.record_outcome(true, Some(latency_ms));
            }
            debug!(url = upstream.url(), running = load.num_requests_running, waiting = load.num_requests_waiting, "scraped load");
        }
        Err(e) => {
            warn!(url = upstream.url(), error = %e, "metrics scrape body was malformed");
            upstream.mark_scrape_failed();
            if track_outcome {
                upstream.record_outcome(false, None);
            }
        }
    }
}
