//! End-to-end tests against a mocked upstream, covering scraping, health
//! transitions, and request forwarding together.

use std::collections::HashSet;

use vllm_fleet_router::config::{Config, RouterTuning, ServerEntry, ServersTable};
use vllm_fleet_router::core::router::Router;
use vllm_fleet_router::core::scraper;
use vllm_fleet_router::core::selector::{self, SelectionError};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(url: &str) -> Config {
    Config {
        servers: ServersTable {
            servers: vec![ServerEntry {
                url: url.to_string(),
                max_concurrent_requests: 10,
            }],
        },
        tuning: RouterTuning::default(),
    }
}

fn config_with_instant_recovery(url: &str) -> Config {
    Config {
        servers: ServersTable {
            servers: vec![ServerEntry {
                url: url.to_string(),
                max_concurrent_requests: 10,
            }],
        },
        tuning: RouterTuning { auto_recovery_threshold: 0.0, ..Default::default() },
    }
}

#[tokio::test]
async fn scrape_tick_updates_load_and_marks_healthy_after_probe() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/metrics"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "vllm:num_requests_running 3\nvllm:num_requests_waiting 1\nvllm:gpu_cache_usage_perc 0.2\n",
        ))
        .mount(&mock_server)
        .await;

    let router = Router::new(config_with_instant_recovery(&mock_server.uri()), "unused.toml".into()).unwrap();
    scraper::tick(&router).await;

    let fleet = router.fleet();
    let upstream = fleet.find(&mock_server.uri()).expect("upstream present");
    let snapshot = upstream.snapshot();
    assert_eq!(snapshot.running, 3);
    assert_eq!(snapshot.waiting, 1);
    assert!(snapshot.scrape_ok);

    // With a zero recovery threshold, a single successful probe is enough
    // for the health checker to flip the upstream healthy.
    assert!(upstream.is_healthy());
}

#[tokio::test]
async fn scrape_tick_marks_scrape_failed_on_unreachable_upstream() {
    let router = Router::new(config_for("http://127.0.0.1:1"), "unused.toml".into()).unwrap();
    scraper::tick(&router).await;

    let fleet = router.fleet();
    let upstream = fleet.find("http://127.0.0.1:1").expect("upstream present");
    assert!(!upstream.snapshot().scrape_ok);
    assert!(!upstream.is_healthy());
}

#[tokio::test]
async fn selector_finds_the_mocked_upstream_once_healthy() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/metrics"))
        .respond_with(ResponseTemplate::new(200).set_body_string("vllm:num_requests_running 0\n"))
        .mount(&mock_server)
        .await;

    let router = Router::new(config_for(&mock_server.uri()), "unused.toml".into()).unwrap();
    let fleet = router.fleet();
    let upstream = fleet.find(&mock_server.uri()).unwrap();
    upstream.mark_healthy();

    let chosen = selector::select(&router.fleet(), None, &HashSet::new()).expect("selection");
    assert_eq!(chosen.url, mock_server.uri());
}

#[tokio::test]
async fn selector_reports_no_healthy_upstream_before_first_probe() {
    let router = Router::new(config_for("http://127.0.0.1:2"), "unused.toml".into()).unwrap();
    let result = selector::select(&router.fleet(), None, &HashSet::new());
    assert_eq!(result, Err(SelectionError::NoHealthyUpstream));
}

#[tokio::test]
async fn forwarder_relays_a_successful_upstream_response() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "chatcmpl-1",
            "choices": [],
        })))
        .mount(&mock_server)
        .await;

    let router = Router::new(config_for(&mock_server.uri()), "unused.toml".into()).unwrap();
    router.fleet().find(&mock_server.uri()).unwrap().mark_healthy();

    let headers = actix_web::http::header::HeaderMap::new();
    let body = actix_web::web::Bytes::from_static(br#"{"messages":[]}"#);
    let response = vllm_fleet_router::core::forwarder::forward(
        &router,
        actix_web::http::Method::POST,
        "/v1/chat/completions",
        &headers,
        body,
    )
    .await
    .expect("forward succeeds");

    assert!(response.status().is_success());
}

#[tokio::test]
async fn forwarder_retries_on_a_different_upstream_after_5xx() {
    let failing = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&failing)
        .await;

    let healthy = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&healthy)
        .await;

    let config = Config {
        servers: ServersTable {
            servers: vec![
                ServerEntry { url: failing.uri(), max_concurrent_requests: 10 },
                ServerEntry { url: healthy.uri(), max_concurrent_requests: 10 },
            ],
        },
        tuning: RouterTuning { retry_delay: 0.01, ..Default::default() },
    };
    let router = Router::new(config, "unused.toml".into()).unwrap();
    for upstream in &router.fleet().upstreams {
        upstream.mark_healthy();
    }
    // Bias selection so the failing upstream (score 0, strictly preferred)
    // is always tried first and the healthy one only on retry.
    router.fleet().find(&failing.uri()).unwrap().set_load(0, 0, 0.0);
    router.fleet().find(&healthy.uri()).unwrap().set_load(5, 0, 0.0);

    let headers = actix_web::http::header::HeaderMap::new();
    let body = actix_web::web::Bytes::new();
    let response = vllm_fleet_router::core::forwarder::forward(
        &router,
        actix_web::http::Method::POST,
        "/v1/completions",
        &headers,
        body,
    )
    .await
    .expect("forward eventually succeeds on the healthy upstream");

    assert!(response.status().is_success());
    assert_eq!(router.fleet().find(&failing.uri()).unwrap().consecutive_failures(), 1);
}
