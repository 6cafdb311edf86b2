//! Health-transition policy, shared by the active probe loop and the
//! forwarder's passive failure tracking.

use tracing::info;

use crate::config::RouterTuning;
use crate::core::upstream::Upstream;

/// Evaluate whether `upstream` should flip liveness given its current
/// rolling stats. Called after every active probe outcome is recorded.
pub fn evaluate_active(upstream: &Upstream, tuning: &RouterTuning) {
    if upstream.is_healthy() {
        let failing = upstream.success_rate() < tuning.health_check_min_success_rate
            || upstream.mean_response_time_ms() > tuning.health_check_max_response_time * 1000.0;
        if failing && upstream.consecutive_failures() >= tuning.health_check_consecutive_failures {
            transition(upstream, false, "active health check failure threshold reached");
        }
        return;
    }

    if let Some(recovering_for) = upstream.recovering_for() {
        if recovering_for >= tuning.auto_recovery_threshold() {
            transition(upstream, true, "sustained successful probes, auto-recovered");
        }
    }
}

/// Called by the forwarder when a request attempt against `upstream` fails.
/// Trips the upstream unhealthy immediately once `failure_threshold`
/// consecutive forwarding failures accumulate, independent of the active
/// probe cadence.
pub fn record_passive_failure(upstream: &Upstream, tuning: &RouterTuning) {
    if upstream.is_healthy() && upstream.consecutive_failures() >= tuning.failure_threshold {
        transition(upstream, false, "consecutive forwarding failures");
    }
}

fn transition(upstream: &Upstream, healthy: bool, reason: &str) {
    let old = upstream.is_healthy();
    if old == healthy {
        return;
    }
    if healthy {
        upstream.mark_healthy();
    } else {
        upstream.mark_unhealthy();
    }
    info!(
        url = upstream.url(),
        old_healthy = old,
        new_healthy = healthy,
        reason,
        "upstream health transition"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_check_trips_unhealthy_after_threshold() {
        let up = Upstream::new("http://a".into(), 4);
        up.mark_healthy();
        let tuning = RouterTuning {
            health_check_consecutive_failures: 2,
            ..Default::default()
        };
        up.record_outcome(false, None);
        evaluate_active(&up, &tuning);
        assert!(up.is_healthy());

        up.record_outcome(false, None);
        evaluate_active(&up, &tuning);
        assert!(!up.is_healthy());
    }

    #[test]
    fn passive_failure_trips_independent_of_active_loop() {
        let up = Upstream::new("http://a".into(), 4);
        up.mark_healthy();
        let tuning = RouterTuning {
            failure_threshold: 2,
            ..Default::default()
        };
        up.record_outcome(false, None);
        record_passive_failure(&up, &tuning);
        assert!(up.is_healthy());

        up.record_outcome(false, None);
        record_passive_failure(&up, &tuning);
        assert!(!up.is_healthy());
    }

    #[test]
    fn single_scrape_timeout_does_not_trip_liveness() {
        let up = Upstream::new("http://a".into(), 4);
        up.mark_healthy();
        let tuning = RouterTuning::default();
        up.mark_scrape_failed();
        evaluate_active(&up, &tuning);
        assert!(up.is_healthy());
    }
}
