//! Pure upstream-selection algorithm.

use std::collections::HashSet;

use rand::seq::IteratorRandom;

use crate::core::fleet::FleetSnapshot;
use crate::core::upstream::UpstreamSnapshot;

/// Load below which an upstream is preferred over one that is merely the
/// least-loaded of a saturated group.
const PREFERRED_SCORE_THRESHOLD: f64 = 0.5;

/// Outcome of a selection attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionError {
    /// No upstream is currently marked healthy.
    NoHealthyUpstream,
    /// At least one upstream is healthy, but none advertise the requested
    /// model.
    NoUpstreamServesModel(String),
    /// Every healthy (and, if filtered, model-serving) candidate is at or
    /// over its declared capacity.
    AllAtCapacity(UpstreamSnapshot),
}

/// Select the best upstream for a request, optionally restricted to
/// upstreams advertising `model_id`. `excluded` removes URLs already tried
/// within the current request's retry loop.
pub fn select(
    fleet: &FleetSnapshot,
    model_id: Option<&str>,
    excluded: &HashSet<String>,
) -> Result<UpstreamSnapshot, SelectionError> {
    let healthy: Vec<UpstreamSnapshot> = fleet
        .upstreams
        .iter()
        .filter(|u| u.is_healthy())
        .filter(|u| !excluded.contains(u.url()))
        .map(|u| u.snapshot())
        .collect();

    if healthy.is_empty() {
        return Err(SelectionError::NoHealthyUpstream);
    }

    let candidates: Vec<UpstreamSnapshot> = match model_id {
        Some(model) if !model.is_empty() => {
            let filtered: Vec<_> = healthy.into_iter().filter(|u| u.models.contains(model)).collect();
            if filtered.is_empty() {
                return Err(SelectionError::NoUpstreamServesModel(model.to_string()));
            }
            filtered
        }
        _ => healthy,
    };

    let preferred: Vec<&UpstreamSnapshot> = candidates
        .iter()
        .filter(|u| u.score() < PREFERRED_SCORE_THRESHOLD)
        .collect();

    let group: Vec<&UpstreamSnapshot> = if !preferred.is_empty() {
        preferred
    } else {
        candidates.iter().collect()
    };

    let min_score = group
        .iter()
        .map(|u| u.score())
        .fold(f64::INFINITY, f64::min);

    let mut rng = rand::thread_rng();
    let winner = group
        .iter()
        .filter(|u| (u.score() - min_score).abs() < 1e-9)
        .choose(&mut rng)
        .expect("group is non-empty");

    if winner.available_capacity() <= 0 {
        return Err(SelectionError::AllAtCapacity((*winner).clone()));
    }

    Ok((*winner).clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouterTuning;
    use crate::core::upstream::Upstream;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn fleet_of(loads: &[(u32, u64, u64, bool)]) -> FleetSnapshot {
        let upstreams = loads
            .iter()
            .enumerate()
            .map(|(i, &(cap, running, waiting, healthy))| {
                let up = Upstream::new(format!("http://host{i}"), cap);
                up.set_load(running, waiting, 0.0);
                if healthy {
                    up.mark_healthy();
                }
                Arc::new(up)
            })
            .collect();
        FleetSnapshot::new(upstreams, RouterTuning::default())
    }

    #[test]
    fn no_healthy_upstream_is_reported() {
        let fleet = fleet_of(&[(10, 0, 0, false)]);
        let result = select(&fleet, None, &HashSet::new());
        assert_eq!(result, Err(SelectionError::NoHealthyUpstream));
    }

    #[test]
    fn picks_least_loaded_among_preferred() {
        // host0 score = 5/10 = 0.5 (not preferred), host1 score = 1/10 = 0.1 (preferred)
        let fleet = fleet_of(&[(10, 5, 0, true), (10, 1, 0, true)]);
        let chosen = select(&fleet, None, &HashSet::new()).expect("selection");
        assert_eq!(chosen.url, "http://host1");
    }

    #[test]
    fn model_filter_excludes_non_serving_upstreams() {
        let fleet = fleet_of(&[(10, 0, 0, true), (10, 0, 0, true)]);
        fleet.upstreams[1].set_models(HashSet::from(["llama".to_string()]));
        let chosen = select(&fleet, Some("llama"), &HashSet::new()).expect("selection");
        assert_eq!(chosen.url, "http://host1");
    }

    #[test]
    fn missing_model_is_reported_even_with_healthy_fleet() {
        let fleet = fleet_of(&[(10, 0, 0, true)]);
        let result = select(&fleet, Some("missing"), &HashSet::new());
        assert_eq!(
            result,
            Err(SelectionError::NoUpstreamServesModel("missing".to_string()))
        );
    }

    #[test]
    fn excluded_urls_are_skipped() {
        let fleet = fleet_of(&[(10, 0, 0, true), (10, 1, 0, true)]);
        let mut excluded = HashSet::new();
        excluded.insert("http://host0".to_string());
        let chosen = select(&fleet, None, &excluded).expect("selection");
        assert_eq!(chosen.url, "http://host1");
    }

    #[test]
    fn saturated_fleet_reports_all_at_capacity() {
        let fleet = fleet_of(&[(10, 10, 0, true)]);
        let result = select(&fleet, None, &HashSet::new());
        match result {
            Err(SelectionError::AllAtCapacity(snap)) => assert_eq!(snap.url, "http://host0"),
            other => panic!("expected AllAtCapacity, got {other:?}"),
        }
    }
}
