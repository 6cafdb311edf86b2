//! The fleet snapshot: the immutable, atomically-published view of which
//! upstreams exist and how they are tuned.

use std::sync::Arc;

use crate::config::RouterTuning;
use crate::core::upstream::Upstream;

/// An immutable ordered list of upstreams plus the tuning knobs in effect
/// when it was published. Upstream identity (the `Arc<Upstream>`) is
/// preserved across reloads that keep the same URL, so liveness and rolling
/// stats survive a config change.
#[derive(Clone)]
pub struct FleetSnapshot {
    pub upstreams: Vec<Arc<Upstream>>,
    pub tuning: RouterTuning,
}

impl FleetSnapshot {
    pub fn new(upstreams: Vec<Arc<Upstream>>, tuning: RouterTuning) -> Self {
        Self { upstreams, tuning }
    }

    pub fn find(&self, url: &str) -> Option<&Arc<Upstream>> {
        self.upstreams.iter().find(|u| u.url() == url)
    }

    pub fn healthy_count(&self) -> usize {
        self.upstreams.iter().filter(|u| u.is_healthy()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_locates_by_url() {
        let up = Arc::new(Upstream::new("http://a".into(), 4));
        let snapshot = FleetSnapshot::new(vec![up.clone()], RouterTuning::default());
        assert!(snapshot.find("http://a").is_some());
        assert!(snapshot.find("http://missing").is_none());
    }
}
