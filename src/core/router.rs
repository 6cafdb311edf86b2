//! The `Router` value: owns the fleet handle, the shared HTTP client, and
//! the tuning knobs, and spawns the background tasks that keep the fleet's
//! load, health, and model data current.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::core::discovery;
use crate::core::fleet::FleetSnapshot;
use crate::core::scraper;
use crate::core::upstream::Upstream;
use crate::utils::error::{Result, RouterError};

/// The single application value threaded through every task and HTTP
/// handler. There is no module-level mutable state anywhere else in the
/// crate; everything reachable from a request or a tick goes through here.
pub struct Router {
    fleet: ArcSwap<FleetSnapshot>,
    http_client: reqwest::Client,
    config_path: PathBuf,
    config_mtime: Mutex<Option<SystemTime>>,
    shutdown_tx: watch::Sender<bool>,
}

impl Router {
    /// Build a router from an already-loaded config. Upstreams start
    /// unhealthy until their first successful probe.
    pub fn new(config: Config, config_path: PathBuf) -> Result<Arc<Self>> {
        let http_client = reqwest::Client::builder()
            .build()
            .map_err(RouterError::HttpClient)?;

        let upstreams = config
            .servers
            .servers
            .iter()
            .map(|entry| Arc::new(Upstream::new(entry.url.clone(), entry.max_concurrent_requests)))
            .collect();

        let fleet = FleetSnapshot::new(upstreams, config.tuning);
        let (shutdown_tx, _) = watch::channel(false);
        let initial_mtime = std::fs::metadata(&config_path).ok().and_then(|m| m.modified().ok());

        Ok(Arc::new(Self {
            fleet: ArcSwap::from_pointee(fleet),
            http_client,
            config_path,
            config_mtime: Mutex::new(initial_mtime),
            shutdown_tx,
        }))
    }

    pub fn fleet(&self) -> Arc<FleetSnapshot> {
        self.fleet.load_full()
    }

    pub fn http_client(&self) -> &reqwest::Client {
        &self.http_client
    }

    /// Reload the config file and atomically publish a new fleet snapshot.
    /// Existing upstream records are preserved by reference for any URL
    /// that survives the reload, so their liveness and rolling stats are
    /// untouched; only their declared capacity is updated in place.
    pub async fn reload(self: &Arc<Self>) -> Result<()> {
        let config = Config::from_file(&self.config_path).await?;
        let current = self.fleet();

        let existing: HashMap<&str, &Arc<Upstream>> =
            current.upstreams.iter().map(|u| (u.url(), u)).collect();

        let mut next = Vec::with_capacity(config.servers.servers.len());
        for entry in &config.servers.servers {
            match existing.get(entry.url.as_str()) {
                Some(upstream) => {
                    upstream.set_max_concurrent_requests(entry.max_concurrent_requests);
                    next.push(Arc::clone(upstream));
                }
                None => {
                    info!(url = entry.url, "new upstream added by config reload");
                    next.push(Arc::new(Upstream::new(
                        entry.url.clone(),
                        entry.max_concurrent_requests,
                    )));
                }
            }
        }

        let removed: Vec<&str> = existing
            .keys()
            .filter(|url| !config.servers.servers.iter().any(|e| &e.url.as_str() == *url))
            .copied()
            .collect();
        for url in removed {
            info!(url, "upstream removed by config reload");
        }

        let new_fleet = FleetSnapshot::new(next, config.tuning);
        self.fleet.store(Arc::new(new_fleet));
        debug!("config reload applied");
        Ok(())
    }

    /// Spawn the scraper/health and discovery loops, plus the config
    /// watcher when `watch_config` is set. Returns their join handles so
    /// the caller can await a clean shutdown.
    pub fn spawn_background_tasks(self: &Arc<Self>, watch_config: bool) -> Vec<JoinHandle<()>> {
        let mut tasks = vec![self.spawn_scrape_and_health_loop(), self.spawn_discovery_loop()];
        if watch_config {
            tasks.push(self.spawn_config_watch_loop());
        }
        tasks
    }

    /// Reload only if the config file's mtime has advanced since the last
    /// check (or since startup). Ticking on a fixed interval does not imply
    /// the file changed; this keeps an unmodified file from being re-read,
    /// re-parsed, and re-published on every tick.
    async fn reload_if_changed(self: &Arc<Self>) {
        let modified = match tokio::fs::metadata(&self.config_path).await {
            Ok(metadata) => metadata.modified().ok(),
            Err(e) => {
                warn!(error = %e, "could not stat config file for reload check");
                return;
            }
        };

        let changed = {
            let mut last = self.config_mtime.lock();
            let changed = *last != modified;
            *last = modified;
            changed
        };

        if !changed {
            return;
        }

        if let Err(e) = self.reload().await {
            error!(error = %e, "config reload failed, retaining previous fleet snapshot");
        }
    }

    /// Signal all background tasks to stop after their current tick.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    fn spawn_scrape_and_health_loop(self: &Arc<Self>) -> JoinHandle<()> {
        let router = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        tokio::spawn(async move {
            loop {
                let interval = router.fleet().tuning.health_check_interval();
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        scraper::tick(&router).await;
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
        })
    }

    fn spawn_discovery_loop(self: &Arc<Self>) -> JoinHandle<()> {
        let router = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        tokio::spawn(async move {
            loop {
                let fleet = router.fleet();
                let interval = fleet.tuning.config_reload_interval();
                let timeout = fleet.tuning.health_check_timeout();
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        let client = router.http_client().clone();
                        let probes = fleet.upstreams.iter().map(|u| discovery::discover_one(&client, u, timeout));
                        futures::future::join_all(probes).await;
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
        })
    }

    fn spawn_config_watch_loop(self: &Arc<Self>) -> JoinHandle<()> {
        let router = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        tokio::spawn(async move {
            loop {
                let interval = router.fleet().tuning.config_reload_interval();
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        router.reload_if_changed().await;
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
        })
    }
}
