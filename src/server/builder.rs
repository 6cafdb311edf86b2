//! Top-level wiring: load config, construct the `Router`, spawn its
//! background tasks, and run the HTTP server until shutdown.

use std::path::PathBuf;

use tracing::info;

use crate::config::Config;
use crate::core::router::Router;
use crate::server::server::HttpServer;
use crate::server::state::AppState;
use crate::utils::error::Result;

/// Options gathered from the CLI/environment for the `run` subcommand.
pub struct RunOptions {
    pub host: String,
    pub port: u16,
    pub config_path: PathBuf,
    pub reload: bool,
}

pub async fn run_server(options: RunOptions) -> Result<()> {
    info!(path = %options.config_path.display(), "loading configuration file");
    let config = Config::from_file(&options.config_path).await?;

    let router = Router::new(config, options.config_path.clone())?;
    let background_tasks = router.spawn_background_tasks(options.reload);

    info!("router endpoints:");
    info!("  POST /v1/chat/completions");
    info!("  POST /v1/completions");
    info!("  POST /v1/embeddings");
    info!("  GET  /v1/models");
    info!("  GET  /health");
    info!("  GET  /load-stats");

    let state = AppState::new(router.clone());
    let server = HttpServer::new(options.host, options.port, state);

    let result = server.start().await;
    router.shutdown();
    for task in background_tasks {
        let _ = task.await;
    }
    result
}
