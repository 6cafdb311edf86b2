//! vllm-fleet-router — reverse proxy and load balancer for a fleet of
//! OpenAI-compatible LLM inference servers.

#![allow(missing_docs)]

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use vllm_fleet_router::config::{resolve_config_path, Config};
use vllm_fleet_router::server::builder::{run_server, RunOptions};
use vllm_fleet_router::utils::error::RouterError;
use vllm_fleet_router::utils::logging;

#[derive(Parser)]
#[command(name = "vllm-fleet-router", version, about = "Reverse proxy and load balancer for OpenAI-compatible LLM inference servers")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the router.
    Run {
        #[arg(long, env = "HOST", default_value = "0.0.0.0")]
        host: String,
        #[arg(long, env = "PORT", default_value_t = 8888)]
        port: u16,
        #[arg(long)]
        config: Option<String>,
        /// Log human-readable text instead of JSON.
        #[arg(long, env = "LOG_TO_CONSOLE")]
        console: bool,
        #[arg(long, env = "LOG_LEVEL", default_value = "info")]
        log_level: String,
        /// Watch the config file and hot-reload the fleet on change.
        #[arg(long)]
        reload: bool,
    },
    /// Parse and validate a config file without starting the router.
    CheckConfig {
        #[arg(long)]
        config: Option<String>,
    },
    /// Print the version string.
    Version,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Command::Run { host, port, config, console, log_level, reload } => {
            logging::init(&log_level, console);
            let config_path = resolve_config_path(config.as_deref());
            let options = RunOptions { host, port, config_path, reload };
            match run_server(options).await {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    eprintln!("Error: {e}");
                    match e {
                        RouterError::ConfigParse(_) | RouterError::Config(_) => ExitCode::from(2),
                        _ => ExitCode::FAILURE,
                    }
                }
            }
        }
        Command::CheckConfig { config } => {
            let config_path = resolve_config_path(config.as_deref());
            match Config::from_file(&config_path).await {
                Ok(config) => {
                    println!(
                        "config OK: {} upstream(s) at {}",
                        config.servers.servers.len(),
                        config_path.display()
                    );
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("config error: {e}");
                    ExitCode::from(2)
                }
            }
        }
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
    }
}
