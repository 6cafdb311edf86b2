//! # vllm-fleet-router
//!
//! A reverse proxy and load balancer for a fleet of OpenAI-compatible LLM
//! inference servers.
//!
//! The router scrapes each upstream's Prometheus `/metrics` endpoint for
//! live load, probes liveness on the same cadence, discovers served models
//! from `/v1/models`, and forwards OpenAI-compatible requests to the
//! least-loaded healthy upstream that serves the requested model — with
//! retry on a different upstream when an attempt fails before any response
//! bytes reach the client.
//!
//! ## Modules
//!
//! - [`config`] — the TOML config file format and its loader.
//! - [`core`] — the routing engine: fleet state, scraping, health,
//!   discovery, selection, and forwarding.
//! - [`server`] — the actix-web HTTP surface.
//! - [`utils`] — error types and logging setup.

pub mod config;
pub mod core;
pub mod server;
pub mod utils;
