// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! MTCA Agent Daemon
//!
//! Long-lived MTConnect agent: connects out to shop-floor SHDR adapters,
//! maintains the bounded observation history, and answers MTConnect queries
//! (`probe`, `current`, `sample`, `asset`) over HTTP.
//!
//! # Usage
//!
//! ```bash
//! # Start with a devices document and one adapter
//! mtca-agent --devices devices.xml --adapter 000@mill-07:7878
//!
//! # Custom port and config file
//! mtca-agent --port 5001 --config agent.json
//! ```
//!
//! # Endpoints
//!
//! - `GET /probe` (or `/`) - device description document
//! - `GET /current[?at=N][&path=...][&interval=ms]` - latest values
//! - `GET /sample?from=N&count=M[&path=...][&interval=ms]` - history window
//! - `GET /asset/{id[;id...]}` and `GET /assets[?type=T&count=N]` - assets
//! - `GET /{device}/...` - device-scoped variants (uuid or name, `a;b` for several)

use axum::Router;
use clap::Parser;
use mtca::agent::{Agent, AgentSettings};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

mod adapter;
mod config;
mod handlers;
mod loader;
mod routes;

pub use config::{AdapterConfig, AgentConfig};

use adapter::AdapterClient;

/// MTCA Agent - MTConnect agent with SHDR adapter ingest
#[derive(Parser, Debug)]
#[command(name = "mtca-agent")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// HTTP port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Bind address (0.0.0.0 for all interfaces)
    #[arg(short, long)]
    bind: Option<String>,

    /// Configuration file (JSON format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// MTConnect devices document
    #[arg(short, long)]
    devices: Option<PathBuf>,

    /// Adapter endpoint as device@host:port (repeatable)
    #[arg(short, long = "adapter")]
    adapters: Vec<String>,

    /// Sample buffer capacity
    #[arg(long)]
    buffer_size: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Shared application state
pub struct AppState {
    pub agent: Arc<Agent>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Load configuration, apply CLI overrides
    let mut config = match &args.config {
        Some(path) => AgentConfig::from_file(path)?,
        None => AgentConfig::default(),
    };
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(bind) = &args.bind {
        config.bind_address = bind.parse()?;
    }
    if let Some(devices) = &args.devices {
        config.devices_file = devices.display().to_string();
    }
    if let Some(buffer_size) = args.buffer_size {
        config.buffer_size = buffer_size;
    }
    for spec in &args.adapters {
        config.adapters.push(parse_adapter_spec(spec)?);
    }
    config.validate()?;

    // Device schemas are loaded once; failures here are fatal.
    let devices = loader::load_devices(&config.devices_file)?;
    info!(
        "loaded {} device(s) from {}",
        devices.len(),
        config.devices_file
    );

    let mut agent = Agent::new(AgentSettings {
        buffer_size: config.buffer_size,
        asset_buffer_size: config.max_assets,
        sender: config.sender.clone(),
        version: config.schema_version.clone(),
        replay_cap: config.replay_cap,
        instance_id: None,
    });
    for device in devices {
        info!("registered device {} ({})", device.name, device.uuid);
        agent.register_device(device)?;
    }
    let agent = Arc::new(agent);

    // Resolve adapter device keys before serving; an unknown device in the
    // adapter table is a configuration error, not a runtime one.
    for adapter_config in &config.adapters {
        let uuid = agent
            .index()
            .resolve_device(&adapter_config.device)
            .map(|schema| schema.uuid.clone())
            .ok_or_else(|| {
                format!(
                    "adapter {} references unknown device \"{}\"",
                    adapter_config.address(),
                    adapter_config.device
                )
            })?;
        let client = AdapterClient::new(
            adapter_config.address(),
            uuid,
            adapter_config.reconnect_interval(),
        );
        tokio::spawn(client.run(Arc::clone(&agent)));
    }

    let state = Arc::new(AppState {
        agent: Arc::clone(&agent),
    });
    let app: Router = routes::agent_routes()
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::new(config.bind_address, config.port);
    info!("MTCA Agent v{}", env!("CARGO_PKG_VERSION"));
    info!("instance {} on http://{}", agent.instance_id(), addr);
    info!(
        "buffer: {} observations, {} assets",
        config.buffer_size, config.max_assets
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Parse `device@host:port` (port optional, defaults to 7878).
fn parse_adapter_spec(spec: &str) -> Result<AdapterConfig, String> {
    let (device, endpoint) = spec
        .split_once('@')
        .ok_or_else(|| format!("adapter \"{spec}\" must be device@host:port"))?;
    if device.is_empty() {
        return Err(format!("adapter \"{spec}\" is missing the device"));
    }
    let (host, port) = match endpoint.rsplit_once(':') {
        Some((host, port)) => (
            host.to_string(),
            port.parse::<u16>()
                .map_err(|_| format!("adapter \"{spec}\" has an invalid port"))?,
        ),
        None => (endpoint.to_string(), 7878),
    };
    if host.is_empty() {
        return Err(format!("adapter \"{spec}\" is missing the host"));
    }
    Ok(AdapterConfig {
        host,
        port,
        device: device.to_string(),
        reconnect_interval_secs: 10,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_adapter_spec() {
        let adapter = parse_adapter_spec("000@mill-07:7878").expect("parse");
        assert_eq!(adapter.device, "000");
        assert_eq!(adapter.host, "mill-07");
        assert_eq!(adapter.port, 7878);

        let adapter = parse_adapter_spec("VMC-3Axis@10.0.0.7").expect("parse");
        assert_eq!(adapter.port, 7878);

        assert!(parse_adapter_spec("no-separator").is_err());
        assert!(parse_adapter_spec("@host:1").is_err());
        assert!(parse_adapter_spec("dev@:1").is_err());
        assert!(parse_adapter_spec("dev@host:notaport").is_err());
    }
}
