//! Forward gateway.
//!
//! A single-listener HTTP gateway built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http::server ──▶ routing::Router ──▶ forward::failover ──▶ forward::forwarder ──▶ Upstream
//!                     (axum, span)     (mappings,          (primary, then        (reqwest, timeout,
//!                                       default host)       mirrors on 404)       header copy, XFF)
//!     Client Response
//!     ◀────────────── http::response ◀──────────────────────────────────────────── streamed body
//!
//!     Cross-cutting: config (TOML + CLI), observability (tracing, Prometheus), lifecycle (signals)
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use forward_gateway::config::{self, validation::validate_config, ConfigError, GatewayConfig};
use forward_gateway::http::GatewayServer;
use forward_gateway::lifecycle::{signals, Shutdown};
use forward_gateway::observability::{logging, metrics};
use forward_gateway::routing::RuleSet;

#[derive(Parser, Debug)]
#[command(name = "forward-gateway", version)]
#[command(about = "HTTP forwarding gateway with path rewriting and mirror failover", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, env = "CONFIG_FILE", default_value = "config.toml")]
    config: PathBuf,

    /// Listener port, replacing the port of `listener.bind_address`
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Default host for unmatched paths, e.g. https://example.com
    #[arg(long, value_name = "URL")]
    host: Option<String>,

    /// Follow upstream redirects instead of relaying them
    /// (`FOLLOW_REDIRECTS` counts only when exactly `true`)
    #[arg(long, env = "FOLLOW_REDIRECTS", value_parser = exactly_true)]
    follow_redirects: bool,

    /// Mirror origin tried on 404, after the configured ones (repeatable)
    #[arg(long = "mirror", value_name = "URL")]
    mirrors: Vec<String>,

    /// Validate configuration, print the routing summary and exit
    #[arg(long)]
    check: bool,
}

impl Cli {
    fn apply(&self, config: &mut GatewayConfig) {
        if let Some(port) = self.port {
            config.listener.bind_address = with_port(&config.listener.bind_address, port);
        }
        if let Some(host) = &self.host {
            config.routing.default_host = Some(host.clone());
        }
        if self.follow_redirects {
            config.routing.follow_redirects = true;
        }
        config.routing.mirrors.extend(self.mirrors.iter().cloned());
    }
}

fn exactly_true(value: &str) -> Result<bool, std::convert::Infallible> {
    Ok(value == "true")
}

fn with_port(bind_address: &str, port: u16) -> String {
    match bind_address.rsplit_once(':') {
        Some((host, _)) => format!("{host}:{port}"),
        None => format!("{bind_address}:{port}"),
    }
}

fn log_summary(config: &GatewayConfig, rules: &RuleSet) {
    tracing::info!(address = %config.listener.bind_address, "Listen address");
    match rules.default_origin() {
        Some(host) => tracing::info!(default_host = %host, "Default host"),
        None => tracing::info!("No default host configured"),
    }
    tracing::info!(follow_redirects = rules.follow_redirects(), "Redirect policy");

    if rules.mappings().is_empty() {
        tracing::info!("No path mappings configured");
    }
    for (i, mapping) in rules.mappings().iter().enumerate() {
        tracing::info!("{}. {} -> {}", i + 1, mapping.pattern(), mapping.template());
    }
    for mirror in rules.mirrors() {
        tracing::info!(mirror = %mirror, "Mirror");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let loaded = config::load_optional(&cli.config)?;
    let found = loaded.is_some();
    let mut config = loaded.unwrap_or_default();
    cli.apply(&mut config);

    logging::init(&config.observability);
    tracing::info!("forward-gateway v{} starting", env!("CARGO_PKG_VERSION"));
    if !found {
        tracing::warn!(path = %cli.config.display(), "Config file not found, using defaults");
    }

    // Overrides are checked with the same rules as the file.
    if let Err(errors) = validate_config(&config) {
        for e in &errors {
            tracing::error!(error = %e, "Invalid configuration");
        }
        return Err(ConfigError::Validation(errors).into());
    }

    let server = GatewayServer::new(config)?;
    log_summary(server.config(), server.rules());

    if cli.check {
        tracing::info!("Configuration OK");
        return Ok(());
    }

    let observability = &server.config().observability;
    if observability.metrics_enabled {
        let addr: SocketAddr = observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let listener = TcpListener::bind(&server.config().listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let stop = shutdown.subscribe();
    tokio::spawn(async move {
        signals::shutdown_signal().await;
        shutdown.trigger();
    });

    server.run(listener, stop).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
