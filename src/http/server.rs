//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Compile routing rules and build the upstream client from config
//! - Create the Axum router (one fallback handler for every method and path)
//! - Wire up middleware (tracing) and a request-id span per request
//! - Serve on a bound listener until shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    response::Response,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::GatewayConfig;
use crate::forward::{HttpForwarder, Upstream};
use crate::http::handler::Gateway;
use crate::lifecycle::shutdown;
use crate::routing::{RuleSet, RuleSetError};

/// Failure to assemble the server from a configuration.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("invalid routing rules: {0}")]
    Rules(#[from] RuleSetError),
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// HTTP server for the gateway.
pub struct GatewayServer {
    router: Router,
    config: GatewayConfig,
    gateway: Arc<Gateway>,
}

impl GatewayServer {
    /// Compile rules and build the client. Fails on any bad rule.
    pub fn new(config: GatewayConfig) -> Result<Self, BuildError> {
        let rules = Arc::new(RuleSet::from_config(&config.routing)?);
        let upstream = HttpForwarder::new(
            rules.follow_redirects(),
            Duration::from_secs(config.timeouts.upstream_secs),
        )?;
        let gateway = Arc::new(Gateway::new(
            rules,
            upstream,
            config.failover.max_replay_body_bytes,
        ));

        let router = build_router(gateway.clone());
        Ok(Self {
            router,
            config,
            gateway,
        })
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// Returns once `shutdown` fires and in-flight requests have drained.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown::wait(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn rules(&self) -> &RuleSet {
        self.gateway.rules()
    }
}

/// Build the Axum router around a gateway.
///
/// Every method and path goes to the same handler; the connection must be
/// served with `ConnectInfo<SocketAddr>`.
pub fn build_router<U: Upstream + 'static>(gateway: Arc<Gateway<U>>) -> Router {
    Router::new()
        .fallback(gateway_handler::<U>)
        .with_state(gateway)
        .layer(TraceLayer::new_for_http())
}

async fn gateway_handler<U: Upstream + 'static>(
    State(gateway): State<Arc<Gateway<U>>>,
    ConnectInfo(client_addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let span = tracing::info_span!("request", request_id = %Uuid::new_v4());
    gateway.handle(request, client_addr).instrument(span).await
}
