//! Per-request orchestration.
//!
//! # Responsibilities
//! - Resolve the target URL for the request path
//! - Forward once (streaming) or through failover (buffered) depending on mirrors
//! - Turn the outcome into a client response and record it
//!
//! # Data Flow
//! ```text
//! Request<Body> + client address
//!     → Router::resolve           (NoRoute → 502, no upstream contact)
//!     → no mirrors:  stream body  → Upstream::forward
//!     → mirrors:     buffer body  → FailoverController  (too large → 413)
//!     → InboundResponse | GatewayError → Response
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::http::{request::Parts, Request};
use axum::response::{IntoResponse, Response};

use crate::forward::{FailoverController, HttpForwarder, InboundResponse, Upstream};
use crate::http::error::GatewayError;
use crate::http::request::{replayable, streaming_attempt};
use crate::observability::metrics;
use crate::routing::{RouteSource, Router, RuleSet};

/// Routing rules plus the upstream they forward through.
#[derive(Debug)]
pub struct Gateway<U = HttpForwarder> {
    router: Router,
    upstream: U,
    replay_limit: usize,
}

impl<U: Upstream> Gateway<U> {
    /// `replay_limit` caps how much of a body is buffered for mirror replay.
    pub fn new(rules: Arc<RuleSet>, upstream: U, replay_limit: usize) -> Self {
        Self {
            router: Router::new(rules),
            upstream,
            replay_limit,
        }
    }

    pub fn rules(&self) -> &RuleSet {
        self.router.rules()
    }

    /// Relay one client request and produce the client response.
    pub async fn handle(&self, request: Request<Body>, client_addr: SocketAddr) -> Response {
        let start = Instant::now();
        let (parts, body) = request.into_parts();
        let method = parts.method.clone();

        tracing::debug!(method = %method, uri = %parts.uri, client = %client_addr, "Proxying request");

        let target = match self.router.resolve(parts.uri.path(), parts.uri.query()) {
            Ok(target) => target,
            Err(e) => {
                tracing::warn!(path = %parts.uri.path(), error = %e, "No route");
                let response = GatewayError::from(e).into_response();
                metrics::record_request(method.as_str(), response.status().as_u16(), "none", start);
                return response;
            }
        };

        if let RouteSource::Mapping(index) = target.source {
            if let Some(mapping) = self.rules().mappings().get(index) {
                tracing::debug!(
                    pattern = %mapping.pattern(),
                    template = %mapping.template(),
                    url = %target.url,
                    "Path matched mapping"
                );
            }
        }

        let response = match self.forward(parts, body, client_addr, &target.url).await {
            Ok(inbound) => {
                tracing::info!(
                    method = %method,
                    url = %target.url,
                    status = inbound.status.as_u16(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Completed"
                );
                inbound.into_response()
            }
            Err(e) => {
                match &e {
                    GatewayError::Forward(_) => {
                        tracing::error!(method = %method, url = %target.url, error = %e, "Forwarding failed")
                    }
                    _ => tracing::warn!(method = %method, url = %target.url, error = %e, "Request rejected"),
                }
                e.into_response()
            }
        };

        metrics::record_request(
            method.as_str(),
            response.status().as_u16(),
            target.source.label(),
            start,
        );
        response
    }

    async fn forward(
        &self,
        parts: Parts,
        body: Body,
        client_addr: SocketAddr,
        url: &str,
    ) -> Result<InboundResponse, GatewayError> {
        let mirrors = self.rules().mirrors();
        if mirrors.is_empty() {
            let attempt = streaming_attempt(parts, body, url.to_string(), client_addr);
            return Ok(self.upstream.forward(attempt).await?);
        }

        let request = replayable(parts, body, client_addr, self.replay_limit).await?;
        let response = FailoverController::new(&self.upstream, mirrors)
            .forward_with_failover(&request, url)
            .await?;
        Ok(response)
    }
}
