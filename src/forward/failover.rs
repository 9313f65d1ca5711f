//! Mirror failover.
//!
//! # Responsibilities
//! - Send to the primary target first
//! - On 404, move the same path and query onto each mirror in order
//! - Stop at the first answer that is not 404
//!
//! # Design Decisions
//! - Only a 404 triggers failover; a primary transport error is returned as-is
//! - Mirror transport errors and unusable mirror URLs are skipped
//! - With nothing but 404s, the last 404 is returned
//! - Requests are replayed from a buffered body (`ReplayableRequest`), never
//!   from the client's stream, which can be read only once
//! - Every attempt gets the full upstream timeout; there is no shared budget

use std::net::SocketAddr;

use axum::body::Bytes;
use axum::http::{HeaderMap, Method};
use url::Url;

use crate::forward::forwarder::{
    AttemptBody, ForwardError, InboundResponse, OutboundAttempt, Upstream,
};
use crate::observability::metrics;

/// A client request whose body is held in memory so it can be sent repeatedly.
#[derive(Debug, Clone)]
pub struct ReplayableRequest {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub client_addr: SocketAddr,
}

impl ReplayableRequest {
    /// A fresh attempt at `url`. Cloning `Bytes` does not copy the body.
    pub fn attempt(&self, url: impl Into<String>) -> OutboundAttempt {
        OutboundAttempt {
            url: url.into(),
            method: self.method.clone(),
            headers: self.headers.clone(),
            body: AttemptBody::Buffered(self.body.clone()),
            client_addr: self.client_addr,
        }
    }
}

/// Failure to move a target URL onto a mirror.
#[derive(Debug, thiserror::Error)]
pub enum OriginError {
    #[error("target '{url}' is not a valid URL: {source}")]
    Target {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("cannot move '{url}' onto mirror {mirror}")]
    Incompatible { url: String, mirror: String },
}

/// Replace scheme, host and port of `target` with those of `mirror`.
/// Path, query and fragment are kept.
pub fn replace_origin(target: &str, mirror: &Url) -> Result<String, OriginError> {
    let mut url = Url::parse(target).map_err(|source| OriginError::Target {
        url: target.to_string(),
        source,
    })?;

    let incompatible = || OriginError::Incompatible {
        url: target.to_string(),
        mirror: mirror.to_string(),
    };

    url.set_scheme(mirror.scheme()).map_err(|_| incompatible())?;
    url.set_host(mirror.host_str()).map_err(|_| incompatible())?;
    url.set_port(mirror.port()).map_err(|_| incompatible())?;

    Ok(url.to_string())
}

/// Runs the primary-then-mirrors policy over an [`Upstream`].
#[derive(Debug)]
pub struct FailoverController<'a, U> {
    upstream: &'a U,
    mirrors: &'a [Url],
}

impl<'a, U: Upstream> FailoverController<'a, U> {
    pub fn new(upstream: &'a U, mirrors: &'a [Url]) -> Self {
        Self { upstream, mirrors }
    }

    pub async fn forward_with_failover(
        &self,
        request: &ReplayableRequest,
        primary: &str,
    ) -> Result<InboundResponse, ForwardError> {
        let response = self.upstream.forward(request.attempt(primary)).await?;
        if !response.is_not_found() || self.mirrors.is_empty() {
            return Ok(response);
        }

        tracing::info!(
            url = %primary,
            mirrors = self.mirrors.len(),
            "Received 404, trying mirrors"
        );

        let mut last_not_found = response;
        for (i, mirror) in self.mirrors.iter().enumerate() {
            let mirror_url = match replace_origin(primary, mirror) {
                Ok(url) => url,
                Err(e) => {
                    tracing::warn!(mirror = %mirror, error = %e, "Failed to create mirror URL");
                    continue;
                }
            };

            tracing::info!(
                attempt = i + 1,
                of = self.mirrors.len(),
                url = %mirror_url,
                "Trying mirror"
            );

            match self.upstream.forward(request.attempt(mirror_url)).await {
                Ok(response) if !response.is_not_found() => {
                    tracing::info!(mirror = %mirror, status = %response.status, "Mirror succeeded");
                    metrics::record_failover("recovered");
                    return Ok(response);
                }
                Ok(response) => {
                    tracing::info!(mirror = %mirror, "Mirror also returned 404");
                    last_not_found = response;
                }
                Err(e) => {
                    tracing::warn!(mirror = %mirror, error = %e, "Mirror failed");
                }
            }
        }

        metrics::record_failover("exhausted");
        Ok(last_not_found)
    }
}
