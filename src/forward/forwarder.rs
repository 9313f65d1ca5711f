//! Single outbound exchange.
//!
//! # Responsibilities
//! - Rebuild the client's request against a resolved target URL
//! - Copy request headers verbatim and set `X-Forwarded-For`
//! - Bound connect + response headers with one timeout
//! - Hand the upstream status, headers and streaming body back
//!
//! # Design Decisions
//! - Non-2xx statuses are responses, not errors
//! - Bodies stream in both directions; nothing is buffered here
//! - `Host` and `Transfer-Encoding` belong to the transport and are not copied
//! - The client never decompresses and never uses environment proxies

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use axum::body::{Body, Bytes, HttpBody};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use futures_util::TryStreamExt;
use reqwest::redirect::Policy;

use crate::observability::metrics;

pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Body of one outbound attempt.
#[derive(Debug)]
pub enum AttemptBody {
    /// The client's body, passed through as it arrives. Usable once.
    Streaming(Body),
    /// A buffered copy, cheap to clone for replays.
    Buffered(Bytes),
}

impl AttemptBody {
    fn into_reqwest(self) -> Option<reqwest::Body> {
        match self {
            AttemptBody::Streaming(body) if body.size_hint().exact() == Some(0) => None,
            AttemptBody::Streaming(body) => {
                Some(reqwest::Body::wrap_stream(body.into_data_stream()))
            }
            AttemptBody::Buffered(bytes) if bytes.is_empty() => None,
            AttemptBody::Buffered(bytes) => Some(reqwest::Body::from(bytes)),
        }
    }
}

/// Everything needed to send one request upstream.
#[derive(Debug)]
pub struct OutboundAttempt {
    pub url: String,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: AttemptBody,
    pub client_addr: SocketAddr,
}

/// What came back from upstream. The body is still streaming.
#[derive(Debug)]
pub struct InboundResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Body,
}

impl InboundResponse {
    pub fn is_not_found(&self) -> bool {
        self.status == StatusCode::NOT_FOUND
    }
}

/// The target could not be reached at all.
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("invalid target URL '{url}': {source}")]
    InvalidTarget {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("no response from {url} within {}s", .after.as_secs())]
    Timeout { url: String, after: Duration },
}

impl ForwardError {
    /// The URL that was being attempted.
    pub fn target(&self) -> &str {
        match self {
            ForwardError::InvalidTarget { url, .. }
            | ForwardError::Transport { url, .. }
            | ForwardError::Timeout { url, .. } => url,
        }
    }

    fn outcome(&self) -> &'static str {
        match self {
            ForwardError::InvalidTarget { .. } => "invalid_target",
            ForwardError::Transport { .. } => "transport_error",
            ForwardError::Timeout { .. } => "timeout",
        }
    }
}

/// Something that can carry an [`OutboundAttempt`] to its target.
pub trait Upstream: Send + Sync {
    fn forward(
        &self,
        attempt: OutboundAttempt,
    ) -> impl Future<Output = Result<InboundResponse, ForwardError>> + Send;
}

/// The request headers to send upstream: the client's, minus transport-owned
/// ones, with `X-Forwarded-For` set to the client's `ip:port`.
pub fn outbound_headers(original: &HeaderMap, client_addr: SocketAddr) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(original.len() + 1);
    for (name, value) in original {
        if name == header::HOST || name == header::TRANSFER_ENCODING {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    if let Ok(value) = HeaderValue::from_str(&client_addr.to_string()) {
        headers.insert(X_FORWARDED_FOR, value);
    }
    headers
}

/// Upstream backed by a pooled reqwest client.
#[derive(Debug, Clone)]
pub struct HttpForwarder {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpForwarder {
    pub fn new(follow_redirects: bool, timeout: Duration) -> Result<Self, reqwest::Error> {
        let policy = if follow_redirects {
            Policy::default()
        } else {
            Policy::none()
        };
        let client = reqwest::Client::builder()
            .redirect(policy)
            .no_proxy()
            .build()?;

        Ok(Self { client, timeout })
    }
}

impl HttpForwarder {
    async fn execute(
        &self,
        attempt: OutboundAttempt,
    ) -> Result<(String, reqwest::Response), ForwardError> {
        let OutboundAttempt {
            url: target,
            method,
            headers,
            body,
            client_addr,
        } = attempt;

        let url = match reqwest::Url::parse(&target) {
            Ok(url) => url,
            Err(source) => return Err(ForwardError::InvalidTarget { url: target, source }),
        };

        let mut request = reqwest::Request::new(method, url);
        *request.headers_mut() = outbound_headers(&headers, client_addr);
        *request.body_mut() = body.into_reqwest();

        match tokio::time::timeout(self.timeout, self.client.execute(request)).await {
            Ok(Ok(response)) => Ok((target, response)),
            Ok(Err(source)) => Err(ForwardError::Transport { url: target, source }),
            Err(_) => Err(ForwardError::Timeout {
                url: target,
                after: self.timeout,
            }),
        }
    }
}

impl Upstream for HttpForwarder {
    async fn forward(&self, attempt: OutboundAttempt) -> Result<InboundResponse, ForwardError> {
        let (target, response) = self
            .execute(attempt)
            .await
            .inspect_err(|e| metrics::record_upstream(e.outcome()))?;
        metrics::record_upstream("response");

        let status = response.status();
        let mut headers = response.headers().clone();
        headers.remove(header::TRANSFER_ENCODING);

        let stream = response.bytes_stream().inspect_err(move |e| {
            tracing::warn!(url = %target, error = %e, "Error copying response body");
        });

        Ok(InboundResponse {
            status,
            headers,
            body: Body::from_stream(stream),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        "203.0.113.7:52100".parse().unwrap()
    }

    #[test]
    fn headers_are_copied_with_every_value() {
        let mut original = HeaderMap::new();
        original.append("accept", HeaderValue::from_static("text/plain"));
        original.append("x-custom", HeaderValue::from_static("one"));
        original.append("x-custom", HeaderValue::from_static("two"));
        original.append("authorization", HeaderValue::from_static("Bearer abc"));

        let headers = outbound_headers(&original, addr());
        let custom: Vec<_> = headers.get_all("x-custom").iter().collect();
        assert_eq!(custom, vec!["one", "two"]);
        assert_eq!(headers["accept"], "text/plain");
        assert_eq!(headers["authorization"], "Bearer abc");
    }

    #[test]
    fn forwarded_for_is_overwritten_with_client_address() {
        let mut original = HeaderMap::new();
        original.append("x-forwarded-for", HeaderValue::from_static("10.0.0.1"));
        original.append("x-forwarded-for", HeaderValue::from_static("10.0.0.2"));

        let headers = outbound_headers(&original, addr());
        let values: Vec<_> = headers.get_all(X_FORWARDED_FOR).iter().collect();
        assert_eq!(values, vec!["203.0.113.7:52100"]);
    }

    #[test]
    fn forwarded_for_brackets_ipv6_clients() {
        let client: SocketAddr = "[2001:db8::1]:443".parse().unwrap();
        let headers = outbound_headers(&HeaderMap::new(), client);
        assert_eq!(headers[X_FORWARDED_FOR], "[2001:db8::1]:443");
    }

    #[test]
    fn transport_headers_are_dropped() {
        let mut original = HeaderMap::new();
        original.insert(header::HOST, HeaderValue::from_static("gateway.local"));
        original.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));

        let headers = outbound_headers(&original, addr());
        assert!(headers.get(header::HOST).is_none());
        assert!(headers.get(header::TRANSFER_ENCODING).is_none());
    }

    #[test]
    fn empty_bodies_are_not_sent() {
        assert!(AttemptBody::Streaming(Body::empty()).into_reqwest().is_none());
        assert!(AttemptBody::Buffered(Bytes::new()).into_reqwest().is_none());
        assert!(AttemptBody::Buffered(Bytes::from_static(b"x"))
            .into_reqwest()
            .is_some());
    }

    #[tokio::test]
    async fn unparseable_target_is_a_forward_error() {
        let forwarder = HttpForwarder::new(false, Duration::from_secs(1)).unwrap();
        let err = forwarder
            .forward(OutboundAttempt {
                url: "not a url".into(),
                method: Method::GET,
                headers: HeaderMap::new(),
                body: AttemptBody::Buffered(Bytes::new()),
                client_addr: addr(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ForwardError::InvalidTarget { .. }));
        assert_eq!(err.target(), "not a url");
    }

    #[tokio::test]
    async fn refused_connection_is_a_forward_error() {
        // Bind then drop to get a port nothing listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let forwarder = HttpForwarder::new(false, Duration::from_secs(5)).unwrap();
        let err = forwarder
            .forward(OutboundAttempt {
                url: format!("http://127.0.0.1:{port}/x"),
                method: Method::GET,
                headers: HeaderMap::new(),
                body: AttemptBody::Buffered(Bytes::new()),
                client_addr: addr(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ForwardError::Transport { .. }));
    }
}
