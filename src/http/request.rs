//! Request preparation.
//!
//! # Responsibilities
//! - Turn the client request into an outbound attempt (streaming body)
//! - Buffer the body, within a limit, when it has to be replayed
//!
//! # Design Decisions
//! - A declared `Content-Length` over the limit is refused before reading anything
//! - Chunked bodies are counted as they arrive and refused at the first byte over

use std::net::SocketAddr;

use axum::body::{Body, Bytes};
use axum::http::{header, request::Parts, HeaderMap};
use futures_util::TryStreamExt;

use crate::forward::{AttemptBody, OutboundAttempt, ReplayableRequest};
use crate::http::error::GatewayError;

/// The client's `Content-Length`, when present and well-formed.
pub fn declared_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Read the whole body into memory, refusing anything over `limit` bytes.
pub async fn buffer_body(headers: &HeaderMap, body: Body, limit: usize) -> Result<Bytes, GatewayError> {
    if declared_length(headers).is_some_and(|len| len > limit as u64) {
        return Err(GatewayError::BodyTooLarge { limit });
    }

    let mut stream = body.into_data_stream();
    let mut buf = Vec::new();
    while let Some(chunk) = stream.try_next().await.map_err(GatewayError::RequestBody)? {
        if buf.len() + chunk.len() > limit {
            return Err(GatewayError::BodyTooLarge { limit });
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(Bytes::from(buf))
}

/// One-shot attempt that streams the client body straight through.
pub fn streaming_attempt(parts: Parts, body: Body, url: String, client_addr: SocketAddr) -> OutboundAttempt {
    OutboundAttempt {
        url,
        method: parts.method,
        headers: parts.headers,
        body: AttemptBody::Streaming(body),
        client_addr,
    }
}

/// Buffer the body so the request can be sent to several targets.
pub async fn replayable(
    parts: Parts,
    body: Body,
    client_addr: SocketAddr,
    limit: usize,
) -> Result<ReplayableRequest, GatewayError> {
    let body = buffer_body(&parts.headers, body, limit).await?;
    Ok(ReplayableRequest {
        method: parts.method,
        headers: parts.headers,
        body,
        client_addr,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, Method, Request};
    use futures_util::stream;

    fn headers_with_length(len: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static(len));
        headers
    }

    #[tokio::test]
    async fn buffers_small_bodies() {
        let bytes = buffer_body(&HeaderMap::new(), Body::from("hello"), 16)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"hello");
    }

    #[tokio::test]
    async fn exact_limit_is_accepted() {
        let bytes = buffer_body(&headers_with_length("5"), Body::from("hello"), 5)
            .await
            .unwrap();
        assert_eq!(bytes.len(), 5);
    }

    #[tokio::test]
    async fn declared_length_over_limit_is_refused() {
        let err = buffer_body(&headers_with_length("1000"), Body::empty(), 10)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::BodyTooLarge { limit: 10 }));
    }

    #[tokio::test]
    async fn chunked_body_over_limit_is_refused() {
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"0123456789")),
            Ok(Bytes::from_static(b"0123456789")),
        ];
        let body = Body::from_stream(stream::iter(chunks));
        let err = buffer_body(&HeaderMap::new(), body, 15).await.unwrap_err();
        assert!(matches!(err, GatewayError::BodyTooLarge { limit: 15 }));
    }

    #[tokio::test]
    async fn replayable_keeps_method_and_headers() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/upload")
            .header("x-token", "abc")
            .body(Body::from("data"))
            .unwrap();
        let (parts, body) = request.into_parts();

        let replay = replayable(parts, body, "127.0.0.1:1".parse().unwrap(), 64)
            .await
            .unwrap();
        assert_eq!(replay.method, Method::POST);
        assert_eq!(replay.headers["x-token"], "abc");
        assert_eq!(&replay.body[..], b"data");
    }

    #[test]
    fn malformed_content_length_is_ignored() {
        assert_eq!(declared_length(&headers_with_length("abc")), None);
        assert_eq!(declared_length(&headers_with_length("42")), Some(42));
    }
}
