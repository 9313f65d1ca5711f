//! Per-request failures and the status each one maps to.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::forward::ForwardError;
use crate::routing::NoRoute;

/// Everything that can stop a request from being relayed.
///
/// Upstream statuses (404, 500, ...) are not errors and never appear here.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Failed to build target URL: {0}")]
    NoRoute(#[from] NoRoute),
    #[error("Failed to reach target server: {0}")]
    Forward(#[from] ForwardError),
    #[error("Request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },
    #[error("Failed to read request body: {0}")]
    RequestBody(#[source] axum::Error),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::NoRoute(_) | GatewayError::Forward(_) => StatusCode::BAD_GATEWAY,
            GatewayError::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::RequestBody(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        // Upstream details stay in the logs.
        let message = match &self {
            GatewayError::Forward(_) => "Failed to reach target server".to_string(),
            other => other.to_string(),
        };
        (self.status(), message).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn routing_and_transport_failures_are_bad_gateway() {
        assert_eq!(GatewayError::from(NoRoute).status(), StatusCode::BAD_GATEWAY);
        let timeout = ForwardError::Timeout {
            url: "https://upstream.internal/x".into(),
            after: Duration::from_secs(30),
        };
        assert_eq!(GatewayError::from(timeout).status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn forward_error_body_hides_target() {
        let err = GatewayError::from(ForwardError::Timeout {
            url: "https://upstream.internal/secret".into(),
            after: Duration::from_secs(30),
        });
        let response = err.into_response();
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"Failed to reach target server");
    }

    #[test]
    fn oversized_body_is_payload_too_large() {
        let err = GatewayError::BodyTooLarge { limit: 10 };
        assert_eq!(err.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(err.to_string(), "Request body exceeds 10 bytes");
    }
}
