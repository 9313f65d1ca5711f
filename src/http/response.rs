//! Response relay.
//!
//! # Responsibilities
//! - Hand the upstream status, headers and body to the client unchanged
//!
//! # Design Decisions
//! - Streaming responses avoid buffering entire body
//! - Dropping the response (client gone) drops the upstream body and its connection

use axum::response::{IntoResponse, Response};

use crate::forward::InboundResponse;

impl IntoResponse for InboundResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(self.body);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}
