//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, fallback handler, request-id span)
//!     → handler.rs (resolve target, choose streaming or failover)
//!     → request.rs (outbound attempt, or buffered replayable request)
//!     → [forward subsystem talks to the upstream]
//!     → response.rs (relay status, headers, body)
//!     → error.rs (gateway failures as 502 / 413 / 400)
//!     → Send to client
//! ```

pub mod error;
pub mod handler;
pub mod request;
pub mod response;
pub mod server;

pub use error::GatewayError;
pub use handler::Gateway;
pub use server::{build_router, BuildError, GatewayServer};
