//! HTTP forwarding gateway library.
//!
//! Requests are matched against ordered regex path mappings, rewritten into
//! absolute target URLs (or sent to a default host), relayed upstream, and
//! retried against mirror origins when the target answers 404.

pub mod config;
pub mod forward;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;

pub use config::GatewayConfig;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
