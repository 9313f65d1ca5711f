//! Forwarding subsystem.
//!
//! # Data Flow
//! ```text
//! ResolvedTarget + client request
//!     → failover.rs (only when mirrors are configured)
//!         → primary attempt, then mirrors in order on 404
//!     → forwarder.rs (one outbound exchange per attempt)
//!         → reqwest client (pooled, redirect policy from config)
//!     → InboundResponse (status, headers, streaming body)
//! ```
//!
//! # Design Decisions
//! - `Upstream` is the seam between policy and transport
//! - One fixed timeout per attempt, none across attempts
//! - A request is replayed only from a buffered body

pub mod failover;
pub mod forwarder;

pub use failover::{replace_origin, FailoverController, OriginError, ReplayableRequest};
pub use forwarder::{
    outbound_headers, AttemptBody, ForwardError, HttpForwarder, InboundResponse,
    OutboundAttempt, Upstream, X_FORWARDED_FOR,
};
