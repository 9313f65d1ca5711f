//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Every request runs inside a span carrying a generated request ID
//! - The request ID stays local; it is never added to the forwarded request
//! - Metrics are cheap (atomic increments) and opt-in

pub mod logging;
pub mod metrics;
