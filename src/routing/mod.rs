//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path, query)
//!     → router.rs (ordered scan, default-host fallback)
//!     → rules.rs (compiled patterns + templates)
//!     → template.rs (capture substitution)
//!     → Return: ResolvedTarget or NoRoute
//!
//! Rule Compilation (at startup):
//!     RoutingConfig
//!     → compile regexes and templates, parse default host and mirrors
//!     → Freeze as immutable RuleSet
//! ```
//!
//! # Design Decisions
//! - Rules compiled at startup, immutable at runtime
//! - Deterministic: same input always resolves to the same target
//! - First match wins (configuration order, no specificity ranking)

pub mod router;
pub mod rules;
pub mod template;

pub use router::{NoRoute, ResolvedTarget, RouteSource, Router};
pub use rules::{PathMapping, RuleSet, RuleSetError};
pub use template::{Template, TemplateError};
