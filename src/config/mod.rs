//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → CLI overrides applied once in main
//!     → routing::RuleSet compiled from config.routing
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no reload path
//! - All fields have defaults to allow minimal configs
//! - Unknown keys are rejected so typos surface at startup
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_optional, parse_config, ConfigError};
pub use schema::{
    FailoverConfig, GatewayConfig, ListenerConfig, LogFormat, ObservabilityConfig,
    PathMappingConfig, RoutingConfig, TimeoutConfig,
};
