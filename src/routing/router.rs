//! Target resolution.
//!
//! # Responsibilities
//! - Scan path mappings in order, first match wins
//! - Fall back to the default host, keeping path and query
//! - Return an explicit `NoRoute` otherwise
//!
//! # Design Decisions
//! - Mappings see the path only; the query never takes part in matching
//! - A matched mapping controls the whole destination (query is not appended)
//! - O(n) scan over mappings (rule counts are small and order is meaningful)

use std::sync::Arc;

use crate::routing::rules::RuleSet;

/// No mapping matched and there is no default host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("no default host configured and no mapping matched")]
pub struct NoRoute;

/// Which rule produced a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteSource {
    /// Index into the configured path mappings.
    Mapping(usize),
    DefaultHost,
}

impl RouteSource {
    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            RouteSource::Mapping(_) => "mapping",
            RouteSource::DefaultHost => "default_host",
        }
    }
}

/// A target URL for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub url: String,
    pub source: RouteSource,
}

/// Resolves request paths against a shared [`RuleSet`].
#[derive(Debug, Clone)]
pub struct Router {
    rules: Arc<RuleSet>,
}

impl Router {
    pub fn new(rules: Arc<RuleSet>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Resolve `path` (and the raw `query`, without `?`) to a target URL.
    pub fn resolve(&self, path: &str, query: Option<&str>) -> Result<ResolvedTarget, NoRoute> {
        for (index, mapping) in self.rules.mappings().iter().enumerate() {
            if let Some(url) = mapping.apply(path) {
                return Ok(ResolvedTarget {
                    url,
                    source: RouteSource::Mapping(index),
                });
            }
        }

        let origin = self.rules.default_origin().ok_or(NoRoute)?;
        let url = match query.filter(|q| !q.is_empty()) {
            Some(query) => format!("{}{}?{}", origin, path, query),
            None => format!("{}{}", origin, path),
        };

        Ok(ResolvedTarget {
            url,
            source: RouteSource::DefaultHost,
        })
    }
}
