//! Compiled routing rules.
//!
//! # Responsibilities
//! - Compile `from` patterns and `to` templates once, at startup
//! - Reject anything that would only fail later, at request time
//! - Hold the default host, mirrors and redirect policy
//!
//! # Design Decisions
//! - Immutable after construction (shared via Arc, no locks)
//! - Mapping order is the configuration order
//! - Patterns are searched, not anchored

use regex::Regex;
use url::Url;

use crate::config::validation::check_base_url;
use crate::config::{PathMappingConfig, RoutingConfig};
use crate::routing::template::{Template, TemplateError};

/// Error building a [`RuleSet`].
#[derive(Debug, thiserror::Error)]
pub enum RuleSetError {
    #[error("invalid regex pattern '{pattern}' (mapping {index}): {source}")]
    InvalidPattern {
        index: usize,
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("invalid template '{template}' (mapping {index}): {source}")]
    InvalidTemplate {
        index: usize,
        template: String,
        #[source]
        source: TemplateError,
    },
    #[error("template '{template}' (mapping {index}) references group ${group}, but the pattern has only {available}")]
    UnknownGroup {
        index: usize,
        template: String,
        group: usize,
        available: usize,
    },
    #[error("template '{template}' (mapping {index}) references group '{name}', which the pattern does not define")]
    UnknownName {
        index: usize,
        template: String,
        name: String,
    },
    #[error("invalid default host: {0}")]
    InvalidDefaultHost(String),
    #[error("invalid mirror: {0}")]
    InvalidMirror(String),
}

/// One compiled `from` → `to` rule.
#[derive(Debug, Clone)]
pub struct PathMapping {
    pattern: Regex,
    template: Template,
    source: PathMappingConfig,
}

impl PathMapping {
    pub fn compile(index: usize, config: &PathMappingConfig) -> Result<Self, RuleSetError> {
        let pattern = Regex::new(&config.from).map_err(|source| RuleSetError::InvalidPattern {
            index,
            pattern: config.from.clone(),
            source,
        })?;

        let template = Template::parse(&config.to).map_err(|source| {
            RuleSetError::InvalidTemplate {
                index,
                template: config.to.clone(),
                source,
            }
        })?;

        // captures_len counts group 0
        let available = pattern.captures_len() - 1;
        if let Some(group) = template.max_group().filter(|g| *g > available) {
            return Err(RuleSetError::UnknownGroup {
                index,
                template: config.to.clone(),
                group,
                available,
            });
        }

        if let Some(name) = template
            .names()
            .find(|name| !pattern.capture_names().flatten().any(|n| n == *name))
        {
            return Err(RuleSetError::UnknownName {
                index,
                template: config.to.clone(),
                name: name.to_string(),
            });
        }

        Ok(Self {
            pattern,
            template,
            source: config.clone(),
        })
    }

    /// Expand this mapping for `path`, or `None` when the pattern does not occur in it.
    pub fn apply(&self, path: &str) -> Option<String> {
        self.pattern
            .captures(path)
            .map(|caps| self.template.expand(&caps))
    }

    /// The `from` pattern as written in the configuration.
    pub fn pattern(&self) -> &str {
        &self.source.from
    }

    /// The `to` template as written in the configuration.
    pub fn template(&self) -> &str {
        &self.source.to
    }
}

/// The compiled, immutable routing configuration.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    /// `scheme://host[:port]` of the default host.
    default_origin: Option<String>,
    mappings: Vec<PathMapping>,
    mirrors: Vec<Url>,
    follow_redirects: bool,
}

impl RuleSet {
    pub fn from_config(config: &RoutingConfig) -> Result<Self, RuleSetError> {
        let mappings = config
            .path_mappings
            .iter()
            .enumerate()
            .map(|(i, m)| PathMapping::compile(i, m))
            .collect::<Result<Vec<_>, _>>()?;

        let default_origin = match config.default_host.as_deref() {
            None | Some("") => None,
            Some(host) => {
                let url = check_base_url(host).map_err(RuleSetError::InvalidDefaultHost)?;
                Some(origin_of(&url))
            }
        };

        let mirrors = config
            .mirrors
            .iter()
            .map(|m| check_base_url(m).map_err(RuleSetError::InvalidMirror))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            default_origin,
            mappings,
            mirrors,
            follow_redirects: config.follow_redirects,
        })
    }

    pub fn default_origin(&self) -> Option<&str> {
        self.default_origin.as_deref()
    }

    pub fn mappings(&self) -> &[PathMapping] {
        &self.mappings
    }

    pub fn mirrors(&self) -> &[Url] {
        &self.mirrors
    }

    pub fn follow_redirects(&self) -> bool {
        self.follow_redirects
    }
}

/// `scheme://host[:port]`, with the port only when the URL spelled out a non-default one.
fn origin_of(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    }
}
