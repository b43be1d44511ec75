//! Backend descriptors and the immutable registry.
//!
//! # Responsibilities
//! - Represent a single backend server (URL and configured weight)
//! - Hold the ordered backend list fixed at startup; the index in this list
//!   is the backend's identity everywhere else

use std::ops::Index;
use url::Url;

use crate::config::{BackendConfig, ValidationError};

/// A single backend server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backend {
    /// Position in the registry.
    pub index: usize,
    /// Base URL of the backend.
    pub url: Url,
    /// Configured weight. Selection is plain round-robin and ignores it.
    pub weight: u32,
}

impl Backend {
    /// Label used to tag logs and metrics.
    pub fn label(&self) -> &str {
        self.url.as_str().trim_end_matches('/')
    }

    /// Absolute URL for `path` on this backend, keeping any base path prefix.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.label(), path)
    }
}

/// Ordered, immutable list of backends.
#[derive(Debug, Clone)]
pub struct BackendRegistry {
    backends: Vec<Backend>,
}

impl BackendRegistry {
    /// Build the registry from configuration.
    ///
    /// Config is normally validated before this point; the checks here
    /// only keep the registry's own invariants.
    pub fn from_config(configs: &[BackendConfig]) -> Result<Self, ValidationError> {
        if configs.is_empty() {
            return Err(ValidationError::NoBackends);
        }

        let backends = configs
            .iter()
            .enumerate()
            .map(|(index, config)| {
                if config.url.trim().is_empty() {
                    return Err(ValidationError::EmptyUrl(index));
                }
                let url = Url::parse(&config.url).map_err(|e| ValidationError::InvalidUrl {
                    index,
                    url: config.url.clone(),
                    reason: e.to_string(),
                })?;
                let weight = u32::try_from(config.weight)
                    .ok()
                    .filter(|w| *w > 0)
                    .ok_or(ValidationError::InvalidWeight {
                        index,
                        weight: config.weight,
                    })?;
                Ok(Backend { index, url, weight })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { backends })
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    /// Always false for a registry built by [`BackendRegistry::from_config`].
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Backend> {
        self.backends.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Backend> {
        self.backends.iter()
    }
}

impl Index<usize> for BackendRegistry {
    type Output = Backend;

    fn index(&self, index: usize) -> &Backend {
        &self.backends[index]
    }
}
