//! Cache-Coherent Read Layer
//!
//! - [`CacheBackend`]: string-keyed get / set-with-ttl / delete, JSON text values
//! - [`MokaCache`]: in-process backend with per-entry TTL
//! - [`keys`]: cache keys per scope and the invalidation fan-out
//! - [`CachedGraph`]: cache-aside aggregate reads and invalidating writes

pub mod keys;
pub mod moka_cache;
pub mod read;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::OntoError;

pub use keys::{invalidation_keys, CacheKey};
pub use moka_cache::MokaCache;
pub use read::CachedGraph;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache backend unavailable: {0}")]
    Unavailable(String),

    #[error("Cache operation failed on '{key}': {reason}")]
    Operation { key: String, reason: String },
}

impl From<CacheError> for OntoError {
    fn from(err: CacheError) -> Self {
        OntoError::Cache(err.to_string())
    }
}

/// Key/value cache collaborator. Values are JSON text so any string-keyed
/// store can back the read layer.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}
