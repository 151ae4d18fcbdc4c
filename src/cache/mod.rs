//! # Cache Key Builder and Cache-Aside Gate
//!
//! Handler results can be cached per route. Two switches must both be on for
//! a request to read from the cache:
//!
//! - the route's [`CachePolicy`](crate::spec::CachePolicy) is enabled, and
//! - the request carries a truthy `_use_cache` control parameter.
//!
//! Successful handler results are written back whenever the route policy is
//! enabled and the result did not come from the cache. Store failures are
//! never surfaced: the gate logs them and behaves as on a miss.
//!
//! Keys are built from the library basename, the callback name and every
//! request parameter in name order, so parameter insertion order never
//! changes the key. The control parameter itself is excluded.

mod memory;

pub use memory::MemoryCacheStore;

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Reserved request parameter opting a request into cache reads.
pub const USE_CACHE_PARAM: &str = "_use_cache";

const KEY_SEPARATOR: &str = ":";

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
}

/// External cache store contract: get/set by key with a TTL.
///
/// Implementations provide their own atomicity for individual calls; the
/// gate adds no locking on top.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Result<Option<Value>, CacheError>;
    async fn set(&self, key: &CacheKey, value: Value, ttl: Duration) -> Result<(), CacheError>;
}

/// Deterministic cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    components: Vec<String>,
    rendered: String,
}

impl CacheKey {
    /// Build the key for a handler invocation.
    pub fn build(library_basename: &str, callback: &str, params: &Map<String, Value>) -> Self {
        let mut names: Vec<&String> = params
            .keys()
            .filter(|name| name.as_str() != USE_CACHE_PARAM)
            .collect();
        names.sort();

        let mut components = Vec::with_capacity(2 + names.len() * 2);
        components.push(library_basename.to_string());
        components.push(callback.to_string());
        for name in names {
            components.push(name.clone());
            components.push(render_value(&params[name.as_str()]));
        }
        let rendered = components.join(KEY_SEPARATOR);
        Self {
            components,
            rendered,
        }
    }

    pub fn components(&self) -> &[String] {
        &self.components
    }

    pub fn as_str(&self) -> &str {
        &self.rendered
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rendered)
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Whether the request opted into cache reads.
pub fn is_cache_requested(params: &Map<String, Value>) -> bool {
    match params.get(USE_CACHE_PARAM) {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::String(s)) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "true" | "1" | "yes" | "on"
        ),
        Some(Value::Number(n)) => n.as_i64() == Some(1),
        _ => false,
    }
}

/// Cache-aside gate over a [`CacheStore`].
#[derive(Clone)]
pub struct CacheGate {
    store: Arc<dyn CacheStore>,
}

impl CacheGate {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// Look up `key`. A store error reads as a miss.
    pub async fn lookup(&self, key: &CacheKey) -> Option<Value> {
        match self.store.get(key).await {
            Ok(Some(value)) => {
                debug!(cache_key = %key, "Cache hit");
                Some(value)
            }
            Ok(None) => {
                debug!(cache_key = %key, "Cache miss");
                None
            }
            Err(e) => {
                warn!(cache_key = %key, error = %e, "Cache lookup failed, treating as miss");
                None
            }
        }
    }

    /// Write a successful payload back. Failures are logged and dropped.
    pub async fn store(&self, key: &CacheKey, value: Value, ttl: Duration) {
        match self.store.set(key, value, ttl).await {
            Ok(()) => debug!(cache_key = %key, ttl_secs = ttl.as_secs(), "Cache write"),
            Err(e) => warn!(cache_key = %key, error = %e, "Cache write failed"),
        }
    }
}

impl fmt::Debug for CacheGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheGate").finish_non_exhaustive()
    }
}
