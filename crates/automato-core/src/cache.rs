//! TTL-cached state
//!
//! A [`StateCache`] wraps one [`StateSource`] and only collects from it when
//! the cached data has expired. Staleness is measured from the last collection
//! attempt, so a failing source is asked at most once per TTL window, while
//! `last_collected_at` keeps reporting the last successful collection.
//!
//! A failed collection never clears the cache: later lookups inside the TTL are
//! served the last good data. The lookup that observed the failure reports it.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

use crate::clock::{secs, Clock};
use crate::error::{CollectionError, ReferenceError, StateError, StateResult};
use crate::source::{StateMap, StateSource};
use crate::PATH_SEPARATOR;

/// TTL used when the configuration does not set one
pub const DEFAULT_TTL_SECS: u64 = 30;

/// Upper bound for a single collection
pub const DEFAULT_COLLECT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Default)]
struct CacheInner {
    data: Option<StateMap>,
    last_collected_at: Option<DateTime<Utc>>,
    last_attempt_at: Option<DateTime<Utc>>,
    last_error: Option<CollectionError>,
    collections: u64,
}

impl CacheInner {
    fn is_stale(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        match self.last_attempt_at {
            Some(attempt) => now - attempt > ttl,
            None => true,
        }
    }
}

/// TTL memoization around one state source
pub struct StateCache {
    name: String,
    ttl: chrono::Duration,
    timeout: Duration,
    source: Box<dyn StateSource>,
    clock: Arc<dyn Clock>,
    // Held across collection: one collection per source at a time
    inner: Mutex<CacheInner>,
}

impl StateCache {
    /// Create a cache named `name` with a TTL in seconds
    pub fn new(
        name: impl Into<String>,
        source: Box<dyn StateSource>,
        ttl_secs: u64,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            name: name.into(),
            ttl: secs(ttl_secs),
            timeout: DEFAULT_COLLECT_TIMEOUT,
            source,
            clock,
            inner: Mutex::new(CacheInner::default()),
        }
    }

    /// Set the upper bound for a single collection
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ttl(&self) -> chrono::Duration {
        self.ttl
    }

    /// Look up one key, collecting first if the cached data has expired
    pub async fn get(&self, key: &str) -> StateResult<Value> {
        let mut inner = self.inner.lock().await;
        let now = self.clock.now();

        if inner.is_stale(now, self.ttl) {
            debug!(state = %self.name, key, "Cached data expired, collecting");
            self.refresh(&mut inner).await?;
        } else {
            trace!(state = %self.name, key, "Using cached data");
        }

        let Some(data) = inner.data.as_ref() else {
            // Inside the TTL of a failed first collection
            let error = inner.last_error.clone().unwrap_or_else(|| {
                CollectionError::InvalidData("no data collected".to_string())
            });
            return Err(error.into());
        };

        lookup_key(data, key)
            .or_else(|| self.source.missing_key(key))
            .ok_or_else(|| {
                debug!(state = %self.name, key, "Key not found in state data");
                StateError::Reference(ReferenceError::Key {
                    state: self.name.clone(),
                    key: key.to_string(),
                })
            })
    }

    /// Collect now, regardless of freshness
    pub async fn collect(&self) -> StateResult<()> {
        let mut inner = self.inner.lock().await;
        self.refresh(&mut inner).await.map_err(StateError::from)
    }

    /// Time of the last successful collection
    pub async fn last_collected_at(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().await.last_collected_at
    }

    /// Number of collections attempted so far
    pub async fn collection_count(&self) -> u64 {
        self.inner.lock().await.collections
    }

    /// Copy of the last successfully collected data
    pub async fn snapshot(&self) -> Option<StateMap> {
        self.inner.lock().await.data.clone()
    }

    async fn refresh(&self, inner: &mut CacheInner) -> Result<(), CollectionError> {
        inner.collections += 1;

        let result = match tokio::time::timeout(self.timeout, self.source.collect()).await {
            Ok(result) => result,
            Err(_) => Err(CollectionError::Timeout(self.timeout)),
        };

        let now = self.clock.now();
        inner.last_attempt_at = Some(now);

        match result {
            Ok(data) => {
                debug!(state = %self.name, keys = data.len(), "Collected state");
                inner.data = Some(data);
                inner.last_collected_at = Some(now);
                inner.last_error = None;
                Ok(())
            }
            Err(e) => {
                warn!(
                    state = %self.name,
                    error = %e,
                    has_stale_data = inner.data.is_some(),
                    "State collection failed"
                );
                inner.last_error = Some(e.clone());
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for StateCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateCache")
            .field("name", &self.name)
            .field("ttl", &self.ttl)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Find `key` in collected data
///
/// The key is tried verbatim first. Otherwise a dotted key walks nested
/// objects and arrays: `cpu.0.load`.
pub fn lookup_key(data: &StateMap, key: &str) -> Option<Value> {
    if let Some(value) = data.get(key) {
        return Some(value.clone());
    }

    let (head, rest) = key.split_once(PATH_SEPARATOR)?;
    let mut current = data.get(head)?;
    for part in rest.split(PATH_SEPARATOR) {
        current = match current {
            Value::Object(map) => map.get(part)?,
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current.clone())
}
