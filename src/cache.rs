//! Time-boxed memoization of aggregation runs.
//!
//! Keys are lowercase `(keyword, location)`. Each key holds a shared
//! [`OnceCell`]: the first caller computes, concurrent callers for the same
//! key wait on the same cell instead of running their own aggregation.
//! Expired entries are replaced lazily on read, or dropped by
//! [`ResultCache::purge_expired`].

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::OnceCell;
use tokio::time::Instant;
use tracing::debug;

use crate::aggregator::Aggregation;
use crate::utils::collapse_whitespace;

pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

pub type CacheKey = (String, String);

#[derive(Debug)]
pub struct CachedSearch {
    pub stored_at: Instant,
    pub aggregation: Aggregation,
}

type Slot = Arc<OnceCell<Arc<CachedSearch>>>;

pub struct ResultCache {
    ttl: Duration,
    entries: Mutex<HashMap<CacheKey, Slot>>,
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl ResultCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn key(keyword: &str, location: &str) -> CacheKey {
        (
            collapse_whitespace(&keyword.to_lowercase()),
            collapse_whitespace(&location.to_lowercase()),
        )
    }

    /// Cached run for the key, or the result of `compute` stored under it.
    /// The flag is `true` when this caller did not run `compute` itself.
    pub async fn get_or_compute<F, Fut>(&self, keyword: &str, location: &str, compute: F) -> (Arc<CachedSearch>, bool)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Aggregation>,
    {
        let key = Self::key(keyword, location);
        let slot = self.slot(&key);

        let mut computed = false;
        let ran = &mut computed;
        let entry = slot
            .get_or_init(|| async move {
                *ran = true;
                let aggregation = compute().await;
                Arc::new(CachedSearch {
                    stored_at: Instant::now(),
                    aggregation,
                })
            })
            .await
            .clone();

        if computed {
            debug!(keyword = %key.0, location = %key.1, "Cache miss");
        } else {
            debug!(keyword = %key.0, location = %key.1, "Cache hit");
        }
        (entry, !computed)
    }

    /// Fresh or in-flight slot for `key`; expired slots are replaced.
    fn slot(&self, key: &CacheKey) -> Slot {
        let mut entries = self.lock();
        if let Some(slot) = entries.get(key).filter(|slot| self.is_live(slot)) {
            return Arc::clone(slot);
        }
        let slot = Slot::default();
        entries.insert(key.clone(), Arc::clone(&slot));
        slot
    }

    fn is_live(&self, slot: &Slot) -> bool {
        match slot.get() {
            Some(entry) => entry.stored_at.elapsed() < self.ttl,
            None => true,
        }
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, slot| self.is_live(slot));
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, Slot>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
