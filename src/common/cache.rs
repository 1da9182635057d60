use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::common::store::{KvStore, KvStoreExt};
use crate::config::{cache_key, MAX_INDEX_CACHE_SECONDS};

/// A fully rendered response body kept for a fixed interval.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CachedPage {
    pub stored_at: DateTime<Utc>,
    pub status: u16,
    pub content_type: String,
    pub body: String,
}

impl CachedPage {
    pub fn is_fresh(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        now >= self.stored_at && now - self.stored_at < ttl
    }
}

/// Per-route page cache kept in the key/value store, so every component
/// instance sees the same snapshot until it expires.
pub struct PageCache<'a> {
    store: &'a dyn KvStore,
    ttl: Duration,
}

impl<'a> PageCache<'a> {
    pub fn new(store: &'a dyn KvStore, ttl_seconds: i64) -> Self {
        Self {
            store,
            ttl: Duration::seconds(ttl_seconds.clamp(0, MAX_INDEX_CACHE_SECONDS)),
        }
    }

    pub fn enabled(&self) -> bool {
        self.ttl > Duration::zero()
    }

    pub fn get(&self, route: &str, now: DateTime<Utc>) -> anyhow::Result<Option<CachedPage>> {
        if !self.enabled() {
            return Ok(None);
        }
        let cached: Option<CachedPage> = self.store.get_json(&cache_key(route))?;
        Ok(cached.filter(|page| page.is_fresh(self.ttl, now)))
    }

    pub fn put(&self, route: &str, page: &CachedPage) -> anyhow::Result<()> {
        if !self.enabled() {
            return Ok(());
        }
        self.store.set_json(&cache_key(route), page)
    }
}
