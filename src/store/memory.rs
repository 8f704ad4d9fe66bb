use crate::core::cache::RateCache;
use crate::core::currency::RateTable;
use crate::core::store::{SubscriptionStore, sort_by_next_payment};
use crate::core::subscription::{Currency, NewSubscription, Subscription, SubscriptionId};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

struct Records {
    last_id: SubscriptionId,
    by_id: BTreeMap<SubscriptionId, Subscription>,
}

/// Non-persistent record store.
pub struct MemoryStore {
    inner: Mutex<Records>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Records {
                last_id: 0,
                by_id: BTreeMap::new(),
            }),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SubscriptionStore for MemoryStore {
    async fn create(&self, record: NewSubscription) -> Result<Subscription> {
        let mut records = self.inner.lock().await;
        records.last_id += 1;
        let sub = record.with_id(records.last_id);
        records.by_id.insert(sub.id, sub.clone());
        debug!("Memory store CREATE {}", sub.id);
        Ok(sub)
    }

    async fn get(&self, id: SubscriptionId) -> Result<Option<Subscription>> {
        let records = self.inner.lock().await;
        Ok(records.by_id.get(&id).cloned())
    }

    async fn list(&self, owner: &str) -> Result<Vec<Subscription>> {
        let records = self.inner.lock().await;
        let mut subs: Vec<Subscription> = records
            .by_id
            .values()
            .filter(|s| s.owner == owner)
            .cloned()
            .collect();
        sort_by_next_payment(&mut subs);
        Ok(subs)
    }

    async fn update(&self, record: Subscription) -> Result<Subscription> {
        let mut records = self.inner.lock().await;
        match records.by_id.get_mut(&record.id) {
            Some(existing) => {
                *existing = record.clone();
                debug!("Memory store UPDATE {}", record.id);
                Ok(record)
            }
            None => Err(anyhow!("No subscription with id {}", record.id)),
        }
    }

    async fn delete(&self, id: SubscriptionId) -> Result<bool> {
        let mut records = self.inner.lock().await;
        let removed = records.by_id.remove(&id).is_some();
        if removed {
            debug!("Memory store DELETE {}", id);
        }
        Ok(removed)
    }
}

struct CachedRates {
    table: RateTable,
    expires_at: Option<Instant>,
}

/// In-process rate cache with optional expiry.
pub struct MemoryRateCache {
    inner: Mutex<HashMap<Currency, CachedRates>>,
}

impl MemoryRateCache {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryRateCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RateCache for MemoryRateCache {
    async fn get(&self, base: Currency) -> Option<RateTable> {
        let cache = self.inner.lock().await;
        if let Some(entry) = cache.get(&base) {
            if let Some(expiry) = entry.expires_at {
                if expiry < Instant::now() {
                    debug!("Rate cache entry expired for {}", base);
                    return None;
                }
            }
            debug!("Rate cache HIT for {}", base);
            return Some(entry.table.clone());
        }
        debug!("Rate cache MISS for {}", base);
        None
    }

    async fn put(&self, table: RateTable, ttl: Option<Duration>) {
        let expires_at = ttl.and_then(|duration| Instant::now().checked_add(duration));
        let mut cache = self.inner.lock().await;
        debug!("Rate cache PUT for {}", table.base());
        cache.insert(table.base(), CachedRates { table, expires_at });
    }

    async fn clear(&self) {
        self.inner.lock().await.clear();
        debug!("Rate cache CLEAR");
    }
}
