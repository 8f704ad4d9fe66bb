use crate::core::cache::RateCache;
use crate::core::currency::RateTable;
use crate::core::store::{SubscriptionStore, sort_by_next_payment};
use crate::core::subscription::{Currency, NewSubscription, Subscription, SubscriptionId};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{Duration, SystemTime};
use tokio::sync::Mutex;
use tracing::debug;

const SUBSCRIPTIONS: &str = "subscriptions";
const RATES: &str = "rates";
const META: &str = "meta";
const LAST_ID_KEY: &str = "last_id";

#[derive(Serialize, Deserialize)]
struct RateEntry {
    table: RateTable,
    expires_at: Option<SystemTime>,
}

fn record_key(id: SubscriptionId) -> [u8; 8] {
    id.to_be_bytes()
}

fn decode_id(key: &[u8]) -> Result<SubscriptionId> {
    let bytes: [u8; 8] = key
        .try_into()
        .map_err(|_| anyhow!("Malformed record key of {} bytes", key.len()))?;
    Ok(SubscriptionId::from_be_bytes(bytes))
}

/// Persistent store on a fjall keyspace. Subscriptions are JSON values keyed
/// by big-endian id; the same keyspace holds the exchange rate cache and the
/// id counter, so ids of deleted records are never handed out again.
pub struct DiskStore {
    keyspace: Keyspace,
    subscriptions: PartitionHandle,
    rates: PartitionHandle,
    meta: PartitionHandle,
    last_id: Mutex<SubscriptionId>,
}

impl DiskStore {
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create data directory: {}", path.display()))?;

        let keyspace = fjall::Config::new(path)
            .open()
            .with_context(|| format!("Failed to open store at {}", path.display()))?;
        let subscriptions = keyspace
            .open_partition(SUBSCRIPTIONS, PartitionCreateOptions::default())
            .context("Failed to open subscriptions partition")?;
        let rates = keyspace
            .open_partition(RATES, PartitionCreateOptions::default())
            .context("Failed to open rates partition")?;
        let meta = keyspace
            .open_partition(META, PartitionCreateOptions::default())
            .context("Failed to open meta partition")?;

        let stored_counter = match meta.get(LAST_ID_KEY)? {
            Some(value) => decode_id(&value)?,
            None => 0,
        };
        // stores written before the counter existed only have their keys
        let highest_key = match subscriptions.last_key_value()? {
            Some((key, _)) => decode_id(&key)?,
            None => 0,
        };
        let last_id = stored_counter.max(highest_key);
        debug!("Opened store at {} (last id {})", path.display(), last_id);

        Ok(Self {
            keyspace,
            subscriptions,
            rates,
            meta,
            last_id: Mutex::new(last_id),
        })
    }

    fn write(&self, sub: &Subscription) -> Result<()> {
        let value = serde_json::to_vec(sub)?;
        self.subscriptions
            .insert(&record_key(sub.id)[..], value)
            .with_context(|| format!("Failed to write subscription {}", sub.id))?;
        self.keyspace.persist(PersistMode::SyncAll)?;
        Ok(())
    }

    fn read_rate_entry(&self, base: Currency) -> Result<Option<RateEntry>> {
        match self.rates.get(base.code())? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    fn write_rate_entry(&self, table: RateTable, ttl: Option<Duration>) -> Result<()> {
        let base = table.base();
        let entry = RateEntry {
            table,
            // a TTL past the end of time never expires
            expires_at: ttl.and_then(|d| SystemTime::now().checked_add(d)),
        };
        self.rates.insert(base.code(), serde_json::to_vec(&entry)?)?;
        self.keyspace.persist(PersistMode::SyncAll)?;
        Ok(())
    }

    fn clear_rate_entries(&self) -> Result<()> {
        for currency in Currency::ALL {
            self.rates.remove(currency.code())?;
        }
        self.keyspace.persist(PersistMode::SyncAll)?;
        Ok(())
    }
}

#[async_trait]
impl SubscriptionStore for DiskStore {
    async fn create(&self, record: NewSubscription) -> Result<Subscription> {
        let mut last_id = self.last_id.lock().await;
        let id = last_id
            .checked_add(1)
            .context("Subscription id space exhausted")?;
        let sub = record.with_id(id);

        let mut batch = self.keyspace.batch();
        batch.insert(&self.subscriptions, &record_key(id)[..], serde_json::to_vec(&sub)?);
        batch.insert(&self.meta, LAST_ID_KEY, &record_key(id)[..]);
        batch
            .commit()
            .with_context(|| format!("Failed to write subscription {id}"))?;
        self.keyspace.persist(PersistMode::SyncAll)?;

        *last_id = id;
        debug!("Disk store CREATE {}", sub.id);
        Ok(sub)
    }

    async fn get(&self, id: SubscriptionId) -> Result<Option<Subscription>> {
        match self.subscriptions.get(record_key(id))? {
            Some(value) => {
                let sub = serde_json::from_slice(&value)
                    .with_context(|| format!("Corrupt subscription record {id}"))?;
                Ok(Some(sub))
            }
            None => Ok(None),
        }
    }

    async fn list(&self, owner: &str) -> Result<Vec<Subscription>> {
        let mut subs = Vec::new();
        for item in self.subscriptions.iter() {
            let (key, value) = item?;
            let sub: Subscription = serde_json::from_slice(&value)
                .with_context(|| format!("Corrupt subscription record {:?}", decode_id(&key).ok()))?;
            if sub.owner == owner {
                subs.push(sub);
            }
        }
        sort_by_next_payment(&mut subs);
        Ok(subs)
    }

    async fn update(&self, record: Subscription) -> Result<Subscription> {
        if !self.subscriptions.contains_key(record_key(record.id))? {
            return Err(anyhow!("No subscription with id {}", record.id));
        }
        self.write(&record)?;
        debug!("Disk store UPDATE {}", record.id);
        Ok(record)
    }

    async fn delete(&self, id: SubscriptionId) -> Result<bool> {
        let key = record_key(id);
        if !self.subscriptions.contains_key(key)? {
            return Ok(false);
        }
        self.subscriptions.remove(&key[..])?;
        self.keyspace.persist(PersistMode::SyncAll)?;
        debug!("Disk store DELETE {}", id);
        Ok(true)
    }
}

#[async_trait]
impl RateCache for DiskStore {
    async fn get(&self, base: Currency) -> Option<RateTable> {
        match self.read_rate_entry(base) {
            Ok(Some(entry)) => {
                if let Some(expires_at) = entry.expires_at {
                    if SystemTime::now() > expires_at {
                        debug!("Rate cache entry expired for {}", base);
                        return None;
                    }
                }
                debug!("Rate cache HIT for {}", base);
                Some(entry.table)
            }
            Ok(None) => {
                debug!("Rate cache MISS for {}", base);
                None
            }
            Err(e) => {
                debug!("Rate cache read error: {}", e);
                None
            }
        }
    }

    async fn put(&self, table: RateTable, ttl: Option<Duration>) {
        let base = table.base();
        match self.write_rate_entry(table, ttl) {
            Ok(()) => debug!("Rate cache PUT for {}", base),
            Err(e) => debug!("Rate cache write error: {}", e),
        }
    }

    async fn clear(&self) {
        if let Err(e) = self.clear_rate_entries() {
            debug!("Rate cache clear error: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::subscription::{BillingCycle, Category};
    use chrono::NaiveDate;
    use tempfile::tempdir;
    use tokio::time::sleep;

    fn record(name: &str, next: NaiveDate) -> NewSubscription {
        NewSubscription {
            owner: "default".to_string(),
            name: name.to_string(),
            price: 9.99,
            currency: Currency::Eur,
            billing_cycle: BillingCycle::Yearly,
            start_date: next,
            next_payment_date: next,
            category: Category::Utilities,
            color: "#f59e0b".to_string(),
            active: true,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_disk_store_crud() {
        let dir = tempdir().unwrap();
        let store = DiskStore::open(dir.path()).unwrap();

        let a = store.create(record("Internet", date(2024, 8, 1))).await.unwrap();
        let b = store.create(record("Water", date(2024, 2, 1))).await.unwrap();
        assert_eq!((a.id, b.id), (1, 2));

        let listed = store.list("default").await.unwrap();
        assert_eq!(listed, vec![b.clone(), a.clone()]);
        assert!(store.list("someone-else").await.unwrap().is_empty());

        let mut changed = b.clone();
        changed.active = false;
        store.update(changed.clone()).await.unwrap();
        assert_eq!(SubscriptionStore::get(&store, b.id).await.unwrap(), Some(changed));

        assert!(store.delete(a.id).await.unwrap());
        assert!(!store.delete(a.id).await.unwrap());
        assert!(store.update(a).await.is_err());
    }

    #[tokio::test]
    async fn test_disk_store_survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = DiskStore::open(dir.path()).unwrap();
            store.create(record("Internet", date(2024, 8, 1))).await.unwrap();
            store.create(record("Water", date(2024, 2, 1))).await.unwrap();
        }

        let store = DiskStore::open(dir.path()).unwrap();
        assert_eq!(store.list("default").await.unwrap().len(), 2);
        let next = store.create(record("Gas", date(2024, 3, 1))).await.unwrap();
        assert_eq!(next.id, 3);
    }

    #[tokio::test]
    async fn test_disk_store_never_reuses_deleted_ids() {
        let dir = tempdir().unwrap();
        {
            let store = DiskStore::open(dir.path()).unwrap();
            store.create(record("Internet", date(2024, 8, 1))).await.unwrap();
            let newest = store.create(record("Water", date(2024, 2, 1))).await.unwrap();
            assert!(store.delete(newest.id).await.unwrap());
        }

        let store = DiskStore::open(dir.path()).unwrap();
        let next = store.create(record("Gas", date(2024, 3, 1))).await.unwrap();
        assert_eq!(next.id, 3);
        assert!(SubscriptionStore::get(&store, 2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_disk_rate_cache_with_huge_ttl() {
        let dir = tempdir().unwrap();
        let store = DiskStore::open(dir.path()).unwrap();

        let table = RateTable::new(Currency::Ron).with_rate(Currency::Eur, 0.2);
        RateCache::put(&store, table.clone(), Some(Duration::MAX)).await;
        assert_eq!(RateCache::get(&store, Currency::Ron).await, Some(table));
    }

    #[tokio::test]
    async fn test_disk_rate_cache() {
        let dir = tempdir().unwrap();
        let store = DiskStore::open(dir.path()).unwrap();
        assert!(RateCache::get(&store, Currency::Ron).await.is_none());

        let table = RateTable::new(Currency::Ron).with_rate(Currency::Gbp, 0.17);
        RateCache::put(&store, table.clone(), None).await;
        assert_eq!(RateCache::get(&store, Currency::Ron).await, Some(table));

        RateCache::clear(&store).await;
        assert!(RateCache::get(&store, Currency::Ron).await.is_none());
    }

    #[tokio::test]
    async fn test_disk_rate_cache_ttl_expiration() {
        let dir = tempdir().unwrap();
        let store = DiskStore::open(dir.path()).unwrap();

        RateCache::put(
            &store,
            RateTable::new(Currency::Usd),
            Some(Duration::from_millis(10)),
        )
        .await;
        assert!(RateCache::get(&store, Currency::Usd).await.is_some());

        sleep(Duration::from_millis(20)).await;
        assert!(RateCache::get(&store, Currency::Usd).await.is_none());
    }
}
