//! In-process [`KeyValue`] store.

use std::sync::Arc;

use common::operations::{By, Delete, Insert, Select};
use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use tokio::time::Instant;
use tracerr::Traced;

use crate::infra::kv::{self, Expiring, Key, KeyValue};

/// In-process [`KeyValue`] store.
///
/// Expired entries are evicted lazily, once they are read. An entry that is
/// never read again stays in memory until the process exits, so a long-living
/// process issuing many tokens grows unboundedly. Prefer [`kv::Redis`] in
/// production.
#[derive(Clone, Debug, Default)]
pub struct Memory {
    /// Stored entries.
    entries: Arc<DashMap<Key, Entry>>,
}

/// Entry of the [`Memory`] store.
#[derive(Debug)]
struct Entry {
    /// JSON-encoded value.
    value: Vec<u8>,

    /// [`Instant`] after which the value is gone.
    expires_at: Instant,
}

impl Memory {
    /// Creates a new empty [`Memory`] store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the raw value stored under the given [`Key`], unless it has
    /// expired already.
    fn live(&self, key: &Key) -> Option<Vec<u8>> {
        let now = Instant::now();
        let expired = match self.entries.get(key) {
            Some(e) if e.expires_at > now => return Some(e.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            drop(self.entries.remove_if(key, |_, e| e.expires_at <= now));
        }
        None
    }
}

impl<V> KeyValue<Insert<Expiring<V>>> for Memory
where
    V: Serialize,
{
    type Ok = ();
    type Err = Traced<kv::Error>;

    async fn execute(
        &self,
        Insert(entry): Insert<Expiring<V>>,
    ) -> Result<Self::Ok, Self::Err> {
        let Expiring { key, value, ttl } = entry;

        let value = serde_json::to_vec(&value)
            .map_err(tracerr::from_and_wrap!(=> kv::Error))?;
        drop(self.entries.insert(
            key,
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        ));
        Ok(())
    }
}

impl<V> KeyValue<Select<By<Option<V>, Key>>> for Memory
where
    V: DeserializeOwned,
{
    type Ok = Option<V>;
    type Err = Traced<kv::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<V>, Key>>,
    ) -> Result<Self::Ok, Self::Err> {
        self.live(by.as_inner())
            .map(|raw| serde_json::from_slice(&raw))
            .transpose()
            .map_err(tracerr::from_and_wrap!(=> kv::Error))
    }
}

impl KeyValue<Select<By<bool, Key>>> for Memory {
    type Ok = bool;
    type Err = Traced<kv::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<bool, Key>>,
    ) -> Result<Self::Ok, Self::Err> {
        Ok(self.live(by.as_inner()).is_some())
    }
}

impl KeyValue<Delete<Key>> for Memory {
    type Ok = ();
    type Err = Traced<kv::Error>;

    async fn execute(
        &self,
        Delete(key): Delete<Key>,
    ) -> Result<Self::Ok, Self::Err> {
        drop(self.entries.remove(&key));
        Ok(())
    }
}

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use common::operations::{By, Delete, Insert, Select};
    use tokio::time;

    use crate::infra::kv::{Expiring, Key, KeyValue as _};

    use super::Memory;

    async fn put(kv: &Memory, key: &Key, value: Vec<u32>, ttl: Duration) {
        kv.execute(Insert(Expiring {
            key: key.clone(),
            value,
            ttl,
        }))
        .await
        .unwrap();
    }

    async fn get(kv: &Memory, key: &Key) -> Option<Vec<u32>> {
        kv.execute(Select(By::<Option<Vec<u32>>, _>::new(key.clone())))
            .await
            .unwrap()
    }

    async fn exists(kv: &Memory, key: &Key) -> bool {
        kv.execute(Select(By::<bool, _>::new(key.clone())))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn stores_and_deletes_values() {
        let kv = Memory::new();
        let key = Key::new("test", 1);

        assert_eq!(get(&kv, &key).await, None);
        assert!(!exists(&kv, &key).await);

        put(&kv, &key, vec![1, 2, 3], Duration::from_secs(60)).await;
        assert_eq!(get(&kv, &key).await, Some(vec![1, 2, 3]));
        assert!(exists(&kv, &key).await);

        kv.execute(Delete(key.clone())).await.unwrap();
        assert_eq!(get(&kv, &key).await, None);

        // Deleting a missing entry is fine.
        kv.execute(Delete(key.clone())).await.unwrap();
    }

    #[tokio::test]
    async fn keeps_empty_values() {
        let kv = Memory::new();
        let key = Key::new("test", "empty");

        put(&kv, &key, vec![], Duration::from_secs(60)).await;

        assert_eq!(get(&kv, &key).await, Some(vec![]));
    }

    #[tokio::test(start_paused = true)]
    async fn expires_values_after_ttl() {
        let kv = Memory::new();
        let key = Key::new("test", 2);

        put(&kv, &key, vec![7], Duration::from_secs(60)).await;

        time::advance(Duration::from_secs(59)).await;
        assert!(exists(&kv, &key).await);

        time::advance(Duration::from_secs(1)).await;
        assert!(!exists(&kv, &key).await);
        assert_eq!(get(&kv, &key).await, None);
        assert!(kv.entries.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn reinsertion_refreshes_ttl() {
        let kv = Memory::new();
        let key = Key::new("test", 3);

        put(&kv, &key, vec![1], Duration::from_secs(60)).await;
        time::advance(Duration::from_secs(50)).await;
        put(&kv, &key, vec![2], Duration::from_secs(60)).await;
        time::advance(Duration::from_secs(50)).await;

        assert_eq!(get(&kv, &key).await, Some(vec![2]));
    }

    #[tokio::test(start_paused = true)]
    async fn keeps_expired_entries_until_read() {
        let kv = Memory::new();
        let key = Key::new("test", 4);

        put(&kv, &key, vec![1], Duration::from_secs(60)).await;
        time::advance(Duration::from_secs(120)).await;
        assert_eq!(kv.entries.len(), 1);

        assert!(!exists(&kv, &key).await);
        assert!(kv.entries.is_empty());
    }
}
