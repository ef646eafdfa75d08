use dashmap::DashMap;
use serde::Serialize;
use std::{borrow::Borrow, hash::Hash, sync::Arc, time::Duration};
use tokio::time::Instant;
use tracing::debug;

use super::TtlPolicy;

/// Stored value with the TTL fixed at insertion.
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn new(value: V, ttl: Duration) -> Self {
        Self {
            value,
            stored_at: Instant::now(),
            ttl,
        }
    }

    fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.stored_at)
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.age(now) >= self.ttl
    }
}

/// Per-entry diagnostics returned by [`TtlCache::list`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EntryStats {
    pub age_sec: u64,
    pub remaining_sec: u64,
    pub duration_sec: u64,
}

/// Time-bounded map with a TTL chosen per entry from its richness.
///
/// There is no size bound: entries only leave through [`delete`](Self::delete),
/// an expired [`get`](Self::get), or a [`sweep`](Self::sweep). Clones share
/// the same underlying map.
#[derive(Debug)]
pub struct TtlCache<K: Clone + Eq + Hash, V> {
    data: Arc<DashMap<K, CacheEntry<V>>>,
    policy: TtlPolicy,
}

impl<K, V> TtlCache<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(policy: TtlPolicy) -> Self {
        Self {
            data: Arc::new(DashMap::new()),
            policy,
        }
    }

    /// Stores `value`, replacing any previous entry, and returns the TTL it got.
    pub fn put(&self, key: K, value: V, richness: usize) -> Duration {
        let ttl = self.policy.ttl_for(richness);
        self.data.insert(key, CacheEntry::new(value, ttl));
        ttl
    }

    /// Returns the value unless it is missing or past its TTL.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = Instant::now();
        let entry = self.data.get(key)?;
        if !entry.is_expired(now) {
            return Some(entry.value.clone());
        }

        drop(entry);
        // a concurrent put may have replaced it meanwhile
        self.data.remove_if(key, |_, entry| entry.is_expired(now));
        None
    }

    /// Removes the entry; `false` if there was none.
    pub fn delete<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.data.remove(key).is_some()
    }

    /// Removes expired entries and returns how many were dropped.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;

        self.data.retain(|_, entry| {
            let keep = !entry.is_expired(now);
            if !keep {
                removed += 1;
            }
            keep
        });

        if removed > 0 {
            debug!("Swept {} expired cache entries", removed);
        }

        removed
    }

    /// Sweeps, then reports age and remaining lifetime of every live entry.
    pub fn list(&self) -> Vec<(K, EntryStats)> {
        self.sweep();
        let now = Instant::now();

        self.data
            .iter()
            .map(|entry| {
                let age = entry.age(now);
                let stats = EntryStats {
                    age_sec: age.as_secs(),
                    remaining_sec: entry.ttl.saturating_sub(age).as_secs(),
                    duration_sec: entry.ttl.as_secs(),
                };
                (entry.key().clone(), stats)
            })
            .collect()
    }

    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl<K, V> Clone for TtlCache<K, V>
where
    K: Clone + Eq + Hash,
{
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            policy: self.policy,
        }
    }
}
