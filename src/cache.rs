use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::trace;

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

type Slot<V> = Arc<Mutex<Option<Entry<V>>>>;

/// Time-boxed memoization of async reads.
///
/// Each key owns its own async lock, so concurrent callers for one key share
/// a single in-flight fetch while callers for other keys proceed untouched.
/// Entries expire purely by age; failed fetches are not stored.
pub(crate) struct TtlCache<K, V> {
    ttl: Duration,
    slots: DashMap<K, Slot<V>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slots: DashMap::new(),
        }
    }

    pub async fn get_or_try_fetch<F, Fut, E>(&self, key: &K, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if self.ttl.is_zero() {
            return fetch().await;
        }

        let slot = Arc::clone(&self.slots.entry(key.clone()).or_default());
        let mut guard = slot.lock().await;

        if let Some(entry) = guard.as_ref()
            && entry.expires_at > Instant::now()
        {
            trace!("cache hit");
            return Ok(entry.value.clone());
        }

        let value = fetch().await?;
        *guard = Some(Entry {
            value: value.clone(),
            expires_at: Instant::now() + self.ttl,
        });
        Ok(value)
    }

    /// Forget a key. A fetch already in flight for it stores into a detached
    /// slot, so the next caller always goes to the remote.
    pub fn invalidate(&self, key: &K) {
        self.slots.remove(key);
    }
}
