/// In-memory TTL cache with single-flight production of values
use crate::error::Result;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// A production every concurrent caller of the same key awaits
type Production<T> = Shared<BoxFuture<'static, Result<T>>>;

enum Slot {
    Ready {
        value: Box<dyn Any + Send>,
        expires_at: Instant,
    },
    Pending {
        generation: u64,
        waiters: usize,
        production: Box<dyn Any + Send>,
    },
}

#[derive(Default)]
struct Entries {
    slots: HashMap<String, Slot>,
    next_generation: u64,
}

/// Key-addressed memoization of asynchronous producers.
///
/// Values live until their TTL passes and are evicted lazily on the next lookup.
/// While a value is being produced, every caller asking for the same key awaits that
/// one production; a failed production is handed to all of them and is not stored.
/// A production whose callers have all gone away is discarded.
#[derive(Default)]
pub struct CacheStore {
    entries: Mutex<Entries>,
}

/// Registration of one caller on a pending slot; dropping it before the production
/// finishes withdraws the caller
struct Waiter<'a> {
    entries: &'a Mutex<Entries>,
    key: &'a str,
    generation: u64,
    finished: bool,
}

impl Drop for Waiter<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        let mut entries = lock(self.entries);
        let abandoned = match entries.slots.get_mut(self.key) {
            Some(Slot::Pending {
                generation,
                waiters,
                ..
            }) if *generation == self.generation => {
                *waiters = waiters.saturating_sub(1);
                *waiters == 0
            }
            _ => false,
        };

        if abandoned {
            entries.slots.remove(self.key);
            debug!(key = self.key, "all callers gone, dropped in-flight production");
        }
    }
}

fn lock(entries: &Mutex<Entries>) -> MutexGuard<'_, Entries> {
    entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl CacheStore {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the live value for `key`, or run `producer` once and cache its result for `ttl`
    pub async fn get_or_set<T, F, Fut>(&self, key: &str, ttl: Duration, producer: F) -> Result<T>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let (production, generation) = {
            let mut entries = lock(&self.entries);
            let now = Instant::now();

            let joined = match entries.slots.get_mut(key) {
                Some(Slot::Ready { value, expires_at }) if now < *expires_at => {
                    if let Some(value) = (**value).downcast_ref::<T>() {
                        debug!(key, "cache hit");
                        return Ok(value.clone());
                    }
                    warn!(key, "cached value has a different type, producing again");
                    None
                }
                Some(Slot::Ready { .. }) => {
                    debug!(key, "cache entry expired");
                    None
                }
                Some(Slot::Pending {
                    generation,
                    waiters,
                    production,
                }) => match (**production).downcast_ref::<Production<T>>() {
                    Some(production) => {
                        debug!(key, "joining in-flight production");
                        *waiters += 1;
                        Some((production.clone(), *generation))
                    }
                    None => {
                        warn!(key, "in-flight production has a different type, producing again");
                        None
                    }
                },
                None => None,
            };

            match joined {
                Some(joined) => joined,
                None => {
                    debug!(key, "cache miss");
                    let generation = entries.next_generation;
                    entries.next_generation += 1;

                    let production: Production<T> = producer().boxed().shared();
                    entries.slots.insert(
                        key.to_string(),
                        Slot::Pending {
                            generation,
                            waiters: 1,
                            production: Box::new(production.clone()),
                        },
                    );
                    (production, generation)
                }
            }
        };

        let mut waiter = Waiter {
            entries: &self.entries,
            key,
            generation,
            finished: false,
        };

        let outcome = production.await;
        waiter.finished = true;

        let mut entries = lock(&self.entries);
        let still_pending = matches!(
            entries.slots.get(key),
            Some(Slot::Pending { generation: current, .. }) if *current == generation
        );

        if still_pending {
            match &outcome {
                Ok(value) => {
                    entries.slots.insert(
                        key.to_string(),
                        Slot::Ready {
                            value: Box::new(value.clone()),
                            expires_at: Instant::now() + ttl,
                        },
                    );
                    debug!(key, ttl_secs = ttl.as_secs(), "cached value");
                }
                Err(e) => {
                    entries.slots.remove(key);
                    debug!(key, error = %e, "production failed, nothing cached");
                }
            }
        }

        outcome
    }

    /// Drop the entry for `key`, returning whether one existed
    pub async fn invalidate(&self, key: &str) -> bool {
        let removed = lock(&self.entries).slots.remove(key).is_some();
        if removed {
            debug!(key, "invalidated cache entry");
        }
        removed
    }

    /// Drop every entry, returning how many were removed
    pub async fn clear(&self) -> usize {
        let mut entries = lock(&self.entries);
        let count = entries.slots.len();
        entries.slots.clear();
        count
    }

    /// Number of stored entries, expired ones included until looked up again
    pub async fn len(&self) -> usize {
        lock(&self.entries).slots.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Snapshot of entry states
    pub async fn stats(&self) -> CacheStats {
        let entries = lock(&self.entries);
        let now = Instant::now();
        let mut stats = CacheStats::default();

        for slot in entries.slots.values() {
            stats.total_entries += 1;
            match slot {
                Slot::Ready { expires_at, .. } if now < *expires_at => stats.live_entries += 1,
                Slot::Ready { .. } => stats.expired_entries += 1,
                Slot::Pending { .. } => stats.in_flight += 1,
            }
        }

        stats
    }
}

/// Cache statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub total_entries: usize,
    pub live_entries: usize,
    pub expired_entries: usize,
    pub in_flight: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScrapeError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_producer(
        counter: &Arc<AtomicUsize>,
        value: u32,
    ) -> impl FnOnce() -> BoxFuture<'static, Result<u32>> {
        let counter = counter.clone();
        move || {
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok(value)
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn test_hit_skips_producer() {
        let cache = CacheStore::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let ttl = Duration::from_secs(60);

        let first = cache.get_or_set("k", ttl, counting_producer(&counter, 7)).await.unwrap();
        let second = cache.get_or_set("k", ttl, counting_producer(&counter, 8)).await.unwrap();

        assert_eq!(first, 7);
        assert_eq!(second, 7);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_production() {
        let cache = CacheStore::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let ttl = Duration::from_secs(60);

        let (a, b, c) = tokio::join!(
            cache.get_or_set("shared", ttl, counting_producer(&counter, 1)),
            cache.get_or_set("shared", ttl, counting_producer(&counter, 2)),
            cache.get_or_set("shared", ttl, counting_producer(&counter, 3)),
        );

        assert_eq!((a.unwrap(), b.unwrap(), c.unwrap()), (1, 1, 1));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_across_tasks() {
        let cache = Arc::new(CacheStore::new());
        let counter = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = cache.clone();
                let producer = counting_producer(&counter, i);
                tokio::spawn(async move {
                    cache.get_or_set("spawned", Duration::from_secs(60), producer).await
                })
            })
            .collect();

        let mut values = Vec::new();
        for handle in handles {
            values.push(handle.await.unwrap().unwrap());
        }

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(values.windows(2).all(|pair| pair[0] == pair[1]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_reaches_all_waiters_and_is_not_cached() {
        let cache = CacheStore::new();
        let attempts = Arc::new(AtomicUsize::new(0));
        let ttl = Duration::from_secs(60);

        let failing = |attempts: Arc<AtomicUsize>| {
            move || async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                Err::<u32, _>(ScrapeError::Timeout { url: "https://origin/x".to_string() })
            }
        };

        let (a, b) = tokio::join!(
            cache.get_or_set("flaky", ttl, failing(attempts.clone())),
            cache.get_or_set("flaky", ttl, failing(attempts.clone())),
        );

        let expected = ScrapeError::Timeout { url: "https://origin/x".to_string() };
        assert_eq!(a.unwrap_err(), expected);
        assert_eq!(b.unwrap_err(), expected);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert!(cache.is_empty().await);

        let retried = cache
            .get_or_set("flaky", ttl, || async { Ok::<u32, ScrapeError>(5) })
            .await
            .unwrap();
        assert_eq!(retried, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_sole_caller_discards_production() {
        let cache = CacheStore::new();
        let ttl = Duration::from_secs(60);

        let slow_failure = || async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Err::<u32, _>(ScrapeError::Timeout { url: "https://origin/slow".to_string() })
        };

        let cancelled =
            tokio::time::timeout(Duration::from_millis(10), cache.get_or_set("slow", ttl, slow_failure)).await;
        assert!(cancelled.is_err());
        assert_eq!(cache.stats().await.in_flight, 0);
        assert!(cache.is_empty().await);

        let fresh = cache
            .get_or_set("slow", ttl, || async { Ok::<u32, ScrapeError>(9) })
            .await
            .unwrap();
        assert_eq!(fresh, 9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_waiter_leaves_production_to_others() {
        let cache = CacheStore::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let ttl = Duration::from_secs(60);

        let (cancelled, kept) = tokio::join!(
            tokio::time::timeout(
                Duration::from_millis(5),
                cache.get_or_set("shared", ttl, counting_producer(&counter, 1)),
            ),
            cache.get_or_set("shared", ttl, counting_producer(&counter, 2)),
        );

        assert!(cancelled.is_err());
        assert_eq!(kept.unwrap(), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().await.live_entries, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expiry() {
        let cache = CacheStore::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let ttl = Duration::from_secs(10);

        let producer = |counter: Arc<AtomicUsize>| {
            move || async move { Ok::<usize, ScrapeError>(counter.fetch_add(1, Ordering::SeqCst)) }
        };

        assert_eq!(cache.get_or_set("ttl", ttl, producer(counter.clone())).await.unwrap(), 0);

        tokio::time::advance(ttl - Duration::from_millis(1)).await;
        assert_eq!(cache.get_or_set("ttl", ttl, producer(counter.clone())).await.unwrap(), 0);

        tokio::time::advance(Duration::from_millis(2)).await;
        assert_eq!(cache.get_or_set("ttl", ttl, producer(counter.clone())).await.unwrap(), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_distinct_keys_are_independent() {
        let cache = CacheStore::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let ttl = Duration::from_secs(60);

        let (a, b) = tokio::join!(
            cache.get_or_set("a", ttl, counting_producer(&counter, 1)),
            cache.get_or_set("b", ttl, counting_producer(&counter, 2)),
        );

        assert_eq!((a.unwrap(), b.unwrap()), (1, 2));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_type_mismatch_produces_again() {
        let cache = CacheStore::new();
        let ttl = Duration::from_secs(60);

        cache.get_or_set("k", ttl, || async { Ok::<u32, ScrapeError>(1) }).await.unwrap();
        let text = cache
            .get_or_set("k", ttl, || async { Ok::<String, ScrapeError>("one".to_string()) })
            .await
            .unwrap();

        assert_eq!(text, "one");
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_clear_and_stats() {
        let cache = CacheStore::new();
        let ttl = Duration::from_secs(5);

        for key in ["a", "b", "c"] {
            cache.get_or_set(key, ttl, || async { Ok::<u8, ScrapeError>(1) }).await.unwrap();
        }

        assert!(cache.invalidate("a").await);
        assert!(!cache.invalidate("a").await);

        tokio::time::advance(Duration::from_secs(6)).await;
        cache
            .get_or_set("d", ttl, || async { Ok::<u8, ScrapeError>(1) })
            .await
            .unwrap();

        let stats = cache.stats().await;
        assert_eq!(stats.total_entries, 3);
        assert_eq!(stats.live_entries, 1);
        assert_eq!(stats.expired_entries, 2);
        assert_eq!(stats.in_flight, 0);

        assert_eq!(cache.clear().await, 3);
        assert!(cache.is_empty().await);
    }
}
