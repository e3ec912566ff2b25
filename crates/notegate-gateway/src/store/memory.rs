//! In-process counter store.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::{CounterStore, StoreError};

struct Entry {
    value: i64,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// How often writes sweep out expired counters.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Default)]
struct Counters {
    entries: HashMap<String, Entry>,
    next_sweep: Option<Instant>,
}

impl Counters {
    /// Drop expired entries once per sweep interval. Keys carry the day, so
    /// old ones are never read again and would otherwise pile up.
    fn maybe_sweep(&mut self, now: Instant, interval: Duration) {
        if self.next_sweep.is_some_and(|at| now < at) {
            return;
        }
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        let swept = before - self.entries.len();
        if swept > 0 {
            tracing::debug!(swept, remaining = self.entries.len(), "Swept expired counters");
        }
        self.next_sweep = Some(now + interval);
    }
}

/// Counter store held in process memory.
///
/// Counters vanish on restart and are not shared between replicas; meant
/// for local runs and tests.
pub struct MemoryCounterStore {
    counters: Mutex<Counters>,
    sweep_interval: Duration,
    closed: AtomicBool,
}

impl Default for MemoryCounterStore {
    fn default() -> Self {
        Self::with_sweep_interval(SWEEP_INTERVAL)
    }
}

impl MemoryCounterStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store that sweeps expired counters every `interval`.
    #[must_use]
    pub fn with_sweep_interval(interval: Duration) -> Self {
        Self {
            counters: Mutex::new(Counters::default()),
            sweep_interval: interval,
            closed: AtomicBool::new(false),
        }
    }

    /// Number of live counters.
    #[must_use]
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.counters
            .lock()
            .map(|c| c.entries.values().filter(|e| e.is_live(now)).count())
            .unwrap_or(0)
    }

    /// Whether no live counters exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries held, expired or not.
    #[cfg(test)]
    fn stored(&self) -> usize {
        self.counters.lock().map(|c| c.entries.len()).unwrap_or(0)
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Counters>, StoreError> {
        self.counters
            .lock()
            .map_err(|_| StoreError::Connection("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<i64>, StoreError> {
        self.ensure_open()?;
        let now = Instant::now();
        let mut counters = self.lock()?;

        match counters.entries.get(key) {
            Some(entry) if entry.is_live(now) => Ok(Some(entry.value)),
            Some(_) => {
                counters.entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn increment_with_expiry(
        &self,
        keys: &[String],
        ttl: Duration,
    ) -> Result<Vec<i64>, StoreError> {
        self.ensure_open()?;
        let now = Instant::now();
        let expires_at = now + ttl;
        let mut counters = self.lock()?;
        counters.maybe_sweep(now, self.sweep_interval);

        let counts = keys
            .iter()
            .map(|key| {
                let entry = counters.entries.entry(key.clone()).or_insert(Entry {
                    value: 0,
                    expires_at,
                });
                if !entry.is_live(now) {
                    entry.value = 0;
                }
                entry.value += 1;
                entry.expires_at = expires_at;
                entry.value
            })
            .collect();

        Ok(counts)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.ensure_open()
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(ToString::to_string).collect()
    }

    #[tokio::test]
    async fn test_missing_key_reads_none() {
        let store = MemoryCounterStore::new();
        assert_eq!(store.get("nope").await.unwrap(), None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_increment_batch() {
        let store = MemoryCounterStore::new();
        let batch = keys(&["a", "b"]);

        assert_eq!(
            store.increment_with_expiry(&batch, DAY).await.unwrap(),
            vec![1, 1]
        );
        assert_eq!(
            store.increment_with_expiry(&batch, DAY).await.unwrap(),
            vec![2, 2]
        );
        assert_eq!(store.get("a").await.unwrap(), Some(2));
        assert_eq!(store.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_resets_counter() {
        let store = MemoryCounterStore::new();
        let batch = keys(&["a"]);
        store.increment_with_expiry(&batch, DAY).await.unwrap();
        store.increment_with_expiry(&batch, DAY).await.unwrap();

        tokio::time::advance(DAY - Duration::from_secs(1)).await;
        assert_eq!(store.get("a").await.unwrap(), Some(2));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(store.get("a").await.unwrap(), None);
        assert_eq!(
            store.increment_with_expiry(&batch, DAY).await.unwrap(),
            vec![1]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_increment_refreshes_expiry() {
        let store = MemoryCounterStore::new();
        let batch = keys(&["a"]);
        store.increment_with_expiry(&batch, DAY).await.unwrap();

        tokio::time::advance(DAY / 2).await;
        store.increment_with_expiry(&batch, DAY).await.unwrap();

        tokio::time::advance(DAY * 3 / 4).await;
        assert_eq!(store.get("a").await.unwrap(), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_sweeps_expired_keys() {
        let store = MemoryCounterStore::new();
        let ttl = Duration::from_secs(60);
        for i in 0..100 {
            store
                .increment_with_expiry(&[format!("day1:{i}")], ttl)
                .await
                .unwrap();
        }
        assert_eq!(store.stored(), 100);

        tokio::time::advance(Duration::from_secs(120)).await;
        store
            .increment_with_expiry(&keys(&["day2:a"]), ttl)
            .await
            .unwrap();

        assert_eq!(store.stored(), 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_keeps_live_keys() {
        let store = MemoryCounterStore::with_sweep_interval(Duration::from_secs(10));
        store
            .increment_with_expiry(&keys(&["short"]), Duration::from_secs(5))
            .await
            .unwrap();
        store
            .increment_with_expiry(&keys(&["long"]), DAY)
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(11)).await;
        store
            .increment_with_expiry(&keys(&["long"]), DAY)
            .await
            .unwrap();

        assert_eq!(store.stored(), 1);
        assert_eq!(store.get("long").await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_closed_store_fails() {
        let store = MemoryCounterStore::new();
        store.close().await.unwrap();
        assert!(matches!(store.get("a").await, Err(StoreError::Closed)));
        assert!(matches!(store.ping().await, Err(StoreError::Closed)));
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_counted() {
        let store = std::sync::Arc::new(MemoryCounterStore::new());
        let mut handles = Vec::new();
        for _ in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .increment_with_expiry(&keys(&["c", "g"]), DAY)
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(store.get("c").await.unwrap(), Some(32));
        assert_eq!(store.get("g").await.unwrap(), Some(32));
    }
}
