//! Counter store abstraction.
//!
//! The store owns counter durability and atomicity. The gateway reads
//! counters through [`crate::quota::QuotaGate`] and writes them through
//! [`crate::quota::QuotaLedger`]; nothing else touches the store.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

mod memory;
mod redis_store;

pub use self::memory::MemoryCounterStore;
pub use self::redis_store::RedisCounterStore;

/// Counter store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Could not connect to the store.
    #[error("Store connection error: {0}")]
    Connection(String),

    /// A command failed.
    #[error("Store command failed: {0}")]
    Command(#[from] redis::RedisError),

    /// A counter holds something that is not an integer.
    #[error("Malformed counter value for {key}: {value:?}")]
    Malformed {
        /// Counter key.
        key: String,
        /// Raw stored value.
        value: String,
    },

    /// The operation exceeded its deadline.
    #[error("Store operation timed out after {0:?}")]
    Timeout(Duration),

    /// The store handle was closed.
    #[error("Store is closed")]
    Closed,
}

/// Shared atomic counter store.
///
/// Implementations must be safe for concurrent use by many in-flight
/// requests through a single shared handle.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Store name, used in logs.
    fn name(&self) -> &str;

    /// Read an integer counter. A missing key is `Ok(None)`.
    async fn get(&self, key: &str) -> Result<Option<i64>, StoreError>;

    /// Increment every key by one and set its expiry to `ttl`, as one
    /// atomic batch. Returns the new counts in key order.
    async fn increment_with_expiry(
        &self,
        keys: &[String],
        ttl: Duration,
    ) -> Result<Vec<i64>, StoreError>;

    /// Connectivity check.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Release the underlying connection. Later calls fail with
    /// [`StoreError::Closed`].
    async fn close(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Parse a raw stored counter value.
pub(crate) fn parse_counter(key: &str, raw: &str) -> Result<i64, StoreError> {
    raw.trim().parse().map_err(|_| StoreError::Malformed {
        key: key.to_string(),
        value: raw.to_string(),
    })
}

#[cfg(test)]
pub(crate) mod testing {
    //! Store doubles for failure-path tests.

    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Store whose reads return fixed raw values and whose writes can fail.
    #[derive(Default)]
    pub struct ScriptedStore {
        pub raw: Mutex<HashMap<String, String>>,
        pub fail_reads: bool,
        pub fail_writes: bool,
        pub writes: AtomicUsize,
    }

    impl ScriptedStore {
        pub fn failing_reads() -> Self {
            Self {
                fail_reads: true,
                ..Self::default()
            }
        }

        pub fn failing_writes() -> Self {
            Self {
                fail_writes: true,
                ..Self::default()
            }
        }

        pub fn with_raw(key: &str, value: &str) -> Self {
            let store = Self::default();
            store
                .raw
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            store
        }

        pub fn write_count(&self) -> usize {
            self.writes.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CounterStore for ScriptedStore {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn get(&self, key: &str) -> Result<Option<i64>, StoreError> {
            if self.fail_reads {
                return Err(StoreError::Connection("connection refused".to_string()));
            }
            let raw = self.raw.lock().unwrap().get(key).cloned();
            raw.map(|v| parse_counter(key, &v)).transpose()
        }

        async fn increment_with_expiry(
            &self,
            keys: &[String],
            _ttl: Duration,
        ) -> Result<Vec<i64>, StoreError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            if self.fail_writes {
                return Err(StoreError::Connection("connection reset".to_string()));
            }
            Ok(vec![1; keys.len()])
        }

        async fn ping(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }
}
