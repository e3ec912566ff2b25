//! Redis-backed counter store.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tokio::sync::RwLock;

use super::{CounterStore, StoreError, parse_counter};

/// Counter store on a Redis server.
///
/// Holds a single multiplexed, auto-reconnecting connection that every
/// request clones; clones share the underlying socket.
pub struct RedisCounterStore {
    conn: RwLock<Option<ConnectionManager>>,
}

impl RedisCounterStore {
    /// Connect to Redis and verify the connection with `PING`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Connection` if the URL is invalid or the
    /// server cannot be reached.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)
            .map_err(|e| StoreError::Connection(format!("Failed to parse REDIS_URL: {e}")))?;

        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| StoreError::Connection(format!("Failed to connect to Redis: {e}")))?;

        let store = Self {
            conn: RwLock::new(Some(manager)),
        };
        store.ping().await?;

        tracing::info!("Connected to Redis successfully");
        Ok(store)
    }

    async fn connection(&self) -> Result<ConnectionManager, StoreError> {
        self.conn.read().await.clone().ok_or(StoreError::Closed)
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    fn name(&self) -> &str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<i64>, StoreError> {
        let mut conn = self.connection().await?;
        let raw: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        raw.map(|value| parse_counter(key, &value)).transpose()
    }

    async fn increment_with_expiry(
        &self,
        keys: &[String],
        ttl: Duration,
    ) -> Result<Vec<i64>, StoreError> {
        let mut conn = self.connection().await?;
        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);

        // MULTI/EXEC so no reader sees one counter bumped without the other.
        let mut pipe = redis::pipe();
        pipe.atomic();
        for key in keys {
            pipe.incr(key, 1).expire(key, ttl_secs).ignore();
        }

        let counts: Vec<i64> = pipe.query_async(&mut conn).await?;
        Ok(counts)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), StoreError> {
        if self.conn.write().await.take().is_some() {
            tracing::info!("Redis connection closed");
        }
        Ok(())
    }
}
