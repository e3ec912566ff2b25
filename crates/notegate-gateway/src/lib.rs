//! # Notegate Gateway
//!
//! HTTP gateway in front of the extraction upstream, with per-client and
//! global daily budgets kept in a shared counter store.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// `/ai-extraction` handler, quota headers and error responses.
pub mod extraction;
/// Client identity resolution.
pub mod identity;
/// Daily budget gate and ledger.
pub mod quota;
mod server;
/// Counter stores.
pub mod store;

use std::future::Future;
use std::sync::Arc;

use notegate_core::config::Config;
use notegate_providers::ProviderError;

pub use extraction::{ExtractionError, QuotaHeaders};
pub use identity::client_identity;
pub use quota::{Decision, QuotaGate, QuotaLedger, QuotaPolicy, Scope};
pub use server::{Gateway, GatewayBuilder, GatewayState};
pub use store::{CounterStore, MemoryCounterStore, RedisCounterStore, StoreError};

/// Connect to the Redis store named by the configuration.
///
/// # Errors
///
/// Returns error if `REDIS_URL` is missing or the server is unreachable.
pub async fn connect_store(config: &Config) -> Result<Arc<dyn CounterStore>, GatewayError> {
    let url = config
        .require_store_url()
        .map_err(|e| GatewayError::Config(e.to_string()))?;
    let store = RedisCounterStore::connect(url).await?;
    Ok(Arc::new(store))
}

/// Start the gateway server against Redis and serve until `shutdown`.
///
/// # Errors
///
/// Returns error if the store is unreachable or the server fails to start.
pub async fn start<F>(config: Config, shutdown: F) -> Result<(), GatewayError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let store = connect_store(&config).await?;
    let gateway = GatewayBuilder::new()
        .with_config(config)
        .with_store(store)
        .build()?;
    gateway.run(shutdown).await
}

/// Gateway errors.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Server error.
    #[error("Server error: {0}")]
    Server(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Counter store error.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Upstream client error.
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_store_requires_url() {
        let err = connect_store(&Config::default()).await.err().unwrap();
        assert!(err.to_string().contains("REDIS_URL"));
    }

    #[tokio::test]
    async fn test_connect_store_rejects_bad_url() {
        let mut config = Config::default();
        config.store.url = Some("not-a-redis-url".to_string());
        let err = connect_store(&config).await.err().unwrap();
        assert!(matches!(err, GatewayError::Store(StoreError::Connection(_))));
    }
}
