//! Post-success counter commit.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::{QuotaPolicy, with_deadline};
use crate::store::{CounterStore, StoreError};

/// Counts after a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommittedCounts {
    /// Client counter after the increment.
    pub client: i64,
    /// Global counter after the increment.
    pub global: i64,
}

/// Charges a request against both daily budgets.
#[derive(Clone)]
pub struct QuotaLedger {
    store: Arc<dyn CounterStore>,
    policy: Arc<QuotaPolicy>,
}

impl QuotaLedger {
    /// Create a ledger over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn CounterStore>, policy: Arc<QuotaPolicy>) -> Self {
        Self { store, policy }
    }

    /// Increment both of today's counters and refresh their expiry.
    ///
    /// Call only after the upstream call succeeded. The day is taken at
    /// commit time.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the batch fails; neither counter moves.
    pub async fn commit(&self, identity: &str) -> Result<CommittedCounts, StoreError> {
        self.commit_at(identity, Utc::now()).await
    }

    /// Commit against the day containing `now`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the batch fails.
    pub async fn commit_at(
        &self,
        identity: &str,
        now: DateTime<Utc>,
    ) -> Result<CommittedCounts, StoreError> {
        let keys = self.policy.keys(identity, now);
        let batch = [keys.client.clone(), keys.global.clone()];

        let counts = with_deadline(
            self.policy.store_timeout,
            self.store.increment_with_expiry(&batch, self.policy.ttl),
        )
        .await?;

        match counts.as_slice() {
            [client, global] => Ok(CommittedCounts {
                client: *client,
                global: *global,
            }),
            _ => Err(StoreError::Malformed {
                key: keys.client,
                value: format!("{counts:?}"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quota::QuotaGate;
    use crate::store::MemoryCounterStore;
    use crate::store::testing::ScriptedStore;
    use chrono::TimeZone;

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_commit_increments_both() {
        let store = Arc::new(MemoryCounterStore::new());
        let policy = Arc::new(QuotaPolicy::default());
        let ledger = QuotaLedger::new(store.clone(), policy.clone());

        assert_eq!(
            ledger.commit_at("a", noon()).await.unwrap(),
            CommittedCounts { client: 1, global: 1 }
        );
        assert_eq!(
            ledger.commit_at("b", noon()).await.unwrap(),
            CommittedCounts { client: 1, global: 2 }
        );

        let keys = policy.keys("a", noon());
        assert_eq!(store.get(&keys.client).await.unwrap(), Some(1));
        assert_eq!(store.get(&keys.global).await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_limit_reached_after_commits() {
        let store: Arc<dyn CounterStore> = Arc::new(MemoryCounterStore::new());
        let policy = Arc::new(QuotaPolicy::default());
        let gate = QuotaGate::new(store.clone(), policy.clone());
        let ledger = QuotaLedger::new(store, policy);

        for _ in 0..5 {
            assert!(gate.check_at("a", noon()).await.unwrap().admitted);
            ledger.commit_at("a", noon()).await.unwrap();
        }
        assert!(!gate.check_at("a", noon()).await.unwrap().admitted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_counters_reset_after_expiry() {
        let store: Arc<dyn CounterStore> = Arc::new(MemoryCounterStore::new());
        let policy = Arc::new(QuotaPolicy::default());
        let gate = QuotaGate::new(store.clone(), policy.clone());
        let ledger = QuotaLedger::new(store, policy.clone());

        for _ in 0..5 {
            ledger.commit_at("a", noon()).await.unwrap();
        }
        assert!(!gate.check_at("a", noon()).await.unwrap().admitted);

        // Same day token, so only expiry can release the budget.
        tokio::time::advance(policy.ttl + std::time::Duration::from_secs(1)).await;
        let decision = gate.check_at("a", noon()).await.unwrap();
        assert!(decision.admitted);
        assert_eq!(decision.client_count, 0);
    }

    #[tokio::test]
    async fn test_commit_failure_is_error() {
        let store = Arc::new(ScriptedStore::failing_writes());
        let ledger = QuotaLedger::new(store.clone(), Arc::new(QuotaPolicy::default()));
        assert!(ledger.commit_at("a", noon()).await.is_err());
        assert_eq!(store.write_count(), 1);
    }
}
