//! Admission check.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::{Decision, QuotaPolicy, Scope, with_deadline};
use crate::store::{CounterStore, StoreError};

/// Reads today's counters and decides whether a request may proceed.
///
/// Never writes. A failed or malformed read is an error, never an
/// admission.
#[derive(Clone)]
pub struct QuotaGate {
    store: Arc<dyn CounterStore>,
    policy: Arc<QuotaPolicy>,
}

impl QuotaGate {
    /// Create a gate over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn CounterStore>, policy: Arc<QuotaPolicy>) -> Self {
        Self { store, policy }
    }

    /// Decide admission for `identity` on the current UTC day.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if either counter cannot be read.
    pub async fn check(&self, identity: &str) -> Result<Decision, StoreError> {
        self.check_at(identity, Utc::now()).await
    }

    /// Decide admission for `identity` on the day containing `now`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if either counter cannot be read.
    pub async fn check_at(
        &self,
        identity: &str,
        now: DateTime<Utc>,
    ) -> Result<Decision, StoreError> {
        let keys = self.policy.keys(identity, now);
        let deadline = self.policy.store_timeout;

        let client_count = with_deadline(deadline, self.store.get(&keys.client))
            .await?
            .unwrap_or(0);
        let global_count = with_deadline(deadline, self.store.get(&keys.global))
            .await?
            .unwrap_or(0);

        let breached = if client_count >= self.policy.client_limit {
            Some(Scope::Client)
        } else if global_count >= self.policy.global_limit {
            Some(Scope::Global)
        } else {
            None
        };

        Ok(Decision {
            admitted: breached.is_none(),
            client_count,
            global_count,
            breached,
        })
    }
}
