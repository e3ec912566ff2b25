//! Two-tier daily request budget.
//!
//! Counters are keyed by UTC day and live for the configured TTL after
//! their latest increment. [`QuotaGate`] decides admission from the
//! current counts; [`QuotaLedger`] charges a request once the upstream
//! call has succeeded. The pair is a soft limit: requests admitted
//! concurrently can overshoot by the number in flight.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};

use notegate_core::config::{CommitPolicy, LimitsConfig, StoreConfig};

use crate::store::StoreError;

mod gate;
mod ledger;

pub use gate::QuotaGate;
pub use ledger::{CommittedCounts, QuotaLedger};

/// Budget scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Per-client budget.
    Client,
    /// Budget shared by all clients.
    Global,
}

impl Scope {
    /// Scope name for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Global => "global",
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Admission decision for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// Whether the request may proceed.
    pub admitted: bool,
    /// Client counter at decision time.
    pub client_count: i64,
    /// Global counter at decision time.
    pub global_count: i64,
    /// Scope that caused the rejection. Client wins when both are spent.
    pub breached: Option<Scope>,
}

/// Budget parameters shared by the gate and the ledger.
#[derive(Debug, Clone)]
pub struct QuotaPolicy {
    /// Per-client daily limit.
    pub client_limit: i64,
    /// Global daily limit.
    pub global_limit: i64,
    /// Counter lifetime after each increment.
    pub ttl: Duration,
    /// Key prefix.
    pub key_prefix: String,
    /// Deadline for each store call.
    pub store_timeout: Duration,
    /// Behaviour when the commit fails.
    pub commit_policy: CommitPolicy,
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        Self::from_config(&LimitsConfig::default(), &StoreConfig::default())
    }
}

impl QuotaPolicy {
    /// Build from configuration.
    #[must_use]
    pub fn from_config(limits: &LimitsConfig, store: &StoreConfig) -> Self {
        Self {
            client_limit: limits.client_daily,
            global_limit: limits.global_daily,
            ttl: limits.ttl(),
            key_prefix: limits.key_prefix.clone(),
            store_timeout: store.timeout(),
            commit_policy: limits.commit_policy,
        }
    }

    /// Counter keys for `identity` on the day containing `now`.
    #[must_use]
    pub fn keys(&self, identity: &str, now: DateTime<Utc>) -> DailyKeys {
        let day = day_token(now);
        DailyKeys {
            client: format!("{}:client:{identity}:{day}", self.key_prefix),
            global: format!("{}:global:{day}", self.key_prefix),
        }
    }

    /// Limit for a scope.
    #[must_use]
    pub const fn limit(&self, scope: Scope) -> i64 {
        match scope {
            Scope::Client => self.client_limit,
            Scope::Global => self.global_limit,
        }
    }
}

/// Counter keys for one identity and day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyKeys {
    /// Per-client key.
    pub client: String,
    /// Global key.
    pub global: String,
}

/// UTC calendar day as `YYYY-MM-DD`.
#[must_use]
pub fn day_token(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%d").to_string()
}

/// Run a store call under the policy deadline.
async fn with_deadline<T, F>(deadline: Duration, call: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    tokio::time::timeout(deadline, call)
        .await
        .map_err(|_| StoreError::Timeout(deadline))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_day_token_is_utc_date() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 23, 59, 59).unwrap();
        assert_eq!(day_token(now), "2024-03-09");
    }

    #[test]
    fn test_keys() {
        let policy = QuotaPolicy::default();
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 8, 0, 0).unwrap();
        let keys = policy.keys("203.0.113.7", now);
        assert_eq!(keys.client, "ratelimit:client:203.0.113.7:2024-01-15");
        assert_eq!(keys.global, "ratelimit:global:2024-01-15");
    }

    #[test]
    fn test_default_policy() {
        let policy = QuotaPolicy::default();
        assert_eq!(policy.limit(Scope::Client), 5);
        assert_eq!(policy.limit(Scope::Global), 50);
        assert_eq!(policy.ttl, Duration::from_secs(24 * 3600));
        assert_eq!(policy.store_timeout, Duration::from_secs(5));
        assert_eq!(policy.commit_policy, CommitPolicy::FailOpen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_maps_to_timeout() {
        let result: Result<(), _> = with_deadline(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(StoreError::Timeout(_))));
    }
}
