//! Upstream response classification.

use bytes::Bytes;
use serde::Deserialize;

use crate::traits::{ProviderError, UpstreamReply};

/// Status token the provider uses for a temporary outage.
const UNAVAILABLE_STATUS: &str = "UNAVAILABLE";
/// Code the provider uses for a temporary outage.
const UNAVAILABLE_CODE: i64 = 503;

/// Result of an upstream round trip, as seen by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamOutcome {
    /// Status 200; body is forwarded verbatim.
    Success(Bytes),
    /// The provider reported a 503 `UNAVAILABLE` envelope.
    ProviderUnavailable,
    /// Any other non-200 reply; status and body are passed through.
    UpstreamError {
        /// Upstream status code.
        status: u16,
        /// Upstream body, untouched.
        body: Bytes,
    },
    /// No status was received (connection refused, timeout, DNS).
    TransportFailure,
}

impl UpstreamOutcome {
    /// Fold a finished upstream call into an outcome.
    ///
    /// A reply is classified by status and body. A network error means no
    /// status arrived and becomes [`UpstreamOutcome::TransportFailure`].
    ///
    /// # Errors
    ///
    /// Returns the error unchanged when the request was never sent
    /// (missing key, payload encoding) or its body could not be read.
    pub fn from_call(result: Result<UpstreamReply, ProviderError>) -> Result<Self, ProviderError> {
        match result {
            Ok(reply) => Ok(reply.into()),
            Err(ProviderError::Network(_)) => Ok(Self::TransportFailure),
            Err(e) => Err(e),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    status: String,
}

/// Classify an upstream status and body.
#[must_use]
pub fn classify(status: u16, body: Bytes) -> UpstreamOutcome {
    if status == 200 {
        return UpstreamOutcome::Success(body);
    }

    if let Ok(envelope) = serde_json::from_slice::<ErrorEnvelope>(&body) {
        if envelope.error.code == UNAVAILABLE_CODE && envelope.error.status == UNAVAILABLE_STATUS {
            return UpstreamOutcome::ProviderUnavailable;
        }
    }

    UpstreamOutcome::UpstreamError { status, body }
}

impl From<UpstreamReply> for UpstreamOutcome {
    fn from(reply: UpstreamReply) -> Self {
        classify(reply.status, reply.body)
    }
}
