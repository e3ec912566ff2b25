//! Upstream traits.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Upstream errors.
///
/// These cover failures that happen before a usable HTTP status is
/// available. Non-200 statuses are not errors at this layer; they are
/// classified by [`crate::classify`].
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Network error before a status was received (refused, timeout, DNS).
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    /// The status arrived but the body could not be read.
    #[error("Failed to read response body: {0}")]
    ResponseBody(#[source] reqwest::Error),

    /// Serialization error building the outgoing request.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration (for example a missing access key).
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl ProviderError {
    /// Whether the request timed out.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Network(e) | Self::ResponseBody(e) => e.is_timeout(),
            _ => false,
        }
    }
}

/// Raw upstream reply: status code and body bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamReply {
    /// HTTP status code.
    pub status: u16,
    /// Response body, untouched.
    pub body: Bytes,
}

impl UpstreamReply {
    /// Create a new reply.
    #[must_use]
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Upstream generative-AI service.
///
/// One call to [`Upstream::generate`] is exactly one HTTP round trip; no
/// implementation retries internally.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Upstream name, used in logs.
    fn name(&self) -> &str;

    /// Send a prompt and return the raw reply.
    async fn generate(&self, prompt: &str) -> Result<UpstreamReply, ProviderError>;
}
