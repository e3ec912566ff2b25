//! Wire types shared by the gateway and the upstream client.

use serde::{Deserialize, Deserializer, Serialize};

/// Body of an inbound extraction request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionRequest {
    /// Note content to extract cards from. Must be non-empty.
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: String,

    /// Tags the caller already uses, in display order.
    #[serde(default, deserialize_with = "null_as_default")]
    pub existing_tags: Vec<String>,

    /// Projects the caller already uses, in display order.
    #[serde(default, deserialize_with = "null_as_default")]
    pub existing_projects: Vec<String>,
}

/// Explicit `null` behaves like an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Request body sent to the upstream `/generate` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// Fully rendered prompt.
    pub prompt: String,
}

/// Token usage reported by the upstream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageMetadata {
    /// Tokens in the prompt.
    #[serde(default)]
    pub prompt_token_count: u64,
    /// Tokens in the generated candidates.
    #[serde(default)]
    pub candidates_token_count: u64,
    /// Total tokens billed.
    #[serde(default)]
    pub total_token_count: u64,
}

/// Successful upstream payload.
///
/// The gateway forwards the upstream body verbatim; this type exists for
/// callers that want to decode it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateResponse {
    /// Generated text (JSON encoded cards).
    pub text: String,
    /// Model that produced the text.
    pub model: String,
    /// Token usage, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_metadata: Option<UsageMetadata>,
    /// Finish reason, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// Generic error body: `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable message.
    pub error: String,
}

impl ErrorResponse {
    /// Create a new error body.
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Status token carried by [`ProviderUnavailableResponse`].
pub const PROVIDER_UNAVAILABLE_STATUS: &str = "provider_unavailable";

/// Message returned when the upstream provider reports itself unavailable.
pub const PROVIDER_UNAVAILABLE_MESSAGE: &str =
    "Our AI provider upstream is currently unavailable. Please try again in a couple minutes.";

/// Normalized body for the provider-unavailable case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderUnavailableResponse {
    /// Human-readable message.
    pub message: String,
    /// Always [`PROVIDER_UNAVAILABLE_STATUS`].
    pub status: String,
}

impl Default for ProviderUnavailableResponse {
    fn default() -> Self {
        Self {
            message: PROVIDER_UNAVAILABLE_MESSAGE.to_string(),
            status: PROVIDER_UNAVAILABLE_STATUS.to_string(),
        }
    }
}

/// Health check body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `healthy` when the process is serving.
    pub status: String,
}

impl HealthResponse {
    /// Healthy status.
    #[must_use]
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
        }
    }
}
