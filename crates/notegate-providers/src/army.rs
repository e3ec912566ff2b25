//! Gemini Army HTTP upstream.
//!
//! Accepts `POST <base>/generate` with `{"prompt": "..."}` and an
//! `Authorization` header carrying the raw access key.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};

use crate::traits::{ProviderError, Upstream, UpstreamReply};
use notegate_core::config::UpstreamConfig;
use notegate_core::secrets::{ApiKey, scrub_secret};
use notegate_core::types::GenerateRequest;

const DEFAULT_BASE_URL: &str = "https://gemini-army.vercel.app";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Gemini Army upstream client.
pub struct GeminiArmyProvider {
    client: Client,
    api_key: Option<ApiKey>,
    base_url: String,
}

impl GeminiArmyProvider {
    /// Create a provider with the default base URL and timeout.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::Config` if the HTTP client cannot be built.
    pub fn new(api_key: Option<ApiKey>) -> Result<Self, ProviderError> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL, DEFAULT_TIMEOUT)
    }

    /// Create with custom base URL and timeout.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::Config` if the HTTP client cannot be built.
    pub fn with_base_url(
        api_key: Option<ApiKey>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Create from upstream configuration.
    ///
    /// A missing access key is not an error here; it is reported on the
    /// first request so the process can still serve health checks.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::Config` if the HTTP client cannot be built.
    pub fn from_config(config: &UpstreamConfig) -> Result<Self, ProviderError> {
        Self::with_base_url(config.api_key(), &config.base_url, config.timeout())
    }

    /// Whether an access key is configured.
    #[must_use]
    pub fn has_access_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Full URL of the generate endpoint.
    #[must_use]
    pub fn generate_url(&self) -> String {
        format!("{}/generate", self.base_url)
    }
}

#[async_trait]
impl Upstream for GeminiArmyProvider {
    fn name(&self) -> &str {
        "gemini-army"
    }

    async fn generate(&self, prompt: &str) -> Result<UpstreamReply, ProviderError> {
        let payload = serde_json::to_vec(&GenerateRequest {
            prompt: prompt.to_string(),
        })?;

        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| ProviderError::Config("ARMY_ACCESS_KEY not set".to_string()))?;

        let response = self
            .client
            .post(self.generate_url())
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, api_key.expose())
            .body(payload)
            .send()
            .await
            .map_err(ProviderError::Network)?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(ProviderError::ResponseBody)?;

        if status == 200 {
            tracing::debug!(status, bytes = body.len(), "Upstream replied");
        } else {
            tracing::debug!(
                status,
                body = %scrub_secret(&String::from_utf8_lossy(&body), api_key),
                "Upstream replied with error"
            );
        }
        Ok(UpstreamReply { status, body })
    }
}
