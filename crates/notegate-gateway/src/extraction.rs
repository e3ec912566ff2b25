//! `/ai-extraction` request handling.
//!
//! Order of operations: method check, identity, admission, body
//! validation, prompt, upstream call, classification, counter commit,
//! response. Counters only move after the upstream call succeeded.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json,
    body::{Body, Bytes},
    extract::{ConnectInfo, Request, State},
    http::{HeaderName, HeaderValue, Method, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, IntoResponseParts, Response, ResponseParts},
};
use thiserror::Error;

use notegate_core::config::CommitPolicy;
use notegate_core::prompt::extraction_prompt;
use notegate_core::types::{ErrorResponse, ProviderUnavailableResponse};
use notegate_core::validation::{ValidationError, parse_extraction_request};
use notegate_providers::{ProviderError, UpstreamOutcome};

use crate::identity::client_identity;
use crate::quota::{Decision, QuotaPolicy, Scope};
use crate::server::GatewayState;
use crate::store::StoreError;

/// Per-client daily limit header.
pub const CLIENT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-client-limit");
/// Per-client remaining requests header.
pub const CLIENT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-client-remaining");
/// Global daily limit header.
pub const GLOBAL_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-global-limit");
/// Global remaining requests header (successful responses only).
pub const GLOBAL_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-global-remaining");

const APPLICATION_JSON: &str = "application/json";

/// Quota headers attached to every extraction response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaHeaders {
    client_limit: i64,
    client_remaining: Option<i64>,
    global_limit: i64,
    global_remaining: Option<i64>,
}

impl QuotaHeaders {
    const fn limits(policy: &QuotaPolicy) -> Self {
        Self {
            client_limit: policy.client_limit,
            client_remaining: None,
            global_limit: policy.global_limit,
            global_remaining: None,
        }
    }

    /// Headers for a request turned away before the counters were read.
    /// Nothing was looked up or charged, so the full limit is reported.
    #[must_use]
    pub const fn unread(policy: &QuotaPolicy) -> Self {
        Self {
            client_remaining: Some(policy.client_limit),
            ..Self::limits(policy)
        }
    }

    /// Headers for a rejected request, including one whose counters could
    /// not be read.
    #[must_use]
    pub const fn rejected(policy: &QuotaPolicy) -> Self {
        Self {
            client_remaining: Some(0),
            ..Self::limits(policy)
        }
    }

    /// Headers for an admitted request that did not consume budget.
    #[must_use]
    pub fn uncharged(policy: &QuotaPolicy, decision: &Decision) -> Self {
        Self {
            client_remaining: Some(remaining(policy.client_limit, decision.client_count)),
            ..Self::limits(policy)
        }
    }

    /// Headers for a successful request, counting the request itself.
    #[must_use]
    pub fn charged(policy: &QuotaPolicy, decision: &Decision) -> Self {
        Self {
            client_limit: policy.client_limit,
            client_remaining: Some(remaining(policy.client_limit, decision.client_count + 1)),
            global_limit: policy.global_limit,
            global_remaining: Some(remaining(policy.global_limit, decision.global_count + 1)),
        }
    }
}

fn remaining(limit: i64, used: i64) -> i64 {
    (limit - used).max(0)
}

impl IntoResponseParts for QuotaHeaders {
    type Error = Infallible;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        let headers = res.headers_mut();
        headers.insert(CLIENT_LIMIT, HeaderValue::from(self.client_limit));
        if let Some(n) = self.client_remaining {
            headers.insert(CLIENT_REMAINING, HeaderValue::from(n));
        }
        headers.insert(GLOBAL_LIMIT, HeaderValue::from(self.global_limit));
        if let Some(n) = self.global_remaining {
            headers.insert(GLOBAL_REMAINING, HeaderValue::from(n));
        }
        Ok(res)
    }
}

/// Extraction failures, each mapped to a fixed client-facing response.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// Anything other than POST.
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// A daily budget is spent.
    #[error("{scope} rate limit exceeded (limit {limit})")]
    RateLimited {
        /// Breached scope.
        scope: Scope,
        /// Limit of that scope.
        limit: i64,
    },

    /// Body failed to decode or validate.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Counter store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Upstream call could not be made or completed.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The provider reported a temporary outage.
    #[error("AI provider unavailable")]
    ProviderUnavailable,

    /// No reply status was received from the upstream.
    #[error("Upstream transport failure")]
    Transport,

    /// Non-success upstream reply, forwarded as-is.
    #[error("Upstream returned status {status}")]
    Upstream {
        /// Upstream status code.
        status: u16,
        /// Upstream body.
        body: Bytes,
    },
}

impl ExtractionError {
    /// Response status.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Provider(ProviderError::Network(_)) | Self::Transport => StatusCode::BAD_GATEWAY,
            Self::Provider(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ProviderUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
        }
    }

    /// Message placed in the `error` field of the response body.
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            Self::MethodNotAllowed => "Method not allowed".to_string(),
            Self::RateLimited {
                scope: Scope::Client,
                limit,
            } => format!("Client rate limit exceeded. Maximum {limit} requests per day."),
            Self::RateLimited {
                scope: Scope::Global,
                ..
            } => "Global rate limit exceeded. Please try again later.".to_string(),
            Self::Validation(e) => e.to_string(),
            Self::Store(_) => "Internal server error".to_string(),
            Self::Provider(ProviderError::Config(_)) => "Server configuration error".to_string(),
            Self::Provider(ProviderError::Serialization(_)) => {
                "Failed to create request".to_string()
            }
            Self::Provider(ProviderError::Network(_)) | Self::Transport => {
                "Failed to call AI service".to_string()
            }
            Self::Provider(ProviderError::ResponseBody(_)) => {
                "Failed to read AI response".to_string()
            }
            Self::ProviderUnavailable => ProviderUnavailableResponse::default().message,
            Self::Upstream { body, .. } => String::from_utf8_lossy(body).into_owned(),
        }
    }
}

impl IntoResponse for ExtractionError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            Self::ProviderUnavailable => {
                (status, Json(ProviderUnavailableResponse::default())).into_response()
            }
            Self::Upstream { body, .. } => {
                (status, [(CONTENT_TYPE, APPLICATION_JSON)], Body::from(body)).into_response()
            }
            other => (status, Json(ErrorResponse::new(other.client_message()))).into_response(),
        }
    }
}

/// Handle one extraction request.
pub async fn extraction_handler(
    State(state): State<Arc<GatewayState>>,
    request: Request,
) -> Response {
    let policy = state.policy.clone();

    if request.method() != Method::POST {
        tracing::debug!(method = %request.method(), "Rejected non-POST extraction request");
        return (QuotaHeaders::unread(&policy), ExtractionError::MethodNotAllowed).into_response();
    }

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| "unknown".to_string(), |ConnectInfo(addr)| addr.to_string());
    let identity = client_identity(request.headers(), &peer);

    let decision = match state.gate.check(&identity).await {
        Ok(decision) => decision,
        Err(e) => {
            tracing::error!(identity = %identity, error = %e, "Rate limit check failed");
            return (QuotaHeaders::rejected(&policy), ExtractionError::Store(e)).into_response();
        }
    };

    if let Some(scope) = decision.breached {
        tracing::info!(
            identity = %identity,
            scope = %scope,
            client_count = decision.client_count,
            global_count = decision.global_count,
            "Rate limit exceeded"
        );
        let err = ExtractionError::RateLimited {
            scope,
            limit: policy.limit(scope),
        };
        return (QuotaHeaders::rejected(&policy), err).into_response();
    }

    match run_admitted(&state, &identity, request).await {
        Ok(body) => {
            let headers = QuotaHeaders::charged(&policy, &decision);
            (
                StatusCode::OK,
                headers,
                [(CONTENT_TYPE, APPLICATION_JSON)],
                Body::from(body),
            )
                .into_response()
        }
        Err(err) => (QuotaHeaders::uncharged(&policy, &decision), err).into_response(),
    }
}

/// Steps after admission. Returns the upstream body to forward.
async fn run_admitted(
    state: &GatewayState,
    identity: &str,
    request: Request,
) -> Result<Bytes, ExtractionError> {
    let raw = axum::body::to_bytes(request.into_body(), state.max_body_bytes)
        .await
        .map_err(|e| ValidationError::Unreadable(e.to_string()))?;

    let extraction = parse_extraction_request(&raw).inspect_err(|e| {
        tracing::debug!(identity = %identity, error = %e, "Invalid extraction request");
    })?;

    let prompt = extraction_prompt(
        &extraction.existing_tags,
        &extraction.existing_projects,
        &extraction.content,
    );

    let result = state.upstream.generate(&prompt).await.inspect_err(|e| {
        tracing::error!(
            identity = %identity,
            upstream = state.upstream.name(),
            error = %e,
            timeout = e.is_timeout(),
            "Upstream call failed"
        );
    });

    match UpstreamOutcome::from_call(result)? {
        UpstreamOutcome::Success(body) => {
            commit(state, identity).await?;
            Ok(body)
        }
        UpstreamOutcome::ProviderUnavailable => {
            tracing::warn!(identity = %identity, "AI provider unavailable");
            Err(ExtractionError::ProviderUnavailable)
        }
        UpstreamOutcome::UpstreamError { status, body } => {
            tracing::warn!(identity = %identity, status, "Upstream returned an error");
            Err(ExtractionError::Upstream { status, body })
        }
        UpstreamOutcome::TransportFailure => Err(ExtractionError::Transport),
    }
}

async fn commit(state: &GatewayState, identity: &str) -> Result<(), ExtractionError> {
    match state.ledger.commit(identity).await {
        Ok(counts) => {
            tracing::debug!(
                identity = %identity,
                client_count = counts.client,
                global_count = counts.global,
                "Rate limit counters incremented"
            );
            Ok(())
        }
        Err(e) => match state.policy.commit_policy {
            CommitPolicy::FailOpen => {
                tracing::warn!(identity = %identity, error = %e, "Failed to increment rate limit counters");
                Ok(())
            }
            CommitPolicy::FailClosed => {
                tracing::error!(identity = %identity, error = %e, "Failed to increment rate limit counters");
                Err(ExtractionError::Store(e))
            }
        },
    }
}
