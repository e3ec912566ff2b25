//! Gateway server.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    routing::{any, get},
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use notegate_core::config::Config;
use notegate_core::types::HealthResponse;
use notegate_providers::{GeminiArmyProvider, Upstream};

use crate::GatewayError;
use crate::extraction::extraction_handler;
use crate::quota::{QuotaGate, QuotaLedger, QuotaPolicy};
use crate::store::CounterStore;

/// Extraction endpoint path.
pub const EXTRACTION_PATH: &str = "/ai-extraction";
/// Extraction endpoint path under the `/api` prefix used by serverless hosts.
pub const API_EXTRACTION_PATH: &str = "/api/ai-extraction";
/// Health endpoint path.
pub const HEALTH_PATH: &str = "/health";

/// Gateway server state shared across handlers.
pub struct GatewayState {
    /// Budget parameters.
    pub policy: Arc<QuotaPolicy>,
    /// Admission check.
    pub gate: QuotaGate,
    /// Post-success counter commit.
    pub ledger: QuotaLedger,
    /// Upstream generative service.
    pub upstream: Arc<dyn Upstream>,
    /// Counter store handle, closed on shutdown.
    pub store: Arc<dyn CounterStore>,
    /// Maximum accepted request body size.
    pub max_body_bytes: usize,
}

/// Gateway server.
pub struct Gateway {
    config: Config,
    state: Arc<GatewayState>,
}

/// Builder for constructing a Gateway with its dependencies.
pub struct GatewayBuilder {
    config: Config,
    store: Option<Arc<dyn CounterStore>>,
    upstream: Option<Arc<dyn Upstream>>,
}

impl GatewayBuilder {
    /// Create a new builder with default config.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            store: None,
            upstream: None,
        }
    }

    /// Set configuration.
    #[must_use]
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Set the counter store.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn CounterStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the upstream. Defaults to the HTTP client built from config.
    #[must_use]
    pub fn with_upstream(mut self, upstream: Arc<dyn Upstream>) -> Self {
        self.upstream = Some(upstream);
        self
    }

    /// Build the gateway.
    ///
    /// # Errors
    ///
    /// Returns error if the store is missing, the configuration is invalid,
    /// or the upstream client cannot be built.
    pub fn build(self) -> Result<Gateway, GatewayError> {
        self.config
            .validate()
            .map_err(|e| GatewayError::Config(e.to_string()))?;

        let store = self
            .store
            .ok_or_else(|| GatewayError::Config("Counter store is required".to_string()))?;

        let upstream: Arc<dyn Upstream> = match self.upstream {
            Some(upstream) => upstream,
            None => {
                let provider = GeminiArmyProvider::from_config(&self.config.upstream)?;
                if !provider.has_access_key() {
                    tracing::warn!(
                        "ARMY_ACCESS_KEY not set; extraction requests will fail with a configuration error"
                    );
                }
                Arc::new(provider)
            }
        };

        let policy = Arc::new(QuotaPolicy::from_config(
            &self.config.limits,
            &self.config.store,
        ));

        let state = GatewayState {
            gate: QuotaGate::new(store.clone(), policy.clone()),
            ledger: QuotaLedger::new(store.clone(), policy.clone()),
            policy,
            upstream,
            store,
            max_body_bytes: self.config.gateway.max_body_bytes,
        };

        Ok(Gateway {
            config: self.config,
            state: Arc::new(state),
        })
    }
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Gateway {
    /// Shared state.
    #[must_use]
    pub fn state(&self) -> &Arc<GatewayState> {
        &self.state
    }

    /// Address the server binds to.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!(
            "{}:{}",
            self.config.gateway.bind_address(),
            self.config.gateway.port
        )
    }

    /// Build the HTTP router.
    ///
    /// Extraction routes accept every method so non-POST requests get the
    /// JSON 405 body.
    pub fn router(&self) -> Router {
        Router::new()
            .route(HEALTH_PATH, get(health_handler))
            .route(EXTRACTION_PATH, any(extraction_handler))
            .route(API_EXTRACTION_PATH, any(extraction_handler))
            .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
            .with_state(self.state.clone())
    }

    /// Bind the configured address and serve until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns error if the address is invalid or cannot be bound.
    pub async fn run<F>(&self, shutdown: F) -> Result<(), GatewayError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr: SocketAddr = self
            .bind_address()
            .parse()
            .map_err(|e| GatewayError::Config(format!("Invalid address: {e}")))?;

        let listener = TcpListener::bind(addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already-bound listener until `shutdown` resolves, then
    /// close the counter store.
    ///
    /// # Errors
    ///
    /// Returns error if the server fails.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<(), GatewayError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(
            client_limit = self.state.policy.client_limit,
            global_limit = self.state.policy.global_limit,
            store = self.state.store.name(),
            upstream = self.state.upstream.name(),
            "Gateway listening on http://{}",
            addr
        );

        let app = self.router();
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| GatewayError::Server(e.to_string()))?;

        tracing::info!("Gateway shutting down");
        if let Err(e) = self.state.store.close().await {
            tracing::warn!("Failed to close counter store: {}", e);
        }
        Ok(())
    }
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
