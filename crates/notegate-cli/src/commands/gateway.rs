//! Gateway command - start and probe the gateway server.

use std::sync::Arc;

use anyhow::{Context, Result};
use notegate_core::config::{BindMode, Config};
use notegate_gateway::{CounterStore, GatewayBuilder, MemoryCounterStore};

use crate::ui;

/// Gateway command arguments.
#[derive(Debug, Clone)]
pub struct GatewayArgs {
    /// Subcommand.
    pub action: GatewayAction,
}

/// Gateway actions.
#[derive(Debug, Clone)]
pub enum GatewayAction {
    /// Serve until interrupted.
    Run {
        /// Port to listen on.
        port: Option<u16>,
        /// Bind address.
        bind: Option<String>,
        /// Use the in-process counter store.
        memory_store: bool,
    },
    /// Probe a running gateway.
    Status,
}

/// Run the gateway command.
pub async fn run_gateway(args: GatewayArgs) -> Result<()> {
    match args.action {
        GatewayAction::Run {
            port,
            bind,
            memory_store,
        } => run_gateway_server(port, bind, memory_store).await,
        GatewayAction::Status => gateway_status().await,
    }
}

/// Parse a `--bind` value.
pub fn parse_bind(value: &str) -> BindMode {
    match value {
        "local" | "loopback" => BindMode::Local,
        "public" | "lan" => BindMode::Public,
        addr => BindMode::Custom(addr.to_string()),
    }
}

async fn run_gateway_server(
    port: Option<u16>,
    bind: Option<String>,
    memory_store: bool,
) -> Result<()> {
    let mut config = Config::load_default().context("Failed to load configuration")?;
    if let Some(port) = port {
        config.gateway.port = port;
    }
    if let Some(bind) = bind {
        config.gateway.mode = parse_bind(&bind);
    }

    let store: Arc<dyn CounterStore> = if memory_store {
        ui::warning("Using in-memory counters; budgets reset on restart");
        Arc::new(MemoryCounterStore::new())
    } else {
        notegate_gateway::connect_store(&config)
            .await
            .context("Counter store unavailable")?
    };

    ui::header("Starting Notegate Gateway");
    ui::kv(
        "Address",
        &format!("{}:{}", config.gateway.bind_address(), config.gateway.port),
    );
    ui::kv("Store", store.name());
    ui::kv("Client limit", &config.limits.client_daily.to_string());
    ui::kv("Global limit", &config.limits.global_daily.to_string());
    println!();

    let gateway = GatewayBuilder::new()
        .with_config(config)
        .with_store(store)
        .build()?;

    ui::info("Press Ctrl+C to stop");
    gateway.run(shutdown_signal()).await?;
    ui::success("Gateway stopped");

    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

/// Check gateway status.
async fn gateway_status() -> Result<()> {
    ui::header("Gateway Status");

    let port = Config::load_default().map_or(8080, |c| c.gateway.port);
    let url = format!("http://127.0.0.1:{port}/health");

    let client = reqwest::Client::new();
    match client
        .get(&url)
        .timeout(std::time::Duration::from_secs(2))
        .send()
        .await
    {
        Ok(resp) if resp.status().is_success() => {
            ui::success(&format!("Gateway is running on port {port}"));
            if let Ok(body) = resp.json::<serde_json::Value>().await {
                if let Some(status) = body.get("status").and_then(|v| v.as_str()) {
                    ui::kv("Status", status);
                }
            }
        }
        Ok(resp) => {
            ui::warning(&format!("Gateway returned status {}", resp.status()));
        }
        Err(_) => {
            ui::warning(&format!("Gateway is not running on port {port}"));
            ui::info("Start with: notegate gateway run");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bind() {
        assert!(matches!(parse_bind("local"), BindMode::Local));
        assert!(matches!(parse_bind("public"), BindMode::Public));
        assert!(matches!(parse_bind("10.1.2.3"), BindMode::Custom(ref a) if a == "10.1.2.3"));
    }
}
