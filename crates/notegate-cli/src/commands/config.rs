//! Config inspection command.

use anyhow::Result;
use notegate_core::config::Config;

use crate::ui;

/// Config actions.
#[derive(Debug, Clone, Copy)]
pub enum ConfigAction {
    /// Print the effective configuration.
    Show,
    /// Load and validate.
    Validate,
    /// Print the config file path.
    Path,
}

/// Run the config command.
pub fn run_config(action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => show_config(),
        ConfigAction::Validate => validate_config(),
        ConfigAction::Path => {
            println!("{}", Config::default_path().display());
            Ok(())
        }
    }
}

/// Effective configuration with the access key masked.
fn redacted(config: &Config) -> Result<serde_json::Value> {
    let mut value = serde_json::to_value(config)?;
    if let Some(key) = value.pointer_mut("/upstream/accessKey") {
        if !key.is_null() {
            *key = serde_json::Value::String("[REDACTED]".to_string());
        }
    }
    Ok(value)
}

fn show_config() -> Result<()> {
    let path = Config::default_path();
    if !path.exists() {
        ui::info(&format!(
            "No config file at {}; showing defaults with environment overrides",
            path.display()
        ));
    }

    let config = Config::load_default()?;
    println!("{}", serde_json::to_string_pretty(&redacted(&config)?)?);
    Ok(())
}

fn validate_config() -> Result<()> {
    match Config::load_default() {
        Ok(config) => {
            ui::success("Configuration is valid");
            ui::kv("Port", &config.gateway.port.to_string());
            ui::kv("Client limit", &config.limits.client_daily.to_string());
            ui::kv("Global limit", &config.limits.global_daily.to_string());
            if config.require_store_url().is_err() {
                ui::warning("REDIS_URL not set; only --memory-store will start");
            }
            Ok(())
        }
        Err(e) => {
            ui::error(&format!("Invalid configuration: {e}"));
            anyhow::bail!("configuration validation failed")
        }
    }
}
