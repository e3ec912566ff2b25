//! Doctor command - configuration and connectivity checks.

use anyhow::Result;
use notegate_core::config::Config;
use notegate_gateway::CounterStore;

use crate::ui::{self, HealthStatus};

/// Check result.
enum CheckResult {
    Ok(Option<String>),
    Warning(String),
    Error(String),
}

impl CheckResult {
    fn report(&self, name: &str) -> bool {
        match self {
            Self::Ok(detail) => {
                ui::health_check(name, HealthStatus::Ok, detail.as_deref());
                false
            }
            Self::Warning(msg) => {
                ui::health_check(name, HealthStatus::Warning, Some(msg));
                true
            }
            Self::Error(msg) => {
                ui::health_check(name, HealthStatus::Error, Some(msg));
                true
            }
        }
    }
}

/// Run all checks and print a summary.
pub async fn run_doctor() -> Result<()> {
    ui::header("Notegate Doctor");
    println!();

    let mut issues_found = 0;

    ui::info("Checking configuration...");
    let config = match Config::load_default() {
        Ok(config) => {
            CheckResult::Ok(Some(Config::default_path().display().to_string()))
                .report("Configuration");
            config
        }
        Err(e) => {
            CheckResult::Error(format!("Invalid config: {e}")).report("Configuration");
            ui::warning("Remaining checks skipped");
            return Ok(());
        }
    };

    ui::info("Checking upstream access key...");
    issues_found += usize::from(check_access_key(&config).report("Access key"));

    ui::info("Checking counter store...");
    issues_found += usize::from(check_store(&config).await.report("Counter store"));

    println!();
    ui::header("Summary");
    if issues_found == 0 {
        ui::success("All checks passed!");
    } else {
        ui::warning(&format!("{issues_found} issue(s) found"));
    }

    Ok(())
}

fn check_access_key(config: &Config) -> CheckResult {
    if config.upstream.api_key().is_some() {
        CheckResult::Ok(Some(config.upstream.base_url.clone()))
    } else {
        CheckResult::Warning("ARMY_ACCESS_KEY not set".to_string())
    }
}

async fn check_store(config: &Config) -> CheckResult {
    match notegate_gateway::connect_store(config).await {
        Ok(store) => {
            let _ = store.close().await;
            CheckResult::Ok(Some("reachable".to_string()))
        }
        Err(e) => CheckResult::Error(e.to_string()),
    }
}
