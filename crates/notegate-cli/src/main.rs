//! Notegate CLI - run and inspect the extraction gateway.

mod commands;
mod ui;

use clap::{Parser, Subcommand};
use notegate_core::config::{GlobalSettings, LogFormat};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "notegate")]
#[command(about = "Notegate - rate-limited AI extraction gateway")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Gateway operations
    Gateway {
        #[command(subcommand)]
        action: GatewayCommands,
    },

    /// Check configuration, counter store and upstream settings
    Doctor,

    /// Configuration inspection
    Config {
        #[command(subcommand)]
        action: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum GatewayCommands {
    /// Start the gateway server
    Run {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Bind address (local, public, or IP)
        #[arg(long)]
        bind: Option<String>,

        /// Keep counters in process memory instead of Redis
        #[arg(long)]
        memory_store: bool,
    },

    /// Check gateway status
    Status,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the effective configuration
    Show,

    /// Validate configuration
    Validate,

    /// Print the configuration file path
    Path,
}

fn init_logging(verbose: bool, settings: &GlobalSettings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose || settings.debug {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    let registry = tracing_subscriber::registry().with(filter);
    match settings.log_format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(fmt::layer().with_target(false)).init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = notegate_core::Config::load_default()
        .map(|c| c.settings)
        .unwrap_or_default();
    init_logging(cli.verbose, &settings);

    match cli.command {
        Commands::Gateway { action } => {
            let args = match action {
                GatewayCommands::Run {
                    port,
                    bind,
                    memory_store,
                } => commands::gateway::GatewayArgs {
                    action: commands::gateway::GatewayAction::Run {
                        port,
                        bind,
                        memory_store,
                    },
                },
                GatewayCommands::Status => commands::gateway::GatewayArgs {
                    action: commands::gateway::GatewayAction::Status,
                },
            };
            commands::run_gateway(args).await?;
        }

        Commands::Doctor => {
            commands::run_doctor().await?;
        }

        Commands::Config { action } => {
            let action = match action {
                Some(ConfigCommands::Validate) => commands::config::ConfigAction::Validate,
                Some(ConfigCommands::Path) => commands::config::ConfigAction::Path,
                Some(ConfigCommands::Show) | None => commands::config::ConfigAction::Show,
            };
            commands::run_config(action)?;
        }
    }

    Ok(())
}
