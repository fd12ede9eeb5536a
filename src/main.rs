//! Configuration relay (v1)
//!
//! Fetches layered configuration from repositories, directories and HTTP
//! endpoints, merges it by profile and keeps it fresh for in-process readers.
//!
//! # Architecture Overview
//!
//! ```text
//!    ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!    │  repository  │   │  directory   │   │   endpoint   │
//!    └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!           └──────────────────┼──────────────────┘
//!                              ▼  raw documents
//!                      ┌──────────────┐
//!                      │    merge     │  profile plan, type checks
//!                      └──────┬───────┘
//!                             ▼  snapshot vN
//!     timer / trigger  ┌──────────────┐        ┌──────────────┐
//!     ────────────────▶│   refresh    │───────▶│    store     │──▶ readers
//!                      │  controller  │        │  (arc-swap)  │
//!                      └──────────────┘        └──────┬───────┘
//!                                                     ▼
//!                                              ┌──────────────┐
//!                                              │  admin API   │
//!                                              └──────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tokio::net::TcpListener;

use config_relay::admin::{self, AdminState};
use config_relay::config::{load_settings, validate_profiles, SettingsError};
use config_relay::lifecycle::{signals, Relay, Shutdown};
use config_relay::merge::MergePlan;
use config_relay::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "config-relay")]
#[command(about = "Fetch, merge and serve externalized configuration", long_about = None)]
struct Args {
    /// Settings file.
    #[arg(short, long, default_value = "relay.toml")]
    config: PathBuf,

    /// Active profiles, lowest precedence first. Overrides `profiles` in the settings file.
    #[arg(short, long, env = "RELAY_PROFILES", value_delimiter = ',')]
    profiles: Option<Vec<String>>,

    /// Run a single refresh, print the merged configuration and exit.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let settings = match load_settings(&args.config) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("config-relay: {}: {}", args.config.display(), e);
            return ExitCode::FAILURE;
        }
    };

    logging::init(&settings.observability.log_level);
    tracing::info!("config-relay v{} starting", env!("CARGO_PKG_VERSION"));

    match run(args, settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "config-relay exiting with error");
            ExitCode::FAILURE
        }
    }
}

async fn run(
    args: Args,
    settings: config_relay::RelaySettings,
) -> Result<(), Box<dyn std::error::Error>> {
    let plan = MergePlan::new(args.profiles.unwrap_or_else(|| settings.profiles.clone()));
    validate_profiles(plan.active()).map_err(SettingsError::Validation)?;

    tracing::info!(
        profiles = ?plan.profiles(),
        sources = settings.sources.len(),
        "Settings loaded"
    );

    if settings.observability.metrics_enabled && !args.once {
        match settings.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %settings.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let relay = Relay::build(&settings, plan)?;
    let fail_fast = settings.refresh.fail_fast || args.once;
    relay.initial_refresh(fail_fast).await?;

    if args.once {
        let snapshot = relay.store().current();
        println!("{}", serde_json::to_string_pretty(snapshot.as_ref())?);
        return Ok(());
    }

    let shutdown = Shutdown::new();
    let stopped = shutdown.signalled();
    let admin_state = AdminState {
        store: relay.store(),
        controller: relay.controller(),
    };
    signals::spawn_signal_listener(relay.handle(), shutdown.clone());

    let admin_task = if settings.admin.enabled {
        let listener = TcpListener::bind(&settings.admin.bind_address).await?;
        Some(tokio::spawn(admin::serve(listener, admin_state, shutdown.clone())))
    } else {
        None
    };

    let controller_task = relay.spawn(&shutdown);

    stopped.await;
    tracing::info!("Shutdown signal received, stopping tasks");

    controller_task.await?;
    if let Some(task) = admin_task {
        task.await??;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
