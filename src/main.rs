//! # idclaim - IdentityClaim operator
//!
//! ## Startup Sequence
//!
//! 1. **Configuration** - Load the optional TOML file, apply CLI overrides, validate
//! 2. **Tracing** - Install the subscriber in the configured format
//! 3. **Kubernetes client** - Infer from the in-cluster environment or kubeconfig
//! 4. **Controller** - Watch claims and owned certificates until shutdown
//!
//! ## Shutdown
//!
//! SIGTERM/SIGINT stop the controller; in-flight passes are dropped and the
//! next start re-derives everything from cluster state.

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![forbid(clippy::panic)]
#![deny(clippy::expect_used)]

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use idclaim_core::{LogConfig, LogFormat, OperatorConfig};
use idclaim_reconciler::{controller, crd_with_ttl_policy};
use kube::Client;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config =
        OperatorConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    cli.apply_overrides(&mut config);
    config
        .validate()
        .context("Invalid configuration after applying command-line overrides")?;

    match cli.command {
        Commands::Run { .. } => {
            init_tracing(&config.log, cli.log_filter.is_some());
            run(&config).await
        }
        Commands::Crd => print_crd(&config),
    }
}

/// Initialize tracing subscriber with environment filter.
///
/// An explicit `--log-filter` wins over `RUST_LOG`, which wins over the
/// configured filter.
fn init_tracing(log: &LogConfig, explicit: bool) {
    let filter = if explicit {
        EnvFilter::new(&log.filter)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.filter))
    };

    let registry = tracing_subscriber::registry().with(filter);
    match log.format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn run(config: &OperatorConfig) -> Result<()> {
    info!(version = env!("CARGO_PKG_VERSION"), "idclaim starting");

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client. Check KUBECONFIG or the in-cluster service account")?;

    controller::run(client, config)
        .await
        .context("Controller terminated with an error")?;

    info!("idclaim stopped gracefully");
    Ok(())
}

fn print_crd(config: &OperatorConfig) -> Result<()> {
    let crd = crd_with_ttl_policy(
        config.identity.default_ttl,
        config.identity.min_ttl,
        config.identity.max_ttl,
    );
    let yaml = serde_yaml::to_string(&crd).context("Failed to render CRD as YAML")?;
    print!("{yaml}");
    Ok(())
}
