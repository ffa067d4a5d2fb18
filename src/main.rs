//! # ec2-operator
//!
//! Entry point for the EC2 operator.
//!
//! ## Startup Sequence
//!
//! 1. **Configuration** - file (optional), then `EC2_OPERATOR_*` variables,
//!    then command-line flags
//! 2. **Kubernetes client** - in-cluster config or the local kubeconfig
//! 3. **EC2 client** - credentials resolved once for the configured region
//! 4. **Controller** - watches `EC2Instance` objects until SIGINT/SIGTERM

#![forbid(unsafe_code)]
#![forbid(clippy::unwrap_used)]
#![forbid(clippy::panic)]
#![deny(clippy::expect_used)]

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use kube::CustomResourceExt;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use ec2_operator::cli::{Cli, Commands};
use ec2_operator::controller;
use ec2_operator_aws::Ec2Provisioner;
use ec2_operator_core::OperatorConfig;
use ec2_operator_crd::{Ec2Instance, KubeRecordStore};
use ec2_operator_reconciler::{ReconcilerBuilder, TracingRecordStore};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Crd => print_crd(),
        Commands::Run { namespace, config } => {
            init_tracing();
            run(namespace, config.as_deref()).await
        }
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn print_crd() -> Result<()> {
    let yaml = serde_yaml::to_string(&Ec2Instance::crd()).context("Failed to render CRD")?;
    print!("{yaml}");
    Ok(())
}

/// Resolve the effective configuration.
fn load_config(namespace: Option<String>, path: Option<&Path>) -> Result<OperatorConfig> {
    let base = match path {
        Some(path) => OperatorConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => OperatorConfig::default(),
    };

    let config = base
        .with_overrides(|key| std::env::var(key).ok())
        .context("Invalid EC2_OPERATOR_* environment")?;

    Ok(match namespace.filter(|ns| !ns.is_empty()) {
        Some(namespace) => config.namespace(namespace),
        None => config,
    })
}

async fn run(namespace: Option<String>, config_path: Option<&Path>) -> Result<()> {
    let start_time = Instant::now();
    info!("EC2 operator starting...");

    let config = load_config(namespace, config_path)?;
    info!(
        region = %config.region,
        namespace = config.namespace.as_deref().unwrap_or("*"),
        error_requeue_secs = config.error_requeue.as_secs(),
        "Configuration loaded"
    );

    let client = kube::Client::try_default()
        .await
        .context("Failed to create Kubernetes client. Check KUBECONFIG or in-cluster service account")?;

    let provisioner = Ec2Provisioner::connect(&config)
        .await
        .context("Failed to initialize EC2 client")?;

    let store = TracingRecordStore::new(KubeRecordStore::new(
        client.clone(),
        config.field_manager.clone(),
    ));

    let reconciler = ReconcilerBuilder::new()
        .with_store(Arc::new(store))
        .with_provisioner(Arc::new(provisioner))
        .build()
        .context("Failed to build reconciler")?;

    info!(
        elapsed_ms = start_time.elapsed().as_millis(),
        "Startup complete"
    );

    controller::run(client, Arc::new(controller::Context::new(reconciler, config))).await;

    info!("EC2 operator stopped");
    Ok(())
}
