//! # Webhook CA Updater
//!
//! Keeps an admission webhook's `caBundle` in sync with a CA file on disk.
//!
//! ## Overview
//!
//! 1. **Command intake** - `POST /` installs a reconciliation target
//!    (`{"webhook": "...", "ca_dir": "...", "ca_file": "..."}`)
//! 2. **Directory watch** - the target's directory is watched for changes
//! 3. **Validation** - the CA file must hold only PEM `CERTIFICATE` blocks
//! 4. **Patch** - a valid, changed bundle is written to every webhook entry
//!
//! Health probes and Prometheus metrics are served on the command port.

use anyhow::{Context, Result};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::Client;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use webhook_ca_updater::config::{Args, ControllerConfig};
use webhook_ca_updater::gateway::KubeWebhookGateway;
use webhook_ca_updater::server::{start_server, ServerState};
use webhook_ca_updater::updater::ReconcilerSupervisor;
use webhook_ca_updater::{metrics, observability};

#[tokio::main]
async fn main() -> Result<()> {
    // Required for rustls 0.23+ when no default provider is set via features
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_existing| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    let args = <Args as clap::Parser>::parse();
    args.validate()?;

    let config = ControllerConfig::from_env();
    observability::init_tracing(&config)?;

    info!("Starting Webhook CA Updater");
    info!(
        "Build info: datetime={}, git_hash={}",
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );
    info!(
        retry_interval_secs = config.retry_interval_secs,
        max_retries = ?config.max_retries,
        missing_on_start = config.webhook_missing_on_start.as_str(),
        missing_on_apply = config.webhook_missing_on_apply.as_str(),
        "Loaded configuration"
    );

    metrics::register_metrics()?;

    let client = kube_client(args.kubeconfig.as_deref()).await?;
    let gateway = Arc::new(KubeWebhookGateway::new(client));
    let supervisor = Arc::new(ReconcilerSupervisor::new(gateway, config.task_settings()));
    let server_state = Arc::new(ServerState::new(Arc::clone(&supervisor)));

    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone(), Arc::clone(&server_state));

    let served = start_server(args.port, server_state, shutdown.clone()).await;
    shutdown.cancel();

    supervisor.stop_all().await;
    info!("Webhook CA Updater stopped");

    served.inspect_err(|e| error!("HTTP server error: {:#}", e))
}

async fn kube_client(kubeconfig: Option<&Path>) -> Result<Client> {
    let Some(path) = kubeconfig else {
        return Client::try_default()
            .await
            .context("failed to create in-cluster Kubernetes client");
    };

    let kubeconfig = Kubeconfig::read_from(path)
        .with_context(|| format!("failed to read kubeconfig '{}'", path.display()))?;
    let config = kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .context("failed to load kubeconfig")?;
    info!("Using kubeconfig {}", path.display());
    Client::try_from(config).context("failed to create Kubernetes client")
}

/// Cancel `shutdown` on SIGINT or SIGTERM and mark the server not ready
fn spawn_signal_handler(shutdown: CancellationToken, server_state: Arc<ServerState>) {
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Received shutdown signal, initiating graceful shutdown...");
        server_state.set_ready(false);
        shutdown.cancel();
    });
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        Err(e) => {
            error!("Failed to install SIGTERM handler: {}", e);
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
