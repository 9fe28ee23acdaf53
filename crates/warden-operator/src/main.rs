//! etcd-warden operator - health conditions for etcd clusters on Kubernetes

use std::sync::Arc;

use clap::Parser;
use futures::StreamExt;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client, CustomResourceExt};
use tokio_util::sync::CancellationToken;

use warden_common::crd::Etcd;
use warden_common::telemetry::init_logging;
use warden_operator::{error_policy, reconcile, Context, OperatorConfig};

/// etcd-warden - derives and records the health of etcd clusters
#[derive(Parser, Debug)]
#[command(name = "warden-operator", version, about, long_about = None)]
struct Cli {
    /// Print the Etcd CRD manifest and exit
    #[arg(long)]
    crd: bool,

    #[command(flatten)]
    config: OperatorConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.crd {
        let crd = serde_yaml::to_string(&Etcd::crd())
            .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))?;
        println!("{crd}");
        return Ok(());
    }

    init_logging(cli.config.log_format)?;

    let client = Client::try_default().await?;
    let etcds: Api<Etcd> = match cli.config.namespace.as_deref() {
        Some(namespace) => Api::namespaced(client.clone(), namespace),
        None => Api::all(client.clone()),
    };

    let shutdown = CancellationToken::new();
    let ctx = Arc::new(Context::new(client, &cli.config, shutdown.clone()));

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received, cancelling in-flight probes");
            signal_token.cancel();
        }
    });

    tracing::info!(
        namespace = cli.config.namespace.as_deref().unwrap_or("<all>"),
        probe_interval = ?cli.config.probe_interval(),
        "Starting Etcd status controller"
    );

    Controller::new(etcds, WatcherConfig::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok(action) => {
                    tracing::debug!(?action, "Etcd reconciliation completed");
                }
                Err(e) => {
                    tracing::error!(error = ?e, "Etcd reconciliation error");
                }
            }
        })
        .await;

    shutdown.cancel();
    tracing::info!("Etcd status controller stopped");
    Ok(())
}
