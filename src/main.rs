// SPDX-License-Identifier: Apache-2.0

//! `openperfd`: wires up the eight module servers, the TVLP registry, and
//! the REST facade, optionally applying a startup config file (spec.md
//! section 6.4) before serving.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use openperf_api::{app_state, serve_with_ready, TvlpRegistry};
use openperf_rest_client::RestClient;
use openperf_server::ModuleServers;

/// Modular load-generation and measurement service.
#[derive(Parser, Debug)]
#[command(name = "openperfd", version, about)]
struct Args {
    /// Address the REST facade binds to.
    #[arg(long, default_value = "127.0.0.1:8080")]
    bind: String,

    /// Optional startup config file (spec.md section 6.4): a YAML
    /// `resources:` map applied over the REST facade once it is listening.
    #[arg(long)]
    config: Option<std::path::PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build the tokio runtime")?;

    runtime.block_on(run(args))
}

async fn run(args: Args) -> anyhow::Result<()> {
    let servers = Arc::new(ModuleServers::spawn());
    let rest = RestClient::new(format!("http://{}", args.bind));
    let tvlp = Arc::new(TvlpRegistry::new(rest.clone()));
    let state = app_state(Arc::clone(&servers), Arc::clone(&tvlp));

    let cancel = CancellationToken::new();

    let (ready_tx, ready_rx) = tokio::sync::oneshot::channel();
    let bind = args.bind.clone();
    let serve_cancel = cancel.clone();
    let serve_task = tokio::spawn(async move { serve_with_ready(&bind, state, serve_cancel, Some(ready_tx)).await });

    if let Some(path) = &args.config {
        // Wait for the REST facade's listener to actually be bound rather
        // than guessing how long that takes. If `serve_with_ready` drops the
        // sender without ever binding (bind-address parse failure, `bind()`
        // itself failing), fall through and let the `serve_task.await` below
        // report that real error instead of hanging here.
        let _ = ready_rx.await;
        let resources = openperf_config::load_file(path).with_context(|| format!("failed to load config file {}", path.display()))?;
        openperf_config::apply(&resources, &rest)
            .await
            .context("failed to apply startup config file")?;
        tracing::info!(path = %path.display(), count = resources.len(), "applied startup config file");
    }

    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
    cancel.cancel();
    serve_task.await.context("REST facade task panicked")?.context("REST facade exited with an error")?;

    drop(tvlp);
    let servers = Arc::try_unwrap(servers).unwrap_or_else(|_| panic!("module servers still referenced at shutdown"));
    servers.shutdown_and_join().map_err(|err| anyhow::anyhow!("module server shutdown failed: {err}"))?;

    Ok(())
}
