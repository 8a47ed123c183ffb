// SPDX-License-Identifier: Apache-2.0

//! Assembles the full REST surface and serves it (grounded on the teacher's
//! `admin::run`: bind, build the router, `axum::serve` with graceful
//! shutdown).

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use openperf_model::module::{
    BlockGeneratorConfig, BlockGeneratorStats, CpuGeneratorConfig, CpuGeneratorStats, MemoryGeneratorConfig, MemoryGeneratorStats,
    NetworkGeneratorConfig, NetworkGeneratorStats, PacketGeneratorConfig, PacketGeneratorStats, PassthroughConfig, PassthroughStats,
};
use openperf_server::ModuleServers;

use crate::error::ApiError;
use crate::module_routes;
use crate::state::AppState;
use crate::tvlp_registry::TvlpRegistry;
use crate::tvlp_routes;

/// Builds the full `Router<AppState>`: every module's REST surface (spec.md
/// section 6.2) merged with the TVLP endpoints.
#[must_use]
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(module_routes::routes::<CpuGeneratorConfig, CpuGeneratorStats>(
            "cpu",
            "cpu-results",
            false,
            Arc::new(|s: &AppState| s.servers.cpu.sender()),
        ))
        .merge(module_routes::routes::<MemoryGeneratorConfig, MemoryGeneratorStats>(
            "memory",
            "memory-results",
            false,
            Arc::new(|s: &AppState| s.servers.memory.sender()),
        ))
        .merge(module_routes::routes::<BlockGeneratorConfig, BlockGeneratorStats>(
            "block",
            "block-results",
            false,
            Arc::new(|s: &AppState| s.servers.block.sender()),
        ))
        .merge(module_routes::routes::<NetworkGeneratorConfig, NetworkGeneratorStats>(
            "network",
            "network-results",
            true,
            Arc::new(|s: &AppState| s.servers.network.sender()),
        ))
        .merge(module_routes::routes::<PacketGeneratorConfig, PacketGeneratorStats>(
            "packet-generator",
            "packet-generator-results",
            true,
            Arc::new(|s: &AppState| s.servers.packet_generator.sender()),
        ))
        .merge(module_routes::routes::<PassthroughConfig, PassthroughStats>(
            "packet-analyzer",
            "packet-analyzer-results",
            false,
            Arc::new(|s: &AppState| s.servers.packet_analyzer.sender()),
        ))
        .merge(module_routes::routes::<PassthroughConfig, PassthroughStats>(
            "packet-capture",
            "packet-capture-results",
            false,
            Arc::new(|s: &AppState| s.servers.packet_capture.sender()),
        ))
        .merge(module_routes::routes::<PassthroughConfig, PassthroughStats>(
            "stack",
            "stack-results",
            false,
            Arc::new(|s: &AppState| s.servers.stack.sender()),
        ))
        .merge(tvlp_routes::routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Builds the shared state from already-spawned module servers and a fresh
/// TVLP registry pointed at this process's own REST facade.
#[must_use]
pub fn app_state(servers: Arc<ModuleServers>, tvlp: Arc<TvlpRegistry>) -> AppState {
    AppState { servers, tvlp }
}

/// Binds `bind_address`, serves the router until `cancel` fires, and returns
/// once the server has shut down (grounded on the teacher's `admin::run`).
pub async fn serve(bind_address: &str, state: AppState, cancel: CancellationToken) -> Result<(), ApiError> {
    serve_with_ready(bind_address, state, cancel, None).await
}

/// As [`serve`], but fires `ready` (if given) the instant the listener is
/// bound — before the router is even built — so a caller that needs to start
/// issuing requests against this facade (e.g. bootstrap config replay) has a
/// real readiness signal instead of a guessed delay.
pub async fn serve_with_ready(
    bind_address: &str,
    state: AppState,
    cancel: CancellationToken,
    ready: Option<oneshot::Sender<()>>,
) -> Result<(), ApiError> {
    let addr: SocketAddr = bind_address
        .parse()
        .map_err(|e| ApiError::tvlp_invalid(format!("invalid bind address \"{bind_address}\": {e}")))?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::Bus(format!("failed to bind {addr}: {e}")))?;

    tracing::info!(%addr, "openperf REST facade listening");
    if let Some(ready) = ready {
        // The receiver may have been dropped (e.g. no bootstrap config was
        // requested); that's not a server error.
        let _ = ready.send(());
    }

    let app = router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            cancel.cancelled().await;
        })
        .await
        .map_err(|e| ApiError::Bus(format!("server error: {e}")))
}
