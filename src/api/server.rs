//! API server lifecycle: bind, serve, shut down.
//!
//! bind → spawn background task → return handle with shutdown channel.
//! A maintenance task purges expired sessions and reset codes while the
//! server runs.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::api::router::api_router;
use crate::core_state::CoreState;
use crate::db;

/// How often expired sessions and codes are purged.
pub const PURGE_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Metadata for a running server.
#[derive(Debug, Clone, Serialize)]
pub struct ServerInfo {
    pub server_addr: String,
    pub port: u16,
    pub started_at: String,
}

/// Handle to a running API server.
pub struct ApiServer {
    pub info: ServerInfo,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl ApiServer {
    /// Signal a graceful shutdown. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            tracing::info!("API server shutdown signal sent");
        }
    }

    /// Wait until the serve task has finished.
    pub async fn wait(&mut self) {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!("API server task failed: {e}");
            }
        }
    }
}

/// Remove expired sessions and reset codes once.
pub fn purge_expired(core: &CoreState) -> Result<(usize, usize), db::DatabaseError> {
    let conn = db::open_database(core.db_path())?;
    let now = chrono::Utc::now();
    let sessions = db::purge_expired_sessions(&conn, &now)?;
    let codes = db::purge_expired_codes(&conn, &now)?;
    Ok((sessions, codes))
}

/// Start the API server on `addr` (port 0 picks an ephemeral port).
pub async fn start_server_on(core: Arc<CoreState>, addr: SocketAddr) -> Result<ApiServer, String> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("Failed to bind API server on {addr}: {e}"))?;

    let addr = listener
        .local_addr()
        .map_err(|e| format!("Failed to get server address: {e}"))?;

    let app = api_router(core.clone());

    let info = ServerInfo {
        server_addr: addr.to_string(),
        port: addr.port(),
        started_at: chrono::Utc::now().to_rfc3339(),
    };

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        let maintenance = tokio::spawn(maintenance_loop(core));

        let shutdown_signal = async move {
            let _ = shutdown_rx.await;
            tracing::info!("API server received shutdown signal");
        };

        tracing::info!(%addr, "API server started");

        if let Err(e) = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal)
        .await
        {
            tracing::error!("API server error: {e}");
        }

        maintenance.abort();
        tracing::info!("API server stopped");
    });

    Ok(ApiServer {
        info,
        shutdown_tx: Some(shutdown_tx),
        task: Some(task),
    })
}

async fn maintenance_loop(core: Arc<CoreState>) {
    let mut ticker = tokio::time::interval(PURGE_INTERVAL);
    loop {
        ticker.tick().await;
        let core = core.clone();
        match tokio::task::spawn_blocking(move || purge_expired(&core)).await {
            Ok(Ok((sessions, codes))) if sessions + codes > 0 => {
                tracing::info!(sessions, codes, "Purged expired credentials");
            }
            Ok(Ok(_)) => {}
            Ok(Err(e)) => tracing::warn!("Credential purge failed: {e}"),
            Err(e) => tracing::warn!("Credential purge task failed: {e}"),
        }
    }
}
