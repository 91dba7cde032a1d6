pub mod adherence;
pub mod ai;
pub mod api;
pub mod config;
pub mod core_state;
pub mod crypto;
pub mod db;
pub mod mail;
pub mod models;
pub mod validation;

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::core_state::{CoreError, CoreState};

#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("Cannot start async runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error("{0}")]
    Server(String),
}

/// Configure, open the database and serve until Ctrl-C.
pub fn run() -> Result<(), StartupError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let config = config::Config::from_env()?;
    let addr = config.bind_addr();

    // Blocking HTTP clients live in CoreState: build it, and drop the last
    // reference, outside the runtime.
    let core = Arc::new(CoreState::from_config(config)?);
    core.init_db()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(serve(core.clone(), addr));
    drop(runtime);
    drop(core);
    result
}

async fn serve(core: Arc<CoreState>, addr: SocketAddr) -> Result<(), StartupError> {
    let mut server = api::start_server_on(core, addr)
        .await
        .map_err(StartupError::Server)?;
    tracing::info!(addr = %server.info.server_addr, "Listening");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Cannot listen for Ctrl-C: {e}");
    }
    server.shutdown();
    server.wait().await;
    Ok(())
}
