pub mod api; // Reference persistence collaborator
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod pipeline;

use tracing_subscriber::EnvFilter;

/// Initialize tracing from `RUST_LOG`, falling back to
/// `config::default_log_filter()`.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();
}

/// Run the persistence server until Ctrl-C.
pub async fn run() -> Result<(), String> {
    let server_config = config::ServerConfig::from_env();
    tracing::info!(
        "{} persistence server v{} starting",
        config::APP_NAME,
        config::APP_VERSION
    );

    let ctx = api::ApiContext::open(&server_config)
        .map_err(|e| format!("Cannot open database {}: {e}", server_config.database_path.display()))?;
    let mut server = api::start_api_server(ctx, &server_config.bind_addr).await?;
    tracing::info!(url = %server.base_url(), "Listening");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Cannot listen for shutdown signal: {e}");
    }
    server.shutdown();
    server.wait().await;
    Ok(())
}
